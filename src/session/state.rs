//! Session lifecycle state and termination report.

use crate::protocol::CloseCode;

/// Lifecycle of a subscription-transport session.
///
/// `Terminated` is final; a session never leaves it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for `connection_init`.
    #[default]
    AwaitingInit,
    /// Acknowledged; operations may be started.
    Ready,
    /// Closed for any reason. All subscription tasks have stopped.
    Terminated,
}

impl SessionState {
    /// Returns `true` while the session is still accepting messages.
    #[must_use]
    pub const fn is_open(self) -> bool { !matches!(self, Self::Terminated) }
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The session closed the transport with this code.
    Closed(CloseCode),
    /// The client went away.
    Disconnected,
    /// Reading from or writing to the transport failed.
    TransportFailed,
}

impl Termination {
    /// Close code sent to the client, if any.
    #[must_use]
    pub fn close_code(&self) -> Option<&CloseCode> {
        match self {
            Self::Closed(code) => Some(code),
            Self::Disconnected | Self::TransportFailed => None,
        }
    }
}
