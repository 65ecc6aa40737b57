//! Session configuration.
//!
//! [`SessionConfig`] holds the knobs of the subscription-transport state
//! machine. The defaults match the reference `graphql-transport-ws` server:
//! a five second initialisation deadline and an empty acknowledgement payload.

use std::time::Duration;

use crate::JsonMap;

/// Default time a client has to send `connection_init`.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Configuration applied to every [`crate::Session`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Deadline for the first message after the transport opens.
    pub init_timeout: Duration,
    /// Payload sent with `connection_ack`. `None` omits the field.
    pub ack_payload: Option<JsonMap>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            init_timeout: DEFAULT_INIT_TIMEOUT,
            ack_payload: Some(JsonMap::new()),
        }
    }
}

impl SessionConfig {
    /// Set the initialisation deadline.
    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Set the payload sent with `connection_ack`.
    #[must_use]
    pub fn ack_payload(mut self, payload: Option<JsonMap>) -> Self {
        self.ack_payload = payload;
        self
    }
}
