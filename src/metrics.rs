//! Metric helpers for `gqlwire`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live subscription-transport sessions.
pub const SESSIONS_ACTIVE: &str = "gqlwire_sessions_active";
/// Name of the gauge tracking running streaming subscriptions.
pub const SUBSCRIPTIONS_ACTIVE: &str = "gqlwire_subscriptions_active";
/// Name of the counter tracking protocol messages.
pub const MESSAGES_TOTAL: &str = "gqlwire_messages_total";
/// Name of the counter tracking protocol, transport and execution errors.
pub const ERRORS_TOTAL: &str = "gqlwire_errors_total";

/// Direction of message processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Messages received from a client.
    Inbound,
    /// Messages sent to a client.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "only used as a label"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active sessions gauge.
pub fn inc_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_sessions() {
    #[cfg(feature = "metrics")]
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Increment the active subscriptions gauge.
pub fn inc_subscriptions() {
    #[cfg(feature = "metrics")]
    gauge!(SUBSCRIPTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active subscriptions gauge.
pub fn dec_subscriptions() {
    #[cfg(feature = "metrics")]
    gauge!(SUBSCRIPTIONS_ACTIVE).decrement(1.0);
}

/// Record a message for the given direction.
pub fn inc_messages(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error occurrence.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}
