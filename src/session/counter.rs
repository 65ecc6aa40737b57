//! Count of sessions whose serve loop is still running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sessions between handshake start and teardown, across every app.
static ACTIVE_SESSIONS: AtomicU64 = AtomicU64::new(0);

/// Held by `Session::run` so the count and the `gqlwire_sessions_active`
/// gauge fall back even when the session future is dropped mid-flight.
pub(super) struct ActiveSession;

impl ActiveSession {
    pub(super) fn new() -> Self {
        ACTIVE_SESSIONS.fetch_add(1, Ordering::Relaxed);
        crate::metrics::inc_sessions();
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        ACTIVE_SESSIONS.fetch_sub(1, Ordering::Relaxed);
        crate::metrics::dec_sessions();
    }
}

/// Number of sessions currently being served.
#[must_use]
pub fn active_session_count() -> u64 { ACTIVE_SESSIONS.load(Ordering::Relaxed) }
