//! Per-session subscription registry.
//!
//! Only the session loop mutates the registry. Subscription tasks report
//! their exit through the channel returned by [`Registry::new`], and the loop
//! applies the removal with [`Registry::finish`]. Each entry carries a key
//! so a late notice from a cancelled task cannot remove a newer entry that
//! reused the same id.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

use crate::subscription::Finished;

struct Entry {
    key: u64,
    token: CancellationToken,
}

/// Handles given to a newly registered subscription task.
pub(super) struct Ticket {
    pub(super) key: u64,
    pub(super) token: CancellationToken,
    pub(super) finished: mpsc::UnboundedSender<Finished>,
}

pub(super) struct Registry {
    entries: HashMap<String, Entry>,
    next_key: u64,
    tracker: TaskTracker,
    finished_tx: mpsc::UnboundedSender<Finished>,
}

impl Registry {
    pub(super) fn new() -> (Self, mpsc::UnboundedReceiver<Finished>) {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        (
            Self {
                entries: HashMap::new(),
                next_key: 0,
                tracker: TaskTracker::new(),
                finished_tx,
            },
            finished_rx,
        )
    }

    pub(super) fn contains(&self, id: &str) -> bool { self.entries.contains_key(id) }

    pub(super) fn len(&self) -> usize { self.entries.len() }

    pub(super) fn tracker(&self) -> &TaskTracker { &self.tracker }

    /// Register `id`. The caller must have checked it is not present.
    pub(super) fn insert(&mut self, id: String) -> Ticket {
        let key = self.next_key;
        self.next_key += 1;
        let token = CancellationToken::new();
        self.entries.insert(
            id,
            Entry {
                key,
                token: token.clone(),
            },
        );
        Ticket {
            key,
            token,
            finished: self.finished_tx.clone(),
        }
    }

    /// Cancel and remove `id`. Unknown ids are ignored.
    pub(super) fn cancel(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                entry.token.cancel();
                debug!(id = %id, "subscription cancel requested");
                true
            }
            None => false,
        }
    }

    /// Remove `id` if it still belongs to the task identified by `key`.
    pub(super) fn finish(&mut self, id: &str, key: u64) -> bool {
        if self.entries.get(id).is_some_and(|entry| entry.key == key) {
            self.entries.remove(id);
            true
        } else {
            false
        }
    }

    /// Cancel every entry and wait for all tasks to exit.
    pub(super) async fn shutdown(&mut self) {
        for (id, entry) in self.entries.drain() {
            entry.token.cancel();
            debug!(id = %id, "subscription cancelled by teardown");
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tracing_test::traced_test;

    use super::*;

    #[fixture]
    fn registry() -> Registry { Registry::new().0 }

    #[rstest]
    fn insert_then_cancel(mut registry: Registry) {
        let ticket = registry.insert("a".into());
        assert!(registry.contains("a"));
        assert!(registry.cancel("a"));
        assert!(ticket.token.is_cancelled());
        assert!(!registry.contains("a"));
        assert!(!registry.cancel("a"), "second cancel is a no-op");
    }

    #[rstest]
    fn stale_finish_keeps_newer_entry(mut registry: Registry) {
        let old = registry.insert("a".into());
        registry.cancel("a");
        let new = registry.insert("a".into());
        assert_ne!(old.key, new.key);
        assert!(!registry.finish("a", old.key));
        assert!(registry.contains("a"));
        assert!(registry.finish("a", new.key));
        assert_eq!(registry.len(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn shutdown_cancels_and_waits(mut registry: Registry) {
        let ticket = registry.insert("a".into());
        let token = ticket.token.clone();
        registry.tracker().spawn(async move { token.cancelled().await });
        registry.shutdown().await;
        assert!(ticket.token.is_cancelled());
        assert_eq!(registry.len(), 0);
        assert!(registry.tracker().is_empty());
    }

    #[rstest]
    #[traced_test]
    #[tokio::test]
    async fn teardown_logs_each_cancelled_id(mut registry: Registry) {
        let _first = registry.insert("first".into());
        let _second = registry.insert("second".into());
        registry.shutdown().await;
        assert!(logs_contain("subscription cancelled by teardown"));
        assert!(logs_contain("id=first"));
        assert!(logs_contain("id=second"));
    }
}
