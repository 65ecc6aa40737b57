//! Streaming subscription task.
//!
//! One task runs per streaming operation. It pulls from a [`BoxSequence`],
//! assembles each element into a `next` message and finishes with exactly
//! one `complete` or `error`, unless its cancellation token fires first. A
//! new element is not requested until the previous message has been sent.
//!
//! Tasks never touch the session registry. They post a [`Finished`] notice
//! so the session loop can remove the entry itself. A `complete` or `error`
//! frame is only sent after its notice is queued, so a client that reuses
//! the id on seeing the frame never races the removal.

use std::panic::AssertUnwindSafe;

use futures::{FutureExt, Sink};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::{
    error::map_error,
    metrics,
    panic::panic_message,
    protocol::Message,
    response::assemble,
    stream::{BoxSequence, SequenceItem},
    transport::{Delivery, Frame, Outbound},
};

/// How a subscription task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The sequence ended and `complete` was sent.
    Completed,
    /// The sequence failed and `error` was sent.
    Failed,
    /// The task was cancelled; nothing further was sent.
    Cancelled,
    /// The transport rejected a frame.
    TransportFailed,
}

/// Notice posted to the session when a task exits.
#[derive(Debug)]
pub(crate) struct Finished {
    pub(crate) id: String,
    pub(crate) key: u64,
    pub(crate) outcome: Outcome,
}

/// RAII guard tracking running subscription tasks.
struct ActiveSubscription;

impl ActiveSubscription {
    fn new() -> Self {
        metrics::inc_subscriptions();
        Self
    }
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) { metrics::dec_subscriptions(); }
}

pub(crate) struct Subscription<S> {
    pub(crate) id: String,
    pub(crate) key: u64,
    pub(crate) sequence: BoxSequence,
    pub(crate) outbound: Outbound<S>,
    pub(crate) token: CancellationToken,
    pub(crate) finished: mpsc::UnboundedSender<Finished>,
}

impl<S> Subscription<S>
where
    S: Sink<Frame> + Unpin + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    /// Spawn the task on `tracker`.
    pub(crate) fn spawn(self, tracker: &TaskTracker) {
        tracker.spawn(self.run());
    }

    async fn run(mut self) {
        let _active = ActiveSubscription::new();
        debug!(id = %self.id, "subscription started");
        let outcome = match AssertUnwindSafe(self.drive()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("subscription task panicked: id={}, panic={message}", self.id);
                metrics::inc_errors();
                self.sequence.cancel();
                let error = Message::Error {
                    id: self.id.clone(),
                    payload: "subscription task panicked".to_owned(),
                };
                self.finish_with(error, Outcome::Failed).await
            }
        };
        debug!(id = %self.id, ?outcome, "subscription finished");
        // Completed and Failed were announced before their frame went out.
        if !matches!(outcome, Outcome::Completed | Outcome::Failed) {
            self.notify(outcome);
        }
    }

    fn notify(&self, outcome: Outcome) {
        // The session may already be gone; nothing is left to notify then.
        let _ = self.finished.send(Finished {
            id: self.id.clone(),
            key: self.key,
            outcome,
        });
    }

    /// Announce `outcome` and then send the terminal `message`.
    ///
    /// Returns the outcome actually reached. A stale announcement is
    /// harmless because the registry ignores keys it no longer holds.
    async fn finish_with(&mut self, message: Message, outcome: Outcome) -> Outcome {
        self.notify(outcome);
        match self.outbound.send_unless_cancelled(&self.token, &message).await {
            Ok(Delivery::Sent) => outcome,
            Ok(Delivery::Suppressed) => Outcome::Cancelled,
            Err(e) => {
                warn!(id = %self.id, error = %e, "subscription send failed");
                Outcome::TransportFailed
            }
        }
    }

    async fn drive(&mut self) -> Outcome {
        loop {
            let item = tokio::select! {
                biased;
                () = self.token.cancelled() => None,
                item = self.sequence.next() => Some(item),
            };
            let Some(item) = item else {
                self.sequence.cancel();
                debug!(id = %self.id, "subscription cancelled");
                return Outcome::Cancelled;
            };

            let id = self.id.clone();
            let (message, terminal) = match item {
                SequenceItem::Element(result) => (
                    Message::Next {
                        id,
                        payload: assemble(result),
                    },
                    None,
                ),
                SequenceItem::End => (Message::Complete { id }, Some(Outcome::Completed)),
                SequenceItem::Failed(failure) => {
                    warn!(id = %self.id, error = %failure, "subscription stream failed");
                    metrics::inc_errors();
                    (
                        Message::Error {
                            id,
                            payload: map_error(&failure).message,
                        },
                        Some(Outcome::Failed),
                    )
                }
            };

            if let Some(outcome) = terminal {
                return self.finish_with(message, outcome).await;
            }
            match self.outbound.send_unless_cancelled(&self.token, &message).await {
                Ok(Delivery::Sent) => {}
                Ok(Delivery::Suppressed) => {
                    self.sequence.cancel();
                    return Outcome::Cancelled;
                }
                Err(e) => {
                    warn!(id = %self.id, error = %e, "subscription send failed");
                    self.sequence.cancel();
                    return Outcome::TransportFailed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::{StreamExt, channel::mpsc as chan, stream};
    use serde_json::json;

    use super::*;
    use crate::{
        engine::ExecutionResult,
        error::ExecutionFailure,
        stream::{PullSequence, ResultSequence},
    };

    struct Harness {
        tracker: TaskTracker,
        token: CancellationToken,
        frames: chan::UnboundedReceiver<Frame>,
        finished: mpsc::UnboundedReceiver<Finished>,
    }

    fn start(sequence: BoxSequence) -> Harness {
        let (tx, frames) = chan::unbounded();
        let (finished_tx, finished) = mpsc::unbounded_channel();
        let tracker = TaskTracker::new();
        let token = CancellationToken::new();
        Subscription {
            id: "7".into(),
            key: 3,
            sequence,
            outbound: Outbound::new(tx),
            token: token.clone(),
            finished: finished_tx,
        }
        .spawn(&tracker);
        tracker.close();
        Harness {
            tracker,
            token,
            frames,
            finished,
        }
    }

    fn pull(items: Vec<Result<ExecutionResult, ExecutionFailure>>) -> BoxSequence {
        Box::new(PullSequence::new(Box::pin(stream::iter(items))))
    }

    async fn text(frames: &mut chan::UnboundedReceiver<Frame>) -> serde_json::Value {
        match frames.next().await {
            Some(Frame::Text(text)) => serde_json::from_str(&text).expect("json frame"),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn elements_then_complete() {
        let mut h = start(pull(vec![
            Ok(ExecutionResult::data(json!({"n": 1}))),
            Ok(ExecutionResult::data(json!({"n": 2}))),
        ]));
        h.tracker.wait().await;
        assert_eq!(
            text(&mut h.frames).await,
            json!({"type": "next", "id": "7", "payload": {"data": {"n": 1}}})
        );
        assert_eq!(
            text(&mut h.frames).await,
            json!({"type": "next", "id": "7", "payload": {"data": {"n": 2}}})
        );
        assert_eq!(text(&mut h.frames).await, json!({"type": "complete", "id": "7"}));
        let finished = h.finished.recv().await.expect("finished notice");
        assert_eq!((finished.id.as_str(), finished.key), ("7", 3));
        assert_eq!(finished.outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn notice_is_queued_before_the_terminal_frame() {
        let mut h = start(pull(vec![Ok(ExecutionResult::data(json!(1)))]));
        assert_eq!(text(&mut h.frames).await["type"], "next");
        assert_eq!(text(&mut h.frames).await["type"], "complete");
        let finished = h.finished.try_recv().expect("notice precedes complete");
        assert_eq!(finished.outcome, Outcome::Completed);
        h.tracker.wait().await;
        assert!(h.finished.try_recv().is_err(), "exactly one notice");
    }

    #[tokio::test]
    async fn failure_sends_error_without_complete() {
        let mut h = start(pull(vec![
            Ok(ExecutionResult::data(json!(1))),
            Err(ExecutionFailure::msg("upstream closed")),
        ]));
        h.tracker.wait().await;
        assert_eq!(text(&mut h.frames).await["type"], "next");
        assert_eq!(
            text(&mut h.frames).await,
            json!({"type": "error", "id": "7", "payload": "upstream closed"})
        );
        let finished = h.finished.recv().await.expect("finished notice");
        assert_eq!(finished.outcome, Outcome::Failed);
        assert!(matches!(h.frames.try_next(), Ok(None)), "no complete after error");
    }

    #[tokio::test]
    async fn cancellation_stops_sends() {
        let never = stream::pending::<Result<ExecutionResult, ExecutionFailure>>();
        let mut h = start(Box::new(PullSequence::new(Box::pin(never))));
        h.token.cancel();
        h.tracker.wait().await;
        let finished = h.finished.recv().await.expect("finished notice");
        assert_eq!(finished.outcome, Outcome::Cancelled);
        assert!(matches!(h.frames.try_next(), Ok(None)), "nothing sent after cancel");
    }

    struct Exploding;

    #[async_trait]
    impl ResultSequence for Exploding {
        async fn next(&mut self) -> SequenceItem { panic!("sequence exploded") }

        fn cancel(&mut self) {}
    }

    #[tokio::test]
    async fn panics_are_reported_for_the_operation() {
        let mut h = start(Box::new(Exploding));
        h.tracker.wait().await;
        assert_eq!(
            text(&mut h.frames).await,
            json!({"type": "error", "id": "7", "payload": "subscription task panicked"})
        );
        let finished = h.finished.recv().await.expect("finished notice");
        assert_eq!(finished.outcome, Outcome::Failed);
    }
}
