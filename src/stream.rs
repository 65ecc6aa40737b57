//! Result sequences produced by streaming operations.
//!
//! An engine may answer a subscription with one of two stream shapes:
//!
//! - a push-based [`PushSource`], fed through an [`Emitter`] by producer code
//!   that decides on its own when the next value is ready;
//! - a pull-based [`ResultStream`] that yields its next value only when
//!   polled.
//!
//! Both are adapted to the common [`ResultSequence`] interface so the
//! subscription task never needs to know which shape is in play. Each shim
//! buffers at most one undelivered element; the next one is not consumed
//! until the caller asks for it.

use std::future::Future;

use async_trait::async_trait;
use futures::{StreamExt, future::BoxFuture};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    engine::{ExecutionResult, ResultStream},
    error::ExecutionFailure,
};

const PUSH_BUFFER: usize = 1;

/// Event delivered by a push-based source.
#[derive(Debug)]
pub enum PushEvent {
    /// One result for the operation.
    Next(ExecutionResult),
    /// The source failed. No further events are read.
    Error(ExecutionFailure),
    /// The source finished normally.
    Complete,
}

/// Returned by [`Emitter`] once the consuming side has gone away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("push source closed")]
pub struct SourceClosed;

/// Cloneable producer half of a [`PushSource`].
///
/// Each call waits until the previous event has been taken by the consumer.
#[derive(Clone, Debug)]
pub struct Emitter {
    tx: mpsc::Sender<PushEvent>,
}

impl Emitter {
    async fn emit(&self, event: PushEvent) -> Result<(), SourceClosed> {
        self.tx.send(event).await.map_err(|_| SourceClosed)
    }

    /// Push one result.
    ///
    /// # Errors
    ///
    /// Returns [`SourceClosed`] if the operation was cancelled.
    pub async fn next(&self, result: ExecutionResult) -> Result<(), SourceClosed> {
        self.emit(PushEvent::Next(result)).await
    }

    /// Fail the source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceClosed`] if the operation was cancelled.
    pub async fn error(&self, failure: impl Into<ExecutionFailure>) -> Result<(), SourceClosed> {
        self.emit(PushEvent::Error(failure.into())).await
    }

    /// Finish the source.
    ///
    /// # Errors
    ///
    /// Returns [`SourceClosed`] if the operation was cancelled.
    pub async fn complete(&self) -> Result<(), SourceClosed> {
        self.emit(PushEvent::Complete).await
    }

    /// Returns `true` once the consumer has stopped listening.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }

    /// Wait until the consumer stops listening.
    pub async fn closed(&self) { self.tx.closed().await; }
}

/// Push-based event source returned as result data.
///
/// Dropping every [`Emitter`] without calling [`Emitter::complete`] is
/// treated as completion.
pub struct PushSource {
    events: mpsc::Receiver<PushEvent>,
    producer: Option<BoxFuture<'static, ()>>,
}

impl PushSource {
    /// Create a source and the emitter that feeds it.
    ///
    /// The caller is responsible for driving whatever code holds the
    /// emitter.
    #[must_use]
    pub fn channel() -> (Emitter, Self) {
        let (tx, events) = mpsc::channel(PUSH_BUFFER);
        (
            Emitter { tx },
            Self {
                events,
                producer: None,
            },
        )
    }

    /// Create a source whose producer future is driven by the consumer.
    ///
    /// The future runs only while the subscription waits for its next
    /// event and is dropped when the subscription is cancelled.
    ///
    /// # Examples
    ///
    /// ```
    /// use gqlwire::{ExecutionResult, PushSource};
    /// use serde_json::json;
    ///
    /// let source = PushSource::new(|emitter| async move {
    ///     for n in 0..3 {
    ///         if emitter.next(ExecutionResult::data(json!({"n": n}))).await.is_err() {
    ///             return;
    ///         }
    ///     }
    ///     let _ = emitter.complete().await;
    /// });
    /// # drop(source);
    /// ```
    #[must_use]
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(Emitter) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (emitter, mut source) = Self::channel();
        source.producer = Some(Box::pin(producer(emitter)));
        source
    }

    async fn recv(&mut self) -> Option<PushEvent> {
        if let Some(producer) = self.producer.as_mut() {
            tokio::select! {
                biased;
                event = self.events.recv() => return event,
                () = producer => {}
            }
            // The producer's emitter is gone; drain whatever it left behind.
            self.producer = None;
        }
        self.events.recv().await
    }

    fn close(&mut self) {
        self.events.close();
        self.producer = None;
    }
}

/// One step of a [`ResultSequence`].
#[derive(Debug)]
pub enum SequenceItem {
    /// The next raw result.
    Element(ExecutionResult),
    /// The sequence is exhausted.
    End,
    /// The sequence failed and will yield nothing further.
    Failed(ExecutionFailure),
}

/// Cancellable sequence of results driven by a subscription task.
#[async_trait]
pub trait ResultSequence: Send {
    /// Wait for the next item. Returns [`SequenceItem::End`] forever once the
    /// sequence has ended, failed or been cancelled.
    async fn next(&mut self) -> SequenceItem;

    /// Stop consuming the underlying source and release it.
    fn cancel(&mut self);
}

/// Boxed [`ResultSequence`] as stored by subscription tasks.
pub type BoxSequence = Box<dyn ResultSequence>;

/// Adapts a [`PushSource`] to [`ResultSequence`].
pub struct PushSequence {
    source: Option<PushSource>,
}

impl PushSequence {
    #[must_use]
    pub fn new(source: PushSource) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn finish(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }
}

#[async_trait]
impl ResultSequence for PushSequence {
    async fn next(&mut self) -> SequenceItem {
        let Some(source) = self.source.as_mut() else {
            return SequenceItem::End;
        };
        match source.recv().await {
            Some(PushEvent::Next(result)) => SequenceItem::Element(result),
            Some(PushEvent::Error(failure)) => {
                self.finish();
                SequenceItem::Failed(failure)
            }
            Some(PushEvent::Complete) | None => {
                self.finish();
                SequenceItem::End
            }
        }
    }

    fn cancel(&mut self) { self.finish(); }
}

/// Adapts a pull-based [`ResultStream`] to [`ResultSequence`].
pub struct PullSequence {
    stream: Option<ResultStream>,
}

impl PullSequence {
    #[must_use]
    pub fn new(stream: ResultStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl ResultSequence for PullSequence {
    async fn next(&mut self) -> SequenceItem {
        let Some(stream) = self.stream.as_mut() else {
            return SequenceItem::End;
        };
        match stream.next().await {
            Some(Ok(result)) => SequenceItem::Element(result),
            Some(Err(failure)) => {
                self.stream = None;
                SequenceItem::Failed(failure)
            }
            None => {
                self.stream = None;
                SequenceItem::End
            }
        }
    }

    fn cancel(&mut self) { self.stream = None; }
}
