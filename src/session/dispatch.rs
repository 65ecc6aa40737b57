//! Message processing for an acknowledged session.
//!
//! The loop is the registry's only writer. It selects between task exit
//! notices and the next client frame, giving notices priority so that an
//! id freed by a finished task is visible before the next message is read.

use futures::{Sink, Stream, StreamExt};
use log::warn;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Registry, Termination, close};
use crate::{
    engine::{ExecutionEngine, execute_guarded},
    error::map_error,
    metrics::{self, Direction},
    protocol::{CloseCode, Message},
    request::Request,
    response::{Assembled, route},
    subscription::{Finished, Outcome, Subscription},
    transport::{Frame, Outbound},
};

/// Whether the loop keeps running after an event.
enum Flow {
    Continue,
    Stop(Termination),
}

enum Event<E> {
    Finished(Finished),
    Frame(Option<Result<String, E>>),
}

pub(super) struct Ready<'a, C, S> {
    pub(super) engine: &'a dyn ExecutionEngine<C>,
    pub(super) context: C,
    pub(super) outbound: Outbound<S>,
    pub(super) registry: &'a mut Registry,
    pub(super) finished: mpsc::UnboundedReceiver<Finished>,
}

impl<C, S> Ready<'_, C, S>
where
    C: Send + Sync + 'static,
    S: Sink<Frame> + Unpin + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    /// Process messages until the session terminates.
    pub(super) async fn serve<I, E>(&mut self, inbound: &mut I) -> Termination
    where
        I: Stream<Item = Result<String, E>> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        loop {
            let event = tokio::select! {
                biased;
                Some(done) = self.finished.recv() => Event::Finished(done),
                frame = inbound.next() => Event::Frame(frame),
            };
            let flow = match event {
                Event::Finished(done) => self.on_finished(&done),
                Event::Frame(None) => Flow::Stop(Termination::Disconnected),
                Event::Frame(Some(Err(e))) => {
                    warn!("failed to receive frame: error={e}");
                    Flow::Stop(Termination::TransportFailed)
                }
                Event::Frame(Some(Ok(text))) => self.on_frame(&text).await,
            };
            if let Flow::Stop(termination) = flow {
                return termination;
            }
        }
    }

    fn on_finished(&mut self, done: &Finished) -> Flow {
        self.registry.finish(&done.id, done.key);
        if done.outcome == Outcome::TransportFailed {
            return Flow::Stop(Termination::TransportFailed);
        }
        Flow::Continue
    }

    async fn on_frame(&mut self, text: &str) -> Flow {
        metrics::inc_messages(Direction::Inbound);
        let message = match Message::decode(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "frame rejected");
                return self.close(CloseCode::UnexpectedMessage).await;
            }
        };
        match message {
            Message::Subscribe { id, payload } => self.subscribe(id, payload).await,
            Message::Complete { id } => {
                self.registry.cancel(&id);
                Flow::Continue
            }
            Message::ConnectionInit { .. } => self.close(CloseCode::TooManyInitRequests).await,
            Message::Ping { .. } => self.send(&Message::Pong { payload: None }).await,
            Message::Pong { .. } => Flow::Continue,
            other @ (Message::ConnectionAck { .. }
            | Message::Next { .. }
            | Message::Error { .. }) => {
                debug!(kind = other.kind(), "unexpected client message");
                self.close(CloseCode::UnexpectedMessage).await
            }
        }
    }

    async fn subscribe(&mut self, id: String, request: Request) -> Flow {
        if self.registry.contains(&id) {
            return self.close(CloseCode::AlreadySubscribed(id)).await;
        }
        debug!(id = %id, "subscribe");
        let result = match execute_guarded(self.engine, request, &self.context).await {
            Ok(result) => result,
            Err(failure) => {
                warn!("operation failed before producing a result: id={id}, error={failure}");
                metrics::inc_errors();
                let payload = map_error(&failure).message;
                return self.send(&Message::Error { id, payload }).await;
            }
        };
        match route(result) {
            Assembled::Single(response) => {
                let next = Message::Next {
                    id: id.clone(),
                    payload: response,
                };
                if let Flow::Stop(termination) = self.send(&next).await {
                    return Flow::Stop(termination);
                }
                self.send(&Message::Complete { id }).await
            }
            Assembled::Stream(sequence) => {
                let ticket = self.registry.insert(id.clone());
                Subscription {
                    id,
                    key: ticket.key,
                    sequence,
                    outbound: self.outbound.clone(),
                    token: ticket.token,
                    finished: ticket.finished,
                }
                .spawn(self.registry.tracker());
                Flow::Continue
            }
        }
    }

    async fn send(&self, message: &Message) -> Flow {
        match self.outbound.send(message).await {
            Ok(_) => Flow::Continue,
            Err(e) => {
                warn!("failed to send message: type={}, error={e}", message.kind());
                Flow::Stop(Termination::TransportFailed)
            }
        }
    }

    async fn close(&self, code: CloseCode) -> Flow { Flow::Stop(close(&self.outbound, code).await) }
}
