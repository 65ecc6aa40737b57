//! Subscription-transport session.
//!
//! A [`Session`] owns one `graphql-transport-ws` connection from upgrade to
//! close. It waits for `connection_init` under a deadline, resolves the
//! execution context through the [`ConnectionHook`], then processes client
//! messages one at a time while streaming operations run as independent
//! tasks. Whatever ends the session, every task is cancelled and awaited
//! before [`Session::run`] returns.

mod counter;
mod dispatch;
mod registry;
mod shutdown;
mod state;

use std::sync::Arc;

pub use counter::active_session_count;
use counter::ActiveSession;
use dispatch::Ready;
use futures::{Sink, Stream, StreamExt};
use log::{info, warn};
use registry::Registry;
pub use state::{SessionState, Termination};

use crate::{
    config::SessionConfig,
    engine::ExecutionEngine,
    hooks::{ConnectionHook, ContextDecision},
    metrics::{self, Direction},
    protocol::{CloseCode, Message},
    transport::{Frame, Outbound},
};

/// Session state machine for one subscription-transport connection.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use futures::channel::mpsc;
/// use gqlwire::{AcceptAll, ExecutionEngine, Frame, Session, SessionConfig};
///
/// # async fn serve(engine: Arc<dyn ExecutionEngine<()>>) {
/// let (to_server, inbound) = mpsc::unbounded::<Result<String, std::io::Error>>();
/// let (sink, from_server) = mpsc::unbounded::<Frame>();
/// let mut session = Session::new(engine, Arc::new(AcceptAll), SessionConfig::default());
/// let termination = session.run(inbound, sink).await;
/// # drop((to_server, from_server, termination));
/// # }
/// ```
pub struct Session<C> {
    engine: Arc<dyn ExecutionEngine<C>>,
    hook: Arc<dyn ConnectionHook<C>>,
    config: SessionConfig,
    state: SessionState,
}

impl<C> Session<C>
where
    C: Send + Sync + 'static,
{
    /// Create a session in the [`SessionState::AwaitingInit`] state.
    #[must_use]
    pub fn new(
        engine: Arc<dyn ExecutionEngine<C>>,
        hook: Arc<dyn ConnectionHook<C>>,
        config: SessionConfig,
    ) -> Self {
        Self {
            engine,
            hook,
            config,
            state: SessionState::AwaitingInit,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.state }

    /// Drive the session over `inbound` text frames and the outbound `sink`
    /// until it terminates.
    ///
    /// Failures never escape: protocol violations close the transport with
    /// their code, and transport errors end the session quietly. Calling
    /// `run` on a terminated session returns immediately.
    pub async fn run<I, E, S>(&mut self, mut inbound: I, sink: S) -> Termination
    where
        I: Stream<Item = Result<String, E>> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let outbound = Outbound::new(sink);
        if !self.state.is_open() {
            outbound.shutdown().await;
            return Termination::Disconnected;
        }

        let _active = ActiveSession::new();
        info!(
            "session opened: gqlwire_active_sessions={}",
            counter::active_session_count()
        );

        let (mut registry, finished) = Registry::new();
        let termination = match self.handshake(&mut inbound, &outbound).await {
            Ok(context) => {
                self.state = SessionState::Ready;
                let mut ready = Ready {
                    engine: self.engine.as_ref(),
                    context,
                    outbound: outbound.clone(),
                    registry: &mut registry,
                    finished,
                };
                ready.serve(&mut inbound).await
            }
            Err(termination) => termination,
        };

        shutdown::teardown(&mut registry, &outbound).await;
        self.state = SessionState::Terminated;
        info!("session closed: termination={termination:?}");
        termination
    }

    async fn handshake<I, E, S>(
        &self,
        inbound: &mut I,
        outbound: &Outbound<S>,
    ) -> Result<C, Termination>
    where
        I: Stream<Item = Result<String, E>> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let text = match tokio::time::timeout(self.config.init_timeout, inbound.next()).await {
            Err(_) => return Err(close(outbound, CloseCode::InitTimeout).await),
            Ok(None) => return Err(Termination::Disconnected),
            Ok(Some(Err(e))) => {
                warn!("failed to receive frame: error={e}");
                return Err(Termination::TransportFailed);
            }
            Ok(Some(Ok(text))) => text,
        };
        metrics::inc_messages(Direction::Inbound);

        let payload = match Message::decode(&text) {
            Ok(Message::ConnectionInit { payload }) => payload,
            Ok(other) => {
                warn!("expected connection_init: type={}", other.kind());
                return Err(close(outbound, CloseCode::Unauthorized).await);
            }
            Err(e) => {
                warn!("rejected first frame: error={e}");
                return Err(close(outbound, CloseCode::UnexpectedMessage).await);
            }
        };

        match self.hook.on_connection_init(payload.as_ref()).await {
            ContextDecision::Rejected => Err(close(outbound, CloseCode::Forbidden).await),
            ContextDecision::Accepted(context) => {
                let ack = Message::ConnectionAck {
                    payload: self.config.ack_payload.clone(),
                };
                match outbound.send(&ack).await {
                    Ok(_) => Ok(context),
                    Err(e) => {
                        warn!("failed to acknowledge connection_init: error={e}");
                        Err(Termination::TransportFailed)
                    }
                }
            }
        }
    }
}

/// Close the transport with `code` and report the outcome.
async fn close<S>(outbound: &Outbound<S>, code: CloseCode) -> Termination
where
    S: Sink<Frame> + Unpin + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    info!("closing session: code={}, reason={}", code.code(), code.reason());
    metrics::inc_errors();
    match outbound.close(&code).await {
        Ok(()) => Termination::Closed(code),
        Err(e) => {
            warn!("failed to send close frame: error={e}");
            Termination::TransportFailed
        }
    }
}
