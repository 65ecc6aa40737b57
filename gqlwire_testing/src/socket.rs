//! In-memory subscription-transport connections.
//!
//! [`socket_pair`] returns a [`ClientEnd`] together with the inbound stream
//! and outbound sink a [`Session`] runs over. Frames travel through
//! unbounded channels, so sends from the client never block.

use std::io;

use futures::{StreamExt, channel::mpsc};
use gqlwire::{CloseFrame, Frame, GraphQLApp, Message, Session, SessionState, Termination};
use tokio::task::JoinHandle;

use crate::TestResult;

/// Inbound half handed to the session.
pub type ServerInbound = mpsc::UnboundedReceiver<Result<String, io::Error>>;
/// Outbound half handed to the session.
pub type ServerSink = mpsc::UnboundedSender<Frame>;
/// Join handle for a spawned session, yielding its termination and final
/// state.
pub type SessionHandle = JoinHandle<(Termination, SessionState)>;

/// Client side of an in-memory connection.
pub struct ClientEnd {
    to_server: mpsc::UnboundedSender<Result<String, io::Error>>,
    from_server: mpsc::UnboundedReceiver<Frame>,
}

/// Create a connected client and server transport.
#[must_use]
pub fn socket_pair() -> (ClientEnd, ServerInbound, ServerSink) {
    let (to_server, inbound) = mpsc::unbounded();
    let (sink, from_server) = mpsc::unbounded();
    (
        ClientEnd {
            to_server,
            from_server,
        },
        inbound,
        sink,
    )
}

/// Run `session` on a background task over a fresh socket pair.
pub fn spawn_session<C>(mut session: Session<C>) -> (ClientEnd, SessionHandle)
where
    C: Send + Sync + 'static,
{
    let (client, inbound, sink) = socket_pair();
    let handle = tokio::spawn(async move {
        let termination = session.run(inbound, sink).await;
        (termination, session.state())
    });
    (client, handle)
}

/// Run a new session from `app` on a background task.
pub fn spawn_app<C>(app: &GraphQLApp<C>) -> (ClientEnd, SessionHandle)
where
    C: Send + Sync + 'static,
{
    spawn_session(app.session())
}

impl ClientEnd {
    /// Send an encoded message.
    ///
    /// # Errors
    ///
    /// Fails if the message cannot be encoded or the session has stopped
    /// reading.
    pub fn send(&self, message: &Message) -> TestResult {
        self.send_raw(message.encode()?)
    }

    /// Send a raw text frame.
    ///
    /// # Errors
    ///
    /// Fails if the session has stopped reading.
    pub fn send_raw(&self, text: impl Into<String>) -> TestResult {
        self.to_server.unbounded_send(Ok(text.into()))?;
        Ok(())
    }

    /// Inject a transport read failure.
    ///
    /// # Errors
    ///
    /// Fails if the session has stopped reading.
    pub fn fail(&self) -> TestResult {
        self.to_server
            .unbounded_send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))?;
        Ok(())
    }

    /// Stop sending; the session observes a disconnect.
    pub fn disconnect(&self) { self.to_server.close_channel(); }

    /// Receive the next frame, or `None` once the session closed the sink.
    pub async fn recv(&mut self) -> Option<Frame> { self.from_server.next().await }

    /// Receive and decode the next text frame.
    ///
    /// # Errors
    ///
    /// Fails if the sink closed, a close frame arrived, or the frame does not
    /// decode.
    pub async fn recv_message(&mut self) -> TestResult<Message> {
        match self.recv().await {
            Some(Frame::Text(text)) => Ok(Message::decode(&text)?),
            Some(Frame::Close(close)) => {
                Err(format!("expected a message, got close {}", close.code).into())
            }
            None => Err("expected a message, got end of stream".into()),
        }
    }

    /// Receive the next frame and require it to be a close frame.
    ///
    /// # Errors
    ///
    /// Fails if the next frame is a message or the sink closed silently.
    pub async fn recv_close(&mut self) -> TestResult<CloseFrame> {
        match self.recv().await {
            Some(Frame::Close(close)) => Ok(close),
            Some(Frame::Text(text)) => Err(format!("expected close, got {text}").into()),
            None => Err("expected close, got end of stream".into()),
        }
    }

    /// Send `connection_init` and require a `connection_ack`.
    ///
    /// # Errors
    ///
    /// Fails if the session answers with anything else.
    pub async fn init(&mut self) -> TestResult {
        self.send(&Message::ConnectionInit { payload: None })?;
        match self.recv_message().await? {
            Message::ConnectionAck { .. } => Ok(()),
            other => Err(format!("expected connection_ack, got {}", other.kind()).into()),
        }
    }

    /// Collect every frame until the session closes the sink.
    pub async fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await {
            frames.push(frame);
        }
        frames
    }
}
