//! Seam to the host WebSocket server.
//!
//! The host supplies inbound text frames as a `Stream` and accepts outbound
//! [`Frame`]s through a `Sink`. [`Outbound`] wraps the sink so the session
//! loop and every subscription task can share it: sends are serialised, and
//! once the transport is closed all later sends are suppressed.

use std::sync::Arc;

use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    metrics::{self, Direction},
    protocol::{CloseCode, Message},
};

/// Close frame payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl From<&CloseCode> for CloseFrame {
    fn from(code: &CloseCode) -> Self {
        Self {
            code: code.code(),
            reason: code.reason(),
        }
    }
}

/// Frame written to the host transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// An encoded [`Message`].
    Text(String),
    /// Close the connection with the given code.
    Close(CloseFrame),
}

/// Outcome of an outbound send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was handed to the sink.
    Sent,
    /// The frame was dropped because the transport or operation had ended.
    Suppressed,
}

struct OutboundInner<S> {
    sink: S,
    closed: bool,
}

/// Shared, serialised handle to the outbound half of a transport.
pub struct Outbound<S> {
    inner: Arc<Mutex<OutboundInner<S>>>,
}

impl<S> Clone for Outbound<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Outbound<S>
where
    S: Sink<Frame> + Unpin + Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    /// Wrap the host's frame sink.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutboundInner {
                sink,
                closed: false,
            })),
        }
    }

    /// Encode and send `message`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if encoding fails or the sink rejects the
    /// frame.
    pub async fn send(&self, message: &Message) -> Result<Delivery, TransportError> {
        self.deliver(message, None).await
    }

    /// Send `message` unless `token` has been cancelled.
    ///
    /// The token is checked again after the send lock is taken, so no frame
    /// for a cancelled operation reaches the sink. A send blocked on a slow
    /// sink is abandoned when the token fires.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if encoding fails or the sink rejects the
    /// frame.
    pub async fn send_unless_cancelled(
        &self,
        token: &CancellationToken,
        message: &Message,
    ) -> Result<Delivery, TransportError> {
        tokio::select! {
            biased;
            () = token.cancelled() => Ok(Delivery::Suppressed),
            delivered = self.deliver(message, Some(token)) => delivered,
        }
    }

    async fn deliver(
        &self,
        message: &Message,
        token: Option<&CancellationToken>,
    ) -> Result<Delivery, TransportError> {
        let text = message.encode()?;
        let mut inner = self.inner.lock().await;
        if inner.closed || token.is_some_and(CancellationToken::is_cancelled) {
            return Ok(Delivery::Suppressed);
        }
        inner
            .sink
            .send(Frame::Text(text))
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))?;
        metrics::inc_messages(Direction::Outbound);
        Ok(Delivery::Sent)
    }

    /// Send a close frame and close the sink. Later sends are suppressed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] if the sink rejects the frame.
    pub async fn close(&self, code: &CloseCode) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner
            .sink
            .send(Frame::Close(code.into()))
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))?;
        inner
            .sink
            .close()
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))
    }

    /// Close the sink without a close frame. Later sends are suppressed.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.closed {
            inner.closed = true;
            if let Err(e) = inner.sink.close().await {
                log::debug!("closing outbound sink failed: error={e}");
            }
        }
    }

    /// Returns `true` once the transport has been closed.
    pub async fn is_closed(&self) -> bool { self.inner.lock().await.closed }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, channel::mpsc};
    use rstest::{fixture, rstest};

    use super::*;

    type Pair = (Outbound<mpsc::UnboundedSender<Frame>>, mpsc::UnboundedReceiver<Frame>);

    #[fixture]
    fn pair() -> Pair {
        let (tx, rx) = mpsc::unbounded();
        (Outbound::new(tx), rx)
    }

    #[rstest]
    #[tokio::test]
    async fn send_writes_text_frame(pair: Pair) {
        let (outbound, mut rx) = pair;
        let delivery = outbound
            .send(&Message::Complete { id: "1".into() })
            .await
            .expect("send");
        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(
            rx.next().await,
            Some(Frame::Text(r#"{"type":"complete","id":"1"}"#.into()))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn close_suppresses_later_sends(pair: Pair) {
        let (outbound, mut rx) = pair;
        outbound
            .close(&CloseCode::TooManyInitRequests)
            .await
            .expect("close");
        let delivery = outbound
            .send(&Message::Ping { payload: None })
            .await
            .expect("send after close");
        assert_eq!(delivery, Delivery::Suppressed);
        assert_eq!(
            rx.next().await,
            Some(Frame::Close(CloseFrame {
                code: 4429,
                reason: "Too many initialisation requests".into(),
            }))
        );
        assert_eq!(rx.next().await, None);
        assert!(outbound.is_closed().await);
    }

    #[rstest]
    #[tokio::test]
    async fn cancelled_token_suppresses_send(pair: Pair) {
        let (outbound, mut rx) = pair;
        let token = CancellationToken::new();
        token.cancel();
        let delivery = outbound
            .send_unless_cancelled(&token, &Message::Complete { id: "1".into() })
            .await
            .expect("send");
        assert_eq!(delivery, Delivery::Suppressed);
        outbound.shutdown().await;
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn rejected_frames_surface_as_errors() {
        let (tx, rx) = mpsc::unbounded();
        drop(rx);
        let outbound = Outbound::new(tx);
        let err = outbound
            .send(&Message::Pong { payload: None })
            .await
            .expect_err("receiver dropped");
        assert!(matches!(err, TransportError::Send(_)));
    }
}
