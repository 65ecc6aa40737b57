//! Wire vocabulary of the `graphql-transport-ws` subprotocol.
//!
//! Every frame on the subscription transport is a JSON object whose `type`
//! field selects one [`Message`] variant. Decoding rejects unknown
//! discriminators and payloads that do not match their variant's shape.
//! [`CloseCode`] lists the non-standard close codes a session may end with.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{JsonMap, error::ProtocolError, request::Request, response::Response};

/// Subprotocol name negotiated during the WebSocket upgrade.
pub const GRAPHQL_TRANSPORT_WS_PROTOCOL: &str = "graphql-transport-ws";

/// A single subscription-transport message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Client asks to establish the session. Only valid as the first message.
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<JsonMap>,
    },
    /// Server accepted the [`Message::ConnectionInit`].
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<JsonMap>,
    },
    /// Liveness probe. Must be answered with [`Message::Pong`].
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<JsonMap>,
    },
    /// Reply to [`Message::Ping`]. Never answered.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<JsonMap>,
    },
    /// Client starts the operation identified by `id`.
    Subscribe { id: String, payload: Request },
    /// One result for operation `id`.
    Next { id: String, payload: Response },
    /// Operation `id` failed. No [`Message::Complete`] follows.
    Error { id: String, payload: String },
    /// From the server: operation `id` finished. From the client: stop
    /// operation `id`.
    Complete { id: String },
}

impl Message {
    /// Decode a message from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedMessage`] if the frame is not valid
    /// JSON, carries an unknown `type`, or its fields do not match the
    /// variant.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedMessage)
    }

    /// Encode the message into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if a payload value cannot be
    /// represented as JSON.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire discriminator for this variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionInit { .. } => "connection_init",
            Self::ConnectionAck { .. } => "connection_ack",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Subscribe { .. } => "subscribe",
            Self::Next { .. } => "next",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Operation id carried by the message, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Subscribe { id, .. }
            | Self::Next { id, .. }
            | Self::Error { id, .. }
            | Self::Complete { id } => Some(id),
            Self::ConnectionInit { .. }
            | Self::ConnectionAck { .. }
            | Self::Ping { .. }
            | Self::Pong { .. } => None,
        }
    }
}

/// Reasons a session closes the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseCode {
    /// `4400`: a message arrived that is invalid in the current state.
    UnexpectedMessage,
    /// `4401`: the first message was not `connection_init`.
    Unauthorized,
    /// `4403`: the connection hook rejected the init payload.
    Forbidden,
    /// `4408`: no message arrived before the init deadline.
    InitTimeout,
    /// `4409`: a subscribe reused the id of a running operation.
    AlreadySubscribed(String),
    /// `4429`: a second `connection_init` arrived.
    TooManyInitRequests,
}

impl CloseCode {
    /// Numeric close code sent in the close frame.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::UnexpectedMessage => 4400,
            Self::Unauthorized => 4401,
            Self::Forbidden => 4403,
            Self::InitTimeout => 4408,
            Self::AlreadySubscribed(_) => 4409,
            Self::TooManyInitRequests => 4429,
        }
    }

    /// Human readable reason sent alongside the code.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::UnexpectedMessage => "Unexpected message".to_owned(),
            Self::Unauthorized => "Unauthorized".to_owned(),
            Self::Forbidden => "Forbidden".to_owned(),
            Self::InitTimeout => "Connection initialisation timeout".to_owned(),
            Self::AlreadySubscribed(id) => format!("Subscriber for {id} already exists"),
            Self::TooManyInitRequests => "Too many initialisation requests".to_owned(),
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}
