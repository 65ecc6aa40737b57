#![doc(html_root_url = "https://docs.rs/gqlwire/latest")]
//! Public API for the `gqlwire` library.
//!
//! This crate exposes a GraphQL execution engine over two transports: plain
//! request/response HTTP and the `graphql-transport-ws` subscription
//! protocol. The engine itself is supplied by the caller through
//! [`ExecutionEngine`]; `gqlwire` owns the protocol layer that turns frames
//! into execution calls and results back into frames.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod http;
pub mod metrics;
mod panic;
pub mod protocol;
pub mod request;
pub mod response;
pub mod session;
pub mod stream;
mod subscription;
pub mod transport;

/// JSON object used for payloads, variables and extensions.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use app::GraphQLApp;
pub use config::SessionConfig;
pub use engine::{ExecutionEngine, ExecutionResult, ResultData};
pub use error::{ExecutionFailure, ProtocolError, TransportError, map_error};
pub use hooks::{AcceptAll, ConnectionHook, ContextDecision, HttpDecision, RequestHook};
pub use crate::http::{HttpDispatcher, HttpError};
pub use protocol::{CloseCode, GRAPHQL_TRANSPORT_WS_PROTOCOL, Message};
pub use request::{BatchRequest, Request};
pub use response::{GraphQLError, PathSegment, Response, SourceLocation};
pub use session::{Session, SessionState, Termination};
pub use stream::{Emitter, PushSource, ResultSequence, SequenceItem, SourceClosed};
pub use transport::{CloseFrame, Delivery, Frame, Outbound};
