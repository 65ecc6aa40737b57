//! Utilities for driving `gqlwire` sessions and dispatchers in tests.
//!
//! Sessions run over in-memory channels: [`spawn_session`] starts one on a
//! background task and returns the [`ClientEnd`] used to talk to it.
//! [`ScriptedEngine`] supplies canned results for each query document.
//!
//! ```rust
//! use gqlwire::{GraphQLApp, Message};
//! use gqlwire_testing::{ScriptedEngine, TestResult, spawn_app};
//!
//! # async fn example() -> TestResult {
//! let app: GraphQLApp<()> = GraphQLApp::new(ScriptedEngine::number());
//! let (mut client, session) = spawn_app(&app);
//! client.init().await?;
//! client.disconnect();
//! session.await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod http;
pub mod logging;
pub mod macros;
pub mod socket;

pub use engine::{ContextEcho, Ending, Script, ScriptedEngine};
pub use logging::{LoggerHandle, logger};
pub use socket::{
    ClientEnd,
    ServerInbound,
    ServerSink,
    SessionHandle,
    socket_pair,
    spawn_app,
    spawn_session,
};

/// Result type for fallible tests and helpers.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
