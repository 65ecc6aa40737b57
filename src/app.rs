//! Application builder bundling the engine, hooks and configuration.
//!
//! `GraphQLApp` is the entry point a host server holds on to. It hands out a
//! fresh [`Session`] for every subscription-transport connection and an
//! [`HttpDispatcher`] for plain HTTP requests, both sharing the same engine.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Sink, Stream};

use crate::{
    config::SessionConfig,
    engine::ExecutionEngine,
    hooks::{AcceptAll, ConnectionHook, RequestHook},
    http::HttpDispatcher,
    session::{Session, Termination},
    transport::Frame,
};

/// Configures how GraphQL operations are served.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use async_trait::async_trait;
/// use gqlwire::{ExecutionEngine, ExecutionFailure, ExecutionResult, GraphQLApp, Request};
/// use gqlwire::SessionConfig;
/// use serde_json::json;
///
/// struct Answer;
///
/// #[async_trait]
/// impl ExecutionEngine<()> for Answer {
///     async fn execute(
///         &self,
///         _request: Request,
///         _context: &(),
///     ) -> Result<ExecutionResult, ExecutionFailure> {
///         Ok(ExecutionResult::data(json!({"number": 42})))
///     }
/// }
///
/// let app = GraphQLApp::new(Answer)
///     .session_config(SessionConfig::default().init_timeout(Duration::from_secs(2)));
/// # drop(app);
/// ```
pub struct GraphQLApp<C> {
    engine: Arc<dyn ExecutionEngine<C>>,
    connection_hook: Arc<dyn ConnectionHook<C>>,
    request_hook: Arc<dyn RequestHook<C>>,
    session_config: SessionConfig,
}

impl<C> Clone for GraphQLApp<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            connection_hook: Arc::clone(&self.connection_hook),
            request_hook: Arc::clone(&self.request_hook),
            session_config: self.session_config.clone(),
        }
    }
}

impl<C> GraphQLApp<C>
where
    C: Default + Send + Sync + 'static,
{
    /// Serve `engine`, accepting every connection and request with
    /// `C::default()` as the execution context.
    #[must_use]
    pub fn new<G>(engine: G) -> Self
    where
        G: ExecutionEngine<C>,
    {
        Self::with_hooks(Arc::new(engine), Arc::new(AcceptAll), Arc::new(AcceptAll))
    }
}

impl<C> GraphQLApp<C>
where
    C: Send + Sync + 'static,
{
    /// Serve `engine` with explicit context hooks.
    #[must_use]
    pub fn with_hooks(
        engine: Arc<dyn ExecutionEngine<C>>,
        connection_hook: Arc<dyn ConnectionHook<C>>,
        request_hook: Arc<dyn RequestHook<C>>,
    ) -> Self {
        Self {
            engine,
            connection_hook,
            request_hook,
            session_config: SessionConfig::default(),
        }
    }

    /// Replace the hook that resolves a session's context.
    #[must_use]
    pub fn connection_hook<H>(mut self, hook: H) -> Self
    where
        H: ConnectionHook<C>,
    {
        self.connection_hook = Arc::new(hook);
        self
    }

    /// Replace the hook that resolves an HTTP request's context.
    #[must_use]
    pub fn request_hook<H>(mut self, hook: H) -> Self
    where
        H: RequestHook<C>,
    {
        self.request_hook = Arc::new(hook);
        self
    }

    /// Replace the session configuration.
    #[must_use]
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Create a session for a newly upgraded connection.
    #[must_use]
    pub fn session(&self) -> Session<C> {
        Session::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.connection_hook),
            self.session_config.clone(),
        )
    }

    /// Create a dispatcher for HTTP requests.
    #[must_use]
    pub fn dispatcher(&self) -> HttpDispatcher<C> {
        HttpDispatcher::new(Arc::clone(&self.engine), Arc::clone(&self.request_hook))
    }

    /// Answer one HTTP request.
    pub async fn handle_http(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        self.dispatcher().dispatch(request).await
    }

    /// Run a fresh session over a connection until it terminates.
    pub async fn serve_session<I, E, S>(&self, inbound: I, sink: S) -> Termination
    where
        I: Stream<Item = Result<String, E>> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        self.session().run(inbound, sink).await
    }
}
