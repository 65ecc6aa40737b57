//! Execution-context hooks.
//!
//! The protocol layer never interprets the execution context. Callers supply
//! a [`ConnectionHook`] that derives it from the `connection_init` payload of
//! a subscription-transport session, and a [`RequestHook`] that derives it
//! for each HTTP request. Both return an explicit decision so that rejection
//! is handled exhaustively rather than signalled by a missing value.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{JsonMap, request::Request};

/// Result of resolving a session's execution context.
#[derive(Debug)]
pub enum ContextDecision<C> {
    /// Use this context for every operation of the session.
    Accepted(C),
    /// Refuse the session. It closes with `4403 Forbidden`.
    Rejected,
}

/// Result of resolving an HTTP request's execution context.
#[derive(Debug)]
pub enum HttpDecision<C> {
    /// Execute the request under this context.
    Execute(C),
    /// Skip execution and answer with this response instead.
    Respond(http::Response<Bytes>),
}

/// Resolves the execution context of a subscription-transport session.
///
/// Called exactly once per session, when `connection_init` arrives.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use gqlwire::{ConnectionHook, ContextDecision, JsonMap};
///
/// struct TokenAuth;
///
/// #[async_trait]
/// impl ConnectionHook<String> for TokenAuth {
///     async fn on_connection_init(&self, payload: Option<&JsonMap>) -> ContextDecision<String> {
///         match payload.and_then(|p| p.get("token")).and_then(|t| t.as_str()) {
///             Some(token) => ContextDecision::Accepted(token.to_owned()),
///             None => ContextDecision::Rejected,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ConnectionHook<C>: Send + Sync + 'static {
    /// Derive the context from the init payload.
    async fn on_connection_init(&self, payload: Option<&JsonMap>) -> ContextDecision<C>;
}

/// Resolves the execution context of an HTTP request.
///
/// Called once per decoded request, so a batch of `n` requests invokes the
/// hook `n` times.
#[async_trait]
pub trait RequestHook<C>: Send + Sync + 'static {
    /// Derive the context for `request`, or answer it directly.
    async fn before_execute(&self, parts: &http::request::Parts, request: &Request)
    -> HttpDecision<C>;
}

/// Hook that accepts everything with the context's default value.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

#[async_trait]
impl<C> ConnectionHook<C> for AcceptAll
where
    C: Default + Send + 'static,
{
    async fn on_connection_init(&self, _payload: Option<&JsonMap>) -> ContextDecision<C> {
        ContextDecision::Accepted(C::default())
    }
}

#[async_trait]
impl<C> RequestHook<C> for AcceptAll
where
    C: Default + Send + 'static,
{
    async fn before_execute(
        &self,
        _parts: &http::request::Parts,
        _request: &Request,
    ) -> HttpDecision<C> {
        HttpDecision::Execute(C::default())
    }
}
