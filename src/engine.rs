//! Seam to the external GraphQL execution engine.
//!
//! `gqlwire` never parses, validates or resolves queries. It hands a
//! [`Request`] and the caller's opaque context to an [`ExecutionEngine`] and
//! receives an [`ExecutionResult`] whose data is either a concrete value or a
//! stream handle.

use std::{fmt, panic::AssertUnwindSafe};

use async_trait::async_trait;
use futures::{FutureExt, Stream, stream::BoxStream};
use serde_json::Value;

use crate::{
    JsonMap,
    error::ExecutionFailure,
    panic::panic_message,
    request::Request,
    response::GraphQLError,
    stream::PushSource,
};

/// Items yielded by a pull-based result stream.
pub type ResultStream = BoxStream<'static, Result<ExecutionResult, ExecutionFailure>>;

/// Data produced by the engine for one execution.
#[derive(Default)]
pub enum ResultData {
    /// The engine produced no value.
    #[default]
    Absent,
    /// A concrete value, typically a JSON object keyed by root field.
    Value(Value),
    /// A push-based event source; each event is one result.
    Push(PushSource),
    /// A pull-based asynchronous sequence of results.
    Pull(ResultStream),
}

impl fmt::Debug for ResultData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Push(_) => f.write_str("Push(..)"),
            Self::Pull(_) => f.write_str("Pull(..)"),
        }
    }
}

/// Raw result returned by an [`ExecutionEngine`].
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub data: ResultData,
    pub errors: Vec<GraphQLError>,
    pub extensions: JsonMap,
}

impl ExecutionResult {
    /// A result carrying a concrete value.
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            data: ResultData::Value(value.into()),
            ..Self::default()
        }
    }

    /// A result whose data is a push-based event source.
    #[must_use]
    pub fn push(source: PushSource) -> Self {
        Self {
            data: ResultData::Push(source),
            ..Self::default()
        }
    }

    /// A result whose data is a pull-based sequence.
    #[must_use]
    pub fn pull<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ExecutionResult, ExecutionFailure>> + Send + 'static,
    {
        Self {
            data: ResultData::Pull(Box::pin(stream)),
            ..Self::default()
        }
    }

    /// Append a GraphQL error.
    #[must_use]
    pub fn with_error(mut self, error: GraphQLError) -> Self {
        self.errors.push(error);
        self
    }

    /// Insert an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }
}

/// External component that executes GraphQL requests.
///
/// `C` is the opaque execution context produced by the caller's hooks; it is
/// threaded through every call for the request or session it belongs to.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use gqlwire::{ExecutionEngine, ExecutionFailure, ExecutionResult, Request};
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
/// ```
#[async_trait]
pub trait ExecutionEngine<C>: Send + Sync + 'static
where
    C: Send + Sync + 'static,
{
    /// Execute `request` under `context`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionFailure`] when the engine cannot produce a
    /// result at all. Field-level failures belong in
    /// [`ExecutionResult::errors`] instead.
    async fn execute(
        &self,
        request: Request,
        context: &C,
    ) -> Result<ExecutionResult, ExecutionFailure>;
}

/// Run the engine, converting a panic into an [`ExecutionFailure`].
pub(crate) async fn execute_guarded<C>(
    engine: &dyn ExecutionEngine<C>,
    request: Request,
    context: &C,
) -> Result<ExecutionResult, ExecutionFailure>
where
    C: Send + Sync + 'static,
{
    match AssertUnwindSafe(engine.execute(request, context))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            log::error!("execution engine panicked: panic={message}");
            Err(ExecutionFailure::msg(format!(
                "execution engine panicked: {message}"
            )))
        }
    }
}
