//! Scripted execution engines.
//!
//! [`ScriptedEngine`] answers each query document with a pre-registered
//! [`Script`], so tests can exercise every result shape without a real
//! GraphQL implementation.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use gqlwire::{
    ExecutionEngine,
    ExecutionFailure,
    ExecutionResult,
    GraphQLError,
    JsonMap,
    PushSource,
    Request,
};
use serde_json::{Value, json};

/// How a streaming script ends after its items.
#[derive(Clone, Debug)]
pub enum Ending {
    /// Finish normally.
    Complete,
    /// Fail with this message.
    Fail(String),
    /// Never finish.
    Hang,
}

/// Behaviour of the engine for one query document.
#[derive(Clone, Debug)]
pub enum Script {
    /// Return this data value.
    Value(Value),
    /// Return this data value after sleeping.
    Delayed(Duration, Value),
    /// Return a result carrying only this GraphQL error.
    Errors(GraphQLError),
    /// Fail before producing any result.
    Fail(String),
    /// Panic inside the engine.
    Panic(String),
    /// Return a pull-based stream of these values.
    Pull {
        items: Vec<Value>,
        delay: Option<Duration>,
        ending: Ending,
    },
    /// Return a push-based source emitting these values.
    Push { items: Vec<Value>, ending: Ending },
}

impl Script {
    /// Pull-based stream that completes after `items`.
    #[must_use]
    pub fn pull(items: Vec<Value>) -> Self {
        Self::Pull {
            items,
            delay: None,
            ending: Ending::Complete,
        }
    }

    /// Push-based source that completes after `items`.
    #[must_use]
    pub fn push(items: Vec<Value>) -> Self {
        Self::Push {
            items,
            ending: Ending::Complete,
        }
    }
}

/// Engine answering queries from a script table.
///
/// Unknown queries fail with a GraphQL error naming the query.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    scripts: HashMap<String, Script>,
    executions: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `script` for `query`.
    #[must_use]
    pub fn on(mut self, query: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(query.into(), script);
        self
    }

    /// Engine resolving `query { number }` to `42`.
    #[must_use]
    pub fn number() -> Self {
        Self::new().on("query { number }", Script::Value(json!({"number": 42})))
    }

    /// Number of times the engine has been invoked.
    #[must_use]
    pub fn executions(&self) -> usize { self.executions.load(Ordering::SeqCst) }
}

fn pull_stream(
    items: Vec<Value>,
    delay: Option<Duration>,
    ending: Ending,
) -> futures::stream::BoxStream<'static, Result<ExecutionResult, ExecutionFailure>> {
    let elements = stream::iter(items).then(move |item| async move {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ExecutionResult::data(item))
    });
    match ending {
        Ending::Complete => elements.boxed(),
        Ending::Fail(message) => elements
            .chain(stream::once(async move { Err(ExecutionFailure::msg(message)) }))
            .boxed(),
        Ending::Hang => elements.chain(stream::pending()).boxed(),
    }
}

fn push_source(items: Vec<Value>, ending: Ending) -> PushSource {
    PushSource::new(move |emitter| async move {
        for item in items {
            if emitter.next(ExecutionResult::data(item)).await.is_err() {
                return;
            }
        }
        match ending {
            Ending::Complete => {
                let _ = emitter.complete().await;
            }
            Ending::Fail(message) => {
                let _ = emitter.error(ExecutionFailure::msg(message)).await;
            }
            Ending::Hang => emitter.closed().await,
        }
    })
}

#[async_trait]
impl<C> ExecutionEngine<C> for ScriptedEngine
where
    C: Send + Sync + 'static,
{
    async fn execute(
        &self,
        request: Request,
        _context: &C,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let Some(script) = self.scripts.get(&request.query).cloned() else {
            return Err(GraphQLError::new(format!("unknown query: {}", request.query)).into());
        };
        match script {
            Script::Value(value) => Ok(ExecutionResult::data(value)),
            Script::Delayed(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(ExecutionResult::data(value))
            }
            Script::Errors(error) => Ok(ExecutionResult::default().with_error(error)),
            Script::Fail(message) => Err(ExecutionFailure::msg(message)),
            Script::Panic(message) => panic!("{message}"),
            Script::Pull {
                items,
                delay,
                ending,
            } => Ok(ExecutionResult::pull(pull_stream(items, delay, ending))),
            Script::Push { items, ending } => Ok(ExecutionResult::push(push_source(items, ending))),
        }
    }
}

/// Engine that answers every request with its context and variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContextEcho;

#[async_trait]
impl ExecutionEngine<JsonMap> for ContextEcho {
    async fn execute(
        &self,
        request: Request,
        context: &JsonMap,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        Ok(ExecutionResult::data(json!({
            "context": context,
            "variables": request.variables,
            "operationName": request.operation_name,
        })))
    }
}
