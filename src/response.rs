//! Wire response shapes and the response assembler.
//!
//! [`Response`] is what clients see for every completed operation, both as an
//! HTTP body and inside [`crate::Message::Next`]. Empty fields are omitted
//! rather than serialised as `null`.
//!
//! The assembler converts a raw [`ExecutionResult`] into a [`Response`].
//! [`classify`] and [`route`] decide whether a result is a concrete value or
//! one of the two streaming shapes that must be driven by a subscription
//! task instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    JsonMap,
    engine::{ExecutionResult, ResultData},
    error::{ExecutionFailure, map_error},
    stream::{BoxSequence, PullSequence, PushSequence},
};

/// Position in the query document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self { Self { line, column } }
}

/// One segment of a response path: a field name or a list index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self { Self::Field(name.to_owned()) }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self { Self::Field(name) }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self { Self::Index(index) }
}

/// Serialisable GraphQL error.
///
/// Engines may return this type directly as a failure; the error mapper then
/// copies it verbatim instead of synthesising one from the display text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct GraphQLError {
    /// Description of the error.
    pub message: String,
    /// Locations within the query document the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<SourceLocation>>,
    /// Path of the response field that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Additional, implementation-defined information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<JsonMap>,
}

impl GraphQLError {
    /// Create an error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }

    /// Build the error reported when a field resolver fails.
    ///
    /// The message names the slash-separated path followed by the source's
    /// display text.
    #[must_use]
    pub fn fetching(path: Vec<PathSegment>, source: &dyn std::error::Error) -> Self {
        let joined = path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/");
        Self::new(format!("Exception while fetching data ({joined}) : {source}")).at_path(path)
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.locations.get_or_insert_with(Vec::new).push(location);
        self
    }

    /// Set the response path.
    #[must_use]
    pub fn at_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }

    /// Insert an extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions
            .get_or_insert_with(JsonMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Record an error classification under `extensions.classification`.
    #[must_use]
    pub fn with_classification(self, classification: impl Into<String>) -> Self {
        self.with_extension("classification", classification.into())
    }
}

/// A completed operation as delivered to clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub extensions: JsonMap,
}

impl Response {
    /// A response carrying only `data`.
    #[must_use]
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// A response reporting a single failure raised by the engine.
    #[must_use]
    pub fn from_failure(failure: &ExecutionFailure) -> Self {
        Self {
            errors: vec![map_error(failure)],
            ..Self::default()
        }
    }
}

impl From<ExecutionResult> for Response {
    fn from(result: ExecutionResult) -> Self { assemble(result) }
}

/// Shape of a raw result's data value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    /// A concrete value (or no value at all).
    Concrete,
    /// A push-based event source.
    Push,
    /// A pull-based asynchronous sequence.
    Pull,
}

/// Determine how a result's data must be delivered.
#[must_use]
pub fn classify(data: &ResultData) -> ResultShape {
    match data {
        ResultData::Absent | ResultData::Value(_) => ResultShape::Concrete,
        ResultData::Push(_) => ResultShape::Push,
        ResultData::Pull(_) => ResultShape::Pull,
    }
}

/// Convert a raw result into a [`Response`].
///
/// `data` is kept only when it is a concrete, non-null value; stream handles
/// are dropped, which cancels them. `errors` and `extensions` are kept only
/// when non-empty.
#[must_use]
pub fn assemble(result: ExecutionResult) -> Response {
    let ExecutionResult {
        data,
        errors,
        extensions,
    } = result;
    let data = match data {
        ResultData::Value(value) if !value.is_null() => Some(value),
        ResultData::Value(_) | ResultData::Absent | ResultData::Push(_) | ResultData::Pull(_) => {
            None
        }
    };
    Response {
        data,
        errors,
        extensions,
    }
}

/// Outcome of routing a raw result.
pub enum Assembled {
    /// Deliver this response once.
    Single(Response),
    /// Drive this sequence until it ends.
    Stream(BoxSequence),
}

impl fmt::Debug for Assembled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(response) => f.debug_tuple("Single").field(response).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Route a raw result either to a single response or to a result sequence.
#[must_use]
pub fn route(result: ExecutionResult) -> Assembled {
    let ExecutionResult {
        data,
        errors,
        extensions,
    } = result;
    match data {
        ResultData::Push(source) => Assembled::Stream(Box::new(PushSequence::new(source))),
        ResultData::Pull(stream) => Assembled::Stream(Box::new(PullSequence::new(stream))),
        data @ (ResultData::Absent | ResultData::Value(_)) => {
            Assembled::Single(assemble(ExecutionResult {
                data,
                errors,
                extensions,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde_json::json;

    use super::*;
    use crate::stream::PushSource;

    #[test]
    fn concrete_value_is_kept() {
        let response = assemble(ExecutionResult::data(json!({"number": 42})));
        assert_eq!(
            serde_json::to_string(&response).expect("serialise"),
            r#"{"data":{"number":42}}"#
        );
    }

    #[test]
    fn null_data_is_omitted() {
        let result = ExecutionResult::data(Value::Null).with_error(GraphQLError::new("boom"));
        let response = assemble(result);
        assert_eq!(
            serde_json::to_string(&response).expect("serialise"),
            r#"{"errors":[{"message":"boom"}]}"#
        );
    }

    #[test]
    fn stream_handles_never_become_data() {
        let result = ExecutionResult::pull(stream::empty()).with_extension("cost", 3);
        let response = assemble(result);
        assert!(response.data.is_none());
        assert_eq!(response.extensions.get("cost"), Some(&json!(3)));
    }

    #[test]
    fn classify_distinguishes_shapes() {
        assert_eq!(classify(&ResultData::Absent), ResultShape::Concrete);
        assert_eq!(classify(&ResultData::Value(json!(1))), ResultShape::Concrete);
        let (_emitter, source) = PushSource::channel();
        assert_eq!(classify(&ResultData::Push(source)), ResultShape::Push);
        assert_eq!(
            classify(&ExecutionResult::pull(stream::empty()).data),
            ResultShape::Pull
        );
    }

    #[test]
    fn route_keeps_concrete_errors() {
        let result = ExecutionResult::default().with_error(GraphQLError::new("invalid"));
        match route(result) {
            Assembled::Single(response) => assert_eq!(response.errors.len(), 1),
            Assembled::Stream(_) => panic!("expected a single response"),
        }
    }

    #[test]
    fn route_sends_streams_to_sequence() {
        let result = ExecutionResult::pull(stream::iter(Vec::new()));
        assert!(matches!(route(result), Assembled::Stream(_)));
    }

    #[test]
    fn fetching_error_names_path() {
        let source = std::io::Error::other("db offline");
        let error = GraphQLError::fetching(vec!["user".into(), 0.into(), "name".into()], &source);
        assert_eq!(
            error.message,
            "Exception while fetching data (user/0/name) : db offline"
        );
        assert_eq!(
            serde_json::to_value(&error).expect("serialise"),
            json!({
                "message": "Exception while fetching data (user/0/name) : db offline",
                "path": ["user", 0, "name"],
            })
        );
    }

    #[test]
    fn classification_lands_in_extensions() {
        let error = GraphQLError::new("nope")
            .at(SourceLocation::new(1, 3))
            .with_classification("FETCHING_ERROR");
        assert_eq!(
            serde_json::to_value(&error).expect("serialise"),
            json!({
                "message": "nope",
                "locations": [{"line": 1, "column": 3}],
                "extensions": {"classification": "FETCHING_ERROR"},
            })
        );
    }
}
