//! GraphQL request shapes accepted over HTTP and the subscription transport.
//!
//! A [`Request`] is built once per operation and consumed by the execution
//! engine. POST bodies may carry either one request or an ordered batch,
//! modelled by [`BatchRequest`]. GET requests carry the same fields as query
//! parameters, with `variables` JSON-encoded inside its parameter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::JsonMap;

/// A single GraphQL operation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The query document.
    pub query: String,
    /// Operation to run when the document defines several.
    #[serde(
        rename = "operationName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
    /// Variable values for the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<JsonMap>,
}

impl Request {
    /// Create a request for `query` without variables or operation name.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }

    /// Set the operation name.
    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Set the variable mapping.
    #[must_use]
    pub fn variables(mut self, variables: JsonMap) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Decode a request from a URL query string such as
    /// `query=...&operationName=...&variables=...`.
    ///
    /// An empty `variables` parameter is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryParamsError::MissingQuery`] when `query` is absent,
    /// [`QueryParamsError::Malformed`] when the string is not valid
    /// form-urlencoded data, and [`QueryParamsError::Variables`] when
    /// `variables` is not a JSON object.
    pub fn from_query_string(query: &str) -> Result<Self, QueryParamsError> {
        let params: QueryParams = serde_urlencoded::from_str(query)?;
        let query = params.query.ok_or(QueryParamsError::MissingQuery)?;
        let variables = match params.variables.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(serde_json::from_str(raw).map_err(QueryParamsError::Variables)?),
        };
        Ok(Self {
            query,
            operation_name: params.operation_name,
            variables,
        })
    }
}

#[derive(Deserialize)]
struct QueryParams {
    query: Option<String>,
    #[serde(rename = "operationName")]
    operation_name: Option<String>,
    variables: Option<String>,
}

/// Errors raised while decoding a GET request's query parameters.
#[derive(Debug, Error)]
pub enum QueryParamsError {
    /// The `query` parameter was not supplied.
    #[error("Missing 'query' parameter")]
    MissingQuery,
    /// The query string could not be parsed.
    #[error("Malformed query string: {0}")]
    Malformed(#[from] serde_urlencoded::de::Error),
    /// The `variables` parameter was not a JSON object.
    #[error("Malformed 'variables' parameter: {0}")]
    Variables(#[source] serde_json::Error),
}

/// Body of a POST request: one request or an ordered batch.
///
/// Decoding tries the single form first and falls back to the batch form
/// when the body is a JSON array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchRequest {
    /// A single request object.
    Single(Request),
    /// An ordered sequence of requests executed concurrently.
    Batch(Vec<Request>),
}

impl From<Request> for BatchRequest {
    fn from(request: Request) -> Self { Self::Single(request) }
}

impl From<Vec<Request>> for BatchRequest {
    fn from(requests: Vec<Request>) -> Self { Self::Batch(requests) }
}
