//! Builders and decoders for HTTP dispatcher tests.

use bytes::Bytes;
use http::{Method, Request, Response};
use serde_json::Value;

use crate::TestResult;

/// Build a `GET` request for `uri`.
///
/// # Errors
///
/// Fails if `uri` is not a valid request target.
pub fn get(uri: &str) -> TestResult<Request<Bytes>> {
    Ok(Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Bytes::new())?)
}

/// Build a `POST /graphql` request carrying `body`.
///
/// # Errors
///
/// Fails if the request cannot be assembled.
pub fn post(body: impl Into<Bytes>) -> TestResult<Request<Bytes>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.into())?)
}

/// Decode a response body as JSON.
///
/// # Errors
///
/// Fails if the body is not valid JSON.
pub fn json_body(response: &Response<Bytes>) -> TestResult<Value> {
    Ok(serde_json::from_slice(response.body())?)
}

/// Decode a response body as UTF-8 text.
///
/// # Errors
///
/// Fails if the body is not valid UTF-8.
pub fn text_body(response: &Response<Bytes>) -> TestResult<String> {
    Ok(String::from_utf8(response.body().to_vec())?)
}
