//! HTTP request dispatcher.
//!
//! [`HttpDispatcher`] turns an `http::Request<Bytes>` into an
//! `http::Response<Bytes>`. `GET` carries one request in the query string;
//! `POST` carries one request object or an ordered batch. Batched requests
//! run concurrently and their responses keep the input order.
//!
//! Execution failures never change the status code: they are reported inside
//! the response's `errors` with `200 OK`. Only undecodable input yields a
//! `4xx`.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use http::{HeaderValue, Method, StatusCode, header, request::Parts};
use log::warn;
use serde::Serialize;
use thiserror::Error;

use crate::{
    engine::{ExecutionEngine, execute_guarded},
    hooks::{HttpDecision, RequestHook},
    metrics,
    request::{BatchRequest, QueryParamsError, Request},
    response::{Response, assemble},
};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// Errors that reject an HTTP request before execution.
#[derive(Debug, Error)]
pub enum HttpError {
    /// `GET` query parameters were missing or malformed.
    #[error(transparent)]
    Query(#[from] QueryParamsError),
    /// The `POST` body was neither a request nor a batch of requests.
    #[error("Bad request")]
    Body(#[source] serde_json::Error),
    /// Only `GET` and `POST` are served.
    #[error("Method {0} not allowed")]
    Method(Method),
}

impl HttpError {
    /// Status code reported for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Method(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// Dispatches HTTP requests to an [`ExecutionEngine`].
pub struct HttpDispatcher<C> {
    engine: Arc<dyn ExecutionEngine<C>>,
    hook: Arc<dyn RequestHook<C>>,
}

impl<C> Clone for HttpDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            hook: Arc::clone(&self.hook),
        }
    }
}

impl<C> HttpDispatcher<C>
where
    C: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(engine: Arc<dyn ExecutionEngine<C>>, hook: Arc<dyn RequestHook<C>>) -> Self {
        Self { engine, hook }
    }

    /// Decode, execute and answer one HTTP request.
    pub async fn dispatch(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        let (parts, body) = request.into_parts();
        match self.try_dispatch(&parts, &body).await {
            Ok(response) => response,
            Err(error) => {
                warn!("rejected http request: method={}, error={error}", parts.method);
                error_response(&error)
            }
        }
    }

    async fn try_dispatch(
        &self,
        parts: &Parts,
        body: &Bytes,
    ) -> Result<http::Response<Bytes>, HttpError> {
        let batch = match parts.method {
            Method::GET => {
                BatchRequest::Single(Request::from_query_string(parts.uri.query().unwrap_or(""))?)
            }
            Method::POST => serde_json::from_slice(body).map_err(HttpError::Body)?,
            ref other => return Err(HttpError::Method(other.clone())),
        };

        let response = match batch {
            BatchRequest::Single(request) => match self.execute(parts, request).await {
                Ok(response) => json_response(&response),
                Err(answer) => answer,
            },
            // The first hook answer replaces the whole batch and drops the
            // requests still pending.
            BatchRequest::Batch(requests) => {
                match try_join_all(requests.into_iter().map(|request| self.execute(parts, request)))
                    .await
                {
                    Ok(responses) => json_response(&responses),
                    Err(answer) => answer,
                }
            }
        };
        Ok(response)
    }

    /// Execute one request, or return the hook's direct answer as `Err`.
    async fn execute(
        &self,
        parts: &Parts,
        request: Request,
    ) -> Result<Response, http::Response<Bytes>> {
        let context = match self.hook.before_execute(parts, &request).await {
            HttpDecision::Execute(context) => context,
            HttpDecision::Respond(answer) => return Err(answer),
        };
        match execute_guarded(self.engine.as_ref(), request, &context).await {
            Ok(result) => Ok(assemble(result)),
            Err(failure) => {
                warn!("http execution failed: error={failure}");
                metrics::inc_errors();
                Ok(Response::from_failure(&failure))
            }
        }
    }
}

fn with_content_type(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> http::Response<Bytes> {
    let mut response = http::Response::new(body.into());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response<T: Serialize>(value: &T) -> http::Response<Bytes> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(StatusCode::OK, JSON, body),
        Err(e) => {
            warn!("failed to encode http response: error={e}");
            with_content_type(StatusCode::INTERNAL_SERVER_ERROR, TEXT, "Internal server error")
        }
    }
}

fn error_response(error: &HttpError) -> http::Response<Bytes> {
    let mut response = with_content_type(error.status(), TEXT, error.to_string());
    if matches!(error, HttpError::Method(_)) {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
    }
    response
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(HttpError::Query(QueryParamsError::MissingQuery), 400, "Missing 'query' parameter")]
    #[case(HttpError::Method(Method::PUT), 405, "Method PUT not allowed")]
    fn error_responses_are_plain_text(
        #[case] error: HttpError,
        #[case] status: u16,
        #[case] body: &str,
    ) {
        let response = error_response(&error);
        assert_eq!(response.status().as_u16(), status);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT);
        assert_eq!(response.body(), body.as_bytes());
    }

    #[test]
    fn bad_body_reads_bad_request() {
        let source = serde_json::from_slice::<BatchRequest>(b"{").expect_err("invalid json");
        let response = error_response(&HttpError::Body(source));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body(), "Bad request".as_bytes());
    }

    #[test]
    fn json_response_sets_content_type() {
        let response = json_response(&Response::default());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(response.body(), "{}".as_bytes());
    }
}
