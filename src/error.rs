//! Error types and the execution error mapper.
//!
//! Failures are contained where they occur: [`ProtocolError`] ends a session
//! with a close code, [`TransportError`] ends it silently, and
//! [`ExecutionFailure`] is mapped by [`map_error`] into a wire
//! [`GraphQLError`] that leaves the session running.

use std::{error::Error as StdError, fmt, iter};

use thiserror::Error;

use crate::response::GraphQLError;

/// Boxed error used at the transport and engine seams.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised while decoding or encoding subscription-transport frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a well-formed [`crate::Message`].
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),
    /// A message could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors raised by the host transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Writing an outbound frame failed.
    #[error("failed to send frame")]
    Send(#[source] BoxError),
    /// An outbound message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// A failure raised by the execution engine.
///
/// Any error type converts into an `ExecutionFailure` with `?`. When the
/// error (or one of its sources) is a [`GraphQLError`], [`map_error`] keeps
/// its structured fields.
pub struct ExecutionFailure(BoxError);

impl ExecutionFailure {
    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Create a failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self { Self(message.into().into()) }

    /// The wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) { self.0.as_ref() }

    /// Find a structured GraphQL error in the failure or its source chain.
    #[must_use]
    pub fn graphql_error(&self) -> Option<&GraphQLError> {
        iter::successors(Some(self.0.as_ref() as &(dyn StdError + 'static)), |&err| {
            err.source()
        })
        .find_map(|err| err.downcast_ref::<GraphQLError>())
    }
}

impl<E> From<E> for ExecutionFailure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self { Self::new(error) }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.0.to_string();
        if message.is_empty() {
            f.write_str(UNKNOWN_ERROR)
        } else {
            f.write_str(&message)
        }
    }
}

impl fmt::Debug for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExecutionFailure").field(&self.0).finish()
    }
}

/// Convert an engine failure into a wire [`GraphQLError`].
///
/// Structured errors are copied verbatim; anything else becomes an error
/// whose message is the failure's display text. This never fails.
#[must_use]
pub fn map_error(failure: &ExecutionFailure) -> GraphQLError {
    failure
        .graphql_error()
        .cloned()
        .unwrap_or_else(|| GraphQLError::new(failure.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::response::{PathSegment, SourceLocation};

    #[derive(Debug, Error)]
    #[error("resolver failed")]
    struct Wrapped(#[source] GraphQLError);

    #[derive(Debug, Error)]
    #[error("")]
    struct Silent;

    fn structured() -> GraphQLError {
        GraphQLError::new("This is my fetching error")
            .at(SourceLocation::new(2, 5))
            .at_path(vec![PathSegment::from("throwError")])
            .with_classification("FETCHING_ERROR")
    }

    #[test]
    fn structured_errors_are_copied_verbatim() {
        let failure = ExecutionFailure::from(structured());
        assert_eq!(map_error(&failure), structured());
    }

    #[test]
    fn structured_sources_are_found() {
        let failure = ExecutionFailure::new(Wrapped(structured()));
        assert_eq!(map_error(&failure), structured());
    }

    #[test]
    fn other_failures_use_display_text() {
        let failure = ExecutionFailure::new(std::io::Error::other("socket closed"));
        let error = map_error(&failure);
        assert_eq!(
            serde_json::to_value(error).expect("serialise"),
            json!({"message": "socket closed"})
        );
    }

    #[test]
    fn empty_messages_fall_back() {
        let failure = ExecutionFailure::new(Silent);
        assert_eq!(map_error(&failure).message, UNKNOWN_ERROR);
    }

    #[test]
    fn question_mark_converts_errors() {
        fn parse(raw: &str) -> Result<u8, ExecutionFailure> { Ok(raw.parse::<u8>()?) }
        let failure = parse("nope").expect_err("parse should fail");
        assert_eq!(map_error(&failure).message, "invalid digit found in string");
    }
}
