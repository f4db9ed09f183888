//! Error types for restfit operations.
//!
//! This module provides [`Error`], the single error type shared by endpoint
//! compilation, request binding, call execution, and response decoding.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Error variants for restfit operations.
///
/// Variants fall into two families: configuration-class errors are caller
/// bugs (bad descriptors, unresolved converters, misuse of a call object)
/// and are detected before any network activity where possible;
/// execution-class errors surface transport faults, HTTP-level failures,
/// and codec failures for an otherwise well-formed invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration or API misuse (bad descriptor, unresolvable
    /// converter, double execution, envelope constructor misuse, etc.).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level I/O failure (connection failed, stream aborted,
    /// body read failed, etc.).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// An HTTP error status, carrying the full buffered error context.
    #[error("http error: {}", .0.status)]
    Status(Box<StatusContext>),

    /// Request body serialization failure.
    #[error("encode error: {0}")]
    Encode(String),

    /// Response body deserialization failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// A successful response carried no body where one was required.
    #[error("null body: {0}")]
    NullBody(String),

    /// The call was canceled before it produced a response.
    #[error("canceled")]
    Canceled,
}

/// Everything known about an HTTP error response at the time it was
/// classified: status line, headers, and the fully buffered error body.
///
/// The body is buffered eagerly so it stays readable after the underlying
/// connection is gone.
#[derive(Debug, Clone)]
pub struct StatusContext {
    pub status: StatusCode,
    pub message: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Error {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    /// Create an encode error.
    pub fn encode<S: Into<String>>(message: S) -> Self {
        Error::Encode(message.into())
    }

    /// Create a decode error.
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Error::Decode(message.into())
    }

    /// Create a null-body error.
    pub fn null_body<S: Into<String>>(message: S) -> Self {
        Error::NullBody(message.into())
    }

    /// Create an HTTP status error from the classified parts of a response.
    pub fn status(status: StatusCode, message: String, headers: HeaderMap, body: Bytes) -> Self {
        Error::Status(Box::new(StatusContext {
            status,
            message,
            headers,
            body,
        }))
    }

    /// Get the HTTP status context, if this is a status error.
    pub fn status_context(&self) -> Option<&StatusContext> {
        match self {
            Error::Status(cx) => Some(cx),
            _ => None,
        }
    }

    /// Whether this error is a caller bug rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Whether this error is a transport-class fault (I/O failure or
    /// cancellation), as opposed to an application-level one.
    pub fn is_transport_class(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Canceled)
    }
}
