//! Error types for amlink.

use std::convert::Infallible;

use thiserror::Error;

use crate::protocol::RequestId;

/// Main error type for all amlink operations.
#[derive(Debug, Error)]
pub enum AmError {
    /// I/O error on a stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (headers and arguments).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame element was neither text nor binary.
    #[error("Frame {index} is not text or binary (got {kind})")]
    InvalidFrame { index: usize, kind: &'static str },

    /// Header failed validation.
    #[error("Invalid header: {0}")]
    InvalidHeader(#[from] HeaderError),

    /// The remote endpoint is not attached.
    #[error("Remote endpoint unavailable")]
    TransportUnavailable,

    /// Connection closed while the operation was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response arrived before the request deadline.
    #[error("Request {0} expired")]
    RequestExpired(RequestId),

    /// Another callback was registered for the same request.
    #[error("Callback for request {0} was replaced")]
    CallbackReplaced(RequestId),

    /// Stream-level protocol error (bad event tag, oversize event, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<Infallible> for AmError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Reason a header was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header is empty")]
    Empty,

    #[error("header is not valid JSON: {0}")]
    NotJson(String),

    #[error("header is not a map")]
    NotAnObject,

    #[error("header does not contain a cmd")]
    MissingCmd,

    #[error("header cmd is not a string")]
    CmdNotString,

    #[error("header cmd is empty")]
    EmptyCmd,

    #[error("header cmd {0:?} is reserved")]
    ReservedCmd(String),

    #[error("header does not contain a request")]
    MissingRequest,

    #[error("header request is not a positive integer")]
    RequestNotPositive,

    #[error("header does not contain frames")]
    MissingFrames,

    #[error("header frames is not a non-negative integer")]
    FramesNotInteger,

    #[error("header declares {declared} frames, limit is {limit}")]
    TooManyFrames { declared: u32, limit: u32 },
}

/// Result type alias using AmError.
pub type Result<T> = std::result::Result<T, AmError>;
