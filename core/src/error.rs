//! Error types for the HTTP client.
//!
//! # Design
//! Usage errors (an unknown format tag, merging into non-mapping data, a
//! response without status information) are reported immediately and are
//! never retried. Failures of the underlying exchange are folded into
//! `Transport`, which keeps the original cause reachable through
//! `std::error::Error::source`. Retrying is left to the caller.

use std::io;

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by requests, responses, codecs and transports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No formatter or parser is registered for the tag, and no default exists.
    #[error("Unrecognized format '{0}'")]
    UnrecognizedFormat(String),

    /// `add_data` was called while the existing data is a scalar or list.
    #[error("cannot merge existing data with new data: existing data is not a mapping")]
    DataNotMergeable,

    /// The response carries no `http-code` header.
    #[error("Unable to get status code: referred header information is missing.")]
    MissingStatusCode,

    /// The `http-code` header is present but is not a number.
    #[error("invalid status code: {0}")]
    InvalidStatusCode(String),

    #[error("invalid request method: {0}")]
    InvalidMethod(String),

    /// The mock transport was asked to send with an empty response queue.
    #[error("No Response available")]
    NoResponseAvailable,

    /// A transport answered a batch with a different number of responses
    /// than requests.
    #[error("batch returned {actual} responses for {expected} requests")]
    BatchSizeMismatch { expected: usize, actual: usize },

    /// `Request::send` was called on a request that has no owning client.
    #[error("request is not bound to a client")]
    MissingClient,

    /// The exchange could not be completed (endpoint unreachable, broken stream, ...).
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    /// Content could not be decoded for the selected format.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl ClientError {
    /// Wrap an underlying transport failure, keeping it as the error source.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClientError::Transport {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error came from the network exchange rather than from
    /// misuse of the client.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}
