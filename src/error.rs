//! Error types for gembridge

use thiserror::Error;

/// Result type alias for gembridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gembridge
#[derive(Error, Debug)]
pub enum Error {
    /// Unresolvable provider selection or invalid session configuration.
    /// Raised synchronously at session start, never per call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure: DNS, connection refused, timeout, or a
    /// failure to read a response body.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status. Carries the status code and either the
    /// parsed JSON error body or a truncated raw excerpt.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Success status but the body is not valid JSON.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Capability the active backend does not implement.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
