//! Test error types.

use thiserror::Error;

/// Errors that can occur while building or reading a test exchange.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Response body was not valid UTF-8.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
