//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level filter could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber is already installed, or installation failed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}
