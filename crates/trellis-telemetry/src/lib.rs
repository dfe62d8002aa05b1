//! Structured logging for Trellis.
//!
//! Every Trellis crate logs through `tracing` macros using the same field
//! names: `request_id`, `middleware`, `phase`, `http.method`, `http.path`,
//! `http.status_code`, `error`, `error.chain` and `duration_ms`. This crate
//! installs the subscriber that turns those events into output:
//!
//! - **JSON** lines for production, one object per event
//! - **Pretty** multi-line output for local development
//!
//! The level filter follows `tracing-subscriber`'s `EnvFilter` syntax, so
//! `"info,trellis_middleware=debug"` is valid.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//!
//! tracing::info!(request_id = "0190...", "request completed");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
