//! # Trellis
//!
//! Request pipelines for serverless HTTP handlers.
//!
//! A [`Pipeline`](middleware::Pipeline) runs an ordered list of middlewares
//! around a terminal handler. Each middleware may hook `before`, `after`
//! and `on_error`; the executor guarantees exactly one response per
//! request, translating errors into a JSON envelope.
//!
//! This crate re-exports the workspace crates and ships the reference
//! login, OTP and chat pipelines built on mock services.
//!
//! ## Crates
//!
//! - [`core`] - errors, principals, DI container, schemas and ports
//! - [`middleware`] - context, pipeline executor and standard middlewares
//! - [`config`] - layered configuration
//! - [`telemetry`] - logging setup
//!
//! ## Example
//!
//! ```
//! use trellis::prelude::*;
//!
//! let mut config = TrellisConfig::development();
//! config.apply_secret_fallbacks().unwrap();
//!
//! let services = Services::new(config);
//! let login = services.login_pipeline();
//! assert_eq!(login.middleware_names()[0], "dependency_injection");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dto;
pub mod pipelines;
pub mod services;

// Re-export core types
pub use trellis_core as core;

// Re-export middleware types
pub use trellis_middleware as middleware;

// Re-export configuration types
pub use trellis_config as config;

// Re-export telemetry types
pub use trellis_telemetry as telemetry;

pub use pipelines::Services;

use thiserror::Error;
use trellis_config::{ConfigError, ConfigLoader};
use trellis_telemetry::{init_logging, TelemetryError};

/// Failure while starting the reference services.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialized.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Loads configuration, installs logging and wires the services.
///
/// Call once at process start.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a global logger is
/// already installed.
pub fn bootstrap(loader: ConfigLoader) -> Result<Services, StartupError> {
    let config = loader.load()?;
    init_logging(&config.logging.to_log_config())?;
    tracing::info!(environment = ?config.environment, "Trellis services ready");
    Ok(Services::new(config))
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use trellis_core::{
        AuthMethod, BoxFuture, ErrorCategory, PipelineError, PipelineResult, Principal,
        TokenPayload, ValidationIssue,
    };

    // Re-export DI and schema types
    pub use trellis_core::di::Container;
    pub use trellis_core::schema::{Schema, SchemaValidator};

    // Re-export pipeline types
    pub use trellis_middleware::stages::*;
    pub use trellis_middleware::{
        Context, Envelope, ExecutionReport, HookResult, HookSet, HookTable, Middleware, Pipeline,
        PipelineBuilder,
    };

    // Re-export configuration
    pub use trellis_config::{ConfigLoader, TrellisConfig};

    // Re-export reference services
    pub use crate::pipelines::Services;
    pub use crate::services::{ChatService, LoginService, SessionTokens};
}
