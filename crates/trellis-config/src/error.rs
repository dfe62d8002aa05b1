//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("configuration file not found: {path}")]
    MissingFile {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file or string is not valid TOML for [`TrellisConfig`](crate::TrellisConfig).
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file or string is not valid JSON for [`TrellisConfig`](crate::TrellisConfig).
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Only TOML and JSON are understood.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    /// The `.env` file exists but could not be loaded.
    #[error("cannot load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// An environment override could not be applied.
    #[error("bad environment variable {var}: {reason}")]
    EnvVar {
        /// Variable name.
        var: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A loaded value is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field name.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Required secrets are absent in an environment that has no fallback.
    #[error("Missing required environment variables: {}", .vars.join(", "))]
    MissingSecrets {
        /// Names of the missing variables.
        vars: Vec<String>,
    },
}

impl ConfigError {
    pub(crate) fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
