//! Configuration section types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trellis_telemetry::{LogConfig, LogFormat};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; missing secrets fall back to development values.
    #[default]
    Development,
    /// Automated tests; behaves like development.
    Test,
    /// Production; missing secrets are fatal.
    Production,
}

impl Environment {
    /// Parses an environment name (`production`, `test`, anything else is
    /// development).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Returns `true` for [`Environment::Production`].
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// API keys by category.
///
/// Serialized as a flat table:
///
/// ```toml
/// [api_keys]
/// guest = "g-123"
/// login = "l-456"
/// partner = "p-789"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ApiKeysConfig {
    keys: BTreeMap<String, String>,
}

impl ApiKeysConfig {
    /// Category used by anonymous guest endpoints.
    pub const GUEST: &'static str = "guest";

    /// Category used by login endpoints.
    pub const LOGIN: &'static str = "login";

    /// Creates an empty key table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the key for `category`.
    #[must_use]
    pub fn with_key(mut self, category: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(category, value);
        self
    }

    /// Sets the key for `category`.
    pub fn set(&mut self, category: impl Into<String>, value: impl Into<String>) {
        self.keys.insert(category.into().to_ascii_lowercase(), value.into());
    }

    /// Returns the configured key for `category`, ignoring empty values.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<&str> {
        self.keys
            .get(&category.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the configured categories.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// Token issuing and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Secret used to sign or seal session tokens.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Lifetime of issued tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

const fn default_token_ttl_secs() -> u64 {
    3600
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Level filter (trace, debug, info, warn, error, or directives).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Converts this section into the telemetry crate's settings.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            file_line_info: self.include_location,
            include_target: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
