//! Main configuration types.
//!
//! This module provides the top-level [`TrellisConfig`] struct.

use serde::{Deserialize, Serialize};

use crate::{ApiKeysConfig, AuthConfig, ConfigError, Environment, LogFormat, LoggingConfig};

/// Development fallback for the guest API key.
pub const DEV_GUEST_KEY: &str = "dev-guest-key";

/// Development fallback for the login API key.
pub const DEV_LOGIN_KEY: &str = "dev-login-key";

/// Development fallback for the token secret.
pub const DEV_TOKEN_SECRET: &str = "dev-secret";

/// Complete Trellis service configuration.
///
/// Constructed once at startup (usually through
/// [`ConfigLoader`](crate::ConfigLoader)) and shared by `Arc` with the
/// middlewares that need it.
///
/// # Example
///
/// ```
/// use trellis_config::{Environment, TrellisConfig};
///
/// let config = TrellisConfig::default();
/// assert_eq!(config.environment, Environment::Development);
/// assert_eq!(config.auth.token_ttl_secs, 3600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// API keys by category.
    #[serde(default)]
    pub api_keys: ApiKeysConfig,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TrellisConfig {
    /// Create a development configuration preset.
    ///
    /// Pretty, debug-level logs with source locations.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Development;
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON, info-level logs. Secrets must be supplied before [`validate`](Self::validate)
    /// passes.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Production;
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }

    /// Returns the environment variable names of required secrets that are
    /// not configured.
    #[must_use]
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_keys.get(ApiKeysConfig::GUEST).is_none() {
            missing.push("GUEST_API_KEY");
        }
        if self.api_keys.get(ApiKeysConfig::LOGIN).is_none() {
            missing.push("LOGIN_API_KEY");
        }
        if self.auth.token_secret.as_deref().map_or(true, str::is_empty) {
            missing.push("JWT_SECRET");
        }
        missing
    }

    /// Fills missing secrets with development values.
    ///
    /// In production a missing secret is an error. Elsewhere the missing
    /// names are logged at `warn` and the development values are used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecrets`] in production.
    pub fn apply_secret_fallbacks(&mut self) -> Result<(), ConfigError> {
        let missing = self.missing_secrets();
        if missing.is_empty() {
            return Ok(());
        }

        if self.environment.is_production() {
            return Err(ConfigError::MissingSecrets {
                vars: missing.into_iter().map(str::to_string).collect(),
            });
        }

        tracing::warn!(
            missing = %missing.join(", "),
            "Missing environment variables, using development defaults"
        );

        if self.api_keys.get(ApiKeysConfig::GUEST).is_none() {
            self.api_keys.set(ApiKeysConfig::GUEST, DEV_GUEST_KEY);
        }
        if self.api_keys.get(ApiKeysConfig::LOGIN).is_none() {
            self.api_keys.set(ApiKeysConfig::LOGIN, DEV_LOGIN_KEY);
        }
        if self.auth.token_secret.as_deref().map_or(true, str::is_empty) {
            self.auth.token_secret = Some(DEV_TOKEN_SECRET.to_string());
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The token TTL is zero
    /// - The log level is not a valid filter
    /// - Required secrets are missing in production
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::invalid_value(
                "auth.token_ttl_secs",
                "must be greater than zero",
            ));
        }

        if trellis_telemetry::create_env_filter(&self.logging.level).is_err() {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("invalid log filter: {}", self.logging.level),
            ));
        }

        if self.environment.is_production() {
            let missing = self.missing_secrets();
            if !missing.is_empty() {
                return Err(ConfigError::MissingSecrets {
                    vars: missing.into_iter().map(str::to_string).collect(),
                });
            }
        }

        Ok(())
    }
}
