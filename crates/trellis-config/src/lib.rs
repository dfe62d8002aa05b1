//! Typed configuration for Trellis services.
//!
//! This crate provides the [`TrellisConfig`] struct and a layered
//! [`ConfigLoader`]:
//! - TOML and JSON configuration files
//! - `.env` files
//! - Environment variable overrides, prefixed (`TRELLIS__SECTION__KEY`) and
//!   the legacy flat names (`GUEST_API_KEY`, `LOGIN_API_KEY`, `JWT_SECRET`)
//! - Strict validation (fails on unknown fields)
//!
//! The configuration is built once at startup and handed to the middlewares
//! that need it by `Arc`. Nothing in the pipeline reads the process
//! environment at request time.
//!
//! # Sections
//!
//! - [`ApiKeysConfig`] - API keys by category (`guest`, `login`, ...)
//! - [`AuthConfig`] - token secret and lifetime
//! - [`LoggingConfig`] - log level and format
//! - [`Environment`] - development, test or production
//!
//! # Configuration File Format
//!
//! ```toml
//! environment = "production"
//!
//! [api_keys]
//! guest = "..."
//! login = "..."
//!
//! [auth]
//! token_secret = "..."
//! token_ttl_secs = 3600
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Missing Secrets
//!
//! In production, a missing guest key, login key or token secret fails
//! [`ConfigLoader::load`]. In development and test the loader logs the
//! missing variable names and substitutes `dev-guest-key`, `dev-login-key`
//! and `dev-secret`.

#![doc(html_root_url = "https://docs.rs/trellis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{TrellisConfig, DEV_GUEST_KEY, DEV_LOGIN_KEY, DEV_TOKEN_SECRET};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{ApiKeysConfig, AuthConfig, Environment, LoggingConfig};
pub use trellis_telemetry::LogFormat;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_toml_config() {
        let toml = r#"
            environment = "production"

            [api_keys]
            guest = "g"
            login = "l"

            [auth]
            token_secret = "s"
            token_ttl_secs = 120

            [logging]
            level = "warn"
            format = "pretty"
        "#;

        let config: TrellisConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.token_ttl_secs, 120);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.api_keys.get(ApiKeysConfig::LOGIN), Some("l"));
    }
}
