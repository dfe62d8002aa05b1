//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env` and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, Environment, LogFormat, TrellisConfig};

/// Flat variable names predating the prefixed scheme. They are applied
/// before prefixed overrides, so `TRELLIS__API_KEYS__GUEST` wins over
/// `GUEST_API_KEY`.
const LEGACY_VARS: [&str; 4] = ["GUEST_API_KEY", "LOGIN_API_KEY", "JWT_SECRET", "NODE_ENV"];

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. `.env` file (loaded into the process environment)
/// 4. Legacy flat variables (`GUEST_API_KEY`, `LOGIN_API_KEY`, `JWT_SECRET`, `NODE_ENV`)
/// 5. Prefixed variables (`TRELLIS__SECTION__KEY`)
///
/// [`load`](Self::load) then fills development fallbacks for missing secrets
/// (or fails in production) and validates the result.
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("trellis.toml")?
///     .with_dotenv()?
///     .with_env_prefix("TRELLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TrellisConfig,
    env_prefix: Option<String>,
    legacy_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Legacy flat variables are read by default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TrellisConfig::default(),
            env_prefix: None,
            legacy_env: true,
        }
    }

    /// Start with development preset configuration.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TrellisConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TrellisConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::missing_file(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `"toml"` or `"json"` format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [api_keys]
    ///     guest = "g-1"
    ///     login = "l-1"
    ///
    ///     [auth]
    ///     token_secret = "s"
    ///     token_ttl_secs = 600
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .without_legacy_env()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.auth.token_ttl_secs, 600);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat(format.to_string()))
            }
        };
        Ok(self)
    }

    /// Load a `.env` file from the current directory into the process
    /// environment. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Loaded environment file");
                Ok(self)
            }
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a specific `.env` file into the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or cannot be parsed.
    pub fn with_dotenv_path<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        dotenvy::from_path(path.as_ref())?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`:
    /// - `TRELLIS__ENVIRONMENT=production`
    /// - `TRELLIS__API_KEYS__GUEST=...`
    /// - `TRELLIS__AUTH__TOKEN_TTL_SECS=600`
    /// - `TRELLIS__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Stop reading the legacy flat variables.
    #[must_use]
    pub fn without_legacy_env(mut self) -> Self {
        self.legacy_env = false;
        self
    }

    /// Finalize and return the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable cannot be parsed,
    /// secrets are missing in production, or validation fails.
    pub fn load(mut self) -> Result<TrellisConfig, ConfigError> {
        self.apply_env(env::vars())?;
        self.config.apply_secret_fallbacks()?;
        self.config.validate()?;
        Ok(self.config)
    }

    /// Finalize without fallbacks or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TrellisConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<TrellisConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        if self.legacy_env {
            for name in LEGACY_VARS {
                if let Some((_, value)) = vars.iter().find(|(k, _)| k == name) {
                    self.apply_legacy_var(name, value);
                }
            }
        }

        if let Some(prefix) = self.env_prefix.clone() {
            let marker = format!("{prefix}__");
            for (key, value) in vars.iter().filter(|(k, _)| k.starts_with(&marker)) {
                self.apply_env_var(key, value, &prefix)?;
            }
        }

        Ok(())
    }

    fn apply_legacy_var(&mut self, key: &str, value: &str) {
        match key {
            "GUEST_API_KEY" => self.config.api_keys.set("guest", value),
            "LOGIN_API_KEY" => self.config.api_keys.set("login", value),
            "JWT_SECRET" => self.config.auth.token_secret = Some(value.to_string()),
            "NODE_ENV" => self.config.environment = Environment::from_name(value),
            _ => {}
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_var(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["ENVIRONMENT"] => {
                self.config.environment = Environment::from_name(value);
            }
            ["API_KEYS", category] => {
                self.config.api_keys.set(category.to_ascii_lowercase(), value);
            }
            ["AUTH", "TOKEN_SECRET"] => {
                self.config.auth.token_secret = Some(value.to_string());
            }
            ["AUTH", "TOKEN_TTL_SECS"] => {
                self.config.auth.token_ttl_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_var(key, "expected integer"))?;
            }
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_var(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_var(key, "expected boolean"))?;
            }
            _ => {
                tracing::debug!(var = key, "Ignoring unrecognized configuration variable");
            }
        }

        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load_unvalidated();
        assert_eq!(config, TrellisConfig::default());
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load_unvalidated();
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{ "environment": "test", "api_keys": { "guest": "g" } }"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load_unvalidated();
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.api_keys.get("guest"), Some("g"));
    }

    #[test]
    fn test_loader_with_string_unsupported_format() {
        let err = ConfigLoader::new().with_string("", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "environment = \"production\"\n\n[auth]\ntoken_secret = \"x\"").unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .unwrap()
            .load_unvalidated();
        assert!(config.environment.is_production());
        assert_eq!(config.auth.token_secret.as_deref(), Some("x"));
    }

    #[test]
    fn test_loader_with_file_rejects_unknown_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[auth]\ntoken_lifetime = 5").unwrap();

        let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/trellis.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        assert!(ConfigLoader::new()
            .with_optional_file("/nonexistent/trellis.toml")
            .is_ok());
    }

    #[test]
    fn test_loader_with_dotenv_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "TRELLIS_LOADER_TEST_ONLY=1").unwrap();
        assert!(ConfigLoader::new().with_dotenv_path(file.path()).is_ok());
    }

    // The process environment is shared between tests, so env layering is
    // exercised through apply_env with explicit variable lists.

    #[test]
    fn test_legacy_vars() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env(vars(&[
                ("GUEST_API_KEY", "g-env"),
                ("LOGIN_API_KEY", "l-env"),
                ("JWT_SECRET", "secret"),
                ("NODE_ENV", "production"),
            ]))
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.api_keys.get("guest"), Some("g-env"));
        assert_eq!(config.api_keys.get("login"), Some("l-env"));
        assert_eq!(config.auth.token_secret.as_deref(), Some("secret"));
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_legacy_vars_disabled() {
        let mut loader = ConfigLoader::new().without_legacy_env();
        loader.apply_env(vars(&[("GUEST_API_KEY", "g-env")])).unwrap();
        assert_eq!(loader.load_unvalidated().api_keys.get("guest"), None);
    }

    #[test]
    fn test_prefixed_vars_override_legacy() {
        let mut loader = ConfigLoader::new().with_env_prefix("trellis");
        loader
            .apply_env(vars(&[
                ("TRELLIS__API_KEYS__GUEST", "g-prefixed"),
                ("GUEST_API_KEY", "g-legacy"),
                ("TRELLIS__API_KEYS__PARTNER", "p-1"),
            ]))
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.api_keys.get("guest"), Some("g-prefixed"));
        assert_eq!(config.api_keys.get("partner"), Some("p-1"));
    }

    #[test]
    fn test_apply_env_var_auth_and_logging() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TRELLIS__AUTH__TOKEN_TTL_SECS", "90", "TRELLIS")
            .unwrap();
        loader
            .apply_env_var("TRELLIS__LOGGING__FORMAT", "PRETTY", "TRELLIS")
            .unwrap();
        loader
            .apply_env_var("TRELLIS__LOGGING__ENABLED", "off", "TRELLIS")
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.auth.token_ttl_secs, 90);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let err = loader
            .apply_env_var("TRELLIS__AUTH__TOKEN_TTL_SECS", "soon", "TRELLIS")
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
    }

    #[test]
    fn test_apply_env_var_invalid_format() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TRELLIS__LOGGING__FORMAT", "xml", "TRELLIS")
            .is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
