//! # Configuration
//!
//! Application configuration comes from three layers, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. an optional YAML file,
//! 3. environment variables.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `STRATA_ENV` | `development`, `production` or `testing` (`dev`/`prod`/`test` accepted) | `production` |
//! | `STRATA_LOG_LEVEL` | `tracing` filter directive, e.g. `info` or `strata=debug` | `info` |
//! | `STRATA_LOG_FORMAT` | `json` or `pretty` | `json` |
//!
//! An unknown environment name falls back to `production`, so diagnostics are
//! never exposed by accident.
//!
//! ## Example file
//!
//! ```yaml
//! environment: development
//! log:
//!   level: debug
//!   format: pretty
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::path::Path;

pub const ENV_VAR: &str = "STRATA_ENV";
pub const LOG_LEVEL_VAR: &str = "STRATA_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "STRATA_LOG_FORMAT";

/// Deployment environment. Controls how internal errors are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
    Testing,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Production,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }

    #[must_use]
    pub fn is_testing(&self) -> bool {
        *self == Environment::Testing
    }

    /// Shape stored in every request context under `"environment"`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "current": self.as_str(),
            "isDevelopment": self.is_development(),
            "isProduction": self.is_production(),
            "isTesting": self.is_testing(),
        })
    }
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        Environment::parse(&s)
    }
}

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

impl From<String> for LogFormat {
    fn from(s: String) -> Self {
        LogFormat::parse(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive handed to `EnvFilter`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub log: LogConfig,
}

impl AppConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Parse a YAML configuration file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid YAML for this shape.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// # Errors
    ///
    /// Fails when `content` is not valid YAML for this shape.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults, then the optional file, then environment variables.
    ///
    /// # Errors
    ///
    /// Propagates file read and parse errors.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::from_env`] and [`AppConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env_name) = lookup(ENV_VAR) {
            self.environment = Environment::parse(&env_name);
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            if !level.trim().is_empty() {
                self.log.level = level;
            }
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            self.log.format = LogFormat::parse(&format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_environment_parse_aliases() {
        assert_eq!(Environment::parse("DEV"), Environment::Development);
        assert_eq!(Environment::parse("testing"), Environment::Testing);
        assert_eq!(Environment::parse("staging"), Environment::Production);
    }

    #[test]
    fn test_environment_value_shape() {
        let v = Environment::Testing.to_value();
        assert_eq!(v["current"], "testing");
        assert_eq!(v["isTesting"], true);
        assert_eq!(v["isDevelopment"], false);
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let config = AppConfig::from_yaml_str("environment: dev\n").unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = AppConfig::from_yaml_str("log:\n  level: warn\n  format: pretty\n").unwrap();
        let vars: HashMap<&str, &str> =
            [(ENV_VAR, "development"), (LOG_LEVEL_VAR, "debug")].into_iter().collect();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Pretty);
    }
}
