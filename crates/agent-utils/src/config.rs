//! Configuration management utilities
//!
//! Lookups go through an [`EnvLookup`] so callers and tests can substitute a
//! map for the process environment.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

use crate::logging::LogFormat;

/// Source of configuration values, usually `std::env::var`
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// A configuration value was present but unusable
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value for {key}: '{value}' ({reason})")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Non-empty, trimmed string value
pub fn env_string(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed value; `Ok(None)` when unset
pub fn env_parse<T>(lookup: EnvLookup<'_>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_string(lookup, key)
        .map(|raw| {
            raw.parse().map_err(|e: T::Err| ConfigError {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Comma-separated list; empty items are dropped
pub fn env_list(lookup: EnvLookup<'_>, key: &str) -> Option<Vec<String>> {
    env_string(lookup, key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Process-level settings shared by binaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "stock-orchestrator".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load from `APP_NAME`, `APP_ENV` and `LOG_FORMAT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            app_name: env_string(lookup, "APP_NAME").unwrap_or(defaults.app_name),
            environment: env_string(lookup, "APP_ENV").unwrap_or(defaults.environment),
            log_format: env_parse(lookup, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_parse() {
        let env = lookup(&[("DEADLINE_MS", " 1500 "), ("BAD", "soon")]);
        assert_eq!(env_parse::<u64>(&env, "DEADLINE_MS"), Ok(Some(1500)));
        assert_eq!(env_parse::<u64>(&env, "MISSING"), Ok(None));

        let err = env_parse::<u64>(&env, "BAD").unwrap_err();
        assert_eq!(err.key, "BAD");
        assert_eq!(err.value, "soon");
    }

    #[test]
    fn test_env_list_and_blank_values() {
        let env = lookup(&[("AGENTS", "technical, ,news,"), ("BLANK", "   ")]);
        assert_eq!(
            env_list(&env, "AGENTS"),
            Some(vec!["technical".to_string(), "news".to_string()])
        );
        assert_eq!(env_string(&env, "BLANK"), None);
    }

    #[test]
    fn test_app_config_from_lookup() {
        let env = lookup(&[("APP_ENV", "production"), ("LOG_FORMAT", "json")]);
        let config = AppConfig::from_lookup(&env).unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.app_name, "stock-orchestrator");

        let env = lookup(&[("LOG_FORMAT", "xml")]);
        assert!(AppConfig::from_lookup(&env).is_err());
    }
}
