//! Environment-variable helpers shared by every configuration struct.

use std::fmt::Display;
use std::str::FromStr;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Read a required, non-empty variable.
pub fn required_env(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

/// Read an optional variable, falling back to `default` when unset or empty.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Read and parse an optional variable, falling back to `default` when unset.
pub fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| {
            ConfigError::Invalid {
                key,
                message: e.to_string(),
            }
        }),
        _ => Ok(default),
    }
}
