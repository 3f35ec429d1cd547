use axum::http::HeaderValue;
use retouch_core::config::{env_or, parse_env, ConfigError};

/// Default whole-request timeout: three upstream calls at the default
/// 120 s upstream timeout, plus headroom.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 420;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Whole-request timeout in seconds (default: `420`). A masked edit
    /// with rewrite chains three upstream calls, each bounded by the
    /// upstream timeout, and must finish inside this budget.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `8000`                  |
    /// | `CORS_ORIGINS`         | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS` | `420`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins = parse_origins(&env_or("CORS_ORIGINS", "http://localhost:5173"))?;

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 8000u16)?,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        })
    }
}

/// Split a comma-separated origin list, rejecting values that cannot be
/// sent as an `Access-Control-Allow-Origin` header.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|e| ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    message: format!("'{origin}': {e}"),
                })
        })
        .collect()
}
