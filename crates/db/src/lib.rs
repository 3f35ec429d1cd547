//! PostgreSQL access for the image catalog.
//!
//! Queries are built at runtime (no compile-time sqlx macros), so the
//! crate builds without a live database. Embeddings travel as pgvector
//! text literals cast with `::vector`.

use std::time::Duration;

use retouch_core::config::{parse_env, required_env, ConfigError};
use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Connection settings loaded from the environment.
///
/// | Env Var                         | Default  |
/// |---------------------------------|----------|
/// | `DATABASE_URL`                  | required |
/// | `DATABASE_MAX_CONNECTIONS`      | `5`      |
/// | `DATABASE_CONNECT_TIMEOUT_SECS` | `10`     |
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: required_env("DATABASE_URL")?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5u32)?,
            connect_timeout: Duration::from_secs(parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 10u64)?),
        })
    }
}

/// Create a bounded connection pool. Callers queue when every connection
/// is checked out.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(&config.url)
        .await
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
