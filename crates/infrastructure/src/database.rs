//! Database connection pool.

use crate::map_db_err;
use peerrank_domain::errors::AppResult;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Connection settings, usually loaded from the environment.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection URL
    pub url: String,
    /// Maximum pool size
    pub max_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Read the configuration from `DATABASE_URL` and friends.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let acquire_timeout = std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        Ok(Self {
            url,
            max_connections,
            acquire_timeout,
        })
    }
}

/// Thin wrapper owning the pg pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect and build the pool.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "database pool ready");
        Ok(Self { pool })
    }

    /// Borrow the inner pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip health probe.
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}
