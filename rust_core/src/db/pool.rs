//! Postgres connection pool for the coin store

use crate::error::{IngestError, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug)]
pub struct DbPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Maximum lifetime of a connection
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    /// How long a save may wait for a free connection
    pub acquire_timeout: Duration,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            max_lifetime: Duration::from_secs(1800), // 30 minutes
            idle_timeout: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl DbPoolConfig {
    /// Size the pool for an ingestion pass: one connection per in-flight
    /// reconciliation, overridable through `DB_POOL_*` variables.
    pub fn for_workers(workers: usize) -> Self {
        let defaults = Self::default();
        let max_connections = std::env::var("DB_POOL_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| (workers as u32).max(defaults.max_connections));

        Self {
            max_connections,
            min_connections: std::env::var("DB_POOL_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_connections)
                .min(max_connections),
            acquire_timeout: std::env::var("DB_POOL_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
            ..defaults
        }
    }
}

pub async fn create_pool(database_url: &str, config: &DbPoolConfig) -> Result<PgPool> {
    info!(
        "Creating database pool: max={}, min={}, acquire_timeout={:?}",
        config.max_connections, config.min_connections, config.acquire_timeout
    );

    let connect_opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| IngestError::Config(format!("invalid DATABASE_URL: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_opts)
        .await?;

    info!("Database pool created successfully");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbPoolConfig::default();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert!(config.min_connections <= config.max_connections);
    }

    #[test]
    fn test_pool_grows_with_workers() {
        let config = DbPoolConfig::for_workers(16);
        assert!(config.max_connections >= 1);
        assert!(config.min_connections <= config.max_connections);
    }
}
