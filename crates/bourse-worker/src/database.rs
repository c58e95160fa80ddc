// Database connection settings

use std::time::Duration;

use anyhow::{Context, Result};
use bourse_broadcast::PostgresBroadcastStore;
use sqlx::postgres::PgPoolOptions;

/// PostgreSQL pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub replica_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Build from CLI-resolved URLs plus environment variables
    ///
    /// Environment variables:
    /// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
    /// - `DATABASE_ACQUIRE_TIMEOUT_MS`: Pool acquire timeout (default: 3000)
    pub fn from_env(url: String, replica_url: Option<String>) -> Self {
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(5);

        let acquire_timeout = std::env::var("DATABASE_ACQUIRE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(3));

        Self {
            url,
            replica_url: replica_url.filter(|u| !u.is_empty()),
            max_connections,
            acquire_timeout,
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }

    /// Connect the primary (and replica, if configured) pools
    pub async fn connect(&self) -> Result<PostgresBroadcastStore> {
        let pool = self
            .pool_options()
            .connect(&self.url)
            .await
            .context("Failed to connect to database")?;
        let mut store = PostgresBroadcastStore::new(pool);

        if let Some(replica_url) = &self.replica_url {
            let replica = self
                .pool_options()
                .connect(replica_url)
                .await
                .context("Failed to connect to read replica")?;
            store = store.with_replica(replica);
            tracing::info!("Read replica configured for eventually consistent reads");
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_replica_url_is_ignored() {
        let config = DatabaseConfig::from_env("postgres://db".into(), Some(String::new()));
        assert!(config.replica_url.is_none());
        assert_eq!(config.url, "postgres://db");
    }
}
