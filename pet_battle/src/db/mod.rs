//! PostgreSQL pool behind the durable collaborators.
//!
//! ```no_run
//! use pet_battle::db::{Database, DatabaseConfig};
//!
//! # async fn run() -> Result<(), sqlx::Error> {
//! let database = Database::connect(&DatabaseConfig::default()).await?;
//! database.migrate().await?;
//! assert!(database.ping().await);
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use config::DatabaseConfig;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Tables for the ledger, role registry and result log
pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Pool plus the statement deadlines it was configured with
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    query_timeout: Duration,
    begin_timeout: Duration,
}

impl Database {
    /// Open the pool
    ///
    /// # Errors
    ///
    /// Fails when the first connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(&config.database_url)
            .await?;

        log::info!(
            "Database pool ready ({}..{} connections)",
            config.min_connections,
            config.max_connections
        );
        Ok(Self {
            pool,
            query_timeout: config.query_timeout,
            begin_timeout: config.begin_timeout,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn begin_timeout(&self) -> Duration {
        self.begin_timeout
    }

    /// Whether a trivial query answers within the query deadline
    pub async fn ping(&self) -> bool {
        let check = sqlx::query("SELECT 1").execute(&self.pool);
        matches!(tokio::time::timeout(self.query_timeout, check).await, Ok(Ok(_)))
    }

    /// Apply [`SCHEMA`]; every statement is idempotent
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        log::info!("Battle schema applied");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_collaborator_tables() {
        for table in ["role_resources", "resource_entries", "battle_roles", "battle_results"] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "missing {table}"
            );
        }
    }
}
