//! Pool and deadline settings for the ledger database.

use std::{env, str::FromStr, time::Duration};

/// PostgreSQL pool settings plus the deadlines [`crate::ledger::PgLedger`]
/// applies to its statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,

    /// Wait for a pooled connection before failing
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,

    /// Deadline for one ledger statement outside a transaction
    pub query_timeout: Duration,
    /// Deadline for opening a ledger transaction
    pub begin_timeout: Duration,
}

impl DatabaseConfig {
    /// Defaults around an explicit URL
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            query_timeout: Duration::from_secs(5),
            begin_timeout: Duration::from_secs(10),
        }
    }

    /// Read the configuration from the environment
    ///
    /// `DATABASE_URL` is required. Optional overrides:
    ///
    /// | Variable | Unit | Default |
    /// |---|---|---|
    /// | `DB_MAX_CONNECTIONS` | count | 20 |
    /// | `DB_MIN_CONNECTIONS` | count | 2 |
    /// | `DB_CONNECTION_TIMEOUT` | seconds | 10 |
    /// | `DB_IDLE_TIMEOUT` | seconds | 600 |
    /// | `DB_MAX_LIFETIME` | seconds | 1800 |
    /// | `DB_QUERY_TIMEOUT_MS` | milliseconds | 5000 |
    /// | `DB_BEGIN_TIMEOUT_MS` | milliseconds | 10000 |
    ///
    /// # Errors
    ///
    /// Names the variable that is missing or does not parse.
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;
        let defaults = Self::with_url(url);

        Ok(Self {
            max_connections: read("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: read("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            acquire_timeout: Duration::from_secs(read(
                "DB_CONNECTION_TIMEOUT",
                defaults.acquire_timeout.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(read(
                "DB_IDLE_TIMEOUT",
                defaults.idle_timeout.as_secs(),
            )?),
            max_lifetime: Duration::from_secs(read(
                "DB_MAX_LIFETIME",
                defaults.max_lifetime.as_secs(),
            )?),
            query_timeout: Duration::from_millis(read(
                "DB_QUERY_TIMEOUT_MS",
                defaults.query_timeout.as_millis() as u64,
            )?),
            begin_timeout: Duration::from_millis(read(
                "DB_BEGIN_TIMEOUT_MS",
                defaults.begin_timeout.as_millis() as u64,
            )?),
            ..defaults
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::with_url("postgres://postgres@localhost/pet_battle")
    }
}

fn read<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
