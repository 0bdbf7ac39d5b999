//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use pet_battle::{db::DatabaseConfig, store::LockSettings};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address, metrics disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Where desks, counters and locks live
    pub store: StoreBackend,
    /// Where balances, roles and results live
    pub ledger: LedgerBackend,
    /// Security configuration
    pub security: SecurityConfig,
    /// Battle engine configuration
    pub battle: BattleConfig,
}

/// Shared store selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redis { url: String },
    /// Single-process development only
    Memory,
}

/// Durable collaborator selection
#[derive(Debug, Clone)]
pub enum LedgerBackend {
    Postgres(DatabaseConfig),
    /// Single-process development only
    Memory,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
}

/// Battle engine configuration
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// JSON file with templates and pets
    pub templates_path: PathBuf,
    /// Desk lock lease and wait
    pub lock: LockSettings,
    /// How long a desk stays known-full locally
    pub registration_cache_ttl: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `templates_override` - Optional template file override (from CLI args)
    /// * `in_memory` - Use in-memory store and ledger (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        templates_override: Option<PathBuf>,
        in_memory: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?.unwrap_or(default_bind()?),
        };
        let metrics_bind = parse_addr("METRICS_BIND")?;

        let in_memory = in_memory || parse_env_or("BATTLE_IN_MEMORY", false);

        let store = if in_memory {
            StoreBackend::Memory
        } else {
            StoreBackend::Redis {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string()),
            }
        };

        let ledger = if in_memory {
            LedgerBackend::Memory
        } else {
            LedgerBackend::Postgres(DatabaseConfig::from_env().map_err(|reason| {
                ConfigError::Invalid {
                    var: "DATABASE_URL".to_string(),
                    reason,
                }
            })?)
        };

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use the account service's access token secret".to_string(),
        })?;

        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        let templates_path = templates_override
            .or_else(|| std::env::var("BATTLE_TEMPLATES_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("battle_templates.json"));

        let defaults = LockSettings::default();
        let battle = BattleConfig {
            templates_path,
            lock: LockSettings {
                lease: Duration::from_secs(parse_env_or(
                    "LOCK_LEASE_SECS",
                    defaults.lease.as_secs(),
                )),
                retries: parse_env_or("LOCK_RETRY_COUNT", defaults.retries),
                retry_delay: Duration::from_millis(parse_env_or(
                    "LOCK_RETRY_DELAY_MS",
                    defaults.retry_delay.as_millis() as u64,
                )),
            },
            registration_cache_ttl: Duration::from_millis(parse_env_or(
                "REGISTRATION_CACHE_TTL_MS",
                1_000,
            )),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            store,
            ledger,
            security: SecurityConfig { jwt_secret },
            battle,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.battle.lock.lease.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LOCK_LEASE_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.battle.lock.retries == 0 {
            return Err(ConfigError::Invalid {
                var: "LOCK_RETRY_COUNT".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // Waiters give up before a held lease can lapse
        let max_wait = self.battle.lock.retry_delay * self.battle.lock.retries;
        if max_wait >= self.battle.lock.lease {
            return Err(ConfigError::Invalid {
                var: "LOCK_RETRY_DELAY_MS".to_string(),
                reason: format!(
                    "Total wait {:?} must stay below the lease {:?}",
                    max_wait, self.battle.lock.lease
                ),
            });
        }

        if let LedgerBackend::Postgres(database) = &self.ledger {
            if database.min_connections > database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Cannot exceed max connections ({})",
                        database.max_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: "Must differ from SERVER_BIND".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> Result<SocketAddr, ConfigError> {
    DEFAULT_BIND.parse().map_err(|_| ConfigError::Invalid {
        var: "SERVER_BIND".to_string(),
        reason: format!("Bad default {DEFAULT_BIND}"),
    })
}

fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Not a socket address: {value}"),
        }),
        Err(_) => Ok(None),
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
