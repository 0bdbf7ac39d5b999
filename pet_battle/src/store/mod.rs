//! Shared low-latency store holding desk state, desk counters and locks.
//!
//! Desk state lives only here; every request handler (in any process) reads
//! it, mutates it under the desk lock and writes it back.
//!
//! ## Keys
//!
//! - `battle:data:<deskId>` - encoded [`Desk`](crate::battle::Desk), written keeping any existing expiry
//! - `battle:deskId:<templateId>` - last desk sequence number for a template
//! - `battle:match:<templateId>` - name of the per-template allocation lock
//! - `lock/<name>` - lease-based mutex entries
//!
//! Two backends are provided: [`RedisStore`] for deployments and
//! [`MemoryStore`] for tests and single-process runs.

pub mod lock;
pub mod memory;
pub mod redis_store;

pub use lock::{DeskMutex, LockGuard, LockSettings};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Shared store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Lock still held by someone else after all retries
    #[error("Lock busy: {0}")]
    LockBusy(String),

    #[error("Codec error: {0}")]
    Codec(String),

    /// Value present but not in the expected shape
    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value and lease-lock contract
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value, keeping the key's current expiry if it has one
    async fn set_keep_ttl(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically increment an integer counter, creating it at 1
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set `key` to `token` only if absent, expiring after `lease`
    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> StoreResult<bool>;

    /// Delete `key` only if it still holds `token`
    async fn unlock(&self, key: &str, token: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Key holding an encoded desk
pub fn desk_key(desk_id: &str) -> String {
    format!("battle:data:{desk_id}")
}

/// Key holding a template's last desk sequence number
pub fn counter_key(template_id: i32) -> String {
    format!("battle:deskId:{template_id}")
}

/// Lock name guarding desk allocation for a template
pub fn allocation_lock_name(template_id: i32) -> String {
    format!("battle:match:{template_id}")
}
