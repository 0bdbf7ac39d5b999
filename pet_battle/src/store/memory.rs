//! In-process store for tests and single-instance runs.

use super::{SharedStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::{collections::HashMap, time::Duration};
use tokio::{sync::Mutex, time::Instant};

#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// [`SharedStore`] backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values, locks excluded
    pub async fn len(&self) -> usize {
        self.values.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.lock().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.values.lock().await.contains_key(key)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set_keep_ttl(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut values = self.values.lock().await;
        let current = match values.get(key) {
            Some(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: "not an integer".to_string(),
                })?,
            None => 0,
        };
        let next = current + 1;
        values.insert(key.to_string(), next.to_string().into_bytes());
        Ok(next)
    }

    async fn try_lock(&self, key: &str, token: &str, lease: Duration) -> StoreResult<bool> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        if leases.get(key).is_some_and(|held| held.expires_at > now) {
            return Ok(false);
        }
        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn unlock(&self, key: &str, token: &str) -> StoreResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
