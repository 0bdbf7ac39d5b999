//! Lease-based distributed mutex over the shared store.

use super::{SharedStore, StoreError, StoreResult};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

const LOCK_PREFIX: &str = "lock/";

/// Lock acquisition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    /// Lease after which a crashed holder's lock lapses
    pub lease: Duration,
    /// Attempts before giving up
    pub retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            retries: 32,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Mutex factory keyed by name (desk ID or allocation lock name)
#[derive(Clone)]
pub struct DeskMutex {
    store: Arc<dyn SharedStore>,
    settings: LockSettings,
}

impl DeskMutex {
    pub fn new(store: Arc<dyn SharedStore>, settings: LockSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> LockSettings {
        self.settings
    }

    /// Acquire the named lock, waiting at most `retries * retry_delay`
    ///
    /// # Errors
    ///
    /// * `StoreError::LockBusy` - Still held by someone else after all attempts
    /// * `StoreError::Redis` - Store unreachable
    pub async fn acquire(&self, name: &str) -> StoreResult<LockGuard> {
        let key = format!("{LOCK_PREFIX}{name}");
        let token = Uuid::new_v4().to_string();
        let attempts = self.settings.retries.max(1);

        for attempt in 1..=attempts {
            if self
                .store
                .try_lock(&key, &token, self.settings.lease)
                .await?
            {
                return Ok(LockGuard {
                    store: self.store.clone(),
                    key,
                    token,
                });
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        log::warn!("Lock {} still busy after {} attempts", key, attempts);
        Err(StoreError::LockBusy(key))
    }
}

/// Held lock. Must be released explicitly; otherwise the lease expires.
#[must_use = "a lock guard should be released once the critical section ends"]
pub struct LockGuard {
    store: Arc<dyn SharedStore>,
    key: String,
    token: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Best-effort release. Failures are logged and left to lease expiry.
    pub async fn release(self) {
        match self.store.unlock(&self.key, &self.token).await {
            Ok(true) => {}
            Ok(false) => log::warn!("Lock {} lapsed before release", self.key),
            Err(e) => log::error!("Failed to release lock {}: {}", self.key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fast_settings() -> LockSettings {
        LockSettings {
            lease: Duration::from_secs(30),
            retries: 3,
            retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = Arc::new(MemoryStore::new());
        let mutex = DeskMutex::new(store, fast_settings());

        let guard = mutex.acquire("1-1").await.unwrap();
        assert_eq!(guard.key(), "lock/1-1");
        guard.release().await;

        let again = mutex.acquire("1-1").await.unwrap();
        again.release().await;
    }

    #[tokio::test]
    async fn test_busy_after_retries() {
        let store = Arc::new(MemoryStore::new());
        let mutex = DeskMutex::new(store, fast_settings());

        let held = mutex.acquire("1-1").await.unwrap();
        let err = mutex.acquire("1-1").await.err().unwrap();
        assert!(matches!(err, StoreError::LockBusy(ref key) if key == "lock/1-1"));
        held.release().await;
    }

    #[tokio::test]
    async fn test_different_names_do_not_contend() {
        let store = Arc::new(MemoryStore::new());
        let mutex = DeskMutex::new(store, fast_settings());

        let a = mutex.acquire("1-1").await.unwrap();
        let b = mutex.acquire("1-2").await.unwrap();
        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn test_waits_for_release() {
        let store = Arc::new(MemoryStore::new());
        let mutex = DeskMutex::new(
            store,
            LockSettings {
                lease: Duration::from_secs(30),
                retries: 50,
                retry_delay: Duration::from_millis(5),
            },
        );

        let held = mutex.acquire("1-1").await.unwrap();
        let waiter = {
            let mutex = mutex.clone();
            tokio::spawn(async move { mutex.acquire("1-1").await.map(|g| g.key().to_string()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        held.release().await;

        assert_eq!(waiter.await.unwrap().unwrap(), "lock/1-1");
    }
}
