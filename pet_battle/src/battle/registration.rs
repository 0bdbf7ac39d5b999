//! Short-lived, process-local memory of desks known to be full.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Caches seat counts for a short TTL so hot join retries against a full desk
/// skip the desk lock. Staleness only delays a join by one TTL.
#[derive(Clone)]
pub struct RegistrationCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, (usize, Instant)>>>,
}

impl RegistrationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Remember the seated count of a desk
    pub async fn remember(&self, desk_id: &str, seated: usize) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, at)| now.duration_since(*at) < self.ttl);
        entries.insert(desk_id.to_string(), (seated, now));
    }

    /// Whether a fresh entry says the desk has no free seat
    pub async fn known_full(&self, desk_id: &str, capacity: usize) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(desk_id)
            .is_some_and(|(seated, at)| at.elapsed() < self.ttl && *seated >= capacity)
    }
}

impl Default for RegistrationCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
