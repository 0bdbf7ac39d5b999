//! Desk persistence in the shared store.

use super::models::Desk;
use super::template::TemplateId;
use crate::store::{SharedStore, StoreError, StoreResult, counter_key, desk_key};
use std::sync::Arc;

/// Loads and saves desks as compact binary blobs
#[derive(Clone)]
pub struct DeskRepository {
    store: Arc<dyn SharedStore>,
}

impl DeskRepository {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Load a desk, `None` if it was never created or already removed
    pub async fn load(&self, desk_id: &str) -> StoreResult<Option<Desk>> {
        match self.store.get(&desk_key(desk_id)).await? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Write a desk back, keeping any expiry already on the key
    pub async fn save(&self, desk: &Desk) -> StoreResult<()> {
        let bytes = encode(desk)?;
        self.store
            .set_keep_ttl(&desk_key(&desk.desk_id), &bytes)
            .await
    }

    pub async fn delete(&self, desk_id: &str) -> StoreResult<()> {
        self.store.delete(&desk_key(desk_id)).await
    }

    /// Last allocated desk sequence for a template
    pub async fn last_sequence(&self, template_id: TemplateId) -> StoreResult<Option<i64>> {
        let key = counter_key(template_id);
        match self.store.get(&key).await? {
            Some(raw) => std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt {
                    key,
                    reason: "desk counter is not an integer".to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Atomically allocate the next desk sequence for a template
    pub async fn next_sequence(&self, template_id: TemplateId) -> StoreResult<i64> {
        self.store.incr(&counter_key(template_id)).await
    }
}

fn encode(desk: &Desk) -> StoreResult<Vec<u8>> {
    bincode::serde::encode_to_vec(desk, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode(bytes: &[u8]) -> StoreResult<Desk> {
    let (desk, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(desk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::models::{BOT_ID_FLOOR, SettlementRound};
    use crate::store::MemoryStore;

    fn repository() -> DeskRepository {
        DeskRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let repo = repository();
        let mut desk = Desk::new("7-1".to_string(), 7, 100);
        desk.seat(1, 101, 100);
        desk.seat(BOT_ID_FLOOR + 1, 102, 0);
        desk.records.get_mut(&1).unwrap().bets = vec![2, 4];
        desk.settlement_round = SettlementRound::AfterRound(2);

        repo.save(&desk).await.unwrap();
        assert_eq!(repo.load("7-1").await.unwrap(), Some(desk));
    }

    #[tokio::test]
    async fn test_missing_desk() {
        let repo = repository();
        assert_eq!(repo.load("7-9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repository();
        repo.save(&Desk::new("7-1".to_string(), 7, 100)).await.unwrap();
        repo.delete("7-1").await.unwrap();
        assert_eq!(repo.load("7-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_codec_error() {
        let repo = repository();
        repo.store()
            .set_keep_ttl(&desk_key("7-1"), &[0xff, 0xff, 0xff])
            .await
            .unwrap();
        assert!(matches!(repo.load("7-1").await, Err(StoreError::Codec(_))));
    }

    #[tokio::test]
    async fn test_sequence_counter() {
        let repo = repository();
        assert_eq!(repo.last_sequence(7).await.unwrap(), None);
        assert_eq!(repo.next_sequence(7).await.unwrap(), 1);
        assert_eq!(repo.next_sequence(7).await.unwrap(), 2);
        assert_eq!(repo.last_sequence(7).await.unwrap(), Some(2));
        assert_eq!(repo.last_sequence(8).await.unwrap(), None);
    }
}
