//! Picks the desk a joining player lands in.

use super::models::{Desk, DeskLifecycle, desk_id};
use super::repository::DeskRepository;
use super::rounds;
use super::template::BattleTemplate;
use crate::store::StoreResult;

/// Window over and nothing worth keeping: never started by a real player, or fully settled
pub fn is_invalid(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    now >= desk.created_at + template.match_window_secs && desk.lifecycle != DeskLifecycle::Active
}

/// Whether a new player may still join `desk`
pub fn is_joinable(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    !template.tutorial
        && !is_invalid(desk, template, now)
        && desk.players.len() < template.capacity
        && !rounds::is_match_started(desk, template, now)
}

/// Desk selection over the per-template sequence counter
///
/// Callers must hold the template's allocation lock.
#[derive(Clone)]
pub struct DeskAllocator {
    repository: DeskRepository,
}

impl DeskAllocator {
    pub fn new(repository: DeskRepository) -> Self {
        Self { repository }
    }

    /// Reuse the template's latest desk if it can take a player, otherwise open a new one
    ///
    /// An invalid latest desk is deleted on the way.
    pub async fn select(&self, template: &BattleTemplate, now: i64) -> StoreResult<Desk> {
        if let Some(sequence) = self.repository.last_sequence(template.id).await? {
            let current_id = desk_id(template.id, sequence);
            if let Some(desk) = self.repository.load(&current_id).await? {
                if is_invalid(&desk, template, now) {
                    log::info!("Discarding stale desk {}", current_id);
                    self.repository.delete(&current_id).await?;
                } else if is_joinable(&desk, template, now) {
                    return Ok(desk);
                }
            }
        }

        let sequence = self.repository.next_sequence(template.id).await?;
        let desk = Desk::new(desk_id(template.id, sequence), template.id, now);
        self.repository.save(&desk).await?;
        log::info!("Opened desk {}", desk.desk_id);
        Ok(desk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::template::tests::scenario_template;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn allocator() -> (DeskAllocator, DeskRepository) {
        let repository = DeskRepository::new(Arc::new(MemoryStore::new()));
        (DeskAllocator::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn test_first_desk() {
        let (allocator, _) = allocator();
        let desk = allocator.select(&scenario_template(), 100).await.unwrap();
        assert_eq!(desk.desk_id, "7-1");
        assert_eq!(desk.created_at, 100);
        assert_eq!(desk.lifecycle, DeskLifecycle::Unused);
    }

    #[tokio::test]
    async fn test_reuses_forming_desk() {
        let (allocator, repository) = allocator();
        let template = scenario_template();
        let mut desk = allocator.select(&template, 100).await.unwrap();
        desk.seat(1, 101, 100);
        desk.lifecycle = DeskLifecycle::Active;
        repository.save(&desk).await.unwrap();

        let again = allocator.select(&template, 105).await.unwrap();
        assert_eq!(again.desk_id, "7-1");
        assert_eq!(again.players, vec![1]);
    }

    #[tokio::test]
    async fn test_full_desk_opens_next() {
        let (allocator, repository) = allocator();
        let template = scenario_template();
        let mut desk = allocator.select(&template, 100).await.unwrap();
        for role_id in 1..=4 {
            desk.seat(role_id, 101, 100);
        }
        desk.lifecycle = DeskLifecycle::Active;
        repository.save(&desk).await.unwrap();

        let next = allocator.select(&template, 101).await.unwrap();
        assert_eq!(next.desk_id, "7-2");
        assert!(repository.load("7-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_started_desk_opens_next() {
        let (allocator, repository) = allocator();
        let template = scenario_template();
        let mut desk = allocator.select(&template, 100).await.unwrap();
        desk.seat(1, 101, 100);
        desk.lifecycle = DeskLifecycle::Active;
        desk.started_at = 110;
        repository.save(&desk).await.unwrap();

        let next = allocator.select(&template, 111).await.unwrap();
        assert_eq!(next.desk_id, "7-2");
    }

    #[tokio::test]
    async fn test_stale_unused_desk_is_deleted() {
        let (allocator, repository) = allocator();
        let template = scenario_template();
        allocator.select(&template, 100).await.unwrap();

        let next = allocator.select(&template, 200).await.unwrap();
        assert_eq!(next.desk_id, "7-2");
        assert!(repository.load("7-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tutorial_always_fresh() {
        let (allocator, _) = allocator();
        let mut template = scenario_template();
        template.tutorial = true;
        let first = allocator.select(&template, 100).await.unwrap();
        let second = allocator.select(&template, 100).await.unwrap();
        assert_ne!(first.desk_id, second.desk_id);
    }
}
