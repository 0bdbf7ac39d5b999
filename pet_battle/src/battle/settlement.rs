//! Desk-level finalization and per-player payout.

use super::errors::{BattleError, BattleResult};
use super::models::{
    BattleRecord, Desk, DeskLifecycle, RoleId, SettlementOutcome, SettlementStatus, is_bot,
};
use super::recorder::RecorderHandle;
use super::rounds;
use super::template::{BattleTemplate, ResourceAmount};
use crate::ledger::{ResultLog, RoleRegistry};
use std::sync::Arc;

/// Rewards a player is owed: the template's reward table scaled by their bonus
pub fn rewards_for(template: &BattleTemplate, win: bool, bonus: i64) -> Vec<ResourceAmount> {
    if !win || bonus <= 0 {
        return Vec::new();
    }
    template
        .rewards
        .iter()
        .map(|reward| reward.scaled(bonus))
        .filter(|reward| reward.quantity > 0)
        .collect()
}

/// Whether the desk is ready for its one-time desk-level settlement
pub fn is_finalizable(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    !desk.finalized
        && desk.started_at > 0
        && (rounds::is_match_ended(desk, template, now) || !desk.has_real_players())
}

/// Pays out finished players and writes the durable record of each desk
///
/// Works on a desk the caller has loaded under its lock. The caller persists
/// the desk afterwards, or deletes it once its lifecycle is `Closable`.
#[derive(Clone)]
pub struct SettlementEngine {
    roles: Arc<dyn RoleRegistry>,
    results: Arc<dyn ResultLog>,
    recorder: RecorderHandle,
}

impl SettlementEngine {
    pub fn new(
        roles: Arc<dyn RoleRegistry>,
        results: Arc<dyn ResultLog>,
        recorder: RecorderHandle,
    ) -> Self {
        Self {
            roles,
            results,
            recorder,
        }
    }

    /// Desk-level settlement, at most once per desk
    ///
    /// Everyone still seated becomes eligible and the result record is handed
    /// to the recorder. Returns whether this call finalized the desk.
    pub fn finalize(&self, desk: &mut Desk, template: &BattleTemplate, now: i64) -> bool {
        if !is_finalizable(desk, template, now) {
            return false;
        }

        for role_id in desk.players.clone() {
            if let Some(record) = desk.records.get_mut(&role_id) {
                record.advance_settlement(SettlementStatus::Eligible);
            }
        }
        desk.finalized = true;
        self.recorder.submit(BattleRecord::from_desk(desk, now));

        log::info!(
            "Desk {} finalized after {} rounds, {} survivors",
            desk.desk_id,
            desk.eliminated.len(),
            desk.players.len()
        );
        true
    }

    /// Settle one player on a live desk
    ///
    /// # Arguments
    ///
    /// * `desk` - Desk loaded under its lock, finalized here if due
    /// * `template` - The desk's template
    /// * `role_id` - Settling player
    ///
    /// # Returns
    ///
    /// * `BattleResult<SettlementOutcome>` - Payout, `credited: false` on replay
    ///
    /// # Errors
    ///
    /// * `BattleError::NotInBattle` - No record for the player on this desk
    /// * `BattleError::SettlementPending` - Player still in a running match
    /// * `BattleError::BattleAlreadyDismiss` - Enrollment no longer points at this desk
    /// * `BattleError::Database` - Ledger failure
    pub async fn settle(
        &self,
        desk: &mut Desk,
        template: &BattleTemplate,
        role_id: RoleId,
    ) -> BattleResult<SettlementOutcome> {
        let Some(record) = desk.records.get(&role_id) else {
            return Err(BattleError::NotInBattle(desk.desk_id.clone()));
        };
        let (status, win, bonus) = (record.settlement, record.win, record.bonus);
        let rewards = rewards_for(template, win, bonus);

        match status {
            SettlementStatus::Unsettled => {
                return Err(BattleError::SettlementPending(desk.desk_id.clone()));
            }
            SettlementStatus::Collected => {
                return Ok(SettlementOutcome {
                    win,
                    bonus,
                    rewards,
                    credited: false,
                });
            }
            SettlementStatus::Eligible => {}
        }

        let collected = self.roles.collect(role_id, &desk.desk_id, &rewards).await;
        let collected = match collected {
            Ok(collected) => collected,
            Err(e) => {
                log::error!("Collect failed for role {} on {}: {}", role_id, desk.desk_id, e);
                return Err(e.into());
            }
        };

        if let Some(record) = desk.records.get_mut(&role_id) {
            record.advance_settlement(SettlementStatus::Collected);
        }

        if !collected {
            log::warn!(
                "Role {} no longer enrolled in {}, nothing paid",
                role_id,
                desk.desk_id
            );
            self.close_if_done(desk);
            return Err(BattleError::BattleAlreadyDismiss(desk.desk_id.clone()));
        }

        log::info!(
            "Role {} settled {} (win: {}, bonus: {})",
            role_id,
            desk.desk_id,
            win,
            bonus
        );
        self.close_if_done(desk);

        Ok(SettlementOutcome {
            win,
            bonus,
            rewards,
            credited: true,
        })
    }

    /// Settle a player whose desk no longer exists, from the durable record
    ///
    /// A player still enrolled in the vanished desk has the enrollment
    /// cleared, and is paid if the record shows a win. A player already
    /// released gets their recorded result back without a credit.
    ///
    /// # Errors
    ///
    /// * `BattleError::BattleAlreadyDismiss` - Neither enrollment nor record
    /// * `BattleError::Database` - Ledger or result log failure
    pub async fn recover(
        &self,
        desk_id: &str,
        template: &BattleTemplate,
        role_id: RoleId,
    ) -> BattleResult<SettlementOutcome> {
        let role = self.roles.role(role_id).await?;
        let entry = self
            .results
            .find(desk_id)
            .await?
            .and_then(|record| record.entry(role_id).cloned());
        let (win, bonus) = entry
            .as_ref()
            .map_or((false, 0), |entry| (entry.win, entry.bonus));
        let rewards = rewards_for(template, win, bonus);

        if role.enrolled_desk.as_deref() == Some(desk_id) {
            let credited = self.roles.collect(role_id, desk_id, &rewards).await?;
            log::info!(
                "Role {} recovered settlement of dismissed desk {} (win: {})",
                role_id,
                desk_id,
                win
            );
            return Ok(SettlementOutcome {
                win,
                bonus,
                rewards,
                credited,
            });
        }

        if entry.is_some() {
            return Ok(SettlementOutcome {
                win,
                bonus,
                rewards,
                credited: false,
            });
        }

        Err(BattleError::BattleAlreadyDismiss(desk_id.to_string()))
    }

    fn close_if_done(&self, desk: &mut Desk) {
        if desk.finalized && desk.all_real_collected() {
            desk.lifecycle = DeskLifecycle::Closable;
            log::info!(
                "Desk {} fully settled ({} seats, {} real)",
                desk.desk_id,
                desk.records.len(),
                desk.records.keys().filter(|id| !is_bot(**id)).count()
            );
        }
    }
}
