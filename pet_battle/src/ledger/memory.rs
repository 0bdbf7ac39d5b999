//! In-process ledger, role registry and result log.

use super::{
    Ledger, LedgerError, LedgerResult, ResultLog, RoleRegistry,
    models::{ResourceEntry, RoleRecord, reward_key},
};
use crate::battle::{BattleRecord, ResourceAmount, ResourceKind, RoleId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

type BalanceKey = (RoleId, ResourceKind, i32);

#[derive(Debug, Default)]
struct State {
    balances: HashMap<BalanceKey, i64>,
    entries: Vec<ResourceEntry>,
    /// idempotency key -> balance after
    applied: HashMap<String, i64>,
    roles: HashMap<RoleId, RoleRecord>,
    results: HashMap<String, BattleRecord>,
}

impl State {
    fn adjust(
        &mut self,
        owner: RoleId,
        delta: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<i64> {
        if delta.quantity == 0 {
            return Err(LedgerError::InvalidAmount(0));
        }

        if let Some(balance_after) = self.applied.get(idempotency_key) {
            return Ok(*balance_after);
        }

        let key = (owner, delta.kind, delta.resource_id);
        let current = self.balances.get(&key).copied().unwrap_or(0);
        let next = current
            .checked_add(delta.quantity)
            .ok_or(LedgerError::BalanceOverflow)?;
        if next < 0 {
            return Err(LedgerError::InsufficientBalance {
                owner,
                resource_id: delta.resource_id,
                available: current,
                required: -delta.quantity,
            });
        }

        self.balances.insert(key, next);
        self.applied.insert(idempotency_key.to_string(), next);
        self.entries.push(ResourceEntry {
            owner,
            kind: delta.kind,
            resource_id: delta.resource_id,
            amount: delta.quantity,
            balance_after: next,
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
        });
        Ok(next)
    }

    fn role_mut(&mut self, role_id: RoleId) -> &mut RoleRecord {
        self.roles
            .entry(role_id)
            .or_insert_with(|| RoleRecord::fresh(role_id))
    }
}

/// Ledger, registry and result log kept in memory
///
/// Multi-step operations run under one lock, so they are as atomic as the
/// PostgreSQL transactions they stand in for.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every applied adjustment for an owner, oldest first
    pub async fn entries(&self, owner: RoleId) -> Vec<ResourceEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn result_count(&self) -> usize {
        self.state.lock().await.results.len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(
        &self,
        owner: RoleId,
        kind: ResourceKind,
        resource_id: i32,
    ) -> LedgerResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .balances
            .get(&(owner, kind, resource_id))
            .copied()
            .unwrap_or(0))
    }

    async fn adjust_balance(
        &self,
        owner: RoleId,
        delta: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<i64> {
        self.state.lock().await.adjust(owner, delta, idempotency_key)
    }
}

#[async_trait]
impl RoleRegistry for MemoryLedger {
    async fn role(&self, role_id: RoleId) -> LedgerResult<RoleRecord> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .get(&role_id)
            .cloned()
            .unwrap_or_else(|| RoleRecord::fresh(role_id)))
    }

    async fn enroll(
        &self,
        role_id: RoleId,
        desk_id: &str,
        entry: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<()> {
        let mut state = self.state.lock().await;

        let enrolled = state
            .roles
            .get(&role_id)
            .and_then(|role| role.enrolled_desk.clone());
        if let Some(enrolled) = enrolled.filter(|enrolled| enrolled != desk_id) {
            return Err(LedgerError::AlreadyEnrolled {
                role_id,
                desk_id: enrolled,
            });
        }

        if entry.quantity > 0 {
            state.adjust(role_id, entry.scaled(-1), idempotency_key)?;
        }

        let role = state.role_mut(role_id);
        role.enrolled_desk = Some(desk_id.to_string());
        role.battle_count += 1;
        Ok(())
    }

    async fn withdraw(
        &self,
        role_id: RoleId,
        desk_id: &str,
        refund: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<bool> {
        let mut state = self.state.lock().await;

        let enrolled_here = state
            .roles
            .get(&role_id)
            .is_some_and(|role| role.enrolled_desk.as_deref() == Some(desk_id));
        if !enrolled_here {
            return Ok(false);
        }

        if refund.quantity > 0 {
            state.adjust(role_id, refund, idempotency_key)?;
        }

        let role = state.role_mut(role_id);
        role.enrolled_desk = None;
        role.battle_count = (role.battle_count - 1).max(0);
        Ok(true)
    }

    async fn collect(
        &self,
        role_id: RoleId,
        desk_id: &str,
        rewards: &[ResourceAmount],
    ) -> LedgerResult<bool> {
        let mut state = self.state.lock().await;

        let enrolled_here = state
            .roles
            .get(&role_id)
            .is_some_and(|role| role.enrolled_desk.as_deref() == Some(desk_id));
        if !enrolled_here {
            return Ok(false);
        }

        // Validate every credit before applying any of them
        for reward in rewards.iter().filter(|r| r.quantity > 0) {
            let key = (role_id, reward.kind, reward.resource_id);
            let current = state.balances.get(&key).copied().unwrap_or(0);
            current
                .checked_add(reward.quantity)
                .ok_or(LedgerError::BalanceOverflow)?;
        }

        for (index, reward) in rewards.iter().enumerate() {
            if reward.quantity > 0 {
                let key = reward_key(role_id, desk_id, index);
                state.adjust(role_id, *reward, &key)?;
            }
        }

        state.role_mut(role_id).enrolled_desk = None;
        Ok(true)
    }

    async fn complete_tutorial(&self, role_id: RoleId) -> LedgerResult<bool> {
        let mut state = self.state.lock().await;
        let role = state.role_mut(role_id);
        if role.tutorial_done {
            return Ok(false);
        }
        role.tutorial_done = true;
        Ok(true)
    }
}

#[async_trait]
impl ResultLog for MemoryLedger {
    async fn record(&self, record: &BattleRecord) -> LedgerResult<()> {
        self.state
            .lock()
            .await
            .results
            .insert(record.desk_id.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, desk_id: &str) -> LedgerResult<Option<BattleRecord>> {
        Ok(self.state.lock().await.results.get(desk_id).cloned())
    }
}
