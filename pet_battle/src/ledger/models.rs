//! Ledger data models.

use crate::battle::{ResourceAmount, ResourceKind, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Battle-related fields of a player's role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role_id: RoleId,
    /// Desk the player is currently enrolled in, if any
    pub enrolled_desk: Option<String>,
    /// Lifetime number of desks joined
    pub battle_count: i64,
    pub tutorial_done: bool,
}

impl RoleRecord {
    /// Record for a player who never joined a battle
    pub fn fresh(role_id: RoleId) -> Self {
        Self {
            role_id,
            enrolled_desk: None,
            battle_count: 0,
            tutorial_done: false,
        }
    }

    /// Enrolled in a desk other than `desk_id`
    pub fn enrolled_elsewhere(&self, desk_id: &str) -> bool {
        self.enrolled_desk
            .as_deref()
            .is_some_and(|enrolled| enrolled != desk_id)
    }
}

/// One applied balance adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub owner: RoleId,
    pub kind: ResourceKind,
    pub resource_id: i32,
    /// Signed delta
    pub amount: i64,
    pub balance_after: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Idempotency key for the entry debit of one enrollment
pub fn entry_key(role_id: RoleId, desk_id: &str, enrollment: &str) -> String {
    format!("battle_entry_{role_id}_{desk_id}_{enrollment}")
}

/// Idempotency key for the refund of one enrollment
pub fn refund_key(role_id: RoleId, desk_id: &str, enrollment: &str) -> String {
    format!("battle_refund_{role_id}_{desk_id}_{enrollment}")
}

/// Idempotency key for one reward line of a settlement
pub fn reward_key(role_id: RoleId, desk_id: &str, index: usize) -> String {
    format!("battle_reward_{role_id}_{desk_id}_{index}")
}

/// Signed delta for a debit of `amount`
pub fn debit(amount: &ResourceAmount) -> ResourceAmount {
    amount.scaled(-1)
}
