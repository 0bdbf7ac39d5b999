//! External collaborators consumed by the battle engine.
//!
//! - [`Ledger`]: idempotent item/pet balance adjustments that never go negative
//! - [`RoleRegistry`]: the per-player "currently enrolled desk" flag plus the
//!   battle counters kept on the role record
//! - [`ResultLog`]: durable record of finished desks
//!
//! [`PgLedger`] implements all three over PostgreSQL (schema in
//! `pet_battle/sql/schema.sql`); [`MemoryLedger`] keeps everything in process
//! memory for tests and local runs.
//!
//! ## Example
//!
//! ```no_run
//! use pet_battle::battle::ResourceAmount;
//! use pet_battle::db::Database;
//! use pet_battle::ledger::{Ledger, PgLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect(&Default::default()).await?;
//!     let ledger = PgLedger::from_database(&db);
//!
//!     // Grant two units of pet 101 to role 1
//!     let balance = ledger
//!         .adjust_balance(1, ResourceAmount::pet(101, 2), "grant_1_101")
//!         .await?;
//!     println!("Pet balance: {}", balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod memory;
pub mod models;
pub mod postgres;

pub use errors::{LedgerError, LedgerResult};
pub use memory::MemoryLedger;
pub use models::{ResourceEntry, RoleRecord};
pub use postgres::PgLedger;

use crate::battle::{BattleRecord, ResourceAmount, ResourceKind, RoleId};
use async_trait::async_trait;
use std::sync::Arc;

/// Item/pet balances
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance, 0 for resources never held
    async fn balance(&self, owner: RoleId, kind: ResourceKind, resource_id: i32)
    -> LedgerResult<i64>;

    /// Apply a signed delta and return the new balance
    ///
    /// Replaying an `idempotency_key` applies nothing and returns the balance
    /// recorded when the key was first used.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientBalance` - Debit would go negative
    /// * `LedgerError::InvalidAmount` - Zero delta
    async fn adjust_balance(
        &self,
        owner: RoleId,
        delta: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<i64>;
}

/// Battle fields of the role record
#[async_trait]
pub trait RoleRegistry: Send + Sync {
    /// Role record, fresh if the player never joined a battle
    async fn role(&self, role_id: RoleId) -> LedgerResult<RoleRecord>;

    /// Atomically debit `entry`, point the enrollment flag at `desk_id` and
    /// bump the battle count
    ///
    /// # Errors
    ///
    /// * `LedgerError::AlreadyEnrolled` - Flag points at another desk
    /// * `LedgerError::InsufficientBalance` - Cannot pay the entry
    async fn enroll(
        &self,
        role_id: RoleId,
        desk_id: &str,
        entry: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<()>;

    /// Undo an enrollment: refund, clear the flag and drop the battle count
    ///
    /// Returns false and changes nothing when the flag does not point at `desk_id`.
    async fn withdraw(
        &self,
        role_id: RoleId,
        desk_id: &str,
        refund: ResourceAmount,
        idempotency_key: &str,
    ) -> LedgerResult<bool>;

    /// Credit `rewards` and clear the enrollment flag in one transaction
    ///
    /// Returns false and credits nothing when the flag does not point at
    /// `desk_id`, which makes a repeated collect harmless.
    async fn collect(
        &self,
        role_id: RoleId,
        desk_id: &str,
        rewards: &[ResourceAmount],
    ) -> LedgerResult<bool>;

    /// Mark the tutorial battle as played; false if it already was
    async fn complete_tutorial(&self, role_id: RoleId) -> LedgerResult<bool>;
}

/// Durable log of finished desks
#[async_trait]
pub trait ResultLog: Send + Sync {
    /// Store a finished desk; recording the same desk again overwrites it
    async fn record(&self, record: &BattleRecord) -> LedgerResult<()>;

    async fn find(&self, desk_id: &str) -> LedgerResult<Option<BattleRecord>>;
}

/// The three collaborators bundled for the coordinator
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn Ledger>,
    pub roles: Arc<dyn RoleRegistry>,
    pub results: Arc<dyn ResultLog>,
}

impl Collaborators {
    /// Use one backend for all three roles
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: Ledger + RoleRegistry + ResultLog + 'static,
    {
        Self {
            ledger: backend.clone(),
            roles: backend.clone(),
            results: backend,
        }
    }
}
