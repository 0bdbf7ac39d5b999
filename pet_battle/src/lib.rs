//! # Pet Battle
//!
//! Server-side engine for a timed, multiplayer pet elimination mini-game.
//!
//! Players enter a pet into a desk, bet each round on one of the grid cells,
//! and after every round one cell is eliminated together with everyone who
//! stood on it. Survivors split a growing bonus pool and are paid in items
//! when the match ends. Sparse desks are topped up with synthetic bots.
//!
//! ## Architecture
//!
//! Desk state is ephemeral and lives in a shared store ([`store`]), guarded by
//! a lease-based distributed mutex so any number of server processes can
//! serve the same desk. Round progression keeps no timers: every request
//! derives the current round from stored timestamps and resolves whatever
//! eliminations are overdue.
//!
//! Durable effects (entry fees, refunds, rewards, enrollment flags and the
//! finished-match log) go through the collaborators in [`ledger`].
//!
//! ## Core Modules
//!
//! - [`battle`]: Templates, round engine, betting, bots, settlement, coordinator
//! - [`store`]: Shared store abstraction (Redis, in-memory) and locks
//! - [`ledger`]: Item/pet ledger, role registry and result log (PostgreSQL, in-memory)
//! - [`auth`]: Access token verification
//! - [`db`]: Connection pool and statement deadlines
//!
//! ## Example
//!
//! ```
//! use pet_battle::battle::{Desk, rounds};
//! use pet_battle::battle::template::TemplateCatalog;
//!
//! let catalog = TemplateCatalog::from_json(r#"{
//!     "pets": [101],
//!     "templates": [{
//!         "id": 1, "match_window_secs": 30, "total_rounds": 3,
//!         "round_durations": [10, 10, 10], "round_interval_secs": 2,
//!         "capacity": 4, "total_bonus": 600, "grid_count": 6
//!     }]
//! }"#).unwrap();
//! let template = catalog.get(1).unwrap();
//!
//! let mut desk = Desk::new("1-1".to_string(), 1, 0);
//! desk.started_at = 31;
//! assert_eq!(rounds::current_round(&desk, &template, 45), 2);
//! ```

/// Access token verification.
pub mod auth;

/// Battle engine and request coordinator.
pub mod battle;
pub use battle::{
    BattleError, BattleResult, MatchCoordinator, RequestContext, TemplateCatalog,
};

/// Database connection pooling.
pub mod db;

/// Durable collaborators: ledger, role registry, result log.
pub mod ledger;

/// Shared desk store and distributed locks.
pub mod store;
