//! Elimination battle engine.
//!
//! Players join a desk for a battle template, bet on grid cells each round,
//! and every round one cell is eliminated along with everyone standing on it.
//! Survivors share a growing bonus pool and collect rewards at the end.
//!
//! ## Layout
//!
//! - [`rounds`]: time-derived round state (pure)
//! - [`betting`]: bets, random backfill and score snapshots (pure)
//! - [`resolver`]: match start, eliminations and the bonus split (pure)
//! - [`bots`]: synthetic seats and their betting schedule (pure)
//! - [`allocator`]: which desk a joining player lands in
//! - [`settlement`]: desk finalization and per-player payout
//! - [`coordinator`]: the request-level operations tying it together
//!
//! ## Example
//!
//! ```no_run
//! use pet_battle::battle::{MatchCoordinator, RequestContext, ResultRecorder, TemplateCatalog};
//! use pet_battle::ledger::{Collaborators, MemoryLedger};
//! use pet_battle::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(TemplateCatalog::load("battle_templates.json")?);
//! let ledger = Arc::new(MemoryLedger::new());
//! let (recorder, _task) = ResultRecorder::spawn(ledger.clone());
//! let coordinator = MatchCoordinator::new(
//!     catalog,
//!     Arc::new(MemoryStore::new()),
//!     Collaborators::from_backend(ledger),
//!     recorder,
//! );
//!
//! let ctx = RequestContext::generate(42);
//! let view = coordinator.match_battle(&ctx, 1, 101).await?;
//! let snapshot = coordinator.bet(&ctx, &view.desk_id, 3).await?;
//! println!("{:?}", snapshot.scores);
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod betting;
pub mod bots;
pub mod clock;
pub mod context;
pub mod coordinator;
pub mod errors;
pub mod models;
pub mod recorder;
pub mod registration;
pub mod repository;
pub mod resolver;
pub mod rng;
pub mod rounds;
pub mod settlement;
pub mod template;

pub use allocator::DeskAllocator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::RequestContext;
pub use coordinator::MatchCoordinator;
pub use errors::{BattleError, BattleResult};
pub use models::{
    BOT_ID_FLOOR, BattleRecord, Desk, DeskLifecycle, ExitOutcome, LeaveOutcome, MatchStateView,
    PlayerRecord, RoleId, RosterEntry, RoundResultView, RoundState, ScoreSnapshot,
    SettlementOutcome, SettlementRound, SettlementStatus, is_bot,
};
pub use recorder::{RecorderHandle, ResultRecorder};
pub use registration::RegistrationCache;
pub use repository::DeskRepository;
pub use rng::Xorshift32;
pub use settlement::SettlementEngine;
pub use template::{
    BattleTemplate, CatalogError, Cell, PetId, ResourceAmount, ResourceKind, TemplateCatalog,
    TemplateId,
};
