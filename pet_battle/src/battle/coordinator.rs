//! Entry point for every player request against a battle desk.
//!
//! Each operation loads the desk from the shared store under its distributed
//! lock, brings the time-derived state up to date (bot seats, start stamp,
//! overdue eliminations), applies the request and writes the desk back.
//! Joining additionally holds the per-template allocation lock, always taken
//! before the desk lock.

use super::allocator::DeskAllocator;
use super::betting;
use super::bots;
use super::clock::{Clock, SystemClock};
use super::context::RequestContext;
use super::errors::{BattleError, BattleResult};
use super::models::{
    Desk, DeskLifecycle, ExitOutcome, LeaveOutcome, MatchStateView, RoleId, RoundResultView,
    RoundState, ScoreSnapshot, SettlementOutcome, SettlementRound, SettlementStatus, template_of,
};
use super::recorder::RecorderHandle;
use super::registration::RegistrationCache;
use super::repository::DeskRepository;
use super::resolver;
use super::rng::Xorshift32;
use super::rounds;
use super::settlement::SettlementEngine;
use super::template::{BattleTemplate, Cell, PetId, TemplateCatalog, TemplateId};
use crate::ledger::{
    Collaborators, LedgerError,
    models::{entry_key, refund_key},
};
use crate::store::{DeskMutex, LockSettings, SharedStore, allocation_lock_name};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Battle request coordinator
///
/// Constructed once at start-up and shared behind an `Arc`.
pub struct MatchCoordinator {
    catalog: Arc<TemplateCatalog>,
    repository: DeskRepository,
    allocator: DeskAllocator,
    mutex: DeskMutex,
    collaborators: Collaborators,
    settlement: SettlementEngine,
    registration: RegistrationCache,
    clock: Arc<dyn Clock>,
    rng: Mutex<Xorshift32>,
}

impl MatchCoordinator {
    /// Create a coordinator with the system clock, default lock settings and
    /// an entropy-seeded generator
    ///
    /// # Arguments
    ///
    /// * `catalog` - Validated templates and pets
    /// * `store` - Shared store holding desks, counters and locks
    /// * `collaborators` - Ledger, role registry and result log
    /// * `recorder` - Handle of the background result recorder
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        store: Arc<dyn SharedStore>,
        collaborators: Collaborators,
        recorder: RecorderHandle,
    ) -> Self {
        let repository = DeskRepository::new(store.clone());
        let settlement = SettlementEngine::new(
            collaborators.roles.clone(),
            collaborators.results.clone(),
            recorder,
        );

        Self {
            catalog,
            allocator: DeskAllocator::new(repository.clone()),
            repository,
            mutex: DeskMutex::new(store, LockSettings::default()),
            collaborators,
            settlement,
            registration: RegistrationCache::default(),
            clock: Arc::new(SystemClock),
            rng: Mutex::new(Xorshift32::from_entropy()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_lock_settings(mut self, settings: LockSettings) -> Self {
        self.mutex = DeskMutex::new(self.repository.store().clone(), settings);
        self
    }

    pub fn with_registration_cache(mut self, registration: RegistrationCache) -> Self {
        self.registration = registration;
        self
    }

    /// Fixed seed for reproducible eliminations
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.rng = Mutex::new(Xorshift32::new(seed));
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn repository(&self) -> &DeskRepository {
        &self.repository
    }

    /// Join a desk of the given template, allocating one if needed
    ///
    /// Joining a desk the caller already sits at returns its current view.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Caller
    /// * `template_id` - Battle type to join
    /// * `pet_id` - Pet entered into the battle
    ///
    /// # Returns
    ///
    /// * `BattleResult<MatchStateView>` - The joined desk
    ///
    /// # Errors
    ///
    /// * `BattleError::ParametersInvalid` - Unknown template or pet
    /// * `BattleError::TutorialCompleted` - Tutorial already played
    /// * `BattleError::ServerBusy` - Allocation or desk lock busy
    /// * `BattleError::BattleAlreadyStarted` - Desk started before the join landed
    /// * `BattleError::BattleRegistrationFull` - No free seat
    /// * `BattleError::NotQualified` - Entry requirements not met
    /// * `BattleError::AlreadyJoinOtherBattle` - Enrolled in another desk
    pub async fn match_battle(
        &self,
        ctx: &RequestContext,
        template_id: TemplateId,
        pet_id: PetId,
    ) -> BattleResult<MatchStateView> {
        let template = self.template(template_id)?;
        if !self.catalog.is_known_pet(pet_id) {
            return Err(BattleError::ParametersInvalid(format!("unknown pet {pet_id}")));
        }

        if template.tutorial && self.collaborators.roles.role(ctx.role_id).await?.tutorial_done {
            return Err(BattleError::TutorialCompleted);
        }

        let lock = self
            .mutex
            .acquire(&allocation_lock_name(template.id))
            .await?;
        let result = self.allocate_and_join(ctx, &template, pet_id).await;
        lock.release().await;
        result
    }

    /// Current view of the caller's desk, topping up bot seats on the way
    pub async fn match_state(
        &self,
        ctx: &RequestContext,
        desk_id: &str,
    ) -> BattleResult<MatchStateView> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.match_state_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    /// Leave a desk that has not started, refunding the entry fee
    ///
    /// # Errors
    ///
    /// * `BattleError::BattleAlreadyDismiss` - Desk gone
    /// * `BattleError::NotInBattle` - Caller not seated
    /// * `BattleError::BattleAlreadyStarted` - Too late to leave; use exit
    pub async fn leave(&self, ctx: &RequestContext, desk_id: &str) -> BattleResult<LeaveOutcome> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.leave_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    /// Withdraw from a running match, keeping the bonus held so far
    ///
    /// The exit is immediate while the current round is still taking bets.
    /// During a round's result interval it is refused with `immediate: false`.
    ///
    /// # Errors
    ///
    /// * `BattleError::NotInBattle` - Caller not seated
    /// * `BattleError::MatchNotStarted` - Use leave instead
    /// * `BattleError::MatchEnded` - Nothing left to exit from
    pub async fn exit(&self, ctx: &RequestContext, desk_id: &str) -> BattleResult<ExitOutcome> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.exit_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    /// Bet on a cell for the current round
    ///
    /// # Returns
    ///
    /// * `BattleResult<ScoreSnapshot>` - Round snapshot including the new bet
    pub async fn bet(
        &self,
        ctx: &RequestContext,
        desk_id: &str,
        cell: Cell,
    ) -> BattleResult<ScoreSnapshot> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.bet_locked(ctx, &template, desk_id, cell).await;
        guard.release().await;
        result
    }

    /// Score snapshot of the current round, letting bots place due bets
    pub async fn sync_score(
        &self,
        ctx: &RequestContext,
        desk_id: &str,
    ) -> BattleResult<ScoreSnapshot> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.sync_score_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    /// Poll the round state, resolving overdue rounds
    ///
    /// A desk that no longer exists reports `Ended` with an empty view.
    pub async fn round_result(
        &self,
        ctx: &RequestContext,
        desk_id: &str,
    ) -> BattleResult<RoundResultView> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.round_result_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    /// Collect the caller's payout
    ///
    /// # Errors
    ///
    /// * `BattleError::SettlementPending` - Caller still playing
    /// * `BattleError::BattleAlreadyDismiss` - Nothing to settle for this desk
    /// * `BattleError::NotInBattle` - Caller never sat at this desk
    pub async fn settlement(
        &self,
        ctx: &RequestContext,
        desk_id: &str,
    ) -> BattleResult<SettlementOutcome> {
        let template = self.desk_template(desk_id)?;
        let guard = self.mutex.acquire(desk_id).await?;
        let result = self.settlement_locked(ctx, &template, desk_id).await;
        guard.release().await;
        result
    }

    async fn allocate_and_join(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        pet_id: PetId,
    ) -> BattleResult<MatchStateView> {
        let desk = self.allocator.select(template, self.clock.now()).await?;
        if self
            .registration
            .known_full(&desk.desk_id, template.capacity)
            .await
        {
            return Err(BattleError::BattleRegistrationFull(desk.desk_id));
        }

        let guard = self.mutex.acquire(&desk.desk_id).await?;
        let result = self.join_locked(ctx, template, &desk.desk_id, pet_id).await;
        guard.release().await;
        result
    }

    async fn join_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
        pet_id: PetId,
    ) -> BattleResult<MatchStateView> {
        let now = self.clock.now();
        let mut desk = self.load(desk_id).await?;
        if desk.is_seated(ctx.role_id) {
            return Ok(self.view(&desk, template, ctx.role_id, now));
        }

        let filled = self.with_rng(|rng| {
            bots::fill_seats(&mut desk, template, self.catalog.pets(), now, rng)
        });

        if rounds::is_match_started(&desk, template, now) {
            self.save_if(filled > 0, &desk).await?;
            return Err(BattleError::BattleAlreadyStarted(desk.desk_id));
        }

        if desk.players.len() >= template.capacity {
            self.registration
                .remember(&desk.desk_id, desk.players.len())
                .await;
            self.save_if(filled > 0, &desk).await?;
            return Err(BattleError::BattleRegistrationFull(desk.desk_id));
        }

        self.check_qualified(ctx.role_id, template, pet_id).await?;

        let role = self.collaborators.roles.role(ctx.role_id).await?;
        if role.enrolled_elsewhere(&desk.desk_id) {
            self.save_if(filled > 0, &desk).await?;
            return Err(BattleError::AlreadyJoinOtherBattle(
                role.enrolled_desk.unwrap_or_default(),
            ));
        }

        let fee = template.entry_fee(pet_id);
        let enrollment = Uuid::new_v4().to_string();
        self.collaborators
            .roles
            .enroll(
                ctx.role_id,
                &desk.desk_id,
                fee,
                &entry_key(ctx.role_id, &desk.desk_id, &enrollment),
            )
            .await
            .map_err(|e| match e {
                LedgerError::InsufficientBalance { .. } => BattleError::NotQualified(template.id),
                other => other.into(),
            })?;

        desk.seat_enrolled(ctx.role_id, pet_id, now, &enrollment);
        desk.lifecycle = DeskLifecycle::Active;

        if let Err(e) = self.complete_join(ctx, template, &desk).await {
            log::error!("{} failed to complete join of {}: {}", ctx, desk.desk_id, e);
            let refund = refund_key(ctx.role_id, &desk.desk_id, &enrollment);
            if let Err(undo) = self
                .collaborators
                .roles
                .withdraw(ctx.role_id, &desk.desk_id, fee, &refund)
                .await
            {
                log::error!("{} failed to undo enrollment in {}: {}", ctx, desk.desk_id, undo);
            }
            return Err(e);
        }

        log::info!(
            "{} joined {} with pet {} ({}/{})",
            ctx,
            desk.desk_id,
            pet_id,
            desk.players.len(),
            template.capacity
        );
        Ok(self.view(&desk, template, ctx.role_id, now))
    }

    /// Steps after the entry is paid; any failure here refunds the entry
    async fn complete_join(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk: &Desk,
    ) -> BattleResult<()> {
        if template.tutorial {
            self.collaborators
                .roles
                .complete_tutorial(ctx.role_id)
                .await?;
        }
        self.repository.save(desk).await?;
        Ok(())
    }

    async fn match_state_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<MatchStateView> {
        let now = self.clock.now();
        let mut desk = self.load_seated(desk_id, ctx.role_id).await?;
        let filled = self.with_rng(|rng| {
            bots::fill_seats(&mut desk, template, self.catalog.pets(), now, rng)
        });
        self.save_if(filled > 0, &desk).await?;
        Ok(self.view(&desk, template, ctx.role_id, now))
    }

    async fn leave_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<LeaveOutcome> {
        let now = self.clock.now();
        let mut desk = self.load_seated(desk_id, ctx.role_id).await?;
        if rounds::is_match_started(&desk, template, now) {
            return Err(BattleError::BattleAlreadyStarted(desk.desk_id));
        }

        let Some(record) = desk.records.get(&ctx.role_id) else {
            return Err(BattleError::NotInBattle(desk.desk_id));
        };
        let fee = template.entry_fee(record.pet_id);
        let refund = refund_key(ctx.role_id, &desk.desk_id, &record.enrollment);
        let withdrawn = self
            .collaborators
            .roles
            .withdraw(ctx.role_id, &desk.desk_id, fee, &refund)
            .await?;

        desk.unseat(ctx.role_id);
        desk.records.remove(&ctx.role_id);
        if !desk.has_real_players() {
            desk.lifecycle = DeskLifecycle::Unused;
        }
        self.registration
            .remember(&desk.desk_id, desk.players.len())
            .await;
        self.repository.save(&desk).await?;

        log::info!("{} left {} (refunded: {})", ctx, desk.desk_id, withdrawn);
        Ok(LeaveOutcome {
            refund: (withdrawn && fee.quantity > 0).then_some(fee),
        })
    }

    async fn exit_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<ExitOutcome> {
        let now = self.clock.now();
        let mut desk = self.load_seated(desk_id, ctx.role_id).await?;
        resolver::start_if_ready(&mut desk, template, now);
        if desk.started_at == 0 {
            return Err(BattleError::MatchNotStarted(desk.desk_id));
        }
        self.catch_up(&mut desk, template, ctx.role_id, now);

        let outcome = if rounds::is_match_ended(&desk, template, now) {
            Err(BattleError::MatchEnded(desk.desk_id.clone()))
        } else if !desk.is_seated(ctx.role_id) {
            // Eliminated by the rounds just resolved
            Ok(ExitOutcome { immediate: true })
        } else {
            let round = rounds::current_round(&desk, template, now);
            if rounds::is_round_started(&desk, template, round, now) {
                Ok(ExitOutcome { immediate: false })
            } else {
                withdraw_seat(&mut desk, ctx.role_id, round);
                log::info!("{} exited {} before round {}", ctx, desk.desk_id, round);
                Ok(ExitOutcome { immediate: true })
            }
        };

        self.repository.save(&desk).await?;
        outcome
    }

    async fn bet_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
        cell: Cell,
    ) -> BattleResult<ScoreSnapshot> {
        let now = self.clock.now();
        let mut desk = self.load_seated(desk_id, ctx.role_id).await?;
        resolver::start_if_ready(&mut desk, template, now);
        self.catch_up(&mut desk, template, ctx.role_id, now);

        let round = rounds::current_round(&desk, template, now);
        let placed = betting::place_bet(&mut desk, template, ctx.role_id, round, cell, now);
        if placed.is_ok() {
            self.with_rng(|rng| bots::place_bot_bets(&mut desk, template, now, rng));
        }

        self.repository.save(&desk).await?;
        placed?;

        log::debug!("{} bet cell {} in {} round {}", ctx, cell, desk.desk_id, round);
        Ok(betting::score_snapshot(&desk, template, ctx.role_id, round))
    }

    async fn sync_score_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<ScoreSnapshot> {
        let now = self.clock.now();
        let mut desk = self.load(desk_id).await?;
        if !desk.records.contains_key(&ctx.role_id) {
            return Err(BattleError::NotInBattle(desk.desk_id));
        }

        let round = rounds::current_round(&desk, template, now);
        if round == 0 {
            return Err(BattleError::MatchNotStarted(desk.desk_id));
        }

        let placed = self.with_rng(|rng| bots::place_bot_bets(&mut desk, template, now, rng));
        self.save_if(placed > 0, &desk).await?;
        Ok(betting::score_snapshot(&desk, template, ctx.role_id, round))
    }

    async fn round_result_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<RoundResultView> {
        let now = self.clock.now();
        let Some(mut desk) = self.repository.load(desk_id).await? else {
            return Ok(RoundResultView::dismissed(template.id));
        };
        let Some(pet_id) = desk.records.get(&ctx.role_id).map(|record| record.pet_id) else {
            return Err(BattleError::NotInBattle(desk.desk_id));
        };

        let filled = self.with_rng(|rng| {
            bots::fill_seats(&mut desk, template, self.catalog.pets(), now, rng)
        });
        let started = resolver::start_if_ready(&mut desk, template, now);

        let current = rounds::current_round(&desk, template, now);
        if current == 0 {
            self.save_if(filled > 0 || started, &desk).await?;
            return Ok(RoundResultView {
                template_id: template.id,
                round: 0,
                state: RoundState::NotStarted,
                round_start_time: rounds::round_start_time(&desk, template, 1),
                eliminated: Vec::new(),
                score: None,
                pet_id: Some(pet_id),
                players_left: desk.players.len(),
            });
        }

        self.catch_up(&mut desk, template, ctx.role_id, now);

        let bets_placed = desk
            .records
            .get(&ctx.role_id)
            .map_or(0, |record| record.bets.len());
        let (state, round) = if is_over(&desk, template, now) {
            (RoundState::Ended, bets_placed)
        } else if !desk.is_seated(ctx.role_id) {
            (RoundState::Settleable, bets_placed)
        } else {
            (RoundState::Ongoing, current)
        };

        self.repository.save(&desk).await?;

        let mut eliminated = desk.eliminated.clone();
        eliminated.truncate(round);
        Ok(RoundResultView {
            template_id: template.id,
            round,
            state,
            round_start_time: rounds::round_start_time(&desk, template, round.max(1)),
            eliminated,
            score: Some(betting::score_snapshot(&desk, template, ctx.role_id, round)),
            pet_id: Some(pet_id),
            players_left: desk.players.len(),
        })
    }

    async fn settlement_locked(
        &self,
        ctx: &RequestContext,
        template: &BattleTemplate,
        desk_id: &str,
    ) -> BattleResult<SettlementOutcome> {
        let now = self.clock.now();
        let Some(mut desk) = self.repository.load(desk_id).await? else {
            return self.settlement.recover(desk_id, template, ctx.role_id).await;
        };
        if !desk.records.contains_key(&ctx.role_id) {
            return Err(BattleError::NotInBattle(desk.desk_id));
        }

        resolver::start_if_ready(&mut desk, template, now);
        self.catch_up(&mut desk, template, ctx.role_id, now);
        self.settlement.finalize(&mut desk, template, now);

        let result = self
            .settlement
            .settle(&mut desk, template, ctx.role_id)
            .await;

        if desk.lifecycle == DeskLifecycle::Closable {
            self.repository.delete(&desk.desk_id).await?;
            log::info!("Desk {} removed after final settlement", desk.desk_id);
        } else {
            self.repository.save(&desk).await?;
        }
        result
    }

    /// Resolve overdue rounds, steering tutorial eliminations away from the caller
    fn catch_up(&self, desk: &mut Desk, template: &BattleTemplate, role_id: RoleId, now: i64) {
        let guided = template.tutorial.then_some(role_id);
        self.with_rng(|rng| resolver::resolve_due_rounds(desk, template, now, guided, rng));
    }

    async fn check_qualified(
        &self,
        role_id: RoleId,
        template: &BattleTemplate,
        pet_id: PetId,
    ) -> BattleResult<()> {
        let fee = template.entry_fee(pet_id);
        let requirements = template
            .entry_requirements
            .iter()
            .chain(std::iter::once(&fee))
            .filter(|requirement| requirement.quantity > 0);

        for requirement in requirements {
            let balance = self
                .collaborators
                .ledger
                .balance(role_id, requirement.kind, requirement.resource_id)
                .await?;
            if balance < requirement.quantity {
                log::debug!(
                    "Role {} lacks {} {} (has {}, needs {})",
                    role_id,
                    requirement.kind,
                    requirement.resource_id,
                    balance,
                    requirement.quantity
                );
                return Err(BattleError::NotQualified(template.id));
            }
        }
        Ok(())
    }

    fn view(
        &self,
        desk: &Desk,
        template: &BattleTemplate,
        role_id: RoleId,
        now: i64,
    ) -> MatchStateView {
        MatchStateView {
            template_id: template.id,
            desk_id: desk.desk_id.clone(),
            created_at: desk.created_at,
            started_at: rounds::effective_start(desk, template, now),
            joined_at: desk
                .records
                .get(&role_id)
                .map_or(0, |record| record.joined_at),
            player_count: desk.players.len(),
            capacity: template.capacity,
        }
    }

    fn template(&self, template_id: TemplateId) -> BattleResult<Arc<BattleTemplate>> {
        self.catalog.get(template_id).ok_or_else(|| {
            BattleError::ParametersInvalid(format!("unknown battle template {template_id}"))
        })
    }

    fn desk_template(&self, desk_id: &str) -> BattleResult<Arc<BattleTemplate>> {
        let template_id = template_of(desk_id)
            .ok_or_else(|| BattleError::ParametersInvalid(format!("malformed desk id {desk_id}")))?;
        self.template(template_id)
    }

    async fn load(&self, desk_id: &str) -> BattleResult<Desk> {
        self.repository
            .load(desk_id)
            .await?
            .ok_or_else(|| BattleError::BattleAlreadyDismiss(desk_id.to_string()))
    }

    async fn load_seated(&self, desk_id: &str, role_id: RoleId) -> BattleResult<Desk> {
        let desk = self.load(desk_id).await?;
        if !desk.is_seated(role_id) {
            return Err(BattleError::NotInBattle(desk.desk_id));
        }
        Ok(desk)
    }

    async fn save_if(&self, changed: bool, desk: &Desk) -> BattleResult<()> {
        if changed {
            self.repository.save(desk).await?;
        }
        Ok(())
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut Xorshift32) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

/// Take a player out of a running match before `round` resolves
fn withdraw_seat(desk: &mut Desk, role_id: RoleId, round: usize) {
    if let Some(record) = desk.records.get_mut(&role_id) {
        record.advance_settlement(SettlementStatus::Eligible);
    }
    desk.unseat(role_id);
    desk.exited.push(role_id);

    if !desk.has_real_players() && desk.settlement_round == SettlementRound::None {
        desk.settlement_round = if round <= 1 {
            SettlementRound::BeforeFirstRound
        } else {
            SettlementRound::AfterRound(round - 1)
        };
    }
}

/// Match over, or closed early because no real player is left
fn is_over(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    if rounds::is_match_ended(desk, template, now) {
        return true;
    }
    match desk.settlement_round {
        SettlementRound::None => false,
        SettlementRound::BeforeFirstRound => true,
        SettlementRound::AfterRound(round) => rounds::is_round_ended(desk, template, round, now),
    }
}
