//! One simulated player: join, bet every round, settle.

use crate::api_client::{ApiClient, rejection_code};
use anyhow::{Result, bail};
use pet_battle::battle::{Cell, PetId, RoleId, RoundState, TemplateId};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use std::time::Duration;

/// Rejections worth waiting out
const TRANSIENT: &[&str] = &["ServerBusy", "SettlementPending"];

/// Join rejections that a fresh attempt may get past (a new desk is allocated)
const REJOIN: &[&str] = &["ServerBusy", "BattleRegistrationFull", "BattleAlreadyStarted"];

/// Bet rejections that only mean the round moved on
const STALE_BET: &[&str] = &["BettingClosed", "CellEliminated", "MatchEnded"];

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub template_id: TemplateId,
    pub grid_count: Cell,
    pub poll_interval: Duration,
    pub think_time: Duration,
    pub think_variance: Duration,
    /// Attempts for join and settlement before giving up
    pub max_attempts: u32,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            template_id: 1,
            grid_count: 6,
            poll_interval: Duration::from_millis(1_000),
            think_time: Duration::from_millis(2_000),
            think_variance: Duration::from_millis(1_500),
            max_attempts: 30,
        }
    }
}

/// How one bot's battle went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReport {
    pub role_id: RoleId,
    pub desk_id: String,
    pub win: bool,
    pub bonus: i64,
    pub credited: bool,
}

/// Uniform pick among cells not yet eliminated
pub fn choose_cell(grid_count: Cell, eliminated: &[Cell], rng: &mut impl Rng) -> Option<Cell> {
    let surviving: Vec<Cell> = (1..=grid_count)
        .filter(|cell| !eliminated.contains(cell))
        .collect();
    surviving.choose(rng).copied()
}

/// Base think time plus or minus a random variance, never below 100ms
pub fn think_delay(base: Duration, variance: Duration, rng: &mut impl Rng) -> Duration {
    let base = base.as_millis() as i64;
    let variance = variance.as_millis() as i64;
    let offset = if variance > 0 {
        rng.random_range(-variance..=variance)
    } else {
        0
    };
    Duration::from_millis((base + offset).max(100) as u64)
}

pub struct BattleBot {
    role_id: RoleId,
    pet_id: PetId,
    client: ApiClient,
    settings: BotSettings,
    rng: StdRng,
}

impl BattleBot {
    pub fn new(
        role_id: RoleId,
        pet_id: PetId,
        client: ApiClient,
        settings: BotSettings,
        seed: u64,
    ) -> Self {
        Self {
            role_id,
            pet_id,
            client,
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Play one battle from join to settlement
    pub async fn play(mut self) -> Result<BotReport> {
        let desk_id = self.join().await?;
        log::info!("Bot {} joined {}", self.role_id, desk_id);

        self.play_rounds(&desk_id).await?;
        self.settle(desk_id).await
    }

    async fn join(&mut self) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .client
                .match_battle(self.settings.template_id, self.pet_id)
                .await
            {
                Ok(view) => return Ok(view.desk_id),
                Err(e) => {
                    let retry = rejection_code(&e).is_some_and(|code| REJOIN.contains(&code));
                    if !retry || attempt >= self.settings.max_attempts {
                        return Err(e);
                    }
                    log::debug!("Bot {} join attempt {} rejected: {}", self.role_id, attempt, e);
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    async fn play_rounds(&mut self, desk_id: &str) -> Result<()> {
        let mut last_bet = 0;
        loop {
            let view = match self.client.round_result(desk_id).await {
                Ok(view) => view,
                Err(e) if rejection_code(&e).is_some_and(|code| TRANSIENT.contains(&code)) => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match view.state {
                RoundState::Ended | RoundState::Settleable => {
                    log::info!(
                        "Bot {} done with {} after round {} ({})",
                        self.role_id,
                        desk_id,
                        view.round,
                        view.state
                    );
                    return Ok(());
                }
                RoundState::Ongoing if view.round > last_bet => {
                    let delay = think_delay(
                        self.settings.think_time,
                        self.settings.think_variance,
                        &mut self.rng,
                    );
                    tokio::time::sleep(delay).await;

                    let Some(cell) =
                        choose_cell(self.settings.grid_count, &view.eliminated, &mut self.rng)
                    else {
                        bail!("No surviving cell left on {}", desk_id);
                    };
                    match self.client.bet(desk_id, cell).await {
                        Ok(_) => {
                            log::debug!(
                                "Bot {} bet cell {} in round {}",
                                self.role_id,
                                cell,
                                view.round
                            );
                            last_bet = view.round;
                        }
                        Err(e) => match rejection_code(&e) {
                            Some(code) if STALE_BET.contains(&code) || TRANSIENT.contains(&code) => {
                                log::debug!("Bot {} bet skipped: {}", self.role_id, e);
                            }
                            // Eliminated between the poll and the bet
                            Some("NotInBattle") => return Ok(()),
                            _ => return Err(e),
                        },
                    }
                }
                RoundState::Ongoing | RoundState::NotStarted => {
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    async fn settle(&mut self, desk_id: String) -> Result<BotReport> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.settlement(&desk_id).await {
                Ok(outcome) => {
                    return Ok(BotReport {
                        role_id: self.role_id,
                        desk_id,
                        win: outcome.win,
                        bonus: outcome.bonus,
                        credited: outcome.credited,
                    });
                }
                Err(e) => {
                    let retry = rejection_code(&e).is_some_and(|code| TRANSIENT.contains(&code));
                    if !retry || attempt >= self.settings.max_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_cell_skips_eliminated() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let cell = choose_cell(6, &[1, 3, 5], &mut rng).unwrap();
            assert!([2, 4, 6].contains(&cell));
        }
    }

    #[test]
    fn test_choose_cell_none_left() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(choose_cell(2, &[1, 2], &mut rng), None);
    }

    #[test]
    fn test_think_delay_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let delay = think_delay(
                Duration::from_millis(1_000),
                Duration::from_millis(300),
                &mut rng,
            );
            assert!(delay >= Duration::from_millis(700));
            assert!(delay <= Duration::from_millis(1_300));
        }
    }

    #[test]
    fn test_think_delay_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = think_delay(Duration::ZERO, Duration::ZERO, &mut rng);
        assert_eq!(delay, Duration::from_millis(100));
    }
}
