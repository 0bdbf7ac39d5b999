//! Desk state and the views returned to callers.

use super::template::{Cell, PetId, ResourceAmount, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Player (role) ID type
pub type RoleId = i64;

/// Synthetic player IDs start here; real role IDs stay below it.
pub const BOT_ID_FLOOR: RoleId = 1 << 48;

/// Whether an ID belongs to a synthetic bot seat
pub fn is_bot(role_id: RoleId) -> bool {
    role_id >= BOT_ID_FLOOR
}

/// Desk identifier `<templateId>-<sequence>`
pub fn desk_id(template_id: TemplateId, sequence: i64) -> String {
    format!("{template_id}-{sequence}")
}

/// Template ID encoded in a desk identifier
pub fn template_of(desk_id: &str) -> Option<TemplateId> {
    let (template, sequence) = desk_id.split_once('-')?;
    sequence.parse::<i64>().ok()?;
    template.parse().ok()
}

/// Per-player payout progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Unsettled,
    Eligible,
    Collected,
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Unsettled => write!(f, "unsettled"),
            SettlementStatus::Eligible => write!(f, "eligible"),
            SettlementStatus::Collected => write!(f, "collected"),
        }
    }
}

/// Desk lifecycle flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeskLifecycle {
    /// No real player seated
    Unused,
    Active,
    /// Fully settled, safe to discard
    Closable,
}

/// Early close-out marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementRound {
    None,
    /// Every real player left before round 1 started; nobody is paid
    BeforeFirstRound,
    /// No real player remains after this round
    AfterRound(usize),
}

/// One seat's history on a desk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub pet_id: PetId,
    /// One cell per round, index 0 is round 1
    pub bets: Vec<Cell>,
    pub win: bool,
    pub bonus: i64,
    pub settlement: SettlementStatus,
    /// Unix seconds, 0 for bots
    pub joined_at: i64,
    /// Ledger key suffix of the entry paid for this seat, empty for bots
    pub enrollment: String,
}

impl PlayerRecord {
    pub fn new(pet_id: PetId, joined_at: i64) -> Self {
        Self {
            pet_id,
            bets: Vec::new(),
            win: false,
            bonus: 0,
            settlement: SettlementStatus::Unsettled,
            joined_at,
            enrollment: String::new(),
        }
    }

    /// Raise the settlement status; lower targets are ignored
    pub fn advance_settlement(&mut self, status: SettlementStatus) {
        if status > self.settlement {
            self.settlement = status;
        }
    }

    pub fn bet_for(&self, round: usize) -> Option<Cell> {
        round.checked_sub(1).and_then(|i| self.bets.get(i)).copied()
    }
}

/// Mutable, ephemeral state of one match room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desk {
    pub desk_id: String,
    pub template_id: TemplateId,
    pub created_at: i64,
    /// 0 until the match starts
    pub started_at: i64,
    /// Seated players in join order, real and bot
    pub players: Vec<RoleId>,
    /// Every player who ever sat here and did not leave
    pub records: BTreeMap<RoleId, PlayerRecord>,
    /// Eliminated cell per resolved round
    pub eliminated: Vec<Cell>,
    pub exited: Vec<RoleId>,
    /// Per-survivor bonus after each resolved round
    pub round_bonus: Vec<i64>,
    pub lifecycle: DeskLifecycle,
    /// Desk-level settlement done
    pub finalized: bool,
    pub settlement_round: SettlementRound,
    pub bot_counter: i64,
}

impl Desk {
    pub fn new(desk_id: String, template_id: TemplateId, now: i64) -> Self {
        Self {
            desk_id,
            template_id,
            created_at: now,
            started_at: 0,
            players: Vec::new(),
            records: BTreeMap::new(),
            eliminated: Vec::new(),
            exited: Vec::new(),
            round_bonus: Vec::new(),
            lifecycle: DeskLifecycle::Unused,
            finalized: false,
            settlement_round: SettlementRound::None,
            bot_counter: 0,
        }
    }

    pub fn is_seated(&self, role_id: RoleId) -> bool {
        self.players.contains(&role_id)
    }

    /// Seat a player, replacing any stale record. No-op if already seated.
    pub fn seat(&mut self, role_id: RoleId, pet_id: PetId, joined_at: i64) {
        if self.is_seated(role_id) {
            return;
        }
        self.players.push(role_id);
        self.records
            .insert(role_id, PlayerRecord::new(pet_id, joined_at));
    }

    /// Seat a real player under the enrollment that paid their entry
    pub fn seat_enrolled(
        &mut self,
        role_id: RoleId,
        pet_id: PetId,
        joined_at: i64,
        enrollment: &str,
    ) {
        if self.is_seated(role_id) {
            return;
        }
        self.seat(role_id, pet_id, joined_at);
        if let Some(record) = self.records.get_mut(&role_id) {
            record.enrollment = enrollment.to_string();
        }
    }

    /// Remove a player from the seated list, keeping the record
    pub fn unseat(&mut self, role_id: RoleId) -> bool {
        let before = self.players.len();
        self.players.retain(|id| *id != role_id);
        self.players.len() != before
    }

    pub fn real_player_count(&self) -> usize {
        self.players.iter().filter(|id| !is_bot(**id)).count()
    }

    pub fn bot_count(&self) -> usize {
        self.players.len() - self.real_player_count()
    }

    pub fn has_real_players(&self) -> bool {
        self.real_player_count() > 0
    }

    /// Stake carried into `round` by each survivor
    pub fn stake_before(&self, round: usize) -> i64 {
        round
            .checked_sub(2)
            .and_then(|i| self.round_bonus.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Every real player who sat through the match has collected
    pub fn all_real_collected(&self) -> bool {
        self.records
            .iter()
            .filter(|(id, _)| !is_bot(**id))
            .all(|(_, record)| record.settlement == SettlementStatus::Collected)
    }
}

/// Public view returned by match and match-state calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStateView {
    pub template_id: TemplateId,
    pub desk_id: String,
    pub created_at: i64,
    /// Effective start, reported once the join window elapsed even if no poll started it
    pub started_at: i64,
    pub joined_at: i64,
    pub player_count: usize,
    pub capacity: usize,
}

/// Who bet on which cell in a round, and what it is worth
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    /// Sum of stakes per cell
    pub scores: BTreeMap<Cell, i64>,
    /// Pets per cell, the caller's own pet excluded
    pub pets: BTreeMap<Cell, Vec<PetId>>,
    /// Caller's cell for the round
    pub cell: Option<Cell>,
    pub player_bonus: i64,
    pub base_bonus: i64,
}

/// Round state reported to a polling player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Ongoing,
    Ended,
    NotStarted,
    /// Caller is out and may settle now
    Settleable,
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundState::Ongoing => write!(f, "ongoing"),
            RoundState::Ended => write!(f, "ended"),
            RoundState::NotStarted => write!(f, "not_started"),
            RoundState::Settleable => write!(f, "settleable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResultView {
    pub template_id: TemplateId,
    pub round: usize,
    pub state: RoundState,
    pub round_start_time: i64,
    pub eliminated: Vec<Cell>,
    pub score: Option<ScoreSnapshot>,
    pub pet_id: Option<PetId>,
    pub players_left: usize,
}

impl RoundResultView {
    /// View for a desk that no longer exists
    pub fn dismissed(template_id: TemplateId) -> Self {
        Self {
            template_id,
            round: 0,
            state: RoundState::Ended,
            round_start_time: 0,
            eliminated: Vec::new(),
            score: None,
            pet_id: None,
            players_left: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    /// Player was removed now; false means the running round must finish first
    pub immediate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOutcome {
    pub refund: Option<ResourceAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub win: bool,
    pub bonus: i64,
    pub rewards: Vec<ResourceAmount>,
    /// False when this call was a replay and nothing was credited
    pub credited: bool,
}

/// One player's line in the durable result record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub role_id: RoleId,
    pub pet_id: PetId,
    pub bets: Vec<Cell>,
    pub win: bool,
    pub bonus: i64,
}

/// Durable record of a finished desk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub template_id: TemplateId,
    pub desk_id: String,
    pub created_at: i64,
    pub started_at: i64,
    pub finished_at: i64,
    pub roster: Vec<RosterEntry>,
    pub eliminated: Vec<Cell>,
    pub round_bonus: Vec<i64>,
}

impl BattleRecord {
    pub fn from_desk(desk: &Desk, finished_at: i64) -> Self {
        Self {
            template_id: desk.template_id,
            desk_id: desk.desk_id.clone(),
            created_at: desk.created_at,
            started_at: desk.started_at,
            finished_at,
            roster: desk
                .records
                .iter()
                .map(|(role_id, record)| RosterEntry {
                    role_id: *role_id,
                    pet_id: record.pet_id,
                    bets: record.bets.clone(),
                    win: record.win,
                    bonus: record.bonus,
                })
                .collect(),
            eliminated: desk.eliminated.clone(),
            round_bonus: desk.round_bonus.clone(),
        }
    }

    pub fn entry(&self, role_id: RoleId) -> Option<&RosterEntry> {
        self.roster.iter().find(|entry| entry.role_id == role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_threshold() {
        assert!(!is_bot(1));
        assert!(!is_bot(BOT_ID_FLOOR - 1));
        assert!(is_bot(BOT_ID_FLOOR));
    }

    #[test]
    fn test_desk_id_roundtrip() {
        let id = desk_id(12, 345);
        assert_eq!(id, "12-345");
        assert_eq!(template_of(&id), Some(12));
        assert_eq!(template_of("12"), None);
        assert_eq!(template_of("x-1"), None);
        assert_eq!(template_of("12-y"), None);
    }

    #[test]
    fn test_settlement_status_never_regresses() {
        let mut record = PlayerRecord::new(1, 0);
        record.advance_settlement(SettlementStatus::Collected);
        record.advance_settlement(SettlementStatus::Eligible);
        assert_eq!(record.settlement, SettlementStatus::Collected);
    }

    #[test]
    fn test_seat_is_idempotent() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.seat(5, 101, 100);
        desk.seat(5, 102, 105);
        assert_eq!(desk.players, vec![5]);
        assert_eq!(desk.records[&5].pet_id, 101);
    }

    #[test]
    fn test_seat_enrolled_keeps_first_enrollment() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.seat_enrolled(5, 101, 100, "first");
        desk.seat_enrolled(5, 101, 100, "second");
        assert_eq!(desk.records[&5].enrollment, "first");

        desk.seat(BOT_ID_FLOOR + 1, 102, 0);
        assert!(desk.records[&(BOT_ID_FLOOR + 1)].enrollment.is_empty());
    }

    #[test]
    fn test_unseat_keeps_record() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.seat(5, 101, 100);
        assert!(desk.unseat(5));
        assert!(!desk.unseat(5));
        assert!(desk.records.contains_key(&5));
    }

    #[test]
    fn test_real_and_bot_counts() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.seat(5, 101, 100);
        desk.seat(BOT_ID_FLOOR + 1, 102, 0);
        assert_eq!(desk.real_player_count(), 1);
        assert_eq!(desk.bot_count(), 1);
    }

    #[test]
    fn test_stake_before() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.round_bonus = vec![50, 120];
        assert_eq!(desk.stake_before(1), 0);
        assert_eq!(desk.stake_before(2), 50);
        assert_eq!(desk.stake_before(3), 120);
    }

    #[test]
    fn test_all_real_collected_ignores_bots() {
        let mut desk = Desk::new("1-1".to_string(), 1, 100);
        desk.seat(5, 101, 100);
        desk.seat(BOT_ID_FLOOR + 1, 102, 0);
        assert!(!desk.all_real_collected());
        desk.records
            .get_mut(&5)
            .unwrap()
            .advance_settlement(SettlementStatus::Collected);
        assert!(desk.all_real_collected());
    }
}
