//! Per-round bets, random backfill and the score snapshot.

use super::errors::{BattleError, BattleResult};
use super::models::{Desk, PlayerRecord, RoleId, ScoreSnapshot};
use super::rng::Xorshift32;
use super::rounds;
use super::template::{BattleTemplate, Cell};
use std::cmp::Ordering;

/// Cells not eliminated so far, ascending
pub fn surviving_cells(desk: &Desk, template: &BattleTemplate) -> Vec<Cell> {
    (1..=template.grid_count)
        .filter(|cell| !desk.eliminated.contains(cell))
        .collect()
}

/// Store `cell` as the bet for `round`, replacing an earlier choice
pub fn record_bet(record: &mut PlayerRecord, round: usize, cell: Cell) {
    let Some(index) = round.checked_sub(1) else {
        return;
    };
    match record.bets.len().cmp(&index) {
        Ordering::Greater => record.bets[index] = cell,
        Ordering::Equal => record.bets.push(cell),
        // Gaps only appear if a resolved round was never backfilled
        Ordering::Less => record.bets.resize(index + 1, cell),
    }
}

/// Place a player's bet for `round`
///
/// # Errors
///
/// * `BattleError::MatchNotStarted` - Desk still forming
/// * `BattleError::MatchEnded` - Final round over
/// * `BattleError::NotInBattle` - Caller not seated (left, exited or eliminated)
/// * `BattleError::CellOutOfRange` - Cell outside `1..=grid_count`
/// * `BattleError::CellEliminated` - Cell removed in an earlier round
/// * `BattleError::BettingClosed` - The round's elimination already fired
pub fn place_bet(
    desk: &mut Desk,
    template: &BattleTemplate,
    role_id: RoleId,
    round: usize,
    cell: Cell,
    now: i64,
) -> BattleResult<()> {
    if desk.started_at == 0 || round == 0 {
        return Err(BattleError::MatchNotStarted(desk.desk_id.clone()));
    }

    if rounds::is_match_ended(desk, template, now) {
        return Err(BattleError::MatchEnded(desk.desk_id.clone()));
    }

    if !desk.is_seated(role_id) {
        return Err(BattleError::NotInBattle(desk.desk_id.clone()));
    }

    if cell < 1 || cell > template.grid_count {
        return Err(BattleError::CellOutOfRange {
            cell,
            grid_count: template.grid_count,
        });
    }

    if desk.eliminated.contains(&cell) {
        return Err(BattleError::CellEliminated(cell));
    }

    if rounds::is_round_started(desk, template, round, now) {
        return Err(BattleError::BettingClosed(round));
    }

    if let Some(record) = desk.records.get_mut(&role_id) {
        record_bet(record, round, cell);
    }
    Ok(())
}

/// Bet a random surviving cell for one player if they have no bet for `round`
///
/// Returns whether a bet was placed.
pub fn auto_bet(
    desk: &mut Desk,
    template: &BattleTemplate,
    role_id: RoleId,
    round: usize,
    rng: &mut Xorshift32,
) -> bool {
    let already = desk
        .records
        .get(&role_id)
        .is_none_or(|record| record.bets.len() >= round);
    if already {
        return false;
    }

    let Some(cell) = rng.pick(&surviving_cells(desk, template)) else {
        return false;
    };
    if let Some(record) = desk.records.get_mut(&role_id) {
        record_bet(record, round, cell);
    }
    true
}

/// Give every seated player without a bet for `round` a random one
pub fn backfill_bets(
    desk: &mut Desk,
    template: &BattleTemplate,
    round: usize,
    rng: &mut Xorshift32,
) -> usize {
    let seated = desk.players.clone();
    seated
        .into_iter()
        .filter(|role_id| auto_bet(desk, template, *role_id, round, rng))
        .count()
}

/// Who sits on which cell in `round` and the stake riding on each cell
///
/// Every record with a bet for the round contributes its pet and the stake
/// carried into the round. The caller's own pet is left out of the pet lists.
pub fn score_snapshot(
    desk: &Desk,
    template: &BattleTemplate,
    role_id: RoleId,
    round: usize,
) -> ScoreSnapshot {
    let mut snapshot = ScoreSnapshot {
        base_bonus: template.base_bonus(),
        player_bonus: desk.stake_before(round),
        ..ScoreSnapshot::default()
    };

    if round == 0 {
        return snapshot;
    }

    let stake = desk.stake_before(round);
    for record in desk.records.values() {
        if let Some(cell) = record.bet_for(round) {
            snapshot.pets.entry(cell).or_default().push(record.pet_id);
            *snapshot.scores.entry(cell).or_default() += stake;
        }
    }

    if let Some(own) = desk.records.get(&role_id) {
        if let Some(cell) = own.bet_for(round) {
            if let Some(pets) = snapshot.pets.get_mut(&cell) {
                if let Some(position) = pets.iter().position(|pet| *pet == own.pet_id) {
                    pets.remove(position);
                }
            }
            snapshot.cell = Some(cell);
        }

        // Once the round is resolved, show the last cell the caller stood on
        if desk.eliminated.len() >= round {
            snapshot.cell = own.bets.last().copied();
        }
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::models::BOT_ID_FLOOR;
    use crate::battle::template::tests::scenario_template;

    fn started_desk() -> Desk {
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        desk.seat(1, 101, 0);
        desk.seat(2, 102, 5);
        desk.started_at = 31;
        desk
    }

    #[test]
    fn test_surviving_cells() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.eliminated = vec![3, 5];
        assert_eq!(surviving_cells(&desk, &template), vec![1, 2, 4, 6]);
    }

    #[test]
    fn test_bet_overwrites_within_round() {
        let template = scenario_template();
        let mut desk = started_desk();
        place_bet(&mut desk, &template, 1, 1, 2, 35).unwrap();
        place_bet(&mut desk, &template, 1, 1, 4, 36).unwrap();
        assert_eq!(desk.records[&1].bets, vec![4]);
    }

    #[test]
    fn test_bet_before_start() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.started_at = 0;
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 0, 2, 10),
            Err(BattleError::MatchNotStarted(_))
        ));
    }

    #[test]
    fn test_bet_after_end() {
        let template = scenario_template();
        let mut desk = started_desk();
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 3, 2, 200),
            Err(BattleError::MatchEnded(_))
        ));
    }

    #[test]
    fn test_bet_range_and_elimination() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.eliminated = vec![3];
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 2, 0, 45),
            Err(BattleError::CellOutOfRange { cell: 0, .. })
        ));
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 2, 7, 45),
            Err(BattleError::CellOutOfRange { cell: 7, .. })
        ));
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 2, 3, 45),
            Err(BattleError::CellEliminated(3))
        ));
    }

    #[test]
    fn test_bet_closed_after_elimination_time() {
        let template = scenario_template();
        let mut desk = started_desk();
        // Round 1 eliminates at 41; 41..43 is the result interval
        assert!(matches!(
            place_bet(&mut desk, &template, 1, 1, 2, 41),
            Err(BattleError::BettingClosed(1))
        ));
    }

    #[test]
    fn test_bet_requires_seat() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.unseat(2);
        assert!(matches!(
            place_bet(&mut desk, &template, 2, 1, 2, 35),
            Err(BattleError::NotInBattle(_))
        ));
    }

    #[test]
    fn test_backfill_only_missing() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.seat(BOT_ID_FLOOR + 1, 103, 0);
        place_bet(&mut desk, &template, 1, 1, 2, 35).unwrap();

        let mut rng = Xorshift32::new(7);
        assert_eq!(backfill_bets(&mut desk, &template, 1, &mut rng), 2);
        assert_eq!(desk.records[&1].bets, vec![2]);
        for record in desk.records.values() {
            assert_eq!(record.bets.len(), 1);
            assert!((1..=6).contains(&record.bets[0]));
        }
        assert_eq!(backfill_bets(&mut desk, &template, 1, &mut rng), 0);
    }

    #[test]
    fn test_auto_bet_avoids_eliminated() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.eliminated = vec![1, 2, 3, 4, 5];
        desk.records.get_mut(&1).unwrap().bets = vec![6, 6, 6, 6, 6];
        let mut rng = Xorshift32::new(99);
        assert!(auto_bet(&mut desk, &template, 1, 6, &mut rng));
        assert_eq!(desk.records[&1].bets.last(), Some(&6));
    }

    #[test]
    fn test_score_snapshot() {
        let template = scenario_template();
        let mut desk = started_desk();
        desk.seat(3, 103, 6);
        desk.round_bonus = vec![200];
        desk.eliminated = vec![5];
        desk.records.get_mut(&1).unwrap().bets = vec![1, 2];
        desk.records.get_mut(&2).unwrap().bets = vec![1, 2];
        desk.records.get_mut(&3).unwrap().bets = vec![1, 4];

        let snapshot = score_snapshot(&desk, &template, 1, 2);
        assert_eq!(snapshot.scores[&2], 400);
        assert_eq!(snapshot.scores[&4], 200);
        assert_eq!(snapshot.pets[&2], vec![102]);
        assert_eq!(snapshot.pets[&4], vec![103]);
        assert_eq!(snapshot.cell, Some(2));
        assert_eq!(snapshot.player_bonus, 200);
        assert_eq!(snapshot.base_bonus, 200);
    }

    #[test]
    fn test_score_snapshot_before_any_bet() {
        let template = scenario_template();
        let desk = started_desk();
        let snapshot = score_snapshot(&desk, &template, 1, 1);
        assert!(snapshot.scores.is_empty());
        assert_eq!(snapshot.cell, None);
        assert_eq!(snapshot.player_bonus, 0);
    }
}
