//! Round resolution: elimination target, survivors and the bonus split.

use super::betting;
use super::models::{Desk, RoleId, SettlementRound, SettlementStatus};
use super::rng::Xorshift32;
use super::rounds;
use super::template::BattleTemplate;

/// Stamp the start time once the desk is full or the join window elapsed
///
/// A desk that fills early starts now; otherwise the start is pinned to the
/// end of the join window so every process computes the same timeline.
/// Returns whether the desk was started by this call.
pub fn start_if_ready(desk: &mut Desk, template: &BattleTemplate, now: i64) -> bool {
    if desk.started_at > 0 || desk.players.is_empty() {
        return false;
    }

    let window_end = desk.created_at + template.match_window_secs;
    if now >= window_end {
        desk.started_at = window_end;
    } else if desk.players.len() >= template.capacity {
        desk.started_at = now;
    } else {
        return false;
    }

    log::info!(
        "Desk {} started at {} with {} players",
        desk.desk_id,
        desk.started_at,
        desk.players.len()
    );
    true
}

/// Per-survivor bonus after `round`
///
/// The pool is `base * round`, or the whole bonus on the final round, minus
/// what exited players already hold, split evenly. The division remainder is
/// not distributed.
pub fn round_bonus(desk: &Desk, template: &BattleTemplate, round: usize) -> i64 {
    let mut pool = if round >= template.total_rounds {
        template.total_bonus
    } else {
        template.base_bonus() * round as i64
    };

    for role_id in &desk.exited {
        if let Some(record) = desk.records.get(role_id) {
            pool -= record.bonus;
        }
    }

    let survivors = desk.players.len() as i64;
    if survivors == 0 {
        return 0;
    }
    (pool / survivors).max(0)
}

/// Resolve one round. No-op if it is already resolved or out of order.
///
/// `guided` is the player steered away from elimination on tutorial desks.
pub fn resolve_round(
    desk: &mut Desk,
    template: &BattleTemplate,
    round: usize,
    guided: Option<RoleId>,
    rng: &mut Xorshift32,
) -> bool {
    if round == 0 || desk.eliminated.len() != round - 1 || round > template.total_rounds {
        return false;
    }

    betting::backfill_bets(desk, template, round, rng);

    let surviving = betting::surviving_cells(desk, template);
    let Some(mut target) = rng.pick(&surviving) else {
        return false;
    };

    if template.tutorial {
        let guided_bet = guided
            .filter(|id| desk.is_seated(*id))
            .and_then(|id| desk.records.get(&id))
            .and_then(|record| record.bet_for(round));
        if guided_bet == Some(target) {
            if let Some(other) = surviving.iter().copied().find(|cell| Some(*cell) != guided_bet) {
                target = other;
            }
        }
    }

    desk.eliminated.push(target);

    let seated = desk.players.clone();
    let mut survivors = Vec::with_capacity(seated.len());
    for role_id in seated {
        let Some(record) = desk.records.get_mut(&role_id) else {
            continue;
        };
        if record.bet_for(round) == Some(target) {
            record.win = false;
            record.bonus = 0;
            record.advance_settlement(SettlementStatus::Eligible);
            desk.unseat(role_id);
        } else {
            record.win = true;
            survivors.push(role_id);
        }
    }

    let bonus = round_bonus(desk, template, round);
    for role_id in &survivors {
        if let Some(record) = desk.records.get_mut(role_id) {
            record.bonus = bonus;
        }
    }
    desk.round_bonus.push(bonus);

    if !desk.has_real_players() && desk.settlement_round == SettlementRound::None {
        desk.settlement_round = SettlementRound::AfterRound(round);
    }

    log::debug!(
        "Desk {} round {} eliminated cell {}, {} survivors at {} each",
        desk.desk_id,
        round,
        target,
        survivors.len(),
        bonus
    );
    true
}

/// Resolve every round whose elimination time has passed
///
/// Stops once no real player is seated; the desk is then waiting to be
/// settled. Returns the number of rounds resolved.
pub fn resolve_due_rounds(
    desk: &mut Desk,
    template: &BattleTemplate,
    now: i64,
    guided: Option<RoleId>,
    rng: &mut Xorshift32,
) -> usize {
    if desk.finalized {
        return 0;
    }

    let due = rounds::due_rounds(desk, template, now);
    let mut resolved = 0;
    while desk.eliminated.len() < due && desk.has_real_players() {
        let round = desk.eliminated.len() + 1;
        if !resolve_round(desk, template, round, guided, rng) {
            break;
        }
        resolved += 1;
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::models::BOT_ID_FLOOR;
    use crate::battle::template::tests::scenario_template;

    fn scenario_desk() -> Desk {
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        desk.seat(1, 101, 0);
        desk.seat(2, 102, 5);
        desk.seat(BOT_ID_FLOOR + 1, 103, 0);
        desk.seat(BOT_ID_FLOOR + 2, 104, 0);
        desk.started_at = 31;
        desk
    }

    #[test]
    fn test_start_when_full() {
        let template = scenario_template();
        let mut desk = scenario_desk();
        desk.started_at = 0;
        assert!(start_if_ready(&mut desk, &template, 20));
        assert_eq!(desk.started_at, 20);
        assert!(!start_if_ready(&mut desk, &template, 25));
    }

    #[test]
    fn test_start_pinned_to_window_end() {
        let template = scenario_template();
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        desk.seat(1, 101, 0);
        assert!(!start_if_ready(&mut desk, &template, 29));
        assert!(start_if_ready(&mut desk, &template, 45));
        assert_eq!(desk.started_at, 30);
    }

    #[test]
    fn test_empty_desk_never_starts() {
        let template = scenario_template();
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        assert!(!start_if_ready(&mut desk, &template, 100));
    }

    #[test]
    fn test_round_bonus_split() {
        let template = scenario_template();
        let desk = scenario_desk();
        assert_eq!(round_bonus(&desk, &template, 1), 50);
        assert_eq!(round_bonus(&desk, &template, 3), 150);
    }

    #[test]
    fn test_round_bonus_subtracts_exited() {
        let template = scenario_template();
        let mut desk = scenario_desk();
        desk.records.get_mut(&2).unwrap().bonus = 100;
        desk.unseat(2);
        desk.exited.push(2);
        // (400 - 100) / 3
        assert_eq!(round_bonus(&desk, &template, 2), 100);
    }

    #[test]
    fn test_resolve_round_eliminates_matching_bets() {
        let template = scenario_template();
        let mut desk = scenario_desk();
        for (role_id, record) in desk.records.iter_mut() {
            record.bets = vec![if *role_id == 1 { 1 } else { 2 }];
        }
        let mut rng = Xorshift32::new(3);
        assert!(resolve_round(&mut desk, &template, 1, None, &mut rng));

        let target = desk.eliminated[0];
        assert_eq!(desk.round_bonus.len(), 1);
        for (role_id, record) in &desk.records {
            if record.bets[0] == target {
                assert!(!desk.is_seated(*role_id));
                assert_eq!(record.bonus, 0);
                assert_eq!(record.settlement, SettlementStatus::Eligible);
            } else {
                assert!(desk.is_seated(*role_id));
                assert!(record.win);
                assert_eq!(record.bonus, desk.round_bonus[0]);
            }
        }

        // Already resolved
        assert!(!resolve_round(&mut desk, &template, 1, None, &mut rng));
    }

    #[test]
    fn test_tutorial_steers_target_away_from_guided() {
        let mut template = scenario_template();
        template.tutorial = true;
        template.grid_count = 4;

        for seed in 1..50 {
            let mut desk = scenario_desk();
            desk.records.get_mut(&1).unwrap().bets = vec![2];
            let mut rng = Xorshift32::new(seed);
            resolve_round(&mut desk, &template, 1, Some(1), &mut rng);
            assert_ne!(desk.eliminated[0], 2);
            assert!(desk.is_seated(1));
        }
    }

    #[test]
    fn test_settlement_marker_when_only_bots_remain() {
        let template = scenario_template();
        let mut desk = scenario_desk();
        desk.eliminated = vec![];
        let mut rng = Xorshift32::new(11);
        // Both real players bet every surviving cell but one, bots the other
        desk.records.get_mut(&1).unwrap().bets = vec![1];
        desk.records.get_mut(&2).unwrap().bets = vec![1];
        desk.records.get_mut(&(BOT_ID_FLOOR + 1)).unwrap().bets = vec![2];
        desk.records.get_mut(&(BOT_ID_FLOOR + 2)).unwrap().bets = vec![3];

        resolve_round(&mut desk, &template, 1, None, &mut rng);
        if desk.eliminated[0] == 1 {
            assert_eq!(desk.settlement_round, SettlementRound::AfterRound(1));
        } else {
            assert_eq!(desk.settlement_round, SettlementRound::None);
        }
    }

    #[test]
    fn test_resolve_due_rounds_catches_up() {
        let template = scenario_template();
        let mut desk = scenario_desk();
        let mut rng = Xorshift32::new(5);

        assert_eq!(resolve_due_rounds(&mut desk, &template, 35, None, &mut rng), 0);
        let resolved = resolve_due_rounds(&mut desk, &template, 70, None, &mut rng);
        assert!(resolved >= 1);
        assert!(desk.eliminated.len() <= template.total_rounds);
        let distinct: std::collections::BTreeSet<_> = desk.eliminated.iter().collect();
        assert_eq!(distinct.len(), desk.eliminated.len());
        for record in desk.records.values() {
            assert!(record.bets.len() <= template.total_rounds);
        }
    }
}
