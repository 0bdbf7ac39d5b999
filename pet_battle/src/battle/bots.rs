//! Synthetic seats that keep sparse desks playable.
//!
//! Seats ramp up linearly over the join window, and seated bots spread their
//! bets across each round instead of all betting at once.

use super::betting;
use super::models::{BOT_ID_FLOOR, Desk, is_bot};
use super::rng::Xorshift32;
use super::rounds;
use super::template::{BattleTemplate, PetId};

/// Seats that should be occupied `elapsed` seconds after desk creation
///
/// `min(capacity, ceil(elapsed / window * capacity))`
pub fn target_seats(template: &BattleTemplate, elapsed: i64) -> usize {
    if elapsed <= 0 || template.match_window_secs <= 0 {
        return 0;
    }

    let capacity = template.capacity as i64;
    let window = template.match_window_secs;
    let target = elapsed.saturating_mul(capacity).saturating_add(window - 1) / window;
    target.min(capacity) as usize
}

/// Top the desk up with bots while it is still forming
///
/// Returns the number of bots seated.
pub fn fill_seats(
    desk: &mut Desk,
    template: &BattleTemplate,
    pets: &[PetId],
    now: i64,
    rng: &mut Xorshift32,
) -> usize {
    if !template.bot_fill
        || desk.started_at > 0
        || desk.records.len() >= template.capacity
    {
        return 0;
    }

    let target = target_seats(template, now - desk.created_at);
    let mut seated = 0;
    while desk.players.len() < target && desk.records.len() < template.capacity {
        let Some(pet_id) = rng.pick(pets) else {
            break;
        };
        desk.bot_counter += 1;
        desk.seat(BOT_ID_FLOOR + desk.bot_counter, pet_id, 0);
        seated += 1;
    }

    if seated > 0 {
        log::debug!(
            "Desk {} seated {} bots ({} of {} seats)",
            desk.desk_id,
            seated,
            desk.players.len(),
            template.capacity
        );
    }
    seated
}

/// How many seated bots should have bet by `now` in `round`
///
/// `ceil(elapsed_in_round / round_duration * bots)`, where the round's betting
/// time ends at its elimination.
pub fn bots_due_to_bet(desk: &Desk, template: &BattleTemplate, round: usize, now: i64) -> usize {
    let duration = template.round_duration(round);
    if duration <= 0 {
        return 0;
    }

    let bots = desk.bot_count() as i64;
    let remaining = rounds::round_start_time(desk, template, round) - now;
    let elapsed = (duration - remaining).clamp(0, duration);
    ((elapsed * bots + duration - 1) / duration) as usize
}

/// Let bots catch up with their betting schedule in the current round
///
/// Returns the number of bets placed.
pub fn place_bot_bets(
    desk: &mut Desk,
    template: &BattleTemplate,
    now: i64,
    rng: &mut Xorshift32,
) -> usize {
    if !template.bot_fill || desk.started_at == 0 {
        return 0;
    }

    let round = rounds::current_round(desk, template, now);
    if round == 0 || rounds::is_round_started(desk, template, round, now) {
        return 0;
    }

    let due = bots_due_to_bet(desk, template, round, now);
    let bots: Vec<_> = desk.players.iter().copied().filter(|id| is_bot(*id)).collect();
    let mut placed = 0;
    for bot in bots.into_iter().take(due) {
        if betting::auto_bet(desk, template, bot, round, rng) {
            placed += 1;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::template::tests::scenario_template;

    const PETS: [PetId; 3] = [101, 102, 103];

    #[test]
    fn test_target_seats_ramp() {
        let template = scenario_template();
        assert_eq!(target_seats(&template, 0), 0);
        assert_eq!(target_seats(&template, 1), 1);
        assert_eq!(target_seats(&template, 8), 2);
        assert_eq!(target_seats(&template, 15), 2);
        assert_eq!(target_seats(&template, 16), 3);
        assert_eq!(target_seats(&template, 30), 4);
        assert_eq!(target_seats(&template, 1_000), 4);
    }

    #[test]
    fn test_fill_counts_real_players() {
        let template = scenario_template();
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        desk.seat(1, 101, 0);
        desk.seat(2, 102, 5);

        let mut rng = Xorshift32::new(1);
        assert_eq!(fill_seats(&mut desk, &template, &PETS, 10, &mut rng), 0);
        assert_eq!(fill_seats(&mut desk, &template, &PETS, 30, &mut rng), 2);
        assert_eq!(desk.players.len(), 4);
        assert_eq!(desk.bot_count(), 2);
        assert_eq!(desk.bot_counter, 2);
        assert!(desk.players[2..].iter().all(|id| is_bot(*id)));
        assert!(desk.records[&desk.players[2]].joined_at == 0);
    }

    #[test]
    fn test_fill_disabled() {
        let mut template = scenario_template();
        template.bot_fill = false;
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        let mut rng = Xorshift32::new(1);
        assert_eq!(fill_seats(&mut desk, &template, &PETS, 30, &mut rng), 0);
    }

    #[test]
    fn test_fill_stops_once_started() {
        let template = scenario_template();
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        desk.seat(1, 101, 0);
        desk.started_at = 30;
        let mut rng = Xorshift32::new(1);
        assert_eq!(fill_seats(&mut desk, &template, &PETS, 40, &mut rng), 0);
    }

    #[test]
    fn test_bots_bet_progressively() {
        let template = scenario_template();
        let mut desk = Desk::new("7-1".to_string(), 7, 0);
        let mut rng = Xorshift32::new(1);
        fill_seats(&mut desk, &template, &PETS, 30, &mut rng);
        desk.started_at = 30;
        // Round 1 betting runs 30..40
        assert_eq!(bots_due_to_bet(&desk, &template, 1, 30), 0);
        assert_eq!(bots_due_to_bet(&desk, &template, 1, 31), 1);
        assert_eq!(bots_due_to_bet(&desk, &template, 1, 35), 2);
        assert_eq!(bots_due_to_bet(&desk, &template, 1, 39), 4);

        assert_eq!(place_bot_bets(&mut desk, &template, 35, &mut rng), 2);
        assert_eq!(place_bot_bets(&mut desk, &template, 35, &mut rng), 0);
        assert_eq!(place_bot_bets(&mut desk, &template, 39, &mut rng), 2);
        assert!(desk.records.values().all(|record| record.bets.len() == 1));
    }
}
