//! Round timeline derived from stored timestamps.
//!
//! Nothing here keeps a timer. Every caller passes `now` and the round state
//! is recomputed from `created_at`, `started_at` and the template, so any
//! process holding the desk can answer the same way.
//!
//! Round `r` (1-based) occupies `[S(r-1), S(r))` seconds after the start,
//! where `S(r)` sums `duration + interval` over the first `r` rounds. Betting
//! runs until the round's elimination time `S(r) - interval`; the interval
//! after it shows the result.

use super::models::Desk;
use super::template::BattleTemplate;

/// Start time used for timeline math, projected to the end of the join window
/// while the desk has not started.
fn timeline_base(desk: &Desk, template: &BattleTemplate) -> i64 {
    if desk.started_at > 0 {
        desk.started_at
    } else {
        desk.created_at + template.match_window_secs
    }
}

/// Current 1-based round, 0 if the match has not started.
///
/// Stays at `total_rounds` once the timeline is exhausted.
pub fn current_round(desk: &Desk, template: &BattleTemplate, now: i64) -> usize {
    if desk.started_at == 0 {
        return 0;
    }

    let elapsed = now - desk.started_at;
    let mut boundary = 0;
    for (i, duration) in template.round_durations.iter().enumerate() {
        boundary += duration + template.round_interval_secs;
        if elapsed < boundary {
            return i + 1;
        }
    }

    template.total_rounds
}

/// Moment a round's elimination fires and its betting closes
pub fn round_start_time(desk: &Desk, template: &BattleTemplate, round: usize) -> i64 {
    let round = round.min(template.total_rounds);
    let betting: i64 = template.round_durations.iter().take(round).sum();
    let pauses = template.round_interval_secs * round.saturating_sub(1) as i64;
    timeline_base(desk, template) + betting + pauses
}

pub fn is_round_started(desk: &Desk, template: &BattleTemplate, round: usize, now: i64) -> bool {
    desk.started_at > 0 && round >= 1 && now >= round_start_time(desk, template, round)
}

pub fn is_round_ended(desk: &Desk, template: &BattleTemplate, round: usize, now: i64) -> bool {
    desk.started_at > 0
        && round >= 1
        && now >= round_start_time(desk, template, round) + template.round_interval_secs
}

/// Started explicitly, or the join window is over
pub fn is_match_started(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    desk.started_at > 0 || now >= desk.created_at + template.match_window_secs
}

pub fn is_match_ended(desk: &Desk, template: &BattleTemplate, now: i64) -> bool {
    desk.started_at > 0
        && current_round(desk, template, now) == template.total_rounds
        && is_round_ended(desk, template, template.total_rounds, now)
}

/// Start time a client should see, 0 while still forming
pub fn effective_start(desk: &Desk, template: &BattleTemplate, now: i64) -> i64 {
    if desk.started_at > 0 {
        desk.started_at
    } else if now >= desk.created_at + template.match_window_secs {
        desk.created_at + template.match_window_secs
    } else {
        0
    }
}

/// Number of rounds whose elimination time has passed
pub fn due_rounds(desk: &Desk, template: &BattleTemplate, now: i64) -> usize {
    let round = current_round(desk, template, now);
    if round == 0 {
        0
    } else if is_round_started(desk, template, round, now) {
        round
    } else {
        round - 1
    }
}
