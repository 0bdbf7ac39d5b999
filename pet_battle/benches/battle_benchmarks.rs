use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pet_battle::battle::{
    BOT_ID_FLOOR, BattleTemplate, Desk, ResourceAmount, Xorshift32, betting, bots, resolver,
    rounds,
};
use std::hint::black_box;

/// 3 rounds of 10s with a 2s pause, 600 bonus over 6 cells
fn template(capacity: usize) -> BattleTemplate {
    BattleTemplate {
        id: 7,
        name: "Bench".to_string(),
        match_window_secs: 30,
        total_rounds: 3,
        round_durations: vec![10, 10, 10],
        round_interval_secs: 2,
        capacity,
        entry_requirements: vec![],
        entry_pet_cost: 1,
        total_bonus: 600,
        grid_count: 6,
        bot_fill: true,
        rewards: vec![ResourceAmount::item(1, 1)],
        tutorial: false,
    }
}

/// Started desk with one real player and bots in every other seat
fn started_desk(template: &BattleTemplate) -> Desk {
    let mut desk = Desk::new("7-1".to_string(), template.id, 0);
    desk.seat(1, 101, 0);
    for i in 1..template.capacity {
        desk.seat(BOT_ID_FLOOR + i as i64, 102, 0);
    }
    desk.started_at = 30;
    desk
}

/// Benchmark the timeline math run on every poll
fn bench_current_round(c: &mut Criterion) {
    let template = template(4);
    let desk = started_desk(&template);

    c.bench_function("current_round", |b| {
        b.iter(|| rounds::current_round(black_box(&desk), &template, black_box(55)));
    });
}

/// Benchmark resolving a whole match at once, as a late poll does
fn bench_resolve_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_match");

    for capacity in [4, 16, 64] {
        let template = template(capacity);
        let desk = started_desk(&template);
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &desk, |b, desk| {
            let mut rng = Xorshift32::new(17);
            b.iter(|| {
                let mut desk = desk.clone();
                resolver::resolve_due_rounds(&mut desk, &template, 100, None, &mut rng)
            });
        });
    }

    group.finish();
}

/// Benchmark bot seating across the join window
fn bench_fill_seats(c: &mut Criterion) {
    let template = template(16);

    c.bench_function("fill_seats_16", |b| {
        let mut rng = Xorshift32::new(5);
        b.iter(|| {
            let mut desk = Desk::new("7-1".to_string(), template.id, 0);
            desk.seat(1, 101, 0);
            bots::fill_seats(&mut desk, &template, &[101, 102, 103], 30, &mut rng)
        });
    });
}

/// Benchmark the score snapshot served by sync_score
fn bench_score_snapshot(c: &mut Criterion) {
    let template = template(64);
    let mut desk = started_desk(&template);
    let mut rng = Xorshift32::new(9);
    betting::backfill_bets(&mut desk, &template, 1, &mut rng);

    c.bench_function("score_snapshot_64", |b| {
        b.iter(|| betting::score_snapshot(black_box(&desk), &template, 1, 1));
    });
}

/// Benchmark the desk encoding written to the shared store on every mutation
fn bench_desk_codec(c: &mut Criterion) {
    let template = template(64);
    let mut desk = started_desk(&template);
    let mut rng = Xorshift32::new(11);
    resolver::resolve_due_rounds(&mut desk, &template, 100, None, &mut rng);
    let config = bincode::config::standard();
    let bytes = bincode::serde::encode_to_vec(&desk, config).unwrap();

    c.bench_function("desk_encode_64", |b| {
        b.iter(|| bincode::serde::encode_to_vec(black_box(&desk), config).unwrap());
    });

    c.bench_function("desk_decode_64", |b| {
        b.iter(|| {
            let (desk, _): (Desk, usize) =
                bincode::serde::decode_from_slice(black_box(&bytes), config).unwrap();
            desk
        });
    });
}

criterion_group!(
    timeline,
    bench_current_round,
    bench_resolve_match,
    bench_fill_seats,
);

criterion_group!(state, bench_score_snapshot, bench_desk_codec);

criterion_main!(timeline, state);
