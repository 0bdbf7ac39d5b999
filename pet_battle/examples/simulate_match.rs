//! Play one match in process and print every round.
//!
//! ```bash
//! cargo run -p pet_battle --example simulate_match
//! ```

use pet_battle::battle::{
    ManualClock, MatchCoordinator, RequestContext, ResourceAmount, ResultRecorder, RoundState,
    TemplateCatalog,
};
use pet_battle::ledger::{Collaborators, Ledger, MemoryLedger};
use pet_battle::store::MemoryStore;
use std::error::Error;
use std::sync::Arc;

const CATALOG: &str = r#"{
    "pets": [101, 102, 103],
    "templates": [{
        "id": 1, "name": "Demo",
        "match_window_secs": 30, "total_rounds": 3,
        "round_durations": [10, 10, 10], "round_interval_secs": 2,
        "capacity": 4, "total_bonus": 600, "grid_count": 6, "bot_fill": true,
        "rewards": [{"kind": "item", "resource_id": 1, "quantity": 1}]
    }]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let ledger = Arc::new(MemoryLedger::new());
    let collaborators = Collaborators::from_backend(ledger.clone());
    let (recorder, _task) = ResultRecorder::spawn(collaborators.results.clone());
    let clock = Arc::new(ManualClock::new(0));

    let coordinator = MatchCoordinator::new(
        Arc::new(TemplateCatalog::from_json(CATALOG)?),
        Arc::new(MemoryStore::new()),
        collaborators,
        recorder,
    )
    .with_clock(clock.clone());

    let player = RequestContext::generate(1);
    ledger
        .adjust_balance(1, ResourceAmount::pet(101, 1), "demo-grant")
        .await?;

    let joined = coordinator.match_battle(&player, 1, 101).await?;
    println!("Joined {} ({}/{})", joined.desk_id, joined.player_count, joined.capacity);

    clock.set(30);
    let view = coordinator.match_state(&player, &joined.desk_id).await?;
    println!("Window closed with {} seats taken", view.player_count);

    let mut now = 31;
    loop {
        clock.set(now);
        let result = coordinator.round_result(&player, &joined.desk_id).await?;
        match result.state {
            RoundState::Ongoing => {
                let cell = (1..=6)
                    .find(|cell| !result.eliminated.contains(cell))
                    .unwrap_or(1);
                if coordinator.bet(&player, &joined.desk_id, cell).await.is_ok() {
                    println!(
                        "t={now:>3} round {} bet cell {cell}, eliminated so far {:?}",
                        result.round, result.eliminated
                    );
                }
            }
            RoundState::Ended | RoundState::Settleable => {
                println!("t={now:>3} {} after round {}", result.state, result.round);
                break;
            }
            RoundState::NotStarted => {}
        }
        now += 4;
    }

    clock.set(now.max(70));
    let outcome = coordinator.settlement(&player, &joined.desk_id).await?;
    println!(
        "Settled: win={} bonus={} rewards={:?}",
        outcome.win, outcome.bonus, outcome.rewards
    );
    Ok(())
}
