//! Load-driving bot players for a pet battle server.
//!
//! Each bot is a real API client with its own access token. Tokens are
//! signed locally with the server's `JWT_SECRET`, so the server sees the bots
//! as ordinary roles; their pet balances must be stocked beforehand unless the
//! template has no entry cost.

use anyhow::{Context, Result};
use pb_bots::{
    api_client::ApiClient,
    player::{BattleBot, BotSettings},
};
use pet_battle::{TemplateCatalog, auth::TokenVerifier};
use pico_args::Arguments;
use rand::seq::IndexedRandom;
use std::time::Duration;

const HELP: &str = "\
Drive a pet battle server with simulated players

USAGE:
  pb_bots [OPTIONS]

OPTIONS:
  --server     URL         Server URL                  [default: http://127.0.0.1:6969]
  --templates  PATH        Template catalog JSON       [default: battle_templates.json]
  --template   ID          Template to play            [default: 2]
  --bots       N           Number of bots              [default: 4]
  --first-role ID          Role ID of the first bot    [default: 100000]
  --poll-ms    MS          Round poll interval         [default: 1000]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  JWT_SECRET               Secret shared with the server (required)
";

struct Args {
    server_url: String,
    templates: String,
    template_id: i32,
    bots: usize,
    first_role: i64,
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        server_url: pargs
            .opt_value_from_str("--server")?
            .unwrap_or_else(|| "http://127.0.0.1:6969".to_string()),
        templates: pargs
            .opt_value_from_str("--templates")?
            .unwrap_or_else(|| "battle_templates.json".to_string()),
        template_id: pargs.opt_value_from_str("--template")?.unwrap_or(2),
        bots: pargs.opt_value_from_str("--bots")?.unwrap_or(4),
        first_role: pargs.opt_value_from_str("--first-role")?.unwrap_or(100_000),
        poll_ms: pargs.opt_value_from_str("--poll-ms")?.unwrap_or(1_000),
    };

    env_logger::builder().format_target(false).init();

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    let verifier = TokenVerifier::new(secret);

    let catalog = TemplateCatalog::load(&args.templates)
        .with_context(|| format!("Failed to load templates from {}", args.templates))?;
    let template = catalog
        .get(args.template_id)
        .with_context(|| format!("Unknown template {}", args.template_id))?;

    let settings = BotSettings {
        template_id: template.id,
        grid_count: template.grid_count,
        poll_interval: Duration::from_millis(args.poll_ms),
        ..BotSettings::default()
    };

    log::info!(
        "Starting {} bots on template {} ({}) against {}",
        args.bots,
        template.id,
        template.name,
        args.server_url
    );

    let client = reqwest::Client::new();
    let mut rng = rand::rng();
    let mut handles = Vec::with_capacity(args.bots);

    for i in 0..args.bots {
        let role_id = args.first_role + i as i64;
        let pet_id = *catalog
            .pets()
            .choose(&mut rng)
            .context("Catalog has no pets")?;
        let token = verifier
            .issue(role_id, chrono::Duration::hours(1))
            .context("Failed to sign bot token")?;

        let api = ApiClient::new(args.server_url.clone(), client.clone(), token);
        let bot = BattleBot::new(role_id, pet_id, api, settings.clone(), role_id as u64);
        handles.push((role_id, tokio::spawn(bot.play())));
    }

    let mut wins = 0;
    let mut failures = 0;
    for (role_id, handle) in handles {
        match handle.await {
            Ok(Ok(report)) => {
                if report.win {
                    wins += 1;
                }
                log::info!(
                    "Bot {} finished {}: win={} bonus={} credited={}",
                    report.role_id,
                    report.desk_id,
                    report.win,
                    report.bonus,
                    report.credited
                );
            }
            Ok(Err(e)) => {
                failures += 1;
                log::error!("Bot {} failed: {:#}", role_id, e);
            }
            Err(e) => {
                failures += 1;
                log::error!("Bot {} task panicked: {}", role_id, e);
            }
        }
    }

    log::info!(
        "{} bots done: {} won, {} failed",
        args.bots,
        wins,
        failures
    );

    if failures > 0 {
        anyhow::bail!("{} of {} bots failed", failures, args.bots);
    }
    Ok(())
}
