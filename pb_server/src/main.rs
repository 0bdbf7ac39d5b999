//! Pet battle server.
//!
//! Stateless request handlers over a shared store (desks, counters, locks)
//! and a durable ledger (balances, roles, results). Any number of instances
//! may run against the same backends.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Error;
use log::info;
use pb_server::{
    api,
    config::{LedgerBackend, ServerConfig, StoreBackend},
    logging, metrics,
};
use pet_battle::{
    MatchCoordinator, TemplateCatalog,
    auth::TokenVerifier,
    battle::{RegistrationCache, ResultRecorder},
    db::Database,
    ledger::{Collaborators, MemoryLedger, PgLedger},
    store::{MemoryStore, RedisStore, SharedStore},
};
use pico_args::Arguments;

const HELP: &str = "\
Run the pet battle server

USAGE:
  pb_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --templates  PATH        Template catalog JSON       [default: env BATTLE_TEMPLATES_PATH or battle_templates.json]

FLAGS:
  --in-memory              Keep desks and balances in process (single instance only)
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus scrape address (disabled when unset)
  REDIS_URL                Shared store for desks and locks
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               Access token secret (at least 32 characters)
  LOCK_LEASE_SECS          Desk lock lease
  LOCK_RETRY_COUNT         Desk lock attempts before ServerBusy
  LOCK_RETRY_DELAY_MS      Pause between desk lock attempts
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let in_memory = pargs.contains("--in-memory");
    let bind = pargs.opt_value_from_str("--bind")?;
    let templates: Option<PathBuf> = pargs.opt_value_from_str("--templates")?;

    let config = ServerConfig::from_env(bind, templates, in_memory)?;
    config.validate()?;

    logging::init();
    info!("Starting pet battle server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics on {}", metrics_bind);
    }

    let catalog = TemplateCatalog::load(&config.battle.templates_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load templates from {}: {}",
            config.battle.templates_path.display(),
            e
        )
    })?;
    info!(
        "Loaded {} template(s) and {} pet(s)",
        catalog.template_count(),
        catalog.pets().len()
    );

    let store: Arc<dyn SharedStore> = match &config.store {
        StoreBackend::Redis { url } => Arc::new(
            RedisStore::connect(url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?,
        ),
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; desks are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let (collaborators, database) = match &config.ledger {
        LedgerBackend::Postgres(db_config) => {
            let database = Database::connect(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            database
                .migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
            info!("Database connected successfully");

            let ledger = Arc::new(PgLedger::from_database(&database));
            (Collaborators::from_backend(ledger), Some(database))
        }
        LedgerBackend::Memory => {
            log::warn!("Using the in-memory ledger; balances are lost on restart");
            (Collaborators::from_backend(Arc::new(MemoryLedger::new())), None)
        }
    };

    let (recorder, recorder_task) = ResultRecorder::spawn(collaborators.results.clone());

    let coordinator = MatchCoordinator::new(
        Arc::new(catalog),
        store.clone(),
        collaborators,
        recorder.clone(),
    )
    .with_lock_settings(config.battle.lock)
    .with_registration_cache(RegistrationCache::new(config.battle.registration_cache_ttl));

    let state = api::AppState {
        coordinator: Arc::new(coordinator),
        verifier: Arc::new(TokenVerifier::new(config.security.jwt_secret.clone())),
        store,
        database: database.clone(),
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    if let Err(e) = recorder.flush().await {
        log::error!("Failed to flush battle results: {}", e);
    }
    drop(recorder);
    recorder_task.abort();

    if let Some(database) = database {
        database.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
