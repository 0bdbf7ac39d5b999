//! HTTP API for the battle server.
//!
//! `GET /health` is public. The battle operations live under `/api/v1/battle/`,
//! take a JSON body by `POST` and require a bearer token:
//!
//! | Path | Operation |
//! |---|---|
//! | `match` | Join a desk of a template |
//! | `match_state` | Desk view while it forms |
//! | `leave` | Leave before the start, refunding the entry |
//! | `exit` | Withdraw from a running match |
//! | `bet` | Bet on a cell for the current round |
//! | `sync_score` | Current round's bets per cell |
//! | `round_result` | Poll the round state |
//! | `settlement` | Collect rewards |
//!
//! CORS is permissive; the game client is served from another origin.

pub mod battle;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use pet_battle::{
    MatchCoordinator, auth::TokenVerifier, db::Database, store::SharedStore,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<MatchCoordinator>,
    pub verifier: Arc<TokenVerifier>,
    pub store: Arc<dyn SharedStore>,
    /// Absent when running with the in-memory ledger
    pub database: Option<Database>,
}

/// Router with the health check, the authenticated battle routes, request
/// IDs and CORS
///
/// ```rust,no_run
/// # use pb_server::api::{create_router, AppState};
/// # async fn example(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:6969").await?;
/// axum::serve(listener, create_router(state)).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::assign_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/battle/match", post(battle::match_battle))
        .route("/battle/match_state", post(battle::match_state))
        .route("/battle/leave", post(battle::leave))
        .route("/battle/exit", post(battle::exit))
        .route("/battle/bet", post(battle::bet))
        .route("/battle/sync_score", post(battle::sync_score))
        .route("/battle/round_result", post(battle::round_result))
        .route("/battle/settlement", post(battle::settlement))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Checks the shared store and, when configured, the database.
///
/// # Response
///
/// Returns `200 OK` if all components are healthy, or `503 Service Unavailable` if any component fails.
///
/// # Example
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","store":true,"database":true,"templates":3,"timestamp":"2026-01-02T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.store.ping().await.is_ok();

    let database_healthy = match &state.database {
        Some(database) => database.ping().await,
        None => true,
    };

    let overall_healthy = store_healthy && database_healthy;

    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "database": database_healthy,
        "templates": state.coordinator.catalog().template_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
