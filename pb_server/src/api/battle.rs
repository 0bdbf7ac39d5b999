//! Battle API handlers.
//!
//! Every endpoint is a `POST` with a JSON body, requires a bearer token, and
//! answers either with the operation's view or with an error body carrying a
//! stable `code`.
//!
//! # Examples
//!
//! Join a battle:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/battle/match \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"template_id": 1, "pet_id": 101}'
//! ```
//!
//! Bet on cell 3:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/battle/bet \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"desk_id": "1-17", "cell": 3}'
//! ```

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
};
use pet_battle::battle::{
    BattleError, BattleResult, Cell, ExitOutcome, LeaveOutcome, MatchStateView, PetId,
    RequestContext, RoleId, RoundResultView, ScoreSnapshot, SettlementOutcome, TemplateId,
    models::template_of,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{AppState, request_id::RequestId};
use crate::{logging, metrics};

/// Request payloads check their own shape before reaching the engine
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub template_id: TemplateId,
    pub pet_id: PetId,
}

impl Validate for MatchRequest {
    fn validate(&self) -> Result<(), String> {
        if self.template_id <= 0 {
            return Err(format!("template_id must be positive, got {}", self.template_id));
        }
        if self.pet_id <= 0 {
            return Err(format!("pet_id must be positive, got {}", self.pet_id));
        }
        Ok(())
    }
}

/// Body of every request that targets one desk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskRequest {
    pub desk_id: String,
}

impl Validate for DeskRequest {
    fn validate(&self) -> Result<(), String> {
        validate_desk_id(&self.desk_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub desk_id: String,
    pub cell: Cell,
}

impl Validate for BetRequest {
    fn validate(&self) -> Result<(), String> {
        validate_desk_id(&self.desk_id)?;
        if self.cell <= 0 {
            return Err(format!("cell must be positive, got {}", self.cell));
        }
        Ok(())
    }
}

fn validate_desk_id(desk_id: &str) -> Result<(), String> {
    template_of(desk_id)
        .map(|_| ())
        .ok_or_else(|| format!("malformed desk_id {desk_id:?}"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code
    pub code: String,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// HTTP status for a battle error
pub fn status_for(err: &BattleError) -> StatusCode {
    match err {
        BattleError::ParametersInvalid(_) | BattleError::CellOutOfRange { .. } => {
            StatusCode::BAD_REQUEST
        }
        BattleError::NotQualified(_) => StatusCode::FORBIDDEN,
        BattleError::NotInBattle(_) => StatusCode::NOT_FOUND,
        BattleError::BattleAlreadyDismiss(_) => StatusCode::GONE,
        BattleError::ServerBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
        BattleError::Database(_) | BattleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BattleError::BattleAlreadyStarted(_)
        | BattleError::BattleRegistrationFull(_)
        | BattleError::AlreadyJoinOtherBattle(_)
        | BattleError::TutorialCompleted
        | BattleError::MatchNotStarted(_)
        | BattleError::MatchEnded(_)
        | BattleError::BettingClosed(_)
        | BattleError::CellEliminated(_)
        | BattleError::SettlementPending(_) => StatusCode::CONFLICT,
    }
}

fn error_response(err: &BattleError) -> ApiError {
    (
        status_for(err),
        Json(ErrorResponse {
            code: err.code().to_string(),
            error: err.client_message(),
        }),
    )
}

/// Validate a payload and build the caller's context
fn prepare(
    endpoint: &str,
    role_id: RoleId,
    request_id: RequestId,
    payload: &impl Validate,
) -> Result<RequestContext, ApiError> {
    let ctx = request_id.into_context(role_id);
    if let Err(reason) = payload.validate() {
        metrics::battle_requests_total(endpoint, "ParametersInvalid");
        tracing::debug!(request_id = %ctx.request_id, endpoint, %reason, "Rejected payload");
        return Err(error_response(&BattleError::ParametersInvalid(reason)));
    }
    Ok(ctx)
}

/// Record metrics and logs for a finished operation and shape the response
fn finish<T>(
    endpoint: &str,
    ctx: &RequestContext,
    started: Instant,
    result: BattleResult<T>,
) -> ApiResult<T> {
    let elapsed = started.elapsed();
    metrics::battle_request_duration_ms(endpoint, elapsed.as_secs_f64() * 1_000.0);
    let outcome = result.as_ref().map_or_else(BattleError::code, |_| "ok");
    logging::battle_call(endpoint, ctx, elapsed, outcome);
    metrics::battle_requests_total(endpoint, outcome);

    match result {
        Ok(value) => Ok(Json(value)),
        Err(err) => {
            if err.is_retryable() {
                metrics::lock_busy_total(endpoint);
            }
            if err.is_infrastructure() {
                tracing::error!(request_id = %ctx.request_id, role_id = ctx.role_id, endpoint, "{}", err);
            } else {
                tracing::debug!(request_id = %ctx.request_id, role_id = ctx.role_id, endpoint, "{}", err);
            }
            Err(error_response(&err))
        }
    }
}

/// Join a desk of the requested template.
///
/// # Response
///
/// Returns `200 OK` with the desk view:
/// ```json
/// {
///   "template_id": 1,
///   "desk_id": "1-17",
///   "created_at": 1767348000,
///   "started_at": 0,
///   "joined_at": 1767348004,
///   "player_count": 3,
///   "capacity": 4
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown template or pet
/// - `403 Forbidden`: Entry requirements not met
/// - `409 Conflict`: Desk full or started, enrolled elsewhere, tutorial done
/// - `503 Service Unavailable`: Lock busy, retry
pub async fn match_battle(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<MatchRequest>,
) -> ApiResult<MatchStateView> {
    let ctx = prepare("match", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state
        .coordinator
        .match_battle(&ctx, request.template_id, request.pet_id)
        .await;
    if result.is_ok() {
        metrics::matches_total(request.template_id);
    }
    finish("match", &ctx, started, result)
}

/// Current view of the caller's desk while it forms.
pub async fn match_state(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<MatchStateView> {
    let ctx = prepare("match_state", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.match_state(&ctx, &request.desk_id).await;
    finish("match_state", &ctx, started, result)
}

/// Leave a desk before it starts; the entry fee is refunded.
pub async fn leave(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<LeaveOutcome> {
    let ctx = prepare("leave", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.leave(&ctx, &request.desk_id).await;
    finish("leave", &ctx, started, result)
}

/// Withdraw from a running match.
///
/// `{"immediate": false}` means the current round's result is showing; retry
/// once the next round opens.
pub async fn exit(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<ExitOutcome> {
    let ctx = prepare("exit", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.exit(&ctx, &request.desk_id).await;
    finish("exit", &ctx, started, result)
}

/// Bet on a cell for the current round.
///
/// # Errors
///
/// - `400 Bad Request`: Cell out of range
/// - `409 Conflict`: Not started, ended, betting closed, cell eliminated
/// - `404 Not Found`: Caller is not seated (eliminated or exited)
pub async fn bet(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<BetRequest>,
) -> ApiResult<ScoreSnapshot> {
    let ctx = prepare("bet", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state
        .coordinator
        .bet(&ctx, &request.desk_id, request.cell)
        .await;
    if result.is_ok() {
        metrics::bets_total();
    }
    finish("bet", &ctx, started, result)
}

/// Bets per cell in the current round.
pub async fn sync_score(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<ScoreSnapshot> {
    let ctx = prepare("sync_score", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.sync_score(&ctx, &request.desk_id).await;
    finish("sync_score", &ctx, started, result)
}

/// Poll the round state.
///
/// # Response
///
/// ```json
/// {
///   "template_id": 1,
///   "round": 2,
///   "state": "ongoing",
///   "round_start_time": 1767348053,
///   "eliminated": [4],
///   "score": { "scores": {"2": 400}, "pets": {"2": [102]}, "cell": 2, "player_bonus": 200, "base_bonus": 200 },
///   "pet_id": 101,
///   "players_left": 3
/// }
/// ```
pub async fn round_result(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<RoundResultView> {
    let ctx = prepare("round_result", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.round_result(&ctx, &request.desk_id).await;
    finish("round_result", &ctx, started, result)
}

/// Collect the caller's rewards.
///
/// Replays return the same outcome with `"credited": false`.
pub async fn settlement(
    State(state): State<AppState>,
    Extension(role_id): Extension<RoleId>,
    request_id: RequestId,
    Json(request): Json<DeskRequest>,
) -> ApiResult<SettlementOutcome> {
    let ctx = prepare("settlement", role_id, request_id, &request)?;
    let started = Instant::now();
    let result = state.coordinator.settlement(&ctx, &request.desk_id).await;
    if let Ok(outcome) = &result {
        metrics::settlements_total(outcome.credited);
    }
    finish("settlement", &ctx, started, result)
}
