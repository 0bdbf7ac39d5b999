//! HTTP-level tests for the battle API.
//!
//! Runs the full router against the in-memory store and ledger with a
//! manually driven clock, so whole matches play out without waiting.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use pb_server::api::{AppState, create_router};
use pet_battle::{
    MatchCoordinator, TemplateCatalog,
    auth::TokenVerifier,
    battle::{ManualClock, RecorderHandle, ResourceAmount, ResourceKind, ResultRecorder},
    ledger::{Collaborators, Ledger, MemoryLedger},
    store::MemoryStore,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const SECRET: &str = "integration_test_secret_at_least_32_chars";
const START: i64 = 1_000;

const CATALOG: &str = r#"{
    "pets": [101, 102, 103],
    "templates": [
        {
            "id": 1, "name": "Tutorial",
            "match_window_secs": 30, "total_rounds": 3,
            "round_durations": [10, 10, 10], "round_interval_secs": 2,
            "capacity": 4, "entry_pet_cost": 0, "total_bonus": 600,
            "grid_count": 6, "tutorial": true,
            "rewards": [{"kind": "item", "resource_id": 1, "quantity": 1}]
        },
        {
            "id": 2, "name": "Arena",
            "match_window_secs": 30, "total_rounds": 3,
            "round_durations": [10, 10, 10], "round_interval_secs": 2,
            "capacity": 4, "total_bonus": 600, "grid_count": 6
        }
    ]
}"#;

struct TestServer {
    app: axum::Router,
    clock: Arc<ManualClock>,
    ledger: Arc<MemoryLedger>,
    recorder: RecorderHandle,
    verifier: TokenVerifier,
}

impl TestServer {
    fn new() -> Self {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let collaborators = Collaborators::from_backend(ledger.clone());
        let (recorder, _task) = ResultRecorder::spawn(collaborators.results.clone());
        let clock = Arc::new(ManualClock::new(START));

        let coordinator = MatchCoordinator::new(
            Arc::new(catalog),
            store.clone(),
            collaborators,
            recorder.clone(),
        )
        .with_clock(clock.clone())
        .with_seed(42);

        let verifier = TokenVerifier::new(SECRET.to_string());
        let state = AppState {
            coordinator: Arc::new(coordinator),
            verifier: Arc::new(verifier.clone()),
            store,
            database: None,
        };

        Self {
            app: create_router(state),
            clock,
            ledger,
            recorder,
            verifier,
        }
    }

    fn token(&self, role_id: i64) -> String {
        self.verifier
            .issue(role_id, chrono::Duration::minutes(15))
            .unwrap()
    }

    async fn grant_pet(&self, role_id: i64, pet_id: i32) {
        self.ledger
            .adjust_balance(role_id, ResourceAmount::pet(pet_id, 1), &format!("grant:{role_id}"))
            .await
            .unwrap();
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

// ============================================================================
// Health and Authentication
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = TestServer::new();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["templates"], 2);
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let server = TestServer::new();
    let (status, _) = server
        .post("/api/v1/battle/match", None, json!({"template_id": 2, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_foreign_token_rejected() {
    let server = TestServer::new();
    let other = TokenVerifier::new("another_secret_that_is_32_chars_long!!".to_string());
    let token = other.issue(1, chrono::Duration::minutes(15)).unwrap();

    let (status, _) = server
        .post(
            "/api/v1/battle/match",
            Some(&token),
            json!({"template_id": 2, "pet_id": 101}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Joining and Leaving
// ============================================================================

#[tokio::test]
async fn test_match_requires_pet() {
    let server = TestServer::new();
    let token = server.token(1);

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 2, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NotQualified");
}

#[tokio::test]
async fn test_match_rejects_bad_payloads() {
    let server = TestServer::new();
    let token = server.token(1);

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 0, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ParametersInvalid");

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 9, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ParametersInvalid");

    let (status, _) = server
        .post("/api/v1/battle/bet", Some(&token), json!({"desk_id": "oops", "cell": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_match_and_leave_refunds() {
    let server = TestServer::new();
    server.grant_pet(1, 101).await;
    let token = server.token(1);

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 2, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["desk_id"], "2-1");
    assert_eq!(body["player_count"], 1);
    assert_eq!(
        server.ledger.balance(1, ResourceKind::Pet, 101).await.unwrap(),
        0
    );

    let (status, body) = server
        .post("/api/v1/battle/match_state", Some(&token), json!({"desk_id": "2-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 4);

    let (status, body) = server
        .post("/api/v1/battle/leave", Some(&token), json!({"desk_id": "2-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refund"]["quantity"], 1);
    assert_eq!(
        server.ledger.balance(1, ResourceKind::Pet, 101).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_second_desk_while_enrolled() {
    let server = TestServer::new();
    server.grant_pet(1, 101).await;
    let token = server.token(1);

    let (status, _) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 2, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 1, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "AlreadyJoinOtherBattle");
}

#[tokio::test]
async fn test_bet_before_start() {
    let server = TestServer::new();
    server.grant_pet(1, 101).await;
    let token = server.token(1);
    server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 2, "pet_id": 101}))
        .await;

    let (status, body) = server
        .post("/api/v1/battle/bet", Some(&token), json!({"desk_id": "2-1", "cell": 3}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MatchNotStarted");
}

#[tokio::test]
async fn test_stranger_cannot_poll_desk() {
    let server = TestServer::new();
    server.grant_pet(1, 101).await;
    server
        .post(
            "/api/v1/battle/match",
            Some(&server.token(1)),
            json!({"template_id": 2, "pet_id": 101}),
        )
        .await;

    let (status, body) = server
        .post(
            "/api/v1/battle/round_result",
            Some(&server.token(2)),
            json!({"desk_id": "2-1"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotInBattle");
}

// ============================================================================
// Full Match
// ============================================================================

#[tokio::test]
async fn test_tutorial_match_end_to_end() {
    let server = TestServer::new();
    let token = server.token(1);

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 1, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["desk_id"], "1-1");

    // Window closes at 1030; round 1 takes bets until 1040
    server.clock.set(START + 35);
    let (status, body) = server
        .post("/api/v1/battle/round_result", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ongoing");
    assert_eq!(body["round"], 1);

    let (status, body) = server
        .post("/api/v1/battle/bet", Some(&token), json!({"desk_id": "1-1", "cell": 1}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cell"], 1);

    let (status, body) = server
        .post("/api/v1/battle/settlement", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SettlementPending");

    // Round 1 resolved; the tutorial player is never eliminated
    server.clock.set(START + 45);
    let (status, body) = server
        .post("/api/v1/battle/round_result", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["round"], 2);
    assert_eq!(body["eliminated"].as_array().unwrap().len(), 1);
    assert_ne!(body["eliminated"][0], 1);

    // Last elimination at 1064, result shown until 1066
    server.clock.set(START + 70);
    let (status, body) = server
        .post("/api/v1/battle/round_result", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ended");
    assert_eq!(body["eliminated"].as_array().unwrap().len(), 3);

    let (status, body) = server
        .post("/api/v1/battle/settlement", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["win"], true);
    assert_eq!(body["bonus"], 600);
    assert_eq!(body["credited"], true);
    assert_eq!(body["rewards"][0]["quantity"], 600);
    assert_eq!(
        server.ledger.balance(1, ResourceKind::Item, 1).await.unwrap(),
        600
    );

    // Desk is gone; the result log answers the replay without paying again
    server.recorder.flush().await.unwrap();
    let (status, body) = server
        .post("/api/v1/battle/settlement", Some(&token), json!({"desk_id": "1-1"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credited"], false);
    assert_eq!(
        server.ledger.balance(1, ResourceKind::Item, 1).await.unwrap(),
        600
    );

    let (status, body) = server
        .post("/api/v1/battle/match", Some(&token), json!({"template_id": 1, "pet_id": 101}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TutorialCompleted");
}
