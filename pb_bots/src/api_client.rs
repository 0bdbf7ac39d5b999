//! HTTP API client for the battle server.

use anyhow::{Context, Result};
use pet_battle::battle::{
    Cell, MatchStateView, PetId, RoundResultView, ScoreSnapshot, SettlementOutcome, TemplateId,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

/// Error body returned by the server for a rejected request
#[derive(Debug, Clone, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub error: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.error)
    }
}

impl std::error::Error for Rejection {}

/// Server rejection code carried by an error, if any
pub fn rejection_code(err: &anyhow::Error) -> Option<&str> {
    err.downcast_ref::<Rejection>().map(|r| r.code.as_str())
}

#[derive(Debug, Serialize)]
struct MatchRequest {
    template_id: TemplateId,
    pet_id: PetId,
}

#[derive(Debug, Serialize)]
struct DeskRequest<'a> {
    desk_id: &'a str,
}

#[derive(Debug, Serialize)]
struct BetRequest<'a> {
    desk_id: &'a str,
    cell: Cell,
}

/// API client acting as one player
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    access_token: String,
}

impl ApiClient {
    /// Create a client that authenticates with `access_token`
    pub fn new(base_url: String, client: reqwest::Client, access_token: String) -> Self {
        Self {
            base_url,
            client,
            access_token,
        }
    }

    pub async fn match_battle(
        &self,
        template_id: TemplateId,
        pet_id: PetId,
    ) -> Result<MatchStateView> {
        let request = MatchRequest {
            template_id,
            pet_id,
        };
        self.post("match", &request).await
    }

    pub async fn round_result(&self, desk_id: &str) -> Result<RoundResultView> {
        self.post("round_result", &DeskRequest { desk_id }).await
    }

    pub async fn bet(&self, desk_id: &str, cell: Cell) -> Result<ScoreSnapshot> {
        self.post("bet", &BetRequest { desk_id, cell }).await
    }

    pub async fn settlement(&self, desk_id: &str) -> Result<SettlementOutcome> {
        self.post("settlement", &DeskRequest { desk_id }).await
    }

    async fn post<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/api/v1/battle/{}", self.base_url, operation))
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to send {operation} request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
            return match serde_json::from_str::<Rejection>(&body) {
                Ok(rejection) => Err(rejection.into()),
                Err(_) => anyhow::bail!("{} failed with {}: {}", operation, status, body),
            };
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {operation} response"))
    }
}
