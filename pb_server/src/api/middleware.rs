//! Bearer-token gate in front of the battle routes.
//!
//! Tokens are issued by the account service; this layer only checks them with
//! the shared HS256 secret and stores the token subject as the caller's
//! [`RoleId`] extension. Handlers take it with `Extension<RoleId>`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use pet_battle::{
    auth::{AuthError, AuthResult},
    battle::RoleId,
};

use super::{AppState, request_id::RequestId};
use crate::{logging, metrics};

fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Reject the request with 401 unless it carries a valid access token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let verified = bearer_token(request.headers()).and_then(|token| state.verifier.verify(token));

    match verified {
        Ok(claims) => {
            let role_id: RoleId = claims.sub;
            request.extensions_mut().insert(role_id);
            Ok(next.run(request).await)
        }
        Err(e) => {
            let request_id = request.extensions().get::<RequestId>().map(RequestId::as_str);
            metrics::rejected_tokens_total();
            logging::rejected_token(request_id, &e.to_string());
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
