//! Correlation IDs for battle requests.
//!
//! Every request carries an ID in `x-request-id`, either the caller's own or a
//! freshly generated UUID. It is echoed on the response and becomes the
//! `request_id` of the [`RequestContext`] handed to the coordinator, so one
//! grep finds the HTTP line, the engine logs and the ledger errors of a call.

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use pet_battle::battle::{RequestContext, RoleId};
use std::{convert::Infallible, fmt, time::Instant};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client IDs longer than this are replaced
const MAX_CLIENT_ID_LEN: usize = 128;

/// Correlation ID of the current request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Reuse a sane client-supplied ID or mint a new one
    pub fn resolve(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_CLIENT_ID_LEN);

        match supplied {
            Some(id) => Self(id.to_string()),
            None => Self::fresh(),
        }
    }

    fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Engine context for `role_id` under this ID
    pub fn into_context(self, role_id: RoleId) -> RequestContext {
        RequestContext::new(role_id, self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handlers always get an ID; routes mounted without the middleware mint one
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::fresh))
    }
}

/// Tag the request, run it inside a `request` span and echo the ID back
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::resolve(request.headers());
    request.extensions_mut().insert(id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request finished"
        );
    });

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers
    }

    #[test]
    fn test_client_id_is_kept() {
        let id = RequestId::resolve(&headers_with("bot-7-join"));
        assert_eq!(id.as_str(), "bot-7-join");
    }

    #[test]
    fn test_missing_or_blank_id_is_generated() {
        assert!(Uuid::parse_str(RequestId::resolve(&HeaderMap::new()).as_str()).is_ok());
        assert!(Uuid::parse_str(RequestId::resolve(&headers_with("   ")).as_str()).is_ok());
    }

    #[test]
    fn test_oversized_id_is_replaced() {
        let long = "x".repeat(MAX_CLIENT_ID_LEN + 1);
        let id = RequestId::resolve(&headers_with(&long));
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_into_context() {
        let ctx = RequestId::resolve(&headers_with("abc")).into_context(42);
        assert_eq!(ctx.role_id, 42);
        assert_eq!(ctx.request_id, "abc");
        assert_eq!(ctx.to_string(), "[abc] role 42");
    }
}
