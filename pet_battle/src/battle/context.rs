//! Request-scoped context passed into every coordinator call.

use super::models::RoleId;
use uuid::Uuid;

/// Who is calling and how to correlate their logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub role_id: RoleId,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(role_id: RoleId, request_id: impl Into<String>) -> Self {
        Self {
            role_id,
            request_id: request_id.into(),
        }
    }

    /// Context with a fresh correlation ID
    pub fn generate(role_id: RoleId) -> Self {
        Self::new(role_id, Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] role {}", self.request_id, self.role_id)
    }
}
