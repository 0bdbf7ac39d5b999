//! Authentication data models.

use crate::battle::RoleId;
use serde::{Deserialize, Serialize};

/// JWT claims for access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Role ID
    pub sub: RoleId,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}
