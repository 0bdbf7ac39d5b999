//! HS256 access token verifier.

use super::{
    errors::{AuthError, AuthResult},
    models::AccessTokenClaims,
};
use crate::battle::{RoleId, is_bot};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Verifies access tokens signed with the shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    /// Create a verifier
    ///
    /// # Arguments
    ///
    /// * `jwt_secret` - Shared HS256 secret
    pub fn new(jwt_secret: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    /// Verify an access token
    ///
    /// # Arguments
    ///
    /// * `token` - JWT access token
    ///
    /// # Returns
    ///
    /// * `AuthResult<AccessTokenClaims>` - Decoded claims or error
    ///
    /// # Errors
    ///
    /// * `AuthError::JwtError` - Bad signature, malformed or expired
    /// * `AuthError::InvalidSubject` - Subject outside the real role range
    pub fn verify(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let token_data =
            decode::<AccessTokenClaims>(token, &self.decoding_key, &Validation::default())?;

        let role_id = token_data.claims.sub;
        if role_id <= 0 || is_bot(role_id) {
            return Err(AuthError::InvalidSubject(role_id));
        }

        Ok(token_data.claims)
    }

    /// Sign a token for a role
    ///
    /// Used by tests and the load bots; production tokens come from the
    /// account service.
    pub fn issue(&self, role_id: RoleId, ttl: Duration) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: role_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}
