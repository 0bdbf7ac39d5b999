//! Authentication error types.

use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Authorization header missing or not a bearer token
    #[error("Missing bearer token")]
    MissingToken,

    /// JWT token error
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// Subject is not a usable role ID
    #[error("Invalid token subject: {0}")]
    InvalidSubject(i64),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// JWT errors are sanitized to prevent disclosing why a token was rejected.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::JwtError(_) | AuthError::InvalidSubject(_) => {
                "Authentication failed".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
