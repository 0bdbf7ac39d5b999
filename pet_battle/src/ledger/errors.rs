//! Ledger error types.

use std::time::Duration;
use thiserror::Error;

/// Ledger, role registry and result log errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A debit would take the balance below zero
    #[error(
        "Insufficient balance for owner {owner} resource {resource_id}: available {available}, required {required}"
    )]
    InsufficientBalance {
        owner: i64,
        resource_id: i32,
        available: i64,
        required: i64,
    },

    /// Enrollment flag already points at another desk
    #[error("Role {role_id} already enrolled in {desk_id}")]
    AlreadyEnrolled { role_id: i64, desk_id: String },

    /// Invalid amount (zero deltas are rejected)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance overflow
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Query or transaction did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Timeout(_) => {
                "Internal server error".to_string()
            }
            LedgerError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            LedgerError::AlreadyEnrolled { .. } => "Already enrolled in a battle".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
