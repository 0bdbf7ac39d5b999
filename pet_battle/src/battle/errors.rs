//! Battle error types.

use crate::ledger::LedgerError;
use crate::store::StoreError;
use thiserror::Error;

/// Battle errors
///
/// Three families: transient (`ServerBusy`, safe to retry), expected business
/// outcomes, and infrastructure failures (`Database`, `Store`) whose details
/// are never shown to clients.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Unknown template or pet, or a malformed request
    #[error("Invalid parameters: {0}")]
    ParametersInvalid(String),

    /// Desk lock could not be acquired in time
    #[error("Server busy: {0}")]
    ServerBusy(String),

    /// Desk no longer exists or enrollment is stale
    #[error("Battle {0} already dismissed")]
    BattleAlreadyDismiss(String),

    #[error("Battle {0} already started")]
    BattleAlreadyStarted(String),

    #[error("Battle {0} registration is full")]
    BattleRegistrationFull(String),

    /// Entry requirements not met
    #[error("Not qualified for battle template {0}")]
    NotQualified(i32),

    #[error("Already joined battle {0}")]
    AlreadyJoinOtherBattle(String),

    #[error("Tutorial battle already completed")]
    TutorialCompleted,

    #[error("Not seated in battle {0}")]
    NotInBattle(String),

    #[error("Battle {0} has not started")]
    MatchNotStarted(String),

    #[error("Battle {0} has ended")]
    MatchEnded(String),

    #[error("Betting closed for round {0}")]
    BettingClosed(usize),

    #[error("Cell {0} already eliminated")]
    CellEliminated(i32),

    #[error("Cell {cell} out of range 1..={grid_count}")]
    CellOutOfRange { cell: i32, grid_count: i32 },

    #[error("Settlement not available yet for battle {0}")]
    SettlementPending(String),

    /// Ledger or result log failure
    #[error("Database error: {0}")]
    Database(LedgerError),

    /// Shared store failure
    #[error("Shared store error: {0}")]
    Store(StoreError),
}

impl BattleError {
    /// Stable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            BattleError::ParametersInvalid(_) => "ParametersInvalid",
            BattleError::ServerBusy(_) => "ServerBusy",
            BattleError::BattleAlreadyDismiss(_) => "BattleAlreadyDismiss",
            BattleError::BattleAlreadyStarted(_) => "BattleAlreadyStarted",
            BattleError::BattleRegistrationFull(_) => "BattleRegistrationFull",
            BattleError::NotQualified(_) => "NotQualified",
            BattleError::AlreadyJoinOtherBattle(_) => "AlreadyJoinOtherBattle",
            BattleError::TutorialCompleted => "TutorialCompleted",
            BattleError::NotInBattle(_) => "NotInBattle",
            BattleError::MatchNotStarted(_) => "MatchNotStarted",
            BattleError::MatchEnded(_) => "MatchEnded",
            BattleError::BettingClosed(_) => "BettingClosed",
            BattleError::CellEliminated(_) => "CellEliminated",
            BattleError::CellOutOfRange { .. } => "CellOutOfRange",
            BattleError::SettlementPending(_) => "SettlementPending",
            BattleError::Database(_) => "DatabaseError",
            BattleError::Store(_) => "StoreError",
        }
    }

    /// Whether the caller may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, BattleError::ServerBusy(_))
    }

    /// Whether the error comes from infrastructure rather than game rules
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, BattleError::Database(_) | BattleError::Store(_))
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            BattleError::Database(_) | BattleError::Store(_) => {
                "Internal server error".to_string()
            }
            BattleError::ServerBusy(_) => "Server busy, please retry".to_string(),
            BattleError::AlreadyJoinOtherBattle(_) => {
                "Already joined another battle".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for BattleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockBusy(key) => BattleError::ServerBusy(key),
            other => BattleError::Store(other),
        }
    }
}

impl From<LedgerError> for BattleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } => BattleError::NotQualified(0),
            LedgerError::AlreadyEnrolled { desk_id, .. } => {
                BattleError::AlreadyJoinOtherBattle(desk_id)
            }
            other => BattleError::Database(other),
        }
    }
}

/// Result type for battle operations
pub type BattleResult<T> = Result<T, BattleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_busy_maps_to_server_busy() {
        let err: BattleError = StoreError::LockBusy("lock/1-1".to_string()).into();
        assert!(matches!(err, BattleError::ServerBusy(_)));
        assert!(err.is_retryable());
        assert_eq!(err.code(), "ServerBusy");
    }

    #[test]
    fn test_store_errors_are_sanitized() {
        let err: BattleError = StoreError::Codec("bad bytes at offset 3".to_string()).into();
        assert!(err.is_infrastructure());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_insufficient_balance_is_not_qualified() {
        let err: BattleError = LedgerError::InsufficientBalance {
            owner: 1,
            resource_id: 101,
            available: 0,
            required: 1,
        }
        .into();
        assert_eq!(err.code(), "NotQualified");
    }

    #[test]
    fn test_business_errors_keep_their_message() {
        let err = BattleError::CellOutOfRange {
            cell: 9,
            grid_count: 6,
        };
        assert_eq!(err.client_message(), "Cell 9 out of range 1..=6");
        assert!(!err.is_infrastructure());
    }
}
