//! Error taxonomy for the ledger write path.
//!
//! Validation and balance errors are returned synchronously with a stable
//! code; `CompensationFailed` means a debit could not be reversed after a
//! partial write and must page an operator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BetError {
    #[error("user missing or inactive")]
    UserInactiveOrMissing,

    #[error("stake outside allowed range: {0} cents")]
    InvalidStake(i64),

    #[error("selection odds invalid: {0}")]
    InvalidOdds(String),

    #[error("combined odds below floor: {0}")]
    InvalidTotalOdds(f64),

    #[error("insufficient balance")]
    InsufficientBalance,

    /// Optimistic check lost a race; the whole operation is safe to retry.
    #[error("concurrent update conflict")]
    ConcurrencyConflict,

    #[error("bet or selection already settled")]
    AlreadySettled,

    /// A partial write was rolled back by a compensating credit.
    #[error("placement failed and was compensated")]
    PlacementFailed,

    /// A partial write could NOT be compensated: the ledger invariant is
    /// broken until an operator intervenes.
    #[error("compensation failed: {0}")]
    CompensationFailed(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl BetError {
    /// Stable machine-readable code for API callers and alerting.
    pub fn code(&self) -> &'static str {
        match self {
            BetError::UserInactiveOrMissing => "user_inactive_or_missing",
            BetError::InvalidStake(_) => "invalid_stake",
            BetError::InvalidOdds(_) => "invalid_odds",
            BetError::InvalidTotalOdds(_) => "invalid_total_odds",
            BetError::InsufficientBalance => "insufficient_balance",
            BetError::ConcurrencyConflict => "concurrency_conflict",
            BetError::AlreadySettled => "already_settled",
            BetError::PlacementFailed => "placement_failed",
            BetError::CompensationFailed(_) => "compensation_failed",
            BetError::Store(_) => "store_error",
        }
    }

    /// Whether the caller can retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BetError::ConcurrencyConflict)
    }
}
