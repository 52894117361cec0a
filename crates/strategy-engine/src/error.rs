//! Error types for strategy sessions

use strategy_sync_core::{CoreError, StrategyError};
use thiserror::Error;

/// Errors surfaced by a [`StrategySession`](crate::StrategySession)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Strategy submission failed: {0}")]
    Submission(#[from] StrategyError),

    #[error("A submission is already in flight")]
    SubmissionInFlight,

    #[error("Balance refresh failed: {0}")]
    BalanceRefresh(CoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Type alias for session results
pub type SessionResult<T> = Result<T, SessionError>;
