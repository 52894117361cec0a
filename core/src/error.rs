//! Error types shared across the workspace

use thiserror::Error;

/// Errors raised by core value types and collaborator calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTransactionHash(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount overflow: {amount} with {decimals} decimals")]
    AmountOverflow { amount: String, decimals: u32 },

    #[error("External service error: {service} - {message}")]
    Collaborator { service: String, message: String },
}

impl CoreError {
    /// Wraps a failure reported by an external collaborator
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// Type alias for core results
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure reported by a strategy's own submission routine.
///
/// Only the human-readable message crosses the boundary; it is what ends up in
/// the session's `error` cell.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StrategyError {
    pub message: String,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<CoreError> for StrategyError {
    fn from(err: CoreError) -> Self {
        StrategyError::new(err.to_string())
    }
}
