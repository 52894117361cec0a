//! Event bus error types

use std::time::Duration;

use crossbeam_channel::{
    RecvError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use thiserror::Error;

/// Errors raised while publishing to or receiving from a bus channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Channel is full")]
    Full,

    #[error("Channel is disconnected")]
    Disconnected,

    #[error("Publish timed out after {0:?}")]
    PublishTimeout(Duration),

    #[error("Receive timed out")]
    RecvTimeout,

    #[error("Channel is empty")]
    Empty,

    #[error("Join error: {0}")]
    Join(String),
}

impl EventBusError {
    pub(crate) fn from_send_error<T>(_err: SendError<T>) -> Self {
        EventBusError::Disconnected
    }

    pub(crate) fn from_try_send_error<T>(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => EventBusError::Full,
            TrySendError::Disconnected(_) => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_send_timeout_error<T>(err: SendTimeoutError<T>, timeout: Duration) -> Self {
        match err {
            SendTimeoutError::Timeout(_) => EventBusError::PublishTimeout(timeout),
            SendTimeoutError::Disconnected(_) => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_recv_error(_err: RecvError) -> Self {
        EventBusError::Disconnected
    }

    pub(crate) fn from_recv_timeout(err: RecvTimeoutError) -> Self {
        match err {
            RecvTimeoutError::Timeout => EventBusError::RecvTimeout,
            RecvTimeoutError::Disconnected => EventBusError::Disconnected,
        }
    }

    pub(crate) fn from_try_recv_error(err: TryRecvError) -> Self {
        match err {
            TryRecvError::Empty => EventBusError::Empty,
            TryRecvError::Disconnected => EventBusError::Disconnected,
        }
    }

    /// Whether the receiving side is gone for good
    pub fn is_disconnected(&self) -> bool {
        matches!(self, EventBusError::Disconnected)
    }
}
