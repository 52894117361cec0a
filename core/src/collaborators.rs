//! Narrow interfaces of the services a strategy session talks to

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::TransactionHash;

/// User-facing transaction notifications
pub trait NotificationSink: Send + Sync {
    fn show_pending_transaction(&self, tx: &TransactionHash);

    fn show_confirmed_transaction(&self, tx: &TransactionHash);
}

/// The UI panel hosting the strategy form
pub trait PanelController: Send + Sync {
    /// Dismisses the current view
    fn close(&self);
}

/// Balance source refresh
#[async_trait]
pub trait BalanceFetcher: Send + Sync {
    /// Reloads balances; `refresh` bypasses any cache
    async fn fetch_balances(&self, refresh: bool) -> CoreResult<()>;
}

/// Fire-and-forget broadcast of named events
pub trait EventEmitter: Send + Sync {
    fn emit_event(&self, name: &str, payload: serde_json::Value);
}
