//! Log-backed stand-ins for the UI collaborators

use strategy_sync_core::{NotificationSink, PanelController, TransactionHash};
use tracing::info;

/// Reports transaction notifications through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn show_pending_transaction(&self, tx: &TransactionHash) {
        info!(tx = %tx, "Transaction pending");
    }

    fn show_confirmed_transaction(&self, tx: &TransactionHash) {
        info!(tx = %tx, "Transaction confirmed");
    }
}

/// Panel with nothing to close
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPanel;

impl PanelController for HeadlessPanel {
    fn close(&self) {
        info!("Strategy panel closed");
    }
}
