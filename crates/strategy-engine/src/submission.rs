//! Submission Controller
//!
//! Drives one strategy submission through `Idle -> Submitting -> Succeeded | Failed -> Idle`
//! and runs the post-submission side effects. The confirmation side effects live
//! in the receipt hook handed to the strategy; they wait for the transaction
//! handle this controller publishes once the pending notification is shown, so a
//! confirmation is never reported before the pending state and a failed
//! submission's hook does nothing.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use strategy_sync_core::{
    Address, BalanceFetcher, EventEmitter, NotificationSink, PanelController, ReceiptHook,
    Strategy, StrategyProtocol, SubmitRequest, TransactionHash,
};
use tokio::sync::oneshot;
use tracing::{error, info, instrument, warn};

use crate::config::OverlapPolicy;
use crate::error::{SessionError, SessionResult};
use crate::observable::Observable;

/// Where the controller is in the submission lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Services touched after a submission
#[derive(Clone)]
pub struct SubmissionServices {
    pub notifications: Arc<dyn NotificationSink>,
    pub panel: Arc<dyn PanelController>,
    pub balances: Arc<dyn BalanceFetcher>,
    pub events: Arc<dyn EventEmitter>,
}

impl fmt::Debug for SubmissionServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionServices").finish_non_exhaustive()
    }
}

/// Decrements the in-flight count when a submission ends or is abandoned
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs submissions of one strategy and exposes their state
pub struct SubmissionController {
    strategy: Arc<dyn Strategy>,
    account: Observable<Option<Address>>,
    services: SubmissionServices,
    policy: OverlapPolicy,
    pending: Observable<bool>,
    error: Observable<String>,
    phase: Observable<SubmissionPhase>,
    in_flight: AtomicUsize,
}

impl SubmissionController {
    pub fn new(
        strategy: Arc<dyn Strategy>,
        account: Observable<Option<Address>>,
        services: SubmissionServices,
        policy: OverlapPolicy,
    ) -> Self {
        Self {
            strategy,
            account,
            services,
            policy,
            pending: Observable::new(false),
            error: Observable::new(String::new()),
            phase: Observable::new(SubmissionPhase::Idle),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// True while a submission is running
    pub fn pending(&self) -> &Observable<bool> {
        &self.pending
    }

    /// Message of the last failed submission, empty otherwise
    pub fn error(&self) -> &Observable<String> {
        &self.error
    }

    pub fn phase(&self) -> &Observable<SubmissionPhase> {
        &self.phase
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submits the strategy's transaction.
    ///
    /// Strategy failures are logged and stored in [`error`](Self::error) as
    /// well as returned. `pending` is cleared however the call ends, except
    /// when the future is dropped before the strategy answers.
    #[instrument(name = "strategy_submit", skip(self))]
    pub async fn submit(&self) -> SessionResult<TransactionHash> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);
        if previous > 0 && self.policy == OverlapPolicy::Reject {
            warn!(in_flight = previous, "Rejecting overlapping submission");
            metrics::increment_counter!("strategy_submissions_rejected_total");
            return Err(SessionError::SubmissionInFlight);
        }

        self.error.set(String::new());
        self.pending.set(true);
        self.phase.set(SubmissionPhase::Submitting);

        let protocol = self.strategy.schema().protocol;
        let (published, handle) = oneshot::channel();
        let request = SubmitRequest {
            from: self.account.get(),
            on_receipt: receipt_hook(handle, self.services.clone(), protocol.clone()),
        };

        info!(%protocol, from = ?request.from, "Submitting strategy");
        let result = match self.strategy.submit(request).await {
            Ok(tx) => {
                info!(tx = %tx, "Transaction sent");
                self.services.notifications.show_pending_transaction(&tx);
                self.services.panel.close();
                // the hook may already be gone if the strategy dropped it
                let _ = published.send(tx.clone());
                self.phase.set(SubmissionPhase::Succeeded);
                metrics::increment_counter!("strategy_submissions_total", "outcome" => "sent");
                Ok(tx)
            }
            Err(err) => {
                error!(error = %err, "Strategy submission failed");
                self.error.set(err.message.clone());
                self.phase.set(SubmissionPhase::Failed);
                metrics::increment_counter!("strategy_submissions_total", "outcome" => "failed");
                Err(SessionError::Submission(err))
            }
        };

        self.pending.set(false);
        self.phase.set(SubmissionPhase::Idle);
        result
    }
}

impl fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionController")
            .field("policy", &self.policy)
            .field("pending", &self.pending.get())
            .field("error", &self.error.get())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

fn receipt_hook(
    handle: oneshot::Receiver<TransactionHash>,
    services: SubmissionServices,
    protocol: StrategyProtocol,
) -> ReceiptHook {
    ReceiptHook::new(move || async move {
        let tx = match handle.await {
            Ok(tx) => tx,
            Err(_) => {
                warn!(%protocol, "Receipt hook fired for a submission that did not go through");
                return Ok(());
            }
        };

        info!(tx = %tx, %protocol, "Transaction confirmed");
        services.notifications.show_confirmed_transaction(&tx);
        services.balances.fetch_balances(true).await?;

        let event = protocol.refresh_event();
        services.events.emit_event(&event, json!({}));
        metrics::increment_counter!("strategy_refresh_events_total");
        Ok(())
    })
}
