//! Contract between the synchronization crates and a strategy implementation.
//!
//! A strategy is built elsewhere from its definition; this workspace only holds
//! a shared reference to it, pushes live state in through the setters and asks it
//! to submit.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{CoreResult, StrategyError};
use crate::props::Props;
use crate::types::{Address, DsaHandle, InputField, StrategySchema, TransactionHash, Web3Handle};

/// Callback fired by a strategy whenever it recomputes its input set
pub type UpdateCallback = Box<dyn Fn() + Send + Sync>;

/// Completion hook handed to [`Strategy::submit`].
///
/// The strategy fires it once the submitted transaction is confirmed on chain.
/// It must be fired from outside the `submit` future (spawned, or from a
/// confirmation listener); awaiting it inside `submit` never completes because
/// the hook waits for the handle that `submit` returns.
pub struct ReceiptHook {
    hook: Box<dyn FnOnce() -> BoxFuture<'static, CoreResult<()>> + Send>,
}

impl ReceiptHook {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoreResult<()>> + Send + 'static,
    {
        Self {
            hook: Box::new(move || Box::pin(hook())),
        }
    }

    /// A hook with no side effects
    pub fn noop() -> Self {
        Self::new(|| async { Ok(()) })
    }

    /// Runs the post-confirmation side effects
    pub async fn fire(self) -> CoreResult<()> {
        (self.hook)().await
    }
}

impl fmt::Debug for ReceiptHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptHook").finish_non_exhaustive()
    }
}

/// Arguments of a strategy submission
#[derive(Debug)]
pub struct SubmitRequest {
    /// Account currently connected, if any
    pub from: Option<Address>,
    pub on_receipt: ReceiptHook,
}

/// A live strategy instance.
///
/// Implementations own their interior mutability: setters are called from
/// independent watchers with no ordering between them, each carrying only the
/// props its source owns, and must merge them idempotently.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Static metadata of the strategy
    fn schema(&self) -> StrategySchema;

    /// Current input set
    fn inputs(&self) -> Vec<InputField>;

    /// Registers `callback` to run after every recomputation of the input set.
    ///
    /// The callback is invoked once the new input set is final and without any
    /// internal lock held, so it may call back into [`Strategy::inputs`].
    fn on_updated(&self, callback: UpdateCallback);

    /// Builds, signs and sends the strategy's transaction
    async fn submit(&self, request: SubmitRequest) -> Result<TransactionHash, StrategyError>;

    fn set_props(&self, props: Props);

    fn set_web3(&self, web3: Option<Web3Handle>);

    fn set_dsa(&self, dsa: Option<DsaHandle>);
}

/// A strategy definition that can be instantiated
pub trait DefineStrategy {
    fn build_strategy(&self) -> Arc<dyn Strategy>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_receipt_hook_runs_once() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let hook = ReceiptHook::new(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(!fired.load(Ordering::SeqCst));
        hook.fire().await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_receipt_hook_propagates_errors() {
        let hook = ReceiptHook::new(|| async { Err(CoreError::collaborator("balances", "offline")) });
        let err = hook.fire().await.unwrap_err();
        assert_eq!(err.to_string(), "External service error: balances - offline");
    }
}
