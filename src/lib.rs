//! # Strategy Sync
//!
//! Keeps DeFi strategy plans in sync with live wallet, price, balance and
//! position state, and drives their transaction submission.
//!
//! ## Architecture
//!
//! The system is organized into modular crates:
//! - `strategy-sync-core`: identifiers, props, token catalog and collaborator contracts
//! - `event-bus`: named-topic broadcast of refresh events
//! - `strategy-engine`: observable runtime, synchronization engine, submission controller
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use strategy_sync::prelude::*;
//!
//! # async fn run(fetcher: Arc<dyn BalanceFetcher>) -> Result<(), Box<dyn std::error::Error>> {
//! let definition = DemoDefinition { confirm_delay: Duration::from_millis(100) };
//! let sources = SessionSources::new(Network::Mainnet, fetcher);
//! let session = StrategySession::from_definition(&definition, sources)
//!     .events(Arc::new(EventBus::default()))
//!     .build()?;
//!
//! let tx = session.submit().await?;
//! println!("sent {tx}, pending = {}", session.pending().get());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod config;
pub mod demo;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::demo::{run_demo, DemoDefinition, DemoReport};
    pub use event_bus::EventBus;
    pub use strategy_engine::{
        Observable, OverlapPolicy, SessionConfig, SessionSources, StrategySession,
    };
    pub use strategy_sync_core::{BalanceFetcher, Network, Strategy, TransactionHash};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub const BUILD_INFO: &str = concat!("Strategy Sync v", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert!(BUILD_INFO.contains("Strategy Sync"));
    }
}
