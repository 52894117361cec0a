//! # Strategy Engine
//!
//! Binds a strategy to live wallet, market and position state and drives its
//! transaction submission.
//!
//! - [`observable`]: observable cells and subscription guards
//! - [`sync`]: the synchronization engine pushing source values into a strategy
//! - [`submission`]: the submission controller and its pending/error state
//! - [`session`]: [`StrategySession`], the surface a UI binds to

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod notify;
pub mod observable;
pub mod session;
pub mod sources;
pub mod submission;
pub mod sync;

pub use config::{DiagnosticsConfig, OverlapPolicy, SessionConfig, DEBUG_ENV_VAR};
pub use error::{SessionError, SessionResult};
pub use notify::{HeadlessPanel, TracingNotifier};
pub use observable::{Observable, Subscription, SubscriptionSet, WeakObservable};
pub use session::{SessionSnapshot, StrategySession, StrategySessionBuilder};
pub use sources::{BalanceSources, PositionSources, SessionSources, Web3Sources};
pub use submission::{SubmissionController, SubmissionPhase, SubmissionServices};
pub use sync::SynchronizationEngine;
