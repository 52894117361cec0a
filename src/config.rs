//! Application Configuration
//!
//! Settings for the `strategy-sync` binary. Values come from an optional TOML
//! file, then from `STRATEGY_SYNC__`-prefixed environment variables (nested keys
//! separated by `__`, e.g. `STRATEGY_SYNC__SUBMISSION__OVERLAP_POLICY=reject`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strategy_engine::{DiagnosticsConfig, OverlapPolicy, SessionConfig};
use strategy_sync_core::Network;
use tracing::info;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Network the wallet starts on
    pub network: Network,

    /// Submission behaviour
    pub submission: SubmissionConfig,

    /// Strategy inspection
    pub diagnostics: DiagnosticsConfig,

    /// Event bus sizing
    pub event_bus: EventBusConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Submission settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// What to do with `submit` while another one is running
    pub overlap_policy: OverlapPolicy,
}

/// Event bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Bounded capacity of each subscriber channel
    pub subscriber_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads the configuration file at `path` (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix("STRATEGY_SYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            network = %config.network,
            overlap_policy = ?config.submission.overlap_policy,
            expose_strategy = config.diagnostics.expose_strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_bus.subscriber_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus subscriber capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings handed to each strategy session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            overlap_policy: self.submission.overlap_policy,
            diagnostics: self.diagnostics.clone(),
        }
    }
}
