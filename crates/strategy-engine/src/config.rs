//! Per-session settings

use serde::{Deserialize, Serialize};

/// How a session treats `submit` while another submission is still running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Overlapping calls run independently; the last one to finish owns the state
    #[default]
    Allow,
    /// A call made while another is running fails with `SubmissionInFlight`
    Reject,
}

/// Environment flag that exposes the live strategy for inspection
pub const DEBUG_ENV_VAR: &str = "STRATEGY_SYNC_DEBUG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Allow `StrategySession::debug_strategy` to hand out the strategy
    #[serde(default)]
    pub expose_strategy: bool,
}

impl DiagnosticsConfig {
    /// Reads the settings from the environment only
    pub fn from_env() -> Self {
        Self {
            expose_strategy: env_flag(DEBUG_ENV_VAR),
        }
    }

    /// Turns exposure on when the environment asks for it
    pub fn with_env_override(self) -> Self {
        Self {
            expose_strategy: self.expose_strategy || env_flag(DEBUG_ENV_VAR),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Settings of one strategy session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::Allow);
        assert!(!config.diagnostics.expose_strategy);
    }

    #[test]
    fn test_overlap_policy_names() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"overlap_policy":"reject","diagnostics":{"expose_strategy":true}}"#)
                .unwrap();
        assert_eq!(config.overlap_policy, OverlapPolicy::Reject);
        assert!(config.diagnostics.expose_strategy);
    }
}
