//! Orchestrator configuration.

use serde::Deserialize;
use std::path::PathBuf;
use teller_ai::RetryPolicy;

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    /// Maximum ANSWER turns per invocation that may request tools.
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: u32,
    /// Attempts per model call, including the first.
    #[serde(default = "default_model_attempts")]
    pub model_attempts: u32,
    /// Directory for file-backed checkpoints; in-memory when unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_max_round_trips() -> u32 {
    12
}

fn default_model_attempts() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            model_attempts: default_model_attempts(),
            state_dir: None,
        }
    }
}

impl AgentConfig {
    /// Retry policy for model calls.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.model_attempts.max(1),
            ..RetryPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_round_trips, 12);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({"max_round_trips": 4})).expect("deserialize");
        assert_eq!(config.max_round_trips, 4);
        assert_eq!(config.model_attempts, 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let config = AgentConfig {
            model_attempts: 0,
            ..AgentConfig::default()
        };
        assert_eq!(config.retry_policy().max_attempts, 1);
    }
}
