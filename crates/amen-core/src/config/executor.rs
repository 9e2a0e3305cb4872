//! Executor and retry configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the live executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Upper bound for a single process spawn or HTTP attempt.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Root directory for files, manifests and generated artifacts.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Build a container image after all actions succeed (docker runtime only).
    #[serde(default)]
    pub build_container: bool,

    /// Start the built image as a detached container, replacing any
    /// container of the same name. Needs `build_container`.
    #[serde(default)]
    pub run_container: bool,

    /// Image name prefix: images are tagged `<prefix>-<intent name>:latest`.
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,

    /// Retry policy for `rest.call`.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: default_action_timeout_secs(),
            workspace_dir: default_workspace_dir(),
            build_container: false,
            run_container: false,
            container_prefix: default_container_prefix(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

/// Exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one. `1` disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1.
    /// Doubles each time, capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Attempts actually allowed; never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

fn default_action_timeout_secs() -> u64 {
    60
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}

fn default_container_prefix() -> String {
    "intent".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
        assert_eq!(retry.backoff(5), Duration::from_millis(1_000));
        assert_eq!(retry.backoff(60), Duration::from_millis(1_000));
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let retry = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.attempts(), 1);
        assert_eq!(RetryConfig::none().attempts(), 1);
    }
}
