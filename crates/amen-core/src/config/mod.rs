//! Engine configuration.
//!
//! Configuration is loaded from a single YAML file (`amen.yaml` by convention).
//! Every section and field has a default, so an empty file, or no file at all,
//! yields a usable configuration.
//!
//! ```yaml
//! approval:
//!   auto_approve: false
//!   default_approver: ops
//! executor:
//!   action_timeout_secs: 30
//!   workspace_dir: ./workspace
//!   build_container: true
//!   run_container: true
//!   retry:
//!     max_attempts: 4
//! audit:
//!   directory: ./.amen
//! logging:
//!   level: debug
//! ```

pub mod audit;
pub mod executor;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use audit::AuditConfig;
pub use executor::{ExecutorConfig, RetryConfig};

/// File name looked up by [`EngineConfig::load_from_dir`].
pub const CONFIG_FILE_NAME: &str = "amen.yaml";

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Project name, informational only.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub advisor: AdvisorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// AMEN gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Skip interactive confirmation. Never skips the fingerprint and
    /// diagnostics checks.
    #[serde(default)]
    pub auto_approve: bool,

    /// Approver recorded when none is given explicitly.
    #[serde(default = "default_approver")]
    pub default_approver: String,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            default_approver: default_approver(),
        }
    }
}

/// Advisor (suggestion source) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_approver() -> String {
    "operator".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content. Blank content yields defaults.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `amen.yaml` from `dir` if present, defaults otherwise.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Loading configuration");
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.action_timeout_secs == 0 {
            return Err(ConfigError::Config(
                "executor.action_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.executor.retry.initial_backoff_ms > self.executor.retry.max_backoff_ms {
            return Err(ConfigError::Config(
                "executor.retry.initial_backoff_ms must not exceed max_backoff_ms".to_string(),
            ));
        }
        if self.executor.run_container && !self.executor.build_container {
            return Err(ConfigError::Config(
                "executor.run_container requires executor.build_container".to_string(),
            ));
        }
        if self.approval.default_approver.trim().is_empty() {
            return Err(ConfigError::Config(
                "approval.default_approver must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml("").unwrap(), EngineConfig::default());
        assert_eq!(
            EngineConfig::from_yaml("project: demo\n").unwrap().executor,
            ExecutorConfig::default()
        );
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let yaml = r#"
approval:
  auto_approve: true
executor:
  action_timeout_secs: 5
  retry:
    max_attempts: 5
audit:
  directory: /var/log/amen
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert!(config.approval.auto_approve);
        assert_eq!(config.approval.default_approver, "operator");
        assert_eq!(config.executor.action_timeout_secs, 5);
        assert_eq!(config.executor.retry.max_attempts, 5);
        assert_eq!(config.executor.retry.initial_backoff_ms, 200);
        assert_eq!(config.executor.container_prefix, "intent");
        assert_eq!(
            config.audit.log_file(),
            Some(PathBuf::from("/var/log/amen/audit.jsonl"))
        );
        assert!(config.audit.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = EngineConfig::from_yaml("executor:\n  action_timeout_secs: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn running_a_container_needs_a_build() {
        let err = EngineConfig::from_yaml("executor:\n  run_container: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));

        let config =
            EngineConfig::from_yaml("executor:\n  build_container: true\n  run_container: true\n")
                .unwrap();
        assert!(config.executor.run_container);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = EngineConfig::from_yaml("approval: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn load_from_dir_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            EngineConfig::load_from_dir(dir.path()).unwrap(),
            EngineConfig::default()
        );

        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "logging:\n  level: debug\n",
        )
        .unwrap();
        let config = EngineConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }
}
