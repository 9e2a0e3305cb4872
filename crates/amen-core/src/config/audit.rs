//! Audit trail configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the lifecycle audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are recorded at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Echo every event as a log line on stdout.
    #[serde(default)]
    pub stdout: bool,

    /// Directory for the JSON Lines audit file (`audit.jsonl`).
    /// When unset, events are only kept in memory or echoed.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stdout: false,
            directory: None,
        }
    }
}

impl AuditConfig {
    /// Path of the audit log file, if file storage is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join("audit.jsonl"))
    }
}

fn default_enabled() -> bool {
    true
}
