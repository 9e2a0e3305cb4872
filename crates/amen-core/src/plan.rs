//! Dry-run plan results.

use crate::action::Action;
use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Simulated effect of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEffect {
    pub index: usize,
    pub action: Action,
    /// Human-readable preview of what execution would do.
    pub preview: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A Warning or Error found while planning. `action_index` is `None` for
/// intent-level findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(action_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            action_index,
            message: message.into(),
        }
    }

    pub fn error(action_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            action_index,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_index {
            Some(index) => write!(f, "[{}] action {}: {}", self.severity, index, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Generated application source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    /// File name relative to the workspace, e.g. `app.py`.
    pub file_name: String,
    pub language: String,
    pub source: String,
    /// Dependency manifest when the stack needs one (`package.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<GeneratedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub file_name: String,
    pub contents: String,
}

/// Container build descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub memory_mb: u32,
    /// CPU share as a decimal string, e.g. `"0.5"`.
    pub cpu: String,
    pub build_time_secs: u32,
    pub startup_time_secs: u32,
}

/// Output of a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResult {
    /// Fingerprint of the intent content that was planned.
    pub fingerprint: Fingerprint,
    pub effects: Vec<PlannedEffect>,
    /// Every Warning and Error, per-action ones first in action order,
    /// followed by intent-level ones.
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<GeneratedCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_descriptor: Option<BuildDescriptor>,
    pub estimated_resources: ResourceEstimate,
    #[serde(default)]
    pub logs: Vec<String>,
    /// True when any diagnostic is an Error.
    pub blocking: bool,
}

impl PlanResult {
    /// Whether any diagnostic has Error severity. Does not trust `blocking`.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}
