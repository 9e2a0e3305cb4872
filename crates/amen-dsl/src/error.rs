//! Error and diagnostic types for the DSL parser.

use amen_core::{ActionError, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A finding reported while reading a DSL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub severity: Severity,
    /// Location in the document, e.g. `IMPLEMENTATION.actions[2]`.
    pub location: String,
    pub message: String,
    /// Index of the offending entry in `IMPLEMENTATION.actions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_error: Option<ActionError>,
}

impl ParseDiagnostic {
    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.into(),
            message: message.into(),
            action_index: None,
            action_error: None,
        }
    }

    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(location, message)
        }
    }

    pub(crate) fn action(index: usize, error: ActionError) -> Self {
        Self {
            severity: Severity::Error,
            location: format!("IMPLEMENTATION.actions[{}]", index),
            message: error.to_string(),
            action_index: Some(index),
            action_error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.location, self.message)
    }
}

/// Errors that prevent an intent from being produced.
#[derive(Debug, Error)]
pub enum DslError {
    /// The text is not valid YAML.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document is YAML but lacks required content.
    #[error("invalid intent document: {}", summarize(.diagnostics))]
    Fatal { diagnostics: Vec<ParseDiagnostic> },
}

fn summarize(diagnostics: &[ParseDiagnostic]) -> String {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| format!("{}: {}", d.location, d.message))
        .collect();
    errors.join("; ")
}
