//! Iteration diffs and history.

use crate::action::Action;
use crate::error::IterationError;
use crate::intent::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A change to an intent's implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationDiff {
    AddAction(Action),
    RemoveAction(usize),
    ReplaceAction(usize, Action),
    SetLanguage(String),
    SetFramework(Option<String>),
}

impl fmt::Display for IterationDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddAction(action) => write!(f, "add '{}'", action),
            Self::RemoveAction(index) => write!(f, "remove action {}", index),
            Self::ReplaceAction(index, action) => {
                write!(f, "replace action {} with '{}'", index, action)
            }
            Self::SetLanguage(language) => write!(f, "set language to {}", language),
            Self::SetFramework(Some(framework)) => write!(f, "set framework to {}", framework),
            Self::SetFramework(None) => write!(f, "clear framework"),
        }
    }
}

/// Who proposed a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOrigin {
    Manual,
    /// Proposed by an advisor and accepted by the operator.
    Advisory,
}

impl fmt::Display for DiffOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Advisory => write!(f, "advisory"),
        }
    }
}

/// What an applied diff actually changed, with the prior values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IterationChange {
    Added {
        index: usize,
        action: Action,
    },
    Removed {
        index: usize,
        action: Action,
    },
    Replaced {
        index: usize,
        before: Action,
        after: Action,
    },
    LanguageChanged {
        before: String,
        after: String,
    },
    FrameworkChanged {
        before: Option<String>,
        after: Option<String>,
    },
}

impl fmt::Display for IterationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { index, action } => write!(f, "+ [{}] {}", index, action),
            Self::Removed { index, action } => write!(f, "- [{}] {}", index, action),
            Self::Replaced {
                index,
                before,
                after,
            } => write!(f, "~ [{}] {} -> {}", index, before, after),
            Self::LanguageChanged { before, after } => {
                write!(f, "~ language {} -> {}", before, after)
            }
            Self::FrameworkChanged { before, after } => write!(
                f,
                "~ framework {} -> {}",
                before.as_deref().unwrap_or("none"),
                after.as_deref().unwrap_or("none")
            ),
        }
    }
}

/// One entry of the append-only iteration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationEntry {
    /// Intent version produced by this change.
    pub version: u64,
    pub origin: DiffOrigin,
    pub change: IterationChange,
    pub recorded_at: DateTime<Utc>,
}

/// Apply one diff to an intent. See [`Intent::apply_iteration`].
pub fn iterate(
    intent: &mut Intent,
    diff: IterationDiff,
    origin: DiffOrigin,
) -> Result<IterationEntry, IterationError> {
    intent.apply_iteration(diff, origin).cloned()
}
