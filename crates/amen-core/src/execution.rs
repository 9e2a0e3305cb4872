//! Live execution results.
//!
//! Runtime failures of individual actions are data, not errors: they are
//! recorded in [`ExecutionResult`] and move the intent to `Failed`.

use crate::action::{Action, HttpMethod};
use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable output of one successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionOutput {
    /// Route registered in the workspace route manifest.
    Route {
        method: HttpMethod,
        path: String,
        manifest: String,
    },
    /// DDL statement appended to the workspace migration file.
    Migration { statement: String, manifest: String },
    Shell {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Http { status: u16, body: String },
    File { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub index: usize,
    pub action: Action,
    pub output: ActionOutput,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend itself failed (spawn error, transport error, IO error).
    Backend,
    /// A process exited with a non-zero status.
    NonZeroExit,
    /// A remote call answered with a non-success status.
    HttpStatus,
    Timeout,
    Cancelled,
    /// Writing generated artifacts failed.
    Artifact,
    /// The container image build failed.
    Build,
    /// Starting the built container failed.
    Container,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend => write!(f, "backend error"),
            Self::NonZeroExit => write!(f, "non-zero exit"),
            Self::HttpStatus => write!(f, "http status"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Artifact => write!(f, "artifact error"),
            Self::Build => write!(f, "build error"),
            Self::Container => write!(f, "container error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Failing action, `None` for post-action steps and cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub fingerprint: Fingerprint,
    pub approved_by: String,
    pub outcome: ExecutionOutcome,
    /// Results of actions that completed, in execution order.
    pub succeeded: Vec<ActionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    /// Indices of actions never started (or interrupted by cancellation).
    pub not_attempted: Vec<usize>,
    /// Workspace-relative paths of artifacts written after the actions.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Image tag when a container build ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Short id of the container started from `image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Base URL of the running service followed by one URL per exposed route.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ExecutionOutcome::Succeeded
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Proof that the execution precondition held when execution started.
/// Issued by [`Intent::begin_execution`](crate::Intent::begin_execution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTicket {
    pub fingerprint: Fingerprint,
    pub approver: String,
    pub approved_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}
