//! Error types for intent lifecycle operations.
//!
//! Every error here is returned before any mutation: a failed call leaves the
//! intent exactly as it was.

use crate::fingerprint::Fingerprint;
use crate::lifecycle::{LifecycleState, TransitionError};
use thiserror::Error;

/// Errors from applying an iteration diff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IterationError {
    #[error("action index {index} out of range (intent has {len} actions)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Errors from recording a plan on an intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanRecordError {
    #[error("plan was produced for {planned} but the intent is now {current}")]
    Stale {
        planned: Fingerprint,
        current: Fingerprint,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Errors from the AMEN gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("intent must be planned before approval (current state: {state})")]
    NotPlanned { state: LifecycleState },

    #[error("plan has {errors} blocking error diagnostic(s)")]
    BlockingDiagnostics { errors: usize },

    #[error("approval declined by {approver}")]
    Declined { approver: String },

    #[error("approver must not be empty")]
    MissingApprover,

    #[error("confirmation failed: {0}")]
    Confirmation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Execution precondition failures. Action failures are reported in
/// [`ExecutionResult`](crate::ExecutionResult) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("intent is not approved (current state: {state})")]
    NotApproved { state: LifecycleState },

    #[error("approval for {approved} is stale, intent is now {current}")]
    StaleApproval {
        approved: Fingerprint,
        current: Fingerprint,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
