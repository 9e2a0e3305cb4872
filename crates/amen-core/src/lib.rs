//! Core types for the amen intent lifecycle.
//!
//! An intent moves through a fixed lifecycle:
//!
//! ```text
//! parse -> Draft -> plan -> Planned -> AMEN -> Approved -> execute -> Executed | Failed
//!            ^                 |                  |
//!            +---- iterate ----+------------------+
//! ```
//!
//! This crate owns the data and the rules, not the side effects:
//!
//! - [`action`]: the closed set of verbs and their validated arguments
//! - [`intent`]: the aggregate root and its controlled mutators
//! - [`lifecycle`]: the transition table every mutator goes through
//! - [`iteration`]: diffs and the append-only history
//! - [`plan`] / [`execution`]: result types produced by the planner and executor
//! - [`config`]: YAML engine configuration

pub mod action;
pub mod approval;
pub mod config;
pub mod error;
pub mod execution;
pub mod fingerprint;
pub mod intent;
pub mod iteration;
pub mod lifecycle;
pub mod plan;

pub use action::{
    Action, ActionError, ActionErrorKind, ColumnType, EndpointPath, HttpMethod, Identifier,
    Verb, parse_action, parse_actions,
};
pub use approval::{Approval, ApprovalOutcome};
pub use config::{
    AdvisorConfig, ApprovalConfig, AuditConfig, ConfigError, EngineConfig, ExecutorConfig,
    LoggingConfig, RetryConfig,
};
pub use error::{ApprovalError, ExecutionError, IterationError, PlanRecordError};
pub use execution::{
    ActionOutput, ActionResult, ExecutionFailure, ExecutionOutcome, ExecutionResult,
    ExecutionTicket, FailureKind,
};
pub use fingerprint::Fingerprint;
pub use intent::{
    Environment, ExecutionMode, Implementation, Intent, IntentDraft, RuntimeKind,
};
pub use iteration::{DiffOrigin, IterationChange, IterationDiff, IterationEntry, iterate};
pub use lifecycle::{LifecycleEvent, LifecycleState, TransitionError, next_state};
pub use plan::{
    BuildDescriptor, Diagnostic, GeneratedCode, GeneratedFile, PlanResult, PlannedEffect,
    ResourceEstimate, Severity,
};
