//! # amen-audit
//!
//! Audit trail for the intent lifecycle.
//!
//! Every registration, iteration, plan, approval decision and execution step
//! can be recorded as an [`AuditEvent`]. Events are written as JSON Lines to
//! a file, echoed as human-readable lines to stdout, or kept in memory.
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `IntentRegistered` | Intent created or parsed |
//! | `IterationApplied` | A diff changed the intent |
//! | `PlanProduced` | Plan recorded, intent is Planned |
//! | `PlanBlocked` | Plan had Error diagnostics, intent is Draft |
//! | `ApprovalGranted` | AMEN gate passed |
//! | `ApprovalRejected` | AMEN gate refused |
//! | `ExecutionStarted` | Executor accepted the approved intent |
//! | `ActionSucceeded` / `ActionFailed` | Per-action outcome |
//! | `ExecutionCompleted` / `ExecutionFailed` | Terminal outcome |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use amen_audit::AuditLogger;
//! use amen_core::{AuditConfig, Intent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(&AuditConfig::default())?;
//! let intent = Intent::new("users", "expose a user api");
//! logger.log_intent_registered(&intent).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditFilter, AuditLogger};
pub use storage::{
    AuditStorage, ConsoleStorage, DualStorage, FileStorage, MemoryStorage, NullStorage,
};
