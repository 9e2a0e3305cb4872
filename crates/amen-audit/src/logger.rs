//! Audit logger implementation.

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{
    AuditStorage, ConsoleStorage, DualStorage, FileStorage, MemoryStorage, NullStorage,
};
use amen_core::{
    ActionResult, Approval, AuditConfig, ExecutionFailure, ExecutionResult, ExecutionTicket,
    Intent, IterationEntry, PlanResult,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Records lifecycle events for intents.
pub struct AuditLogger {
    enabled: bool,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a logger from configuration.
    ///
    /// A configured directory yields file storage, `stdout` echoes every
    /// event, and with neither the logger keeps nothing.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let storage: Arc<dyn AuditStorage> = match (config.log_file(), config.stdout) {
            (Some(path), true) => Arc::new(DualStorage::new(
                Box::new(FileStorage::new(path)?),
                Box::new(ConsoleStorage),
            )),
            (Some(path), false) => Arc::new(FileStorage::new(path)?),
            (None, true) => Arc::new(ConsoleStorage),
            (None, false) => Arc::new(NullStorage),
        };

        Ok(Self {
            enabled: true,
            storage,
        })
    }

    /// Create a logger with custom storage.
    pub fn with_storage(storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            enabled: true,
            storage,
        }
    }

    /// Create a disabled logger (no-op).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            storage: Arc::new(NullStorage),
        }
    }

    /// Create a logger that only prints to console.
    pub fn console_only() -> Self {
        Self::with_storage(Arc::new(ConsoleStorage))
    }

    /// Create a logger backed by memory, returning the storage for inspection.
    pub fn in_memory() -> (Self, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (Self::with_storage(storage.clone()), storage)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        debug!(
            event_type = %event.event_type,
            intent_id = %event.intent_id,
            "Recording audit event"
        );

        self.storage.store(&event).await
    }

    // =========================================================================
    // Lifecycle helpers
    // =========================================================================

    pub async fn log_intent_registered(&self, intent: &Intent) -> Result<(), AuditError> {
        let event = base(AuditEventType::IntentRegistered, intent)
            .fingerprint(intent.fingerprint().as_str())
            .meta(serde_json::json!({
                "goal": intent.goal(),
                "actions": intent.actions().len(),
            }))
            .build();
        self.log(event).await
    }

    pub async fn log_iteration(
        &self,
        intent: &Intent,
        entry: &IterationEntry,
    ) -> Result<(), AuditError> {
        let event = base(AuditEventType::IterationApplied, intent)
            .fingerprint(intent.fingerprint().as_str())
            .meta(serde_json::json!({
                "version": entry.version,
                "origin": entry.origin,
                "change": entry.change.to_string(),
            }))
            .build();
        self.log(event).await
    }

    pub async fn log_plan(&self, intent: &Intent, plan: &PlanResult) -> Result<(), AuditError> {
        let kind = if plan.blocking {
            AuditEventType::PlanBlocked
        } else {
            AuditEventType::PlanProduced
        };
        let event = base(kind, intent)
            .fingerprint(plan.fingerprint.as_str())
            .meta(serde_json::json!({
                "effects": plan.effects.len(),
                "errors": plan.error_count(),
                "warnings": plan.warning_count(),
            }))
            .build();
        self.log(event).await
    }

    pub async fn log_approval_granted(
        &self,
        intent: &Intent,
        approval: &Approval,
    ) -> Result<(), AuditError> {
        let event = base(AuditEventType::ApprovalGranted, intent)
            .actor(&approval.approver)
            .fingerprint(approval.fingerprint.as_str())
            .build();
        self.log(event).await
    }

    pub async fn log_approval_rejected(
        &self,
        intent: &Intent,
        approver: &str,
        reason: &str,
    ) -> Result<(), AuditError> {
        let event = base(AuditEventType::ApprovalRejected, intent)
            .actor(approver)
            .fingerprint(intent.fingerprint().as_str())
            .error(reason)
            .build();
        self.log(event).await
    }

    pub async fn log_execution_started(
        &self,
        intent: &Intent,
        ticket: &ExecutionTicket,
    ) -> Result<(), AuditError> {
        let event = base(AuditEventType::ExecutionStarted, intent)
            .actor(&ticket.approver)
            .fingerprint(ticket.fingerprint.as_str())
            .build();
        self.log(event).await
    }

    pub async fn log_action_succeeded(
        &self,
        intent: &Intent,
        result: &ActionResult,
    ) -> Result<(), AuditError> {
        let event = base(AuditEventType::ActionSucceeded, intent)
            .action(result.index, result.action.to_string())
            .duration_ms(result.duration_ms)
            .meta(serde_json::json!({ "attempts": result.attempts }))
            .build();
        self.log(event).await
    }

    pub async fn log_action_failed(
        &self,
        intent: &Intent,
        failure: &ExecutionFailure,
    ) -> Result<(), AuditError> {
        let mut builder = base(AuditEventType::ActionFailed, intent)
            .error(format!("{}: {}", failure.kind, failure.message))
            .meta(serde_json::json!({ "attempts": failure.attempts }));
        if let Some(index) = failure.index {
            let action = intent
                .actions()
                .get(index)
                .map(|a| a.to_string())
                .unwrap_or_default();
            builder = builder.action(index, action);
        }
        self.log(builder.build()).await
    }

    /// Log the terminal execution event (completed or failed).
    pub async fn log_execution_finished(
        &self,
        intent: &Intent,
        result: &ExecutionResult,
    ) -> Result<(), AuditError> {
        let kind = if result.is_success() {
            AuditEventType::ExecutionCompleted
        } else {
            AuditEventType::ExecutionFailed
        };
        let duration = u64::try_from(result.duration_ms()).unwrap_or(0);
        let mut builder = base(kind, intent)
            .actor(&result.approved_by)
            .fingerprint(result.fingerprint.as_str())
            .duration_ms(duration)
            .meta(serde_json::json!({
                "outcome": result.outcome,
                "succeeded": result.succeeded.len(),
                "not_attempted": result.not_attempted,
                "artifacts": result.artifacts,
                "image": result.image,
                "container_id": result.container_id,
                "endpoints": result.endpoints,
            }));
        if let Some(ref failure) = result.failure {
            builder = builder.error(format!("{}: {}", failure.kind, failure.message));
        }
        self.log(builder.build()).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(&filter).await
    }

    /// Full trail of one intent, oldest first.
    pub async fn history(&self, intent_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            intent_id: Some(intent_id.to_string()),
            ..Default::default()
        })
        .await
    }
}

fn base(kind: AuditEventType, intent: &Intent) -> crate::event::AuditEventBuilder {
    AuditEvent::builder(kind, intent.id(), intent.name()).state(intent.state().to_string())
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub intent_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub actor: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref id) = self.intent_id {
            if &event.intent_id != id {
                return false;
            }
        }
        if let Some(kind) = self.event_type {
            if event.event_type != kind {
                return false;
            }
        }
        if let Some(ref actor) = self.actor {
            if event.actor.as_ref() != Some(actor) {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.occurred_at > end {
                return false;
            }
        }
        true
    }

    /// Filter, then page.
    pub fn apply(&self, events: impl IntoIterator<Item = AuditEvent>) -> Vec<AuditEvent> {
        events
            .into_iter()
            .filter(|e| self.matches(e))
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
