//! Audit event types.
//!
//! One event per lifecycle step. Core fields are always the intent id and
//! name; the rest is filled in depending on the event type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Authoring =====
    /// Intent parsed or created and registered.
    IntentRegistered,
    /// Iteration diff applied.
    IterationApplied,

    // ===== Planning =====
    /// Plan recorded without Error diagnostics.
    PlanProduced,
    /// Plan recorded with Error diagnostics.
    PlanBlocked,

    // ===== AMEN gate =====
    ApprovalGranted,
    ApprovalRejected,

    // ===== Execution =====
    ExecutionStarted,
    ActionSucceeded,
    ActionFailed,
    ExecutionCompleted,
    ExecutionFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntentRegistered => write!(f, "INTENT_REGISTERED"),
            Self::IterationApplied => write!(f, "ITERATION_APPLIED"),
            Self::PlanProduced => write!(f, "PLAN_PRODUCED"),
            Self::PlanBlocked => write!(f, "PLAN_BLOCKED"),
            Self::ApprovalGranted => write!(f, "APPROVAL_GRANTED"),
            Self::ApprovalRejected => write!(f, "APPROVAL_REJECTED"),
            Self::ExecutionStarted => write!(f, "EXECUTION_STARTED"),
            Self::ActionSucceeded => write!(f, "ACTION_SUCCEEDED"),
            Self::ActionFailed => write!(f, "ACTION_FAILED"),
            Self::ExecutionCompleted => write!(f, "EXECUTION_COMPLETED"),
            Self::ExecutionFailed => write!(f, "EXECUTION_FAILED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    pub event_type: AuditEventType,

    pub intent_id: String,

    pub intent_name: String,

    /// Who triggered the event (approver, operator).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Content fingerprint the event refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Lifecycle state after the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,

    /// Canonical action text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        intent_id: impl Into<String>,
        intent_name: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            intent_id: intent_id.into(),
            intent_name: intent_name.into(),
            actor: None,
            fingerprint: None,
            state: None,
            action_index: None,
            action: None,
            duration_ms: None,
            error: None,
            meta: serde_json::Value::Null,
        }
    }

    pub fn builder(
        event_type: AuditEventType,
        intent_id: impl Into<String>,
        intent_name: impl Into<String>,
    ) -> AuditEventBuilder {
        AuditEventBuilder {
            event: Self::new(event_type, intent_id, intent_name),
        }
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE intent=<id> name=<name> [key=value...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} intent={} name={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.intent_id,
            self.intent_name,
        );

        if let Some(ref state) = self.state {
            line.push_str(&format!(" state={}", state));
        }
        if let Some(ref actor) = self.actor {
            line.push_str(&format!(" actor={}", actor));
        }
        if let Some(ref fingerprint) = self.fingerprint {
            line.push_str(&format!(" fingerprint={}", fingerprint));
        }
        if let Some(index) = self.action_index {
            line.push_str(&format!(" index={}", index));
        }
        if let Some(ref action) = self.action {
            let preview: String = action.chars().take(100).collect();
            line.push_str(&format!(" action=\"{}\"", preview.replace('"', "'")));
        }
        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }
        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

/// Builder for audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.event.actor = Some(actor.into());
        self
    }

    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.event.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.event.state = Some(state.into());
        self
    }

    pub fn action(mut self, index: usize, action: impl Into<String>) -> Self {
        self.event.action_index = Some(index);
        self.event.action = Some(action.into());
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let event = AuditEvent::builder(AuditEventType::ActionFailed, "ab12cd34", "users")
            .action(2, "shell.exec false")
            .error("exit status 1")
            .duration_ms(12)
            .build();

        assert_eq!(event.event_type, AuditEventType::ActionFailed);
        assert_eq!(event.action_index, Some(2));
        assert_eq!(event.action.as_deref(), Some("shell.exec false"));
        assert_eq!(event.actor, None);
    }

    #[test]
    fn log_line_lists_present_fields() {
        let event = AuditEvent::builder(AuditEventType::ApprovalGranted, "ab12cd34", "users")
            .actor("alice")
            .fingerprint("sha256:abc")
            .state("approved")
            .build();

        let line = event.to_log_line();
        assert!(line.contains("APPROVAL_GRANTED intent=ab12cd34 name=users"));
        assert!(line.contains("actor=alice"));
        assert!(line.contains("fingerprint=sha256:abc"));
        assert!(!line.contains("error="));
    }

    #[test]
    fn json_skips_empty_fields() {
        let event = AuditEvent::new(AuditEventType::IntentRegistered, "id", "name");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "intent_registered");
        assert!(json.get("actor").is_none());
        assert!(json.get("meta").is_none());
    }
}
