//! Shared intents and the lifecycle facade.
//!
//! An [`IntentHandle`] serializes every lifecycle call on one intent; distinct
//! handles never contend. [`Engine`] runs planner, gate and executor against a
//! handle and writes the audit trail. Audit failures are logged and never
//! change the outcome of a lifecycle call.

use crate::executor::{ExecuteOptions, Executor};
use crate::gate::AmenGate;
use amen_audit::{AuditError, AuditLogger};
use amen_core::{
    ApprovalError, ApprovalOutcome, DiffOrigin, ExecutionError, ExecutionResult, Intent,
    IterationDiff, IterationEntry, IterationError, PlanRecordError, PlanResult, iterate,
};
use amen_planner::{Advisor, AppliedSuggestions, Planner, ProposedDiff, suggest_or_empty};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// An intent shared between tasks.
#[derive(Clone)]
pub struct IntentHandle {
    id: Arc<str>,
    inner: Arc<Mutex<Intent>>,
}

impl IntentHandle {
    pub fn new(intent: Intent) -> Self {
        Self {
            id: Arc::from(intent.id()),
            inner: Arc::new(Mutex::new(intent)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, Intent> {
        self.inner.lock().await
    }

    /// Copy of the intent as it is now.
    pub async fn snapshot(&self) -> Intent {
        self.inner.lock().await.clone()
    }
}

pub struct Engine {
    planner: Planner,
    gate: AmenGate,
    executor: Executor,
    audit: Arc<AuditLogger>,
}

impl Engine {
    pub fn new(gate: AmenGate, executor: Executor, audit: Arc<AuditLogger>) -> Self {
        Self {
            planner: Planner::new(),
            gate,
            executor,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Wrap `intent` in a handle and record its registration.
    pub async fn register(&self, intent: Intent) -> IntentHandle {
        record(self.audit.log_intent_registered(&intent).await);
        IntentHandle::new(intent)
    }

    pub async fn iterate(
        &self,
        handle: &IntentHandle,
        diff: IterationDiff,
        origin: DiffOrigin,
    ) -> Result<IterationEntry, IterationError> {
        let mut intent = handle.lock().await;
        let entry = iterate(&mut intent, diff, origin)?;
        record(self.audit.log_iteration(&intent, &entry).await);
        Ok(entry)
    }

    pub async fn plan(&self, handle: &IntentHandle) -> Result<PlanResult, PlanRecordError> {
        let mut intent = handle.lock().await;
        let plan = self.planner.plan_intent(&mut intent)?.clone();
        record(self.audit.log_plan(&intent, &plan).await);
        Ok(plan)
    }

    /// Proposals from `advisor`; a failing advisor yields none.
    pub async fn suggest(
        &self,
        handle: &IntentHandle,
        advisor: &dyn Advisor,
        focus: Option<&str>,
    ) -> Vec<ProposedDiff> {
        let intent = handle.snapshot().await;
        suggest_or_empty(advisor, &intent, focus).await
    }

    /// Apply proposals as advisory iterations under one lock.
    pub async fn apply_suggestions(
        &self,
        handle: &IntentHandle,
        proposals: Vec<ProposedDiff>,
    ) -> AppliedSuggestions {
        let mut intent = handle.lock().await;
        let outcome = amen_planner::apply_suggestions(&mut intent, proposals);
        for entry in &outcome.applied {
            record(self.audit.log_iteration(&intent, entry).await);
        }
        outcome
    }

    pub async fn approve(
        &self,
        handle: &IntentHandle,
        approver: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        let mut intent = handle.lock().await;
        match self.gate.approve(&mut intent, approver).await {
            Ok(outcome) => {
                if outcome.is_new() {
                    record(
                        self.audit
                            .log_approval_granted(&intent, outcome.approval())
                            .await,
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                record(
                    self.audit
                        .log_approval_rejected(&intent, approver, &e.to_string())
                        .await,
                );
                Err(e)
            }
        }
    }

    /// Execute while holding the intent lock, so no iteration can interleave.
    pub async fn execute(
        &self,
        handle: &IntentHandle,
        options: &ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut intent = handle.lock().await;
        if let Ok(ticket) = intent.begin_execution() {
            record(self.audit.log_execution_started(&intent, &ticket).await);
        }

        let result = self.executor.execute(&mut intent, options).await?;

        for action in &result.succeeded {
            record(self.audit.log_action_succeeded(&intent, action).await);
        }
        if let Some(ref failure) = result.failure {
            if failure.index.is_some() {
                record(self.audit.log_action_failed(&intent, failure).await);
            }
        }
        record(self.audit.log_execution_finished(&intent, &result).await);
        Ok(result)
    }
}

fn record(result: Result<(), AuditError>) {
    if let Err(e) = result {
        warn!(error = %e, "Failed to record audit event");
    }
}
