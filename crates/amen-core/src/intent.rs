//! The intent aggregate.
//!
//! An [`Intent`] is only mutated through the methods below, and each of them
//! routes its state change through [`next_state`]. Every method validates
//! first and mutates second, so an `Err` leaves the intent untouched.

use crate::action::Action;
use crate::approval::{Approval, ApprovalOutcome};
use crate::error::{ApprovalError, ExecutionError, IterationError, PlanRecordError};
use crate::execution::{ExecutionResult, ExecutionTicket};
use crate::fingerprint::Fingerprint;
use crate::iteration::{DiffOrigin, IterationChange, IterationDiff, IterationEntry};
use crate::lifecycle::{LifecycleEvent, LifecycleState, next_state};
use crate::plan::PlanResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_BASE_IMAGE: &str = "python:3.12-slim";
pub const DEFAULT_LANGUAGE: &str = "python";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    Docker,
    Kubernetes,
    Local,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::Local => "local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "docker" => Some(Self::Docker),
            "kubernetes" | "k8s" => Some(Self::Kubernetes),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Whether this runtime is packaged as a container image.
    pub fn uses_container(&self) -> bool {
        matches!(self, Self::Docker | Self::Kubernetes)
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[default]
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "live", alias = "transactional")]
    Live,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dry-run" | "dry_run" | "dryrun" => Some(Self::DryRun),
            "live" | "transactional" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub runtime: RuntimeKind,
    #[serde(default = "default_base_image")]
    pub base_image: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            runtime: RuntimeKind::default(),
            base_image: default_base_image(),
            ports: Vec::new(),
            services: Vec::new(),
            volumes: Vec::new(),
            env_vars: BTreeMap::new(),
        }
    }
}

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub language: String,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            framework: None,
            actions: Vec::new(),
        }
    }
}

/// Everything needed to create a new Draft intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentDraft {
    pub name: String,
    pub goal: String,
    pub description: Option<String>,
    pub environment: Environment,
    pub implementation: Implementation,
    pub execution_mode: ExecutionMode,
}

impl IntentDraft {
    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            description: None,
            environment: Environment::default(),
            implementation: Implementation::default(),
            execution_mode: ExecutionMode::default(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.implementation.actions = actions;
        self
    }
}

/// Aggregate root of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    id: String,
    name: String,
    goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    environment: Environment,
    implementation: Implementation,
    #[serde(default)]
    execution_mode: ExecutionMode,
    state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan_fingerprint: Option<Fingerprint>,
    #[serde(default)]
    iteration_history: Vec<IterationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approval: Option<Approval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_plan: Option<PlanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_execution: Option<ExecutionResult>,
}

impl Intent {
    /// Create a Draft intent with a fresh id.
    pub fn draft(draft: IntentDraft) -> Self {
        let now = Utc::now();
        let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self {
            id,
            name: draft.name,
            goal: draft.goal,
            description: draft.description,
            created_at: now,
            updated_at: now,
            version: 1,
            environment: draft.environment,
            implementation: draft.implementation,
            execution_mode: draft.execution_mode,
            state: LifecycleState::Draft,
            plan_fingerprint: None,
            iteration_history: Vec::new(),
            approval: None,
            last_plan: None,
            last_execution: None,
        }
    }

    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self::draft(IntentDraft::new(name, goal))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub fn actions(&self) -> &[Action] {
        &self.implementation.actions
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn plan_fingerprint(&self) -> Option<&Fingerprint> {
        self.plan_fingerprint.as_ref()
    }

    pub fn iteration_history(&self) -> &[IterationEntry] {
        &self.iteration_history
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.approval.as_ref()
    }

    pub fn last_plan(&self) -> Option<&PlanResult> {
        self.last_plan.as_ref()
    }

    pub fn last_execution(&self) -> Option<&ExecutionResult> {
        self.last_execution.as_ref()
    }

    /// Fingerprint of the current environment and implementation.
    ///
    /// Name, goal, description and execution mode are not part of it.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.canonical_content())
    }

    /// Whether the last successful plan still describes the current content.
    pub fn is_plan_current(&self) -> bool {
        self.plan_fingerprint.as_ref() == Some(&self.fingerprint())
    }

    fn canonical_content(&self) -> String {
        let env = &self.environment;
        let imp = &self.implementation;

        let mut lines = vec![
            format!("runtime={}", env.runtime),
            format!("base_image={:?}", env.base_image),
            format!("ports={:?}", env.ports),
            format!("services={:?}", env.services),
            format!("volumes={:?}", env.volumes),
        ];
        for (key, value) in &env.env_vars {
            lines.push(format!("env[{:?}]={:?}", key, value));
        }
        lines.push(format!("language={:?}", imp.language));
        lines.push(format!("framework={:?}", imp.framework));
        for (index, action) in imp.actions.iter().enumerate() {
            lines.push(format!("action[{}]={:?}", index, action.to_string()));
        }
        lines.join("\n")
    }

    /// Apply an iteration diff: append history, bump the version, clear any
    /// approval and return to Draft.
    pub fn apply_iteration(
        &mut self,
        diff: IterationDiff,
        origin: DiffOrigin,
    ) -> Result<&IterationEntry, IterationError> {
        let next = next_state(self.state, LifecycleEvent::Iterated)?;
        let len = self.implementation.actions.len();
        let in_range = |index: usize| {
            if index < len {
                Ok(index)
            } else {
                Err(IterationError::IndexOutOfRange { index, len })
            }
        };

        let change = match diff {
            IterationDiff::AddAction(action) => {
                self.implementation.actions.push(action.clone());
                IterationChange::Added { index: len, action }
            }
            IterationDiff::RemoveAction(index) => {
                let index = in_range(index)?;
                let action = self.implementation.actions.remove(index);
                IterationChange::Removed { index, action }
            }
            IterationDiff::ReplaceAction(index, after) => {
                let index = in_range(index)?;
                let before =
                    std::mem::replace(&mut self.implementation.actions[index], after.clone());
                IterationChange::Replaced {
                    index,
                    before,
                    after,
                }
            }
            IterationDiff::SetLanguage(after) => {
                let before = std::mem::replace(&mut self.implementation.language, after.clone());
                IterationChange::LanguageChanged { before, after }
            }
            IterationDiff::SetFramework(after) => {
                let before = std::mem::replace(&mut self.implementation.framework, after.clone());
                IterationChange::FrameworkChanged { before, after }
            }
        };

        self.version += 1;
        self.iteration_history.push(IterationEntry {
            version: self.version,
            origin,
            change,
            recorded_at: Utc::now(),
        });
        self.enter(next, LifecycleEvent::Iterated);

        let last = self.iteration_history.len() - 1;
        Ok(&self.iteration_history[last])
    }

    /// Record a plan produced for the current content.
    ///
    /// A plan without Error diagnostics moves the intent to Planned and pins
    /// `plan_fingerprint`; a blocking one moves it to Draft. The plan is
    /// retained either way.
    pub fn record_plan(&mut self, plan: PlanResult) -> Result<&PlanResult, PlanRecordError> {
        let current = self.fingerprint();
        if plan.fingerprint != current {
            return Err(PlanRecordError::Stale {
                planned: plan.fingerprint,
                current,
            });
        }

        let event = if plan.has_errors() {
            LifecycleEvent::PlanBlocked
        } else {
            LifecycleEvent::PlanAccepted
        };
        let next = next_state(self.state, event)?;

        if event == LifecycleEvent::PlanAccepted {
            self.plan_fingerprint = Some(current);
        }
        self.enter(next, event);
        Ok(&*self.last_plan.insert(plan))
    }

    /// Run the approval checks without changing anything.
    ///
    /// Checks, in order: already approved for the same content, blocking plan
    /// for the current content, Planned state. `Ok(Some(_))` is the existing
    /// approval; `Ok(None)` means a new approval may be recorded.
    pub fn check_approvable(&self) -> Result<Option<&Approval>, ApprovalError> {
        let current = self.fingerprint();

        if self.state == LifecycleState::Approved {
            if let Some(approval) = &self.approval {
                if approval.fingerprint == current {
                    return Ok(Some(approval));
                }
            }
        }

        if let Some(plan) = &self.last_plan {
            if plan.fingerprint == current && plan.has_errors() {
                return Err(ApprovalError::BlockingDiagnostics {
                    errors: plan.error_count(),
                });
            }
        }

        if self.state != LifecycleState::Planned || !self.is_plan_current() {
            return Err(ApprovalError::NotPlanned { state: self.state });
        }

        Ok(None)
    }

    /// Grant approval for the planned content. Approving unchanged content
    /// twice is a no-op.
    pub fn approve(
        &mut self,
        approver: &str,
        at: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        if let Some(existing) = self.check_approvable()? {
            return Ok(ApprovalOutcome::AlreadyApproved(existing.clone()));
        }

        let approver = approver.trim();
        if approver.is_empty() {
            return Err(ApprovalError::MissingApprover);
        }

        let next = next_state(self.state, LifecycleEvent::Approved)?;
        let approval = Approval {
            fingerprint: self.fingerprint(),
            approver: approver.to_string(),
            approved_at: at,
        };
        self.approval = Some(approval.clone());
        self.enter(next, LifecycleEvent::Approved);
        Ok(ApprovalOutcome::Approved(approval))
    }

    /// Check the execution precondition. Does not change state.
    pub fn begin_execution(&self) -> Result<ExecutionTicket, ExecutionError> {
        let approval = match (&self.state, &self.approval) {
            (LifecycleState::Approved, Some(approval)) => approval,
            _ => return Err(ExecutionError::NotApproved { state: self.state }),
        };

        let current = self.fingerprint();
        if approval.fingerprint != current {
            return Err(ExecutionError::StaleApproval {
                approved: approval.fingerprint.clone(),
                current,
            });
        }

        Ok(ExecutionTicket {
            fingerprint: current,
            approver: approval.approver.clone(),
            approved_at: approval.approved_at,
            started_at: Utc::now(),
        })
    }

    /// Record the result of an execution started with `ticket`: Executed on
    /// success, Failed otherwise.
    pub fn finish_execution(
        &mut self,
        ticket: ExecutionTicket,
        result: ExecutionResult,
    ) -> Result<&ExecutionResult, ExecutionError> {
        if self.state != LifecycleState::Approved {
            return Err(ExecutionError::NotApproved { state: self.state });
        }
        let current = self.fingerprint();
        if ticket.fingerprint != current {
            return Err(ExecutionError::StaleApproval {
                approved: ticket.fingerprint,
                current,
            });
        }

        let event = if result.is_success() {
            LifecycleEvent::ExecutionSucceeded
        } else {
            LifecycleEvent::ExecutionFailed
        };
        let next = next_state(self.state, event)?;
        self.enter(next, event);
        Ok(&*self.last_execution.insert(result))
    }

    /// Single place where state and approval change together.
    fn enter(&mut self, next: LifecycleState, event: LifecycleEvent) {
        if next != LifecycleState::Approved {
            self.approval = None;
        }
        info!(
            intent_id = %self.id,
            from = %self.state,
            to = %next,
            event = %event,
            "Lifecycle transition"
        );
        self.state = next;
        self.updated_at = Utc::now();
    }
}
