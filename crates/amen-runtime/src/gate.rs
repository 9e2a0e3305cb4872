//! The AMEN gate.
//!
//! Nothing runs before a human says AMEN. The gate checks the intent, asks a
//! [`Confirmer`] unless auto-approval is configured, and only then records
//! the approval. Every refusal leaves the intent unchanged.

use amen_core::{ApprovalConfig, ApprovalError, ApprovalOutcome, Intent};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Asks a human to confirm an approval.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// `Ok(false)` is a refusal; `Err` means the question could not be asked.
    async fn confirm(&self, intent: &Intent, approver: &str) -> anyhow::Result<bool>;
}

/// Confirmer with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmer(pub bool);

#[async_trait]
impl Confirmer for StaticConfirmer {
    async fn confirm(&self, _intent: &Intent, _approver: &str) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}

pub struct AmenGate {
    auto_approve: bool,
    confirmer: Arc<dyn Confirmer>,
}

impl AmenGate {
    pub fn new(confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            auto_approve: false,
            confirmer,
        }
    }

    pub fn from_config(config: &ApprovalConfig, confirmer: Arc<dyn Confirmer>) -> Self {
        Self::new(confirmer).with_auto_approve(config.auto_approve)
    }

    /// Skip the confirmation step. All other checks still apply.
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    pub async fn approve(
        &self,
        intent: &mut Intent,
        approver: &str,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        if let Some(existing) = intent.check_approvable()? {
            info!(intent_id = %intent.id(), approver = %existing.approver, "Intent already approved");
            return Ok(ApprovalOutcome::AlreadyApproved(existing.clone()));
        }

        let approver = approver.trim();
        if approver.is_empty() {
            return Err(ApprovalError::MissingApprover);
        }

        if !self.auto_approve {
            match self.confirmer.confirm(intent, approver).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(intent_id = %intent.id(), approver, "Approval declined");
                    return Err(ApprovalError::Declined {
                        approver: approver.to_string(),
                    });
                }
                Err(e) => return Err(ApprovalError::Confirmation(format!("{:#}", e))),
            }
        }

        let outcome = intent.approve(approver, Utc::now())?;
        info!(
            intent_id = %intent.id(),
            approver,
            fingerprint = %outcome.approval().fingerprint.short(),
            auto = self.auto_approve,
            "AMEN"
        );
        Ok(outcome)
    }
}
