//! Approval records.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A granted approval, bound to the fingerprint that was planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub fingerprint: Fingerprint,
    pub approver: String,
    pub approved_at: DateTime<Utc>,
}

/// Successful result of an approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// A new approval was recorded.
    Approved(Approval),
    /// The intent was already approved for the same content; nothing changed.
    AlreadyApproved(Approval),
}

impl ApprovalOutcome {
    pub fn approval(&self) -> &Approval {
        match self {
            Self::Approved(a) | Self::AlreadyApproved(a) => a,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Approved(_))
    }
}
