//! Approval decision context shared between the pipeline and `deploy-approval`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecisionKind {
    Approve,
    Reject,
}

/// A resolved approval or rejection, separation-of-duties enforced at the
/// point of resolution (spec 4.6): `approverId` MUST NOT equal `requesterId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub decision: ApprovalDecisionKind,
    pub approver_id: String,
    pub decided_at: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn approve(approver_id: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecisionKind::Approve,
            approver_id: approver_id.into(),
            decided_at: Utc::now(),
            reason: None,
        }
    }

    pub fn reject(approver_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecisionKind::Reject,
            approver_id: approver_id.into(),
            decided_at: Utc::now(),
            reason: Some(reason.into()),
        }
    }
}
