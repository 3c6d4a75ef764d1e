//! The pending-approval record and its possible outcomes.

use chrono::{DateTime, Utc};
use deploy_types::{ApprovalDecision, ApprovalHandle, Environment, ExecutionId};

#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub handle: ApprovalHandle,
    pub execution_id: ExecutionId,
    pub environment: Environment,
    pub requester_id: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Pending,
    Decided(ApprovalDecision),
    TimedOut,
}

impl ApprovalOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalOutcome::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(
            self,
            ApprovalOutcome::Decided(d) if d.decision == deploy_types::ApprovalDecisionKind::Approve
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ApprovalState {
    pub request: ApprovalRequest,
    pub outcome: ApprovalOutcome,
}
