//! Errors for the `ApprovalGate` contract (spec 4.6).

use deploy_types::ApprovalHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request {0} not found")]
    NotFound(ApprovalHandle),

    #[error("approval request {0} already resolved")]
    AlreadyResolved(ApprovalHandle),

    #[error("approver {approver_id} may not resolve their own request (requester {requester_id})")]
    SeparationOfDuties {
        requester_id: String,
        approver_id: String,
    },

    #[error("internal approval gate error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
