//! The stable, terse error kinds every terminal execution carries (spec 7).
//! Individual crates define their own `thiserror` enums for their local
//! concerns and map into this shared kind at the orchestrator boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DeployErrorKind {
    #[error("validation")]
    Validation,
    #[error("signature_rejected")]
    SignatureRejected,
    #[error("preparation")]
    Preparation,
    #[error("approval_denied")]
    ApprovalDenied,
    #[error("approval_timeout")]
    ApprovalTimeout,
    #[error("health_degradation")]
    HealthDegradation,
    #[error("node_driver_error")]
    NodeDriverError,
    #[error("cancelled")]
    Cancelled,
    #[error("conflict")]
    Conflict,
    #[error("internal")]
    Internal,
}

impl DeployErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, DeployErrorKind::Preparation)
    }
}
