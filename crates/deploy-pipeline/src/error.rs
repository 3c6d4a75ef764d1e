//! Pipeline errors (spec 7): each variant maps onto exactly one of the ten
//! stable error kinds in `deploy_types::DeployErrorKind`.

use deploy_types::{DeployErrorKind, ExecutionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("signature check failed: {0}")]
    SignatureRejected(String),

    #[error("artifact preparation failed: {0}")]
    Preparation(String),

    #[error("approval denied: {0}")]
    ApprovalDenied(String),

    #[error("approval timed out")]
    ApprovalTimeout,

    #[error("health degraded during rollout: {0}")]
    HealthDegradation(String),

    #[error("node driver error: {0}")]
    NodeDriverError(String),

    #[error("execution {0} cancelled")]
    Cancelled(ExecutionId),

    #[error("execution {0} already in progress")]
    Conflict(ExecutionId),

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The stable kind this error surfaces to clients (spec 7).
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            PipelineError::Validation(_) => DeployErrorKind::Validation,
            PipelineError::SignatureRejected(_) => DeployErrorKind::SignatureRejected,
            PipelineError::Preparation(_) => DeployErrorKind::Preparation,
            PipelineError::ApprovalDenied(_) => DeployErrorKind::ApprovalDenied,
            PipelineError::ApprovalTimeout => DeployErrorKind::ApprovalTimeout,
            PipelineError::HealthDegradation(_) => DeployErrorKind::HealthDegradation,
            PipelineError::NodeDriverError(_) => DeployErrorKind::NodeDriverError,
            PipelineError::Cancelled(_) => DeployErrorKind::Cancelled,
            PipelineError::Conflict(_) => DeployErrorKind::Conflict,
            PipelineError::Internal(_) => DeployErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
