//! Errors for the public orchestrator entry point (spec 4.8, 7).

use deploy_approval::ApprovalError;
use deploy_pipeline::PipelineError;
use deploy_tracker::TrackerError;
use deploy_types::{DeployErrorKind, ExecutionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("execution {0} not found")]
    NotFound(ExecutionId),

    /// A concurrent execution already holds the `(environment, module)`
    /// serialization key and `queueWait` elapsed before it released it
    /// (spec 4.8).
    #[error("a deployment for this environment and module is already in progress")]
    AlreadyInProgress,

    #[error("idempotency key already bound to a different execution")]
    IdempotencyConflict,

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("internal orchestrator error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            OrchestratorError::NotFound(_) => DeployErrorKind::Validation,
            OrchestratorError::AlreadyInProgress => DeployErrorKind::Conflict,
            OrchestratorError::IdempotencyConflict => DeployErrorKind::Conflict,
            OrchestratorError::Approval(_) => DeployErrorKind::ApprovalDenied,
            OrchestratorError::Tracker(_) => DeployErrorKind::Internal,
            OrchestratorError::Pipeline(e) => e.kind(),
            OrchestratorError::Internal(_) => DeployErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
