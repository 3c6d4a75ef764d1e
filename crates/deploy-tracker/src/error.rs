//! Errors for the `Tracker` contract (spec 4.7).

use deploy_types::ExecutionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("execution {0} already exists")]
    Conflict(ExecutionId),

    #[error("execution {0} not found")]
    NotFound(ExecutionId),

    #[error("non-monotonic update rejected for execution {0}")]
    NonMonotonic(ExecutionId),

    #[error("internal tracker error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
