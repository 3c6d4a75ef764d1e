//! Errors for the `MetricsSource`/`MetricsProbe` contract (spec 4.4).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// Retryable: the caller's strategy should back off and resample.
    #[error("transient metrics error for node: {0}")]
    Transient(String),

    /// The node could not be reached at all; strategies treat this as
    /// equivalent to Unhealthy rather than retrying indefinitely.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    #[error("internal metrics error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
