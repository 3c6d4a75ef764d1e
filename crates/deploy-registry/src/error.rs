//! Registry error types

use deploy_types::{ClusterId, NodeId};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no cluster configured for environment {0}")]
    ClusterNotFound(String),

    #[error("cluster not found: {0}")]
    ClusterIdNotFound(ClusterId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node {0} is not in a state that allows this transition")]
    InvalidNodeState(NodeId),

    #[error("internal registry error: {0}")]
    Internal(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
