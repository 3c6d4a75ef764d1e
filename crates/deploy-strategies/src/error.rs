//! Errors for strategy execution. `NodeDriverError` maps 1:1 onto spec 4.9's
//! `NodeDriverError` kind; `HealthDegradation` onto MetricsProbe rejections.

use deploy_registry::RegistryError;
use deploy_types::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("node driver error on {node_id}: {reason}")]
    NodeDriver { node_id: NodeId, reason: String },

    #[error("health degradation: {0}")]
    HealthDegradation(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("internal strategy error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StrategyError>;
