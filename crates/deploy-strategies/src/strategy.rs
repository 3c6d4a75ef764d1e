//! The `Strategy` contract (spec 4.5): every rollout strategy implements
//! the same `apply`/`rollback` interface regardless of algorithm.

use async_trait::async_trait;
use deploy_types::{Cluster, Module, NodeId};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// `touched` is every node this strategy attempted to mutate, in case a
    /// later stage (e.g. PostValidate) fails and the caller needs to roll
    /// back a rollout that itself reported success.
    Succeeded { touched: Vec<NodeId> },
    Failed { reason: String, touched: Vec<NodeId> },
    Cancelled { touched: Vec<NodeId> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RollbackOutcome {
    Succeeded,
    PartialFailure(Vec<NodeId>),
}

/// Receives progress fractions/messages during a strategy run. Delivery
/// must be non-blocking to the strategy (spec 6); implementations should
/// not perform slow I/O inline.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, fraction: f64, message: &str);
}

/// A `ProgressSink` that drops every update; used where no caller cares.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _fraction: f64, _message: &str) {}
}

#[async_trait]
pub trait Strategy: Send + Sync {
    async fn apply(
        &self,
        cluster: &Cluster,
        target_module: &Module,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ApplyOutcome;

    /// Reverts exactly `touched` (the node set a prior `apply` call reported,
    /// via `ApplyOutcome`) rather than the whole cluster — nodes the
    /// rollout never reached must not be driven through a rollback cycle.
    async fn rollback(
        &self,
        cluster: &Cluster,
        touched: &[NodeId],
        prior_version: &semver::Version,
        progress: &dyn ProgressSink,
    ) -> RollbackOutcome;

    fn name(&self) -> &'static str;
}
