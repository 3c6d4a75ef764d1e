//! Shared single-node update/rollback sequence used by every strategy:
//! flip to `Updating` via the registry, invoke the driver, record the
//! outcome. This is the only place a node's `currentModuleVersion` changes
//! (spec 8, invariant 6).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use deploy_metrics::AvailabilityCheck;
use deploy_registry::Registry;
use deploy_types::{ClusterId, Module, Node, NodeId};
use tracing::warn;

use crate::driver::NodeDriver;

/// Adapts a `Registry` into a `deploy_metrics::AvailabilityCheck` so a
/// stability wait re-verifies Availability every iteration instead of
/// trusting a one-time snapshot taken before the hold window started
/// (spec 4.4: "all of S are Available" must hold *throughout* the window).
pub struct RegistryAvailability<'a> {
    pub registry: &'a Arc<dyn Registry>,
    pub cluster_id: &'a ClusterId,
    pub heartbeat_grace: chrono::Duration,
}

#[async_trait]
impl AvailabilityCheck for RegistryAvailability<'_> {
    async fn all_available(&self, node_ids: &[NodeId]) -> bool {
        let Ok(available) = self.registry.available(self.cluster_id, self.heartbeat_grace).await else {
            return false;
        };
        let available_ids: HashSet<&NodeId> = available.iter().map(|n| &n.id).collect();
        node_ids.iter().all(|id| available_ids.contains(id))
    }
}

/// Applies `module` to `node`, returning `true` on success. Failures are
/// recorded on the registry as `Unhealthy` rather than propagated, so
/// callers can keep batching while tracking which nodes failed.
pub async fn update_node(
    registry: &Arc<dyn Registry>,
    driver: &Arc<dyn NodeDriver>,
    node: &Node,
    module: &Module,
) -> bool {
    let updating = match registry.begin_update(&node.id).await {
        Ok(n) => n,
        Err(e) => {
            warn!(node_id = %node.id, error = %e, "begin_update failed");
            return false;
        }
    };

    match driver.apply_module(&updating, module).await {
        Ok(()) => {
            if let Err(e) = registry
                .complete_update(&node.id, Some(module.version.clone()), true)
                .await
            {
                warn!(node_id = %node.id, error = %e, "complete_update failed after successful apply");
                return false;
            }
            true
        }
        Err(e) => {
            warn!(node_id = %node.id, error = %e, "node driver apply failed");
            let _ = registry.complete_update(&node.id, None, false).await;
            false
        }
    }
}

/// Reverts `node` to `prior_version`, best-effort. Returns `true` on
/// success; on failure the node is left `Unhealthy` and its id is reported
/// to the caller for `RollbackOutcome::PartialFailure`.
pub async fn rollback_node(
    registry: &Arc<dyn Registry>,
    driver: &Arc<dyn NodeDriver>,
    node: &Node,
    prior_version: &semver::Version,
) -> Result<(), NodeId> {
    let updating = match registry.begin_update(&node.id).await {
        Ok(n) => n,
        Err(e) => {
            warn!(node_id = %node.id, error = %e, "begin_update failed during rollback");
            return Err(node.id.clone());
        }
    };

    match driver.rollback_module(&updating, Some(prior_version.clone())).await {
        Ok(()) => {
            let _ = registry
                .complete_update(&node.id, Some(prior_version.clone()), true)
                .await;
            Ok(())
        }
        Err(e) => {
            warn!(node_id = %node.id, error = %e, "node driver rollback failed");
            let _ = registry.complete_update(&node.id, None, false).await;
            Err(node.id.clone())
        }
    }
}
