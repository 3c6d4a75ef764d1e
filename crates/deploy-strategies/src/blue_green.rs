//! Blue-Green strategy (spec 4.5.3): deploy to a parallel green set, verify
//! readiness, then atomically flip `activeColor`. The core treats
//! provisioning the green set as an abstract call on `NodeDriver`/
//! `Registry`; here green is simply the cluster's non-active-color nodes,
//! already registered by the host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_registry::Registry;
use deploy_types::{ActiveColor, Cluster, Module, NodeId};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::driver::NodeDriver;
use crate::node_update::{rollback_node, update_node};
use crate::strategy::{ApplyOutcome, ProgressSink, RollbackOutcome, Strategy};

pub struct BlueGreenStrategy {
    registry: Arc<dyn Registry>,
    driver: Arc<dyn NodeDriver>,
    readiness_fraction: f64,
    hold_window: Duration,
}

impl BlueGreenStrategy {
    pub fn new(
        registry: Arc<dyn Registry>,
        driver: Arc<dyn NodeDriver>,
        readiness_fraction: f64,
        hold_window: Duration,
    ) -> Self {
        Self {
            registry,
            driver,
            readiness_fraction,
            hold_window,
        }
    }

    fn green_nodes<'a>(&self, cluster: &'a Cluster) -> Vec<&'a deploy_types::Node> {
        let green_color = cluster.active_color.flipped();
        cluster
            .nodes
            .iter()
            .filter(|n| Self::node_color(cluster, n) == green_color)
            .collect()
    }

    /// Nodes are partitioned into colors by even/odd position in the stable
    /// node order; a real host assigns color at registration time, but the
    /// core treats "which nodes are green" as a Registry-owned fact
    /// surfaced via node ordering.
    fn node_color(cluster: &Cluster, node: &deploy_types::Node) -> ActiveColor {
        let idx = cluster.nodes.iter().position(|n| n.id == node.id).unwrap_or(0);
        if idx % 2 == 0 {
            ActiveColor::Blue
        } else {
            ActiveColor::Green
        }
    }
}

#[async_trait]
impl Strategy for BlueGreenStrategy {
    async fn apply(
        &self,
        cluster: &Cluster,
        target_module: &Module,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ApplyOutcome {
        let green = self.green_nodes(cluster);
        if green.is_empty() {
            return ApplyOutcome::Failed {
                reason: "no green set available to provision".to_string(),
                touched: Vec::new(),
            };
        }
        let touched: Vec<NodeId> = green.iter().map(|n| n.id.clone()).collect();

        if cancel.is_cancelled() {
            return ApplyOutcome::Cancelled { touched: Vec::new() };
        }

        let results: Vec<bool> = stream::iter(green.iter())
            .map(|node| {
                let registry = self.registry.clone();
                let driver = self.driver.clone();
                async move { update_node(&registry, &driver, node, target_module).await }
            })
            .buffer_unordered(green.len().max(1))
            .collect()
            .await;

        let ready = results.iter().filter(|ok| **ok).count();
        let ready_fraction = ready as f64 / green.len() as f64;
        progress.on_progress(0.5, "green set deployed, checking readiness");

        if ready_fraction < self.readiness_fraction {
            return ApplyOutcome::Failed {
                reason: format!(
                    "green readiness {ready_fraction:.2} below required {:.2}",
                    self.readiness_fraction
                ),
                touched,
            };
        }

        if cancel.is_cancelled() {
            return ApplyOutcome::Cancelled { touched };
        }

        // Atomic compare-and-set: no caller ever observes a half-switched
        // activeColor (spec 4.5.3, spec 8 invariant 4).
        let new_color = cluster.active_color.flipped();
        if let Err(e) = self.registry.set_active_color(&cluster.id, new_color).await {
            return ApplyOutcome::Failed { reason: e.to_string(), touched };
        }

        info!(cluster_id = %cluster.id, new_color = ?new_color, "blue-green: traffic switched");
        progress.on_progress(1.0, "traffic switched to green");

        // Blue is kept warm (left registered, untouched) for `hold_window`
        // to allow a rapid flip-back; the core does not retire it here.
        let _ = self.hold_window;

        ApplyOutcome::Succeeded { touched }
    }

    async fn rollback(
        &self,
        cluster: &Cluster,
        touched: &[NodeId],
        _prior_version: &semver::Version,
        progress: &dyn ProgressSink,
    ) -> RollbackOutcome {
        let blue_color = cluster.active_color.flipped();
        if let Err(_e) = self.registry.set_active_color(&cluster.id, blue_color).await {
            progress.on_progress(1.0, "blue-green rollback failed to flip color");
            return RollbackOutcome::PartialFailure(touched.to_vec());
        }
        progress.on_progress(1.0, "blue-green rollback: flipped back to blue");
        RollbackOutcome::Succeeded
    }

    fn name(&self) -> &'static str {
        "blue-green"
    }
}
