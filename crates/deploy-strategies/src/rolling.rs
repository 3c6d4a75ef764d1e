//! Rolling strategy (spec 4.5.2): batch through the stable node order,
//! waiting for stability after each batch before proceeding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_metrics::{MetricsProbe, StabilityBudgets};
use deploy_registry::Registry;
use deploy_types::{Cluster, Module, NodeId};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::driver::NodeDriver;
use crate::node_update::{rollback_node, update_node};
use crate::strategy::{ApplyOutcome, ProgressSink, RollbackOutcome, Strategy};

pub struct RollingStrategy {
    registry: Arc<dyn Registry>,
    driver: Arc<dyn NodeDriver>,
    probe: Arc<MetricsProbe>,
    batch_size: usize,
    batch_settle_window: Duration,
    budgets: StabilityBudgets,
}

impl RollingStrategy {
    pub fn new(
        registry: Arc<dyn Registry>,
        driver: Arc<dyn NodeDriver>,
        probe: Arc<MetricsProbe>,
        batch_size: usize,
        batch_settle_window: Duration,
        budgets: StabilityBudgets,
    ) -> Self {
        Self {
            registry,
            driver,
            probe,
            batch_size: batch_size.max(1),
            batch_settle_window,
            budgets,
        }
    }
}

#[async_trait]
impl Strategy for RollingStrategy {
    async fn apply(
        &self,
        cluster: &Cluster,
        target_module: &Module,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ApplyOutcome {
        let heartbeat_grace = chrono::Duration::seconds(30);
        let targets = match self.registry.available(&cluster.id, heartbeat_grace).await {
            Ok(nodes) => nodes,
            Err(e) => return ApplyOutcome::Failed { reason: e.to_string(), touched: Vec::new() },
        };

        let batches: Vec<_> = targets.chunks(self.batch_size).collect();
        let mut updated_so_far: Vec<NodeId> = Vec::new();

        for (i, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                self.rollback_updated(cluster, &updated_so_far).await;
                return ApplyOutcome::Cancelled { touched: updated_so_far };
            }

            info!(cluster_id = %cluster.id, batch = i, size = batch.len(), "rolling: updating batch");
            let results: Vec<bool> = stream::iter(batch.iter())
                .map(|node| {
                    let registry = self.registry.clone();
                    let driver = self.driver.clone();
                    async move { update_node(&registry, &driver, node, target_module).await }
                })
                .buffer_unordered(batch.len().max(1))
                .collect()
                .await;

            if results.iter().any(|ok| !ok) {
                warn!(batch = i, "rolling: batch update failed, rolling back");
                updated_so_far.extend(batch.iter().map(|n| n.id.clone()));
                return ApplyOutcome::Failed {
                    reason: format!("batch {i} failed to update"),
                    touched: updated_so_far,
                };
            }
            updated_so_far.extend(batch.iter().map(|n| n.id.clone()));

            let availability = crate::node_update::RegistryAvailability {
                registry: &self.registry,
                cluster_id: &cluster.id,
                heartbeat_grace,
            };
            let stable = self
                .probe
                .wait_for_stable(
                    &updated_so_far[updated_so_far.len() - batch.len()..],
                    &availability,
                    self.batch_settle_window,
                    self.budgets,
                )
                .await;
            if stable.is_err() {
                warn!(batch = i, "rolling: batch unstable, rolling back");
                return ApplyOutcome::Failed {
                    reason: format!("batch {i} failed to stabilize"),
                    touched: updated_so_far,
                };
            }

            progress.on_progress(
                (i + 1) as f64 / batches.len().max(1) as f64,
                &format!("batch {} of {} settled", i + 1, batches.len()),
            );
        }

        ApplyOutcome::Succeeded { touched: updated_so_far }
    }

    async fn rollback(
        &self,
        cluster: &Cluster,
        touched: &[NodeId],
        prior_version: &semver::Version,
        progress: &dyn ProgressSink,
    ) -> RollbackOutcome {
        let mut failed = Vec::new();
        for id in touched {
            let Some(node) = cluster.nodes.iter().find(|n| &n.id == id) else {
                continue;
            };
            let target = node.current_module_version.clone().unwrap_or_else(|| prior_version.clone());
            if rollback_node(&self.registry, &self.driver, node, &target)
                .await
                .is_err()
            {
                failed.push(node.id.clone());
            }
        }
        progress.on_progress(1.0, "rolling rollback complete");
        if failed.is_empty() {
            RollbackOutcome::Succeeded
        } else {
            RollbackOutcome::PartialFailure(failed)
        }
    }

    fn name(&self) -> &'static str {
        "rolling"
    }
}

impl RollingStrategy {
    async fn rollback_updated(&self, cluster: &Cluster, updated: &[NodeId]) {
        for id in updated {
            if let Some(node) = cluster.nodes.iter().find(|n| &n.id == id) {
                let prior = node.current_module_version.clone();
                if let Some(prior) = prior {
                    let _ = rollback_node(&self.registry, &self.driver, node, &prior).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_metrics::MetricsConfig;
    use deploy_registry::InMemoryRegistry;
    use deploy_types::{ClusterId, Environment, HealthSnapshot, ModuleName, Node};
    use std::collections::HashMap;

    struct AlwaysOkDriver;

    #[async_trait]
    impl NodeDriver for AlwaysOkDriver {
        async fn apply_module(&self, _node: &Node, _module: &Module) -> crate::error::Result<()> {
            Ok(())
        }
        async fn rollback_module(
            &self,
            _node: &Node,
            _prior_version: Option<semver::Version>,
        ) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct FakeSource;

    #[async_trait]
    impl deploy_metrics::MetricsSource for FakeSource {
        async fn sample_node(&self, _node_id: &NodeId) -> deploy_metrics::Result<HealthSnapshot> {
            Ok(HealthSnapshot::unknown())
        }
    }

    fn module() -> Module {
        Module {
            name: ModuleName::parse("auth").unwrap(),
            version: semver::Version::parse("2.0.0").unwrap(),
            binary_ref: "blob://auth-2.0.0".into(),
            signature: vec![],
            signer_cert_chain: vec![],
            metadata: HashMap::new(),
        }
    }

    async fn setup_cluster(registry: &InMemoryRegistry, healthy_nodes: usize) -> Cluster {
        let mut cluster = Cluster::new(ClusterId::new("qa-1"), Environment::QA);
        for i in 0..healthy_nodes {
            cluster
                .nodes
                .push(Node::new(NodeId::new(format!("n{i}")), cluster.id.clone(), "addr"));
        }
        registry.register_cluster(cluster.clone()).await.unwrap();
        for i in 0..healthy_nodes {
            registry
                .heartbeat(&NodeId::new(format!("n{i}")), HealthSnapshot::unknown(), 500.0)
                .await
                .unwrap();
        }
        registry.get_cluster(Environment::QA).await.unwrap()
    }

    #[tokio::test]
    async fn apply_batches_through_all_nodes() {
        let concrete = Arc::new(InMemoryRegistry::new());
        let cluster = setup_cluster(&concrete, 4).await;
        let registry: Arc<dyn Registry> = concrete.clone();
        let driver: Arc<dyn NodeDriver> = Arc::new(AlwaysOkDriver);
        let probe = Arc::new(MetricsProbe::new(
            Arc::new(FakeSource),
            MetricsConfig {
                max_concurrency: 16,
                sample_interval: Duration::from_millis(5),
            },
        ));
        let budgets = StabilityBudgets {
            error_rate_budget: 0.01,
            p95_latency_budget_ms: 500.0,
        };
        // A freshly updated node sits in `Unknown` until its next heartbeat, so
        // nothing would ever report Available without this background agent
        // stand-in keeping the heartbeats flowing while `apply` holds its
        // per-batch stability window.
        let heartbeat_ids: Vec<NodeId> = cluster.nodes.iter().map(|n| n.id.clone()).collect();
        let heartbeat_registry = concrete.clone();
        let heartbeats = tokio::spawn(async move {
            loop {
                for id in &heartbeat_ids {
                    let _ = heartbeat_registry
                        .heartbeat(id, HealthSnapshot::unknown(), 50.0)
                        .await;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let strategy = RollingStrategy::new(registry, driver, probe, 2, Duration::from_millis(10), budgets);
        let cancel = CancellationToken::new();
        let outcome = strategy
            .apply(&cluster, &module(), &crate::strategy::NullProgressSink, &cancel)
            .await;
        heartbeats.abort();
        assert!(matches!(outcome, ApplyOutcome::Succeeded { ref touched } if touched.len() == 4));
    }

    #[tokio::test]
    async fn rollback_only_touches_nodes_passed_in() {
        let concrete = InMemoryRegistry::new();
        let cluster = setup_cluster(&concrete, 4).await;
        let registry: Arc<dyn Registry> = Arc::new(concrete);
        let driver: Arc<dyn NodeDriver> = Arc::new(AlwaysOkDriver);
        let probe = Arc::new(MetricsProbe::new(
            Arc::new(FakeSource),
            MetricsConfig {
                max_concurrency: 16,
                sample_interval: Duration::from_millis(5),
            },
        ));
        let budgets = StabilityBudgets {
            error_rate_budget: 0.01,
            p95_latency_budget_ms: 500.0,
        };
        let strategy = RollingStrategy::new(registry, driver, probe, 2, Duration::from_millis(10), budgets);
        let touched = vec![NodeId::new("n0"), NodeId::new("n1")];
        let prior = semver::Version::parse("1.0.0").unwrap();
        let outcome = strategy
            .rollback(&cluster, &touched, &prior, &crate::strategy::NullProgressSink)
            .await;
        assert_eq!(outcome, RollbackOutcome::Succeeded);
    }
}
