//! Direct strategy (spec 4.5.1): update every Available node in parallel,
//! bounded by `parallelism`. Use only where partial-outage risk is
//! acceptable (Dev).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_registry::Registry;
use deploy_types::{Cluster, Module, NodeId};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::driver::NodeDriver;
use crate::node_update::{rollback_node, update_node};
use crate::strategy::{ApplyOutcome, ProgressSink, RollbackOutcome, Strategy};

pub struct DirectStrategy {
    registry: Arc<dyn Registry>,
    driver: Arc<dyn NodeDriver>,
    parallelism: usize,
    settle_timeout: Duration,
}

impl DirectStrategy {
    pub fn new(
        registry: Arc<dyn Registry>,
        driver: Arc<dyn NodeDriver>,
        parallelism: usize,
        settle_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            driver,
            parallelism,
            settle_timeout,
        }
    }
}

#[async_trait]
impl Strategy for DirectStrategy {
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

        if cancel.is_cancelled() {
            return ApplyOutcome::Cancelled { touched: Vec::new() };
        }

        info!(cluster_id = %cluster.id, count = targets.len(), "direct: updating all available nodes");
        let touched: Vec<NodeId> = targets.iter().map(|n| n.id.clone()).collect();
        let total = targets.len().max(1);
        let succeeded: Vec<bool> = stream::iter(targets.iter())
            .map(|node| {
                let registry = self.registry.clone();
                let driver = self.driver.clone();
                async move { update_node(&registry, &driver, node, target_module).await }
            })
            .buffer_unordered(self.parallelism.max(1))
            .collect()
            .await;

        progress.on_progress(1.0, "direct rollout applied");

        if cancel.is_cancelled() {
            return ApplyOutcome::Cancelled { touched };
        }

        let healthy = succeeded.iter().filter(|ok| **ok).count();
        if healthy < total {
            return ApplyOutcome::Failed {
                reason: format!(
                    "{}/{} nodes failed to update within {:?}",
                    total - healthy,
                    total,
                    self.settle_timeout
                ),
                touched,
            };
        }
        ApplyOutcome::Succeeded { touched }
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
        progress.on_progress(1.0, "direct rollback complete");
        if failed.is_empty() {
            RollbackOutcome::Succeeded
        } else {
            RollbackOutcome::PartialFailure(failed)
        }
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_registry::InMemoryRegistry;
    use deploy_types::{ClusterId, Environment, ModuleName, Node, NodeId};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDriver {
        applied: AtomicUsize,
        fail_node: Option<NodeId>,
    }

    #[async_trait]
    impl NodeDriver for CountingDriver {
        async fn apply_module(
            &self,
            node: &deploy_types::Node,
            _module: &Module,
        ) -> crate::error::Result<()> {
            if Some(&node.id) == self.fail_node.as_ref() {
                return Err(crate::error::StrategyError::NodeDriver {
                    node_id: node.id.clone(),
                    reason: "boom".into(),
                });
            }
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback_module(
            &self,
            _node: &deploy_types::Node,
            _prior_version: Option<semver::Version>,
        ) -> crate::error::Result<()> {
            Ok(())
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
        let mut cluster = Cluster::new(ClusterId::new("dev-1"), Environment::Development);
        for i in 0..healthy_nodes {
            cluster
                .nodes
                .push(Node::new(NodeId::new(format!("n{i}")), cluster.id.clone(), "addr"));
        }
        registry.register_cluster(cluster.clone()).await.unwrap();
        for i in 0..healthy_nodes {
            registry
                .heartbeat(&NodeId::new(format!("n{i}")), deploy_types::HealthSnapshot::unknown(), 500.0)
                .await
                .unwrap();
        }
        registry.get_cluster(Environment::Development).await.unwrap()
    }

    #[tokio::test]
    async fn apply_updates_all_available_nodes() {
        let concrete = InMemoryRegistry::new();
        let cluster = setup_cluster(&concrete, 3).await;
        let registry: Arc<dyn Registry> = Arc::new(concrete);
        let driver: Arc<dyn NodeDriver> = Arc::new(CountingDriver {
            applied: AtomicUsize::new(0),
            fail_node: None,
        });
        let strategy = DirectStrategy::new(registry, driver, usize::MAX, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let outcome = strategy
            .apply(&cluster, &module(), &crate::strategy::NullProgressSink, &cancel)
            .await;
        assert!(matches!(outcome, ApplyOutcome::Succeeded { ref touched } if touched.len() == 3));
    }

    #[tokio::test]
    async fn apply_fails_when_a_node_driver_errors() {
        let concrete = InMemoryRegistry::new();
        let cluster = setup_cluster(&concrete, 2).await;
        let registry: Arc<dyn Registry> = Arc::new(concrete);
        let driver: Arc<dyn NodeDriver> = Arc::new(CountingDriver {
            applied: AtomicUsize::new(0),
            fail_node: Some(NodeId::new("n0")),
        });
        let strategy = DirectStrategy::new(registry, driver, usize::MAX, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let outcome = strategy
            .apply(&cluster, &module(), &crate::strategy::NullProgressSink, &cancel)
            .await;
        assert!(matches!(outcome, ApplyOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn rollback_only_touches_requested_nodes() {
        let concrete = InMemoryRegistry::new();
        let cluster = setup_cluster(&concrete, 3).await;
        let registry: Arc<dyn Registry> = Arc::new(concrete);
        let driver: Arc<dyn NodeDriver> = Arc::new(CountingDriver {
            applied: AtomicUsize::new(0),
            fail_node: None,
        });
        let strategy = DirectStrategy::new(registry, driver, usize::MAX, Duration::from_secs(60));
        let prior = semver::Version::parse("1.0.0").unwrap();
        let touched = vec![NodeId::new("n0"), NodeId::new("n1")];
        let outcome = strategy
            .rollback(&cluster, &touched, &prior, &crate::strategy::NullProgressSink)
            .await;
        assert_eq!(outcome, RollbackOutcome::Succeeded);
    }
}
