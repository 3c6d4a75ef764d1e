//! Canary strategy (spec 4.5.4): promote tranches of the cluster in
//! percentage steps, holding each step only while the updated set (U)
//! stays within canary budgets and does not regress against the baseline
//! set (B).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_metrics::{AvailabilityCheck, MetricsProbe, StabilityBudgets};
use deploy_registry::Registry;
use deploy_types::{Cluster, Module, Node, NodeId};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::driver::NodeDriver;
use crate::node_update::{rollback_node, update_node, RegistryAvailability};
use crate::strategy::{ApplyOutcome, ProgressSink, RollbackOutcome, Strategy};

pub struct CanaryStrategy {
    registry: Arc<dyn Registry>,
    driver: Arc<dyn NodeDriver>,
    probe: Arc<MetricsProbe>,
    steps: Vec<u8>,
    step_hold_window: Duration,
    budgets: StabilityBudgets,
    error_rate_regression_budget: f64,
    latency_regression_budget_ms: f64,
}

impl CanaryStrategy {
    pub fn new(
        registry: Arc<dyn Registry>,
        driver: Arc<dyn NodeDriver>,
        probe: Arc<MetricsProbe>,
        steps: Vec<u8>,
        step_hold_window: Duration,
        budgets: StabilityBudgets,
        error_rate_regression_budget: f64,
        latency_regression_budget_ms: f64,
    ) -> Self {
        Self {
            registry,
            driver,
            probe,
            steps,
            step_hold_window,
            budgets,
            error_rate_regression_budget,
            latency_regression_budget_ms,
        }
    }

    /// U meets canary budgets outright, AND — when there is still a
    /// baseline to compare against — errorRate(U) − errorRate(B) ≤ budget
    /// AND p95(U) − p95(B) ≤ budget (spec 4.5.4). Unreachable nodes fail the
    /// check outright.
    async fn within_regression_budgets(&self, updated: &[NodeId], baseline: &[NodeId]) -> bool {
        let u_samples = self.probe.sample_cluster(updated).await;
        let Some((u_err, u_p95)) = Self::aggregate(&u_samples) else {
            return false;
        };
        if u_err > self.budgets.error_rate_budget || u_p95 > self.budgets.p95_latency_budget_ms {
            return false;
        }

        // An empty baseline (final step) has nothing to regress against.
        if baseline.is_empty() {
            return true;
        }

        let b_samples = self.probe.sample_cluster(baseline).await;
        let Some((b_err, b_p95)) = Self::aggregate(&b_samples) else {
            return false;
        };

        u_err - b_err <= self.error_rate_regression_budget
            && u_p95 - b_p95 <= self.latency_regression_budget_ms
    }

    fn aggregate(
        samples: &std::collections::HashMap<NodeId, deploy_metrics::Result<deploy_types::HealthSnapshot>>,
    ) -> Option<(f64, f64)> {
        if samples.is_empty() {
            return None;
        }
        let mut sum_err = 0.0;
        let mut max_p95 = 0.0_f64;
        for result in samples.values() {
            match result {
                Ok(s) => {
                    sum_err += s.error_rate;
                    max_p95 = max_p95.max(s.p95_latency_ms);
                }
                Err(_) => return None,
            }
        }
        Some((sum_err / samples.len() as f64, max_p95))
    }
}

#[async_trait]
impl Strategy for CanaryStrategy {
    async fn apply(
        &self,
        cluster: &Cluster,
        target_module: &Module,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ApplyOutcome {
        let heartbeat_grace = chrono::Duration::seconds(30);
        let mut ordered = match self.registry.available(&cluster.id, heartbeat_grace).await {
            Ok(nodes) => nodes,
            Err(e) => return ApplyOutcome::Failed { reason: e.to_string(), touched: Vec::new() },
        };
        // Stable node order; ties broken by id (spec 4.5.4).
        ordered.sort_by(|a, b| a.id.cmp(&b.id));
        let total = ordered.len();

        let mut already_updated: Vec<NodeId> = Vec::new();

        for (step_idx, pct) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                self.rollback_updated(cluster, &already_updated).await;
                return ApplyOutcome::Cancelled { touched: already_updated };
            }

            let target_count = ((total as f64) * (*pct as f64) / 100.0).ceil() as usize;
            if target_count <= already_updated.len() {
                // Cumulative percentage rounds to the same count: no-op step.
                continue;
            }

            let tranche: Vec<&Node> = ordered[already_updated.len()..target_count].to_vec();
            info!(step = step_idx, pct = pct, tranche = tranche.len(), "canary: promoting tranche");

            let results: Vec<bool> = stream::iter(tranche.iter())
                .map(|node| {
                    let registry = self.registry.clone();
                    let driver = self.driver.clone();
                    async move { update_node(&registry, &driver, node, target_module).await }
                })
                .buffer_unordered(tranche.len().max(1))
                .collect()
                .await;

            if results.iter().any(|ok| !ok) {
                warn!(step = step_idx, "canary: tranche update failed");
                already_updated.extend(tranche.iter().map(|n| n.id.clone()));
                return ApplyOutcome::Failed {
                    reason: format!("step {step_idx} tranche failed to update"),
                    touched: already_updated,
                };
            }
            already_updated.extend(tranche.iter().map(|n| n.id.clone()));

            let baseline: Vec<NodeId> = ordered[target_count..]
                .iter()
                .map(|n| n.id.clone())
                .collect();

            let availability = RegistryAvailability {
                registry: &self.registry,
                cluster_id: &cluster.id,
                heartbeat_grace,
            };
            let deadline = tokio::time::Instant::now() + self.step_hold_window;
            loop {
                let stable = availability.all_available(&already_updated).await
                    && self.within_regression_budgets(&already_updated, &baseline).await;
                if !stable {
                    warn!(step = step_idx, "canary: step regressed against baseline or nodes unavailable");
                    return ApplyOutcome::Failed {
                        reason: format!("step {step_idx} regressed against baseline"),
                        touched: already_updated,
                    };
                }
                if tokio::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(self.probe_interval()).await;
            }

            progress.on_progress(
                (step_idx + 1) as f64 / self.steps.len() as f64,
                &format!("canary step {pct}% held"),
            );
        }

        ApplyOutcome::Succeeded { touched: already_updated }
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
        progress.on_progress(1.0, "canary rollback complete");
        if failed.is_empty() {
            RollbackOutcome::Succeeded
        } else {
            RollbackOutcome::PartialFailure(failed)
        }
    }

    fn name(&self) -> &'static str {
        "canary"
    }
}

impl CanaryStrategy {
    fn probe_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn rollback_updated(&self, cluster: &Cluster, updated: &[NodeId]) {
        for id in updated {
            if let Some(node) = cluster.nodes.iter().find(|n| &n.id == id) {
                if let Some(prior) = node.current_module_version.clone() {
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
    use deploy_types::{ClusterId, Environment, HealthSnapshot, ModuleName};
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

    async fn setup_cluster(registry: &InMemoryRegistry, n: usize) -> Cluster {
        let mut cluster = Cluster::new(ClusterId::new("prod-1"), Environment::Production);
        for i in 0..n {
            cluster
                .nodes
                .push(Node::new(NodeId::new(format!("n{i}")), cluster.id.clone(), "addr"));
        }
        registry.register_cluster(cluster.clone()).await.unwrap();
        for i in 0..n {
            registry
                .heartbeat(&NodeId::new(format!("n{i}")), HealthSnapshot::unknown(), 500.0)
                .await
                .unwrap();
        }
        registry.get_cluster(Environment::Production).await.unwrap()
    }

    fn strategy(registry: Arc<dyn Registry>, probe: Arc<MetricsProbe>) -> CanaryStrategy {
        CanaryStrategy::new(
            registry,
            Arc::new(AlwaysOkDriver),
            probe,
            vec![10, 30, 50, 100],
            Duration::from_millis(10),
            StabilityBudgets {
                error_rate_budget: 0.005,
                p95_latency_budget_ms: 200.0,
            },
            0.005,
            50.0,
        )
    }

    #[tokio::test]
    async fn apply_advances_through_all_steps_when_healthy() {
        let concrete = Arc::new(InMemoryRegistry::new());
        let cluster = setup_cluster(&concrete, 10).await;
        let registry: Arc<dyn Registry> = concrete.clone();
        let probe = Arc::new(MetricsProbe::new(
            Arc::new(FakeSource),
            MetricsConfig {
                max_concurrency: 16,
                sample_interval: Duration::from_millis(5),
            },
        ));
        // Nodes sit in `Unknown` right after an update until their next
        // heartbeat; stand in for the node agent so the hold loop's
        // Availability check has something to observe.
        let heartbeat_ids: Vec<NodeId> = cluster.nodes.iter().map(|n| n.id.clone()).collect();
        let heartbeat_registry = concrete.clone();
        let heartbeats = tokio::spawn(async move {
            loop {
                for id in &heartbeat_ids {
                    let _ = heartbeat_registry
                        .heartbeat(id, HealthSnapshot::unknown(), 500.0)
                        .await;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let strat = strategy(registry, probe);
        let cancel = CancellationToken::new();
        let outcome = strat
            .apply(&cluster, &module(), &crate::strategy::NullProgressSink, &cancel)
            .await;
        heartbeats.abort();
        assert!(matches!(outcome, ApplyOutcome::Succeeded { ref touched } if touched.len() == 10));
    }

    #[tokio::test]
    async fn apply_fails_when_canary_tranche_regresses() {
        struct RegressingSource;
        #[async_trait]
        impl deploy_metrics::MetricsSource for RegressingSource {
            async fn sample_node(&self, node_id: &NodeId) -> deploy_metrics::Result<HealthSnapshot> {
                let error_rate = if node_id.as_str().starts_with('n') && node_id.as_str() < "n3" {
                    0.5
                } else {
                    0.0
                };
                Ok(HealthSnapshot {
                    cpu_pct: 10.0,
                    mem_pct: 10.0,
                    p95_latency_ms: 10.0,
                    error_rate,
                    sampled_at: chrono::Utc::now(),
                })
            }
        }

        let concrete = InMemoryRegistry::new();
        let cluster = setup_cluster(&concrete, 10).await;
        let registry: Arc<dyn Registry> = Arc::new(concrete);
        let probe = Arc::new(MetricsProbe::new(
            Arc::new(RegressingSource),
            MetricsConfig {
                max_concurrency: 16,
                sample_interval: Duration::from_millis(5),
            },
        ));
        let strat = strategy(registry, probe);
        let cancel = CancellationToken::new();
        let outcome = strat
            .apply(&cluster, &module(), &crate::strategy::NullProgressSink, &cancel)
            .await;
        assert!(matches!(outcome, ApplyOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn regression_budget_rejects_uniformly_unhealthy_tranche_with_matching_baseline() {
        struct UniformlyBadSource;
        #[async_trait]
        impl deploy_metrics::MetricsSource for UniformlyBadSource {
            async fn sample_node(&self, _node_id: &NodeId) -> deploy_metrics::Result<HealthSnapshot> {
                Ok(HealthSnapshot {
                    cpu_pct: 10.0,
                    mem_pct: 10.0,
                    p95_latency_ms: 10.0,
                    error_rate: 0.03,
                    sampled_at: chrono::Utc::now(),
                })
            }
        }

        let probe = Arc::new(MetricsProbe::new(
            Arc::new(UniformlyBadSource),
            MetricsConfig {
                max_concurrency: 16,
                sample_interval: Duration::from_millis(5),
            },
        ));
        let strat = CanaryStrategy::new(
            Arc::new(InMemoryRegistry::new()),
            Arc::new(AlwaysOkDriver),
            probe,
            vec![10, 30, 50, 100],
            Duration::from_millis(10),
            StabilityBudgets {
                error_rate_budget: 0.005,
                p95_latency_budget_ms: 200.0,
            },
            0.005,
            50.0,
        );

        let updated = vec![NodeId::new("n0"), NodeId::new("n1")];
        let baseline = vec![NodeId::new("n2"), NodeId::new("n3")];
        assert!(!strat.within_regression_budgets(&updated, &baseline).await);
    }
}
