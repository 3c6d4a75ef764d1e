//! Public entry point (spec 4.8): `Submit`, `Get`, `List`, `Approve`,
//! `Reject`, `Cancel`. Owns nothing the pipeline itself owns — it only adds
//! the concurrency control (serialization key, idempotency) and dispatch
//! that sit in front of one `PipelineRunner::run`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use deploy_pipeline::PipelineRunner;
use deploy_tracker::{ListFilter, Page, Pagination, TrackedEntry};
use deploy_types::{ApprovalDecision, DeploymentRequest, ExecutionId, PipelineExecutionState};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::approval_index::IndexedApprovalGate;
use crate::error::{OrchestratorError, Result};
use crate::keyed_lock::KeyedLock;

pub struct Orchestrator {
    runner: Arc<PipelineRunner>,
    approval_index: Arc<IndexedApprovalGate>,
    locks: KeyedLock,
    idempotency: Arc<DashMap<String, ExecutionId>>,
    cancellations: Arc<DashMap<ExecutionId, CancellationToken>>,
    queue_wait: Duration,
}

impl Orchestrator {
    /// `runner.approval_gate` MUST be `approval_index` itself (wrapped as
    /// `Arc<dyn ApprovalGate>`) so `Approve`/`Reject` here resolve the same
    /// handles the pipeline is waiting on.
    pub fn new(runner: Arc<PipelineRunner>, approval_index: Arc<IndexedApprovalGate>, queue_wait: Duration) -> Self {
        Self {
            runner,
            approval_index,
            locks: KeyedLock::new(),
            idempotency: Arc::new(DashMap::new()),
            cancellations: Arc::new(DashMap::new()),
            queue_wait,
        }
    }

    /// Starts a new execution, or returns the existing one if
    /// `idempotency_key` already names a non-terminal execution.
    /// Otherwise, blocks up to `queueWait` acquiring the
    /// `(environment, module)` serialization key before returning
    /// (spec 4.8); the pipeline itself then runs in the background.
    pub async fn submit(&self, request: DeploymentRequest, idempotency_key: Option<String>) -> Result<ExecutionId> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.idempotency.get(key).map(|e| *e) {
                if let Ok(state) = self.runner.tracker.get(&existing).await {
                    if !state.status.is_terminal() {
                        return Ok(existing);
                    }
                }
            }
        }

        let guard = self.locks.acquire(request.serialization_key(), self.queue_wait).await?;

        let execution_id = ExecutionId::generate();
        if let Some(key) = idempotency_key {
            self.idempotency.insert(key, execution_id);
        }

        let cancel = CancellationToken::new();
        self.cancellations.insert(execution_id, cancel.clone());

        let runner = self.runner.clone();
        let cancellations = self.cancellations.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = runner.run(execution_id, request, cancel).await {
                warn!(%execution_id, error = %e, "deployment execution ended in error");
            }
            cancellations.remove(&execution_id);
        });

        Ok(execution_id)
    }

    pub async fn get(&self, execution_id: &ExecutionId) -> Result<PipelineExecutionState> {
        Ok(self.runner.tracker.get(execution_id).await?)
    }

    pub async fn list(&self, filter: ListFilter, pagination: Pagination) -> Result<Page<TrackedEntry>> {
        Ok(self.runner.tracker.list_all(filter, pagination).await?)
    }

    pub async fn approve(&self, execution_id: ExecutionId, approver_id: String) -> Result<()> {
        self.approval_index
            .resolve_by_execution(&execution_id, ApprovalDecision::approve(approver_id))
            .await
    }

    pub async fn reject(&self, execution_id: ExecutionId, approver_id: String, reason: String) -> Result<()> {
        self.approval_index
            .resolve_by_execution(&execution_id, ApprovalDecision::reject(approver_id, reason))
            .await
    }

    /// Cooperative; takes effect at the next stage boundary the runner
    /// checks (spec 4.2, 4.8).
    pub fn cancel(&self, execution_id: ExecutionId) -> Result<()> {
        let token = self
            .cancellations
            .get(&execution_id)
            .ok_or(OrchestratorError::NotFound(execution_id))?;
        token.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deploy_approval::{ApprovalGate, InMemoryApprovalGate};
    use deploy_metrics::{MetricsConfig, MetricsProbe};
    use deploy_registry::{InMemoryRegistry, Registry};
    use deploy_strategies::NodeDriver;
    use deploy_tracker::InMemoryTracker;
    use deploy_types::{Cluster, ClusterId, DeployConfig, Environment, HealthSnapshot, Module, ModuleName, Node, NodeId};
    use deploy_verifier::{VerificationMode, VerifyOutcome, Verifier};
    use std::collections::HashMap;

    struct AllHealthySource;

    #[async_trait]
    impl deploy_metrics::MetricsSource for AllHealthySource {
        async fn sample_node(&self, _node_id: &NodeId) -> deploy_metrics::Result<HealthSnapshot> {
            Ok(HealthSnapshot {
                cpu_pct: 5.0,
                mem_pct: 5.0,
                p95_latency_ms: 20.0,
                error_rate: 0.0,
                sampled_at: chrono::Utc::now(),
            })
        }
    }

    struct NoopDriver;

    #[async_trait]
    impl NodeDriver for NoopDriver {
        async fn apply_module(&self, _node: &Node, _module: &Module) -> deploy_strategies::Result<()> {
            Ok(())
        }
        async fn rollback_module(&self, _node: &Node, _prior_version: Option<semver::Version>) -> deploy_strategies::Result<()> {
            Ok(())
        }
    }

    /// Sleeps long enough on every apply to keep a Direct-strategy deploy
    /// in flight while a test observes contention on the serialization key.
    struct SlowDriver {
        delay: Duration,
    }

    #[async_trait]
    impl NodeDriver for SlowDriver {
        async fn apply_module(&self, _node: &Node, _module: &Module) -> deploy_strategies::Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
        async fn rollback_module(&self, _node: &Node, _prior_version: Option<semver::Version>) -> deploy_strategies::Result<()> {
            Ok(())
        }
    }

    struct AlwaysTrustingVerifier;

    #[async_trait]
    impl Verifier for AlwaysTrustingVerifier {
        async fn verify(&self, _module: &Module, _mode: VerificationMode) -> VerifyOutcome {
            VerifyOutcome::Ok
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

    async fn registry_with_cluster(environment: Environment, node_count: usize) -> Arc<dyn Registry> {
        let concrete = InMemoryRegistry::new();
        let mut cluster = Cluster::new(ClusterId::new("c1"), environment);
        for i in 0..node_count {
            cluster.nodes.push(Node::new(NodeId::new(format!("n{i}")), cluster.id.clone(), "addr"));
        }
        concrete.register_cluster(cluster).await.unwrap();
        for i in 0..node_count {
            concrete
                .heartbeat(&NodeId::new(format!("n{i}")), HealthSnapshot::unknown(), 500.0)
                .await
                .unwrap();
        }
        Arc::new(concrete)
    }

    fn request(environment: Environment) -> DeploymentRequest {
        DeploymentRequest {
            module: module(),
            target_environment: environment,
            strategy: None,
            requester_id: "alice".into(),
            requested_at: chrono::Utc::now(),
            correlation_id: None,
        }
    }

    async fn orchestrator(driver: Arc<dyn NodeDriver>, registry: Arc<dyn Registry>, queue_wait: Duration) -> Orchestrator {
        let approval_index = Arc::new(IndexedApprovalGate::new(Arc::new(InMemoryApprovalGate::new())));
        let runner = Arc::new(PipelineRunner {
            registry,
            verifier: Arc::new(AlwaysTrustingVerifier),
            probe: Arc::new(MetricsProbe::new(Arc::new(AllHealthySource), MetricsConfig::default())),
            driver,
            tracker: Arc::new(InMemoryTracker::new()),
            approval_gate: approval_index.clone() as Arc<dyn ApprovalGate>,
            notifier: Arc::new(deploy_pipeline::NullNotifier),
            audit_sink: Arc::new(deploy_pipeline::NullAuditSink),
            clock: Arc::new(deploy_pipeline::SystemClock),
            config: DeployConfig::default(),
        });
        Orchestrator::new(runner, approval_index, queue_wait)
    }

    #[tokio::test]
    async fn submit_runs_to_completion() {
        let registry = registry_with_cluster(Environment::Development, 2).await;
        let orch = orchestrator(Arc::new(NoopDriver), registry, Duration::from_secs(1)).await;

        let execution_id = orch.submit(request(Environment::Development), None).await.unwrap();

        let state = loop {
            let state = orch.get(&execution_id).await.unwrap();
            if state.status.is_terminal() {
                break state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert_eq!(state.status, deploy_types::PipelineStatus::Succeeded);
    }

    #[tokio::test]
    async fn resubmitting_the_same_idempotency_key_returns_the_in_flight_execution() {
        let registry = registry_with_cluster(Environment::Development, 1).await;
        let orch = orchestrator(
            Arc::new(SlowDriver { delay: Duration::from_millis(200) }),
            registry,
            Duration::from_secs(2),
        )
        .await;

        let first = orch
            .submit(request(Environment::Development), Some("release-42".to_string()))
            .await
            .unwrap();
        let second = orch
            .submit(request(Environment::Development), Some("release-42".to_string()))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_submission_on_the_same_key_fails_already_in_progress() {
        let registry = registry_with_cluster(Environment::Development, 1).await;
        let orch = orchestrator(
            Arc::new(SlowDriver { delay: Duration::from_millis(300) }),
            registry,
            Duration::from_millis(20),
        )
        .await;

        let _first = orch.submit(request(Environment::Development), None).await.unwrap();
        // The first submission's background task is still holding the
        // serialization key guard while its slow driver sleeps.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = orch.submit(request(Environment::Development), None).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyInProgress));
    }

    #[tokio::test]
    async fn approve_by_execution_id_resumes_a_suspended_rollout() {
        let registry = registry_with_cluster(Environment::Staging, 1).await;
        let orch = orchestrator(Arc::new(NoopDriver), registry, Duration::from_secs(1)).await;

        let execution_id = orch.submit(request(Environment::Staging), None).await.unwrap();

        loop {
            if orch.get(&execution_id).await.unwrap().status == deploy_types::PipelineStatus::AwaitingApproval {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        orch.approve(execution_id, "bob".to_string()).await.unwrap();

        let state = loop {
            let state = orch.get(&execution_id).await.unwrap();
            if state.status.is_terminal() {
                break state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert_eq!(state.status, deploy_types::PipelineStatus::Succeeded);
    }

    #[tokio::test]
    async fn reject_by_execution_id_fails_a_suspended_rollout() {
        let registry = registry_with_cluster(Environment::Staging, 1).await;
        let orch = orchestrator(Arc::new(NoopDriver), registry, Duration::from_secs(1)).await;

        let execution_id = orch.submit(request(Environment::Staging), None).await.unwrap();

        loop {
            if orch.get(&execution_id).await.unwrap().status == deploy_types::PipelineStatus::AwaitingApproval {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        orch.reject(execution_id, "bob".to_string(), "not ready".to_string()).await.unwrap();

        let state = loop {
            let state = orch.get(&execution_id).await.unwrap();
            if state.status.is_terminal() {
                break state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert_eq!(state.status, deploy_types::PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_of_unknown_execution_is_not_found() {
        let registry = registry_with_cluster(Environment::Development, 1).await;
        let orch = orchestrator(Arc::new(NoopDriver), registry, Duration::from_secs(1)).await;
        let err = orch.cancel(ExecutionId::generate()).unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }
}
