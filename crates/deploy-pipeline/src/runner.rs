//! The seven-stage pipeline runner (spec 4.2): Validate, SignatureCheck,
//! Prepare, SmokeTest, ApprovalGate, Deploy, PostValidate. Stages run
//! strictly sequentially and a failure short-circuits everything after it,
//! except that a Deploy or PostValidate failure always attempts the
//! strategy's rollback before the execution is marked terminal.

use std::sync::Arc;
use std::time::Duration;

use deploy_approval::{ApprovalGate, ApprovalOutcome};
use deploy_metrics::{MetricsProbe, StabilityBudgets};
use deploy_registry::Registry;
use deploy_strategies::node_update::RegistryAvailability;
use deploy_strategies::{ApplyOutcome, NodeDriver, NullProgressSink, RollbackOutcome};
use deploy_tracker::Tracker;
use deploy_types::{
    ApprovalDecisionKind, Cluster, DeployConfig, DeployEvent, DeploymentRequest, DeploymentResult,
    ExecutionId, PipelineExecutionState, PipelineStatus, StageName, StageStatus,
};
use deploy_verifier::{VerificationMode, VerifyOutcome, Verifier};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::factory::build_strategy;
use crate::interfaces::{audit, AuditSink, Clock, Notifier};

pub struct PipelineRunner {
    pub registry: Arc<dyn Registry>,
    pub verifier: Arc<dyn Verifier>,
    pub probe: Arc<MetricsProbe>,
    pub driver: Arc<dyn NodeDriver>,
    pub tracker: Arc<dyn Tracker>,
    pub approval_gate: Arc<dyn ApprovalGate>,
    pub notifier: Arc<dyn Notifier>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
    pub config: DeployConfig,
}

/// How the run ended, carrying enough detail to pick the terminal status
/// and the error `run()` should surface.
enum Terminal {
    Succeeded,
    Failed(PipelineError),
    RolledBack(PipelineError),
    Cancelled,
}

impl PipelineRunner {
    #[instrument(skip(self, request, cancel), fields(execution_id = %execution_id))]
    pub async fn run(
        &self,
        execution_id: ExecutionId,
        request: DeploymentRequest,
        cancel: CancellationToken,
    ) -> Result<DeploymentResult> {
        let mut state = self
            .tracker
            .start(execution_id, request.clone())
            .await
            .map_err(|_| PipelineError::Conflict(execution_id))?;

        self.transition(&mut state, PipelineStatus::Running).await?;

        let cluster = match self.registry.get_cluster(request.target_environment).await {
            Ok(c) => c,
            Err(e) => {
                return self
                    .finish(execution_id, state, Terminal::Failed(PipelineError::Validation(e.to_string())), 0, 0)
                    .await
            }
        };

        let terminal = self.execute_stages(&mut state, &request, &cluster, &cancel).await;
        let (nodes_updated, nodes_rolled_back) = match &terminal {
            Terminal::Succeeded => (cluster.nodes.len(), 0),
            Terminal::RolledBack(_) => (0, cluster.nodes.len()),
            _ => (0, 0),
        };

        self.finish(execution_id, state, terminal, nodes_updated, nodes_rolled_back).await
    }

    async fn execute_stages(
        &self,
        state: &mut PipelineExecutionState,
        request: &DeploymentRequest,
        cluster: &Cluster,
        cancel: &CancellationToken,
    ) -> Terminal {
        macro_rules! checked_stage {
            ($name:expr, $body:expr) => {
                if let Some(t) = self.check_cancelled(cancel) {
                    return t;
                }
                if let Err(e) = self.run_stage(state, $name, $body).await {
                    return Terminal::Failed(e);
                }
            };
        }

        checked_stage!(StageName::Validate, self.validate(request, cluster));
        checked_stage!(StageName::SignatureCheck, self.signature_check(request));
        checked_stage!(StageName::Prepare, self.prepare(cluster));
        checked_stage!(StageName::SmokeTest, self.smoke_test(cluster));

        if request.target_environment.requires_approval() {
            if let Some(t) = self.check_cancelled(cancel) {
                return t;
            }
            if let Err(e) = self.await_approval(state, request, cluster).await {
                return Terminal::Failed(e);
            }
        }

        if let Some(t) = self.check_cancelled(cancel) {
            return t;
        }
        let strategy = build_strategy(
            &request.resolved_strategy(),
            self.registry.clone(),
            self.driver.clone(),
            self.probe.clone(),
            &self.config,
        );

        self.begin_stage(state, StageName::Deploy);
        let touched = match strategy.apply(cluster, &request.module, &NullProgressSink, cancel).await {
            ApplyOutcome::Succeeded { touched } => {
                self.finish_stage_ok(state, StageName::Deploy, "deploy succeeded");
                touched
            }
            ApplyOutcome::Cancelled { .. } => {
                self.finish_stage_err(state, StageName::Deploy, "cancelled mid-deploy");
                return Terminal::Cancelled;
            }
            ApplyOutcome::Failed { reason, touched } => {
                self.finish_stage_err(state, StageName::Deploy, &reason);
                let rollback = strategy
                    .rollback(cluster, &touched, &self.baseline_version(cluster), &NullProgressSink)
                    .await;
                return self.rollback_terminal(rollback, PipelineError::NodeDriverError(reason));
            }
        };

        self.begin_stage(state, StageName::PostValidate);
        match self.post_validate(cluster).await {
            Ok(()) => {
                self.finish_stage_ok(state, StageName::PostValidate, "ok");
                Terminal::Succeeded
            }
            Err(e) => {
                warn!(%e, "post-validate failed, rolling back deploy");
                self.finish_stage_err(state, StageName::PostValidate, &e.to_string());
                let rollback = strategy
                    .rollback(cluster, &touched, &self.baseline_version(cluster), &NullProgressSink)
                    .await;
                self.rollback_terminal(rollback, e)
            }
        }
    }

    /// Requests approval, parks until `Resolve` or `approvalTimeout`, and
    /// audits the decision synchronously before the pipeline resumes
    /// (spec 6).
    async fn await_approval(
        &self,
        state: &mut PipelineExecutionState,
        request: &DeploymentRequest,
        cluster: &Cluster,
    ) -> Result<()> {
        self.begin_stage(state, StageName::ApprovalGate);
        self.transition(state, PipelineStatus::AwaitingApproval).await?;

        let handle = self
            .approval_gate
            .request_approval(state.execution_id, cluster.environment, request.requester_id.clone())
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.config.approval_timeout;
        let poll_interval = Duration::from_millis(500);
        let sweep_timeout =
            chrono::Duration::from_std(self.config.approval_timeout).unwrap_or_else(|_| chrono::Duration::zero());
        let outcome = loop {
            if self.config.approval_timeout > Duration::ZERO {
                self.approval_gate
                    .sweep_timeouts(sweep_timeout)
                    .await
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
            }
            let outcome = self
                .approval_gate
                .check(&handle)
                .await
                .map_err(|e| PipelineError::Internal(e.to_string()))?;
            if !outcome.is_pending() {
                break outcome;
            }
            if tokio::time::Instant::now() >= deadline {
                break ApprovalOutcome::TimedOut;
            }
            tokio::time::sleep(poll_interval).await;
        };

        self.transition(state, PipelineStatus::Running).await?;

        match outcome {
            ApprovalOutcome::Decided(decision) => {
                audit(
                    self.audit_sink.as_ref(),
                    "approval_decided",
                    &decision.approver_id,
                    serde_json::json!({
                        "execution_id": state.execution_id.to_string(),
                        "decision": decision.decision,
                        "reason": decision.reason,
                    }),
                )
                .await;

                match decision.decision {
                    ApprovalDecisionKind::Approve => {
                        self.finish_stage_ok(state, StageName::ApprovalGate, "approved");
                        Ok(())
                    }
                    ApprovalDecisionKind::Reject => {
                        let reason = decision.reason.unwrap_or_else(|| "rejected".to_string());
                        self.finish_stage_err(state, StageName::ApprovalGate, &reason);
                        Err(PipelineError::ApprovalDenied(reason))
                    }
                }
            }
            ApprovalOutcome::TimedOut => {
                self.finish_stage_err(state, StageName::ApprovalGate, "approval timed out");
                Err(PipelineError::ApprovalTimeout)
            }
            ApprovalOutcome::Pending => unreachable!("loop only exits once a terminal outcome is reached"),
        }
    }

    async fn validate(&self, request: &DeploymentRequest, cluster: &Cluster) -> Result<()> {
        if cluster.environment != request.target_environment {
            return Err(PipelineError::Validation("cluster environment mismatch".into()));
        }
        Ok(())
    }

    async fn signature_check(&self, request: &DeploymentRequest) -> Result<()> {
        let mode = if request.target_environment.allows_permissive_signatures() {
            VerificationMode::PermissiveDev
        } else {
            VerificationMode::Strict
        };
        match self.verifier.verify(&request.module, mode).await {
            VerifyOutcome::Ok => Ok(()),
            other => Err(PipelineError::SignatureRejected(format!("{other:?}"))),
        }
    }

    async fn prepare(&self, cluster: &Cluster) -> Result<()> {
        let available = self
            .registry
            .available(&cluster.id, self.heartbeat_grace())
            .await
            .map_err(|e| PipelineError::Preparation(e.to_string()))?;
        if available.is_empty() {
            return Err(PipelineError::Preparation("no Available node to stage the artifact to".into()));
        }
        Ok(())
    }

    async fn smoke_test(&self, cluster: &Cluster) -> Result<()> {
        let available = self
            .registry
            .available(&cluster.id, self.heartbeat_grace())
            .await
            .map_err(|e| PipelineError::Preparation(e.to_string()))?;
        let node_ids: Vec<_> = available.iter().map(|n| n.id.clone()).collect();
        let samples = self.probe.sample_cluster(&node_ids).await;
        for (node_id, sample) in samples {
            match sample {
                Ok(h) if h.error_rate <= self.config.error_rate_budget => {}
                Ok(h) => {
                    return Err(PipelineError::HealthDegradation(format!(
                        "{node_id} smoke-test error rate {:.4} exceeds budget {:.4}",
                        h.error_rate, self.config.error_rate_budget
                    )))
                }
                Err(e) => {
                    return Err(PipelineError::HealthDegradation(format!(
                        "{node_id} unreachable during smoke test: {e}"
                    )))
                }
            }
        }
        Ok(())
    }

    async fn post_validate(&self, cluster: &Cluster) -> Result<()> {
        let budgets = StabilityBudgets {
            error_rate_budget: self.config.error_rate_budget,
            p95_latency_budget_ms: self.config.p95_latency_budget_ms,
        };
        let node_ids: Vec<_> = cluster.nodes.iter().map(|n| n.id.clone()).collect();
        let availability = RegistryAvailability {
            registry: &self.registry,
            cluster_id: &cluster.id,
            heartbeat_grace: self.heartbeat_grace(),
        };
        self.probe
            .wait_for_stable(&node_ids, &availability, self.config.post_validate_window, budgets)
            .await
            .map_err(|e| PipelineError::HealthDegradation(e.to_string()))
    }

    fn rollback_terminal(&self, rollback: RollbackOutcome, cause: PipelineError) -> Terminal {
        match rollback {
            RollbackOutcome::Succeeded => Terminal::RolledBack(cause),
            RollbackOutcome::PartialFailure(nodes) => {
                warn!(?nodes, "rollback left some nodes unhealthy");
                Terminal::RolledBack(cause)
            }
        }
    }

    /// Best-effort baseline to roll back to: the highest version already
    /// running anywhere in the cluster before this deploy started.
    fn baseline_version(&self, cluster: &Cluster) -> semver::Version {
        cluster
            .nodes
            .iter()
            .filter_map(|n| n.current_module_version.clone())
            .max()
            .unwrap_or_else(|| semver::Version::new(0, 0, 0))
    }

    fn heartbeat_grace(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.heartbeat_grace).unwrap_or_else(|_| chrono::Duration::seconds(30))
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> Option<Terminal> {
        cancel.is_cancelled().then_some(Terminal::Cancelled)
    }

    fn begin_stage(&self, state: &mut PipelineExecutionState, name: StageName) {
        state.current_stage = Some(name);
        let stage = state.stage_mut(name);
        stage.status = StageStatus::Running;
        stage.started_at = Some(self.clock.now());
        state.touch();
    }

    fn finish_stage_ok(&self, state: &mut PipelineExecutionState, name: StageName, message: &str) {
        let stage = state.stage_mut(name);
        stage.status = StageStatus::Succeeded;
        stage.finished_at = Some(self.clock.now());
        stage.message = Some(message.to_string());
        let emitted = stage.clone();
        state.touch();
        self.notifier.notify(DeployEvent::OnStageComplete {
            execution_id: state.execution_id,
            stage: Box::new(emitted),
        });
    }

    fn finish_stage_err(&self, state: &mut PipelineExecutionState, name: StageName, message: &str) {
        let stage = state.stage_mut(name);
        stage.status = StageStatus::Failed;
        stage.finished_at = Some(self.clock.now());
        stage.message = Some(message.to_string());
        let emitted = stage.clone();
        state.touch();
        self.notifier.notify(DeployEvent::OnStageComplete {
            execution_id: state.execution_id,
            stage: Box::new(emitted),
        });
    }

    /// Runs one stage's body, bracketing it with `begin_stage`/`finish_stage_*`
    /// and enforcing `config.stage_timeout`.
    async fn run_stage<F>(&self, state: &mut PipelineExecutionState, name: StageName, body: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        self.begin_stage(state, name);
        match tokio::time::timeout(self.config.stage_timeout, body).await {
            Ok(Ok(())) => {
                self.finish_stage_ok(state, name, "ok");
                Ok(())
            }
            Ok(Err(e)) => {
                self.finish_stage_err(state, name, &e.to_string());
                Err(e)
            }
            Err(_) => {
                let e = PipelineError::Internal(format!("stage {name} timed out"));
                self.finish_stage_err(state, name, &e.to_string());
                Err(e)
            }
        }
    }

    async fn transition(&self, state: &mut PipelineExecutionState, next: PipelineStatus) -> Result<()> {
        state.transition(next).map_err(|e| PipelineError::Internal(e.to_string()))?;
        self.tracker
            .update(state.clone())
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        self.notifier.notify(DeployEvent::OnStateChange {
            state: Box::new(state.clone()),
        });
        Ok(())
    }

    async fn finish(
        &self,
        execution_id: ExecutionId,
        mut state: PipelineExecutionState,
        terminal: Terminal,
        nodes_updated: usize,
        nodes_rolled_back: usize,
    ) -> Result<DeploymentResult> {
        let final_status = match &terminal {
            Terminal::Succeeded => PipelineStatus::Succeeded,
            Terminal::Failed(e) => {
                state.error_summary = Some(e.to_string());
                PipelineStatus::Failed
            }
            Terminal::RolledBack(e) => {
                state.error_summary = Some(e.to_string());
                PipelineStatus::RolledBack
            }
            Terminal::Cancelled => {
                state.error_summary = Some("cancelled".to_string());
                PipelineStatus::Cancelled
            }
        };

        if state.status.can_transition_to(final_status) {
            self.transition(&mut state, final_status).await?;
        }

        let duration_ms = (self.clock.now() - state.started_at).num_milliseconds().max(0) as u64;
        let result = DeploymentResult {
            state: state.clone(),
            nodes_updated,
            nodes_rolled_back,
            duration_ms,
        };

        self.tracker
            .complete(&execution_id, result.clone())
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        info!(status = %result.state.status, "pipeline finished");

        match terminal {
            Terminal::Succeeded | Terminal::RolledBack(_) => Ok(result),
            Terminal::Failed(e) => Err(e),
            Terminal::Cancelled => Err(PipelineError::Cancelled(execution_id)),
        }
    }
}
