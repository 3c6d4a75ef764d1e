//! Indexes `ApprovalHandle`s by `executionId` so the orchestrator's public
//! `Approve`/`Reject` operations (spec 4.8), which only see an
//! `executionId`, can resolve the handle `deploy-approval` actually keys on.

use async_trait::async_trait;
use dashmap::DashMap;
use deploy_approval::{ApprovalGate, ApprovalOutcome};
use deploy_types::{ApprovalDecision, ApprovalHandle, Environment, ExecutionId};
use std::sync::Arc;

use crate::error::{OrchestratorError, Result};

pub struct IndexedApprovalGate {
    inner: Arc<dyn ApprovalGate>,
    by_execution: DashMap<ExecutionId, ApprovalHandle>,
}

impl IndexedApprovalGate {
    pub fn new(inner: Arc<dyn ApprovalGate>) -> Self {
        Self {
            inner,
            by_execution: DashMap::new(),
        }
    }

    pub fn handle_for(&self, execution_id: &ExecutionId) -> Option<ApprovalHandle> {
        self.by_execution.get(execution_id).map(|h| *h)
    }

    pub async fn resolve_by_execution(&self, execution_id: &ExecutionId, decision: ApprovalDecision) -> Result<()> {
        let handle = self
            .handle_for(execution_id)
            .ok_or(OrchestratorError::NotFound(*execution_id))?;
        Ok(self.inner.resolve(&handle, decision).await?)
    }
}

#[async_trait]
impl ApprovalGate for IndexedApprovalGate {
    async fn request_approval(
        &self,
        execution_id: ExecutionId,
        environment: Environment,
        requester_id: String,
    ) -> deploy_approval::Result<ApprovalHandle> {
        let handle = self.inner.request_approval(execution_id, environment, requester_id).await?;
        self.by_execution.insert(execution_id, handle);
        Ok(handle)
    }

    async fn resolve(&self, handle: &ApprovalHandle, decision: ApprovalDecision) -> deploy_approval::Result<()> {
        self.inner.resolve(handle, decision).await
    }

    async fn check(&self, handle: &ApprovalHandle) -> deploy_approval::Result<ApprovalOutcome> {
        self.inner.check(handle).await
    }

    async fn sweep_timeouts(&self, timeout: chrono::Duration) -> deploy_approval::Result<usize> {
        self.inner.sweep_timeouts(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_approval::InMemoryApprovalGate;

    #[tokio::test]
    async fn resolve_by_execution_reaches_the_handle_recorded_on_request() {
        let inner: Arc<dyn ApprovalGate> = Arc::new(InMemoryApprovalGate::new());
        let indexed = IndexedApprovalGate::new(inner);
        let exec_id = ExecutionId::generate();
        indexed
            .request_approval(exec_id, Environment::Production, "alice".into())
            .await
            .unwrap();

        indexed
            .resolve_by_execution(&exec_id, ApprovalDecision::approve("bob".into()))
            .await
            .unwrap();

        let handle = indexed.handle_for(&exec_id).unwrap();
        let outcome = indexed.check(&handle).await.unwrap();
        assert!(outcome.is_approved());
    }

    #[tokio::test]
    async fn resolve_by_execution_without_a_prior_request_fails_not_found() {
        let inner: Arc<dyn ApprovalGate> = Arc::new(InMemoryApprovalGate::new());
        let indexed = IndexedApprovalGate::new(inner);
        let err = indexed
            .resolve_by_execution(&ExecutionId::generate(), ApprovalDecision::approve("bob".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }
}
