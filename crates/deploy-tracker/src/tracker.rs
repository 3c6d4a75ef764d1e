//! The `Tracker` contract (spec 4.7): the single source of truth for a
//! pipeline execution's state, keyed by `executionId`.

use async_trait::async_trait;
use deploy_types::{DeploymentRequest, DeploymentResult, ExecutionId, PipelineExecutionState};

use crate::entry::TrackedEntry;
use crate::filter::{ListFilter, Page, Pagination};
use crate::Result;

#[async_trait]
pub trait Tracker: Send + Sync {
    /// Fails `Conflict` if `execution_id` already exists (idempotency
    /// boundary at the orchestrator's Submit).
    async fn start(
        &self,
        execution_id: ExecutionId,
        request: DeploymentRequest,
    ) -> Result<PipelineExecutionState>;

    /// Replaces the stored state for `state.execution_id`. Rejects updates
    /// that move `lastUpdatedAt` backwards or that are not a legal DAG
    /// transition from the stored status.
    async fn update(&self, state: PipelineExecutionState) -> Result<()>;

    /// Terminal write; subsequent `update`/`complete` calls are rejected.
    async fn complete(&self, execution_id: &ExecutionId, result: DeploymentResult) -> Result<()>;

    async fn get(&self, execution_id: &ExecutionId) -> Result<PipelineExecutionState>;

    /// Stable order: `startedAt` desc, then `executionId`.
    async fn list_in_progress(&self) -> Result<Vec<PipelineExecutionState>>;

    async fn list_all(&self, filter: ListFilter, pagination: Pagination) -> Result<Page<TrackedEntry>>;

    /// Evicts terminal entries older than `retention`. Never evicts a
    /// non-terminal entry.
    async fn sweep_expired(&self, retention: chrono::Duration) -> Result<usize>;
}
