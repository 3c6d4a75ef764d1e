//! The `ApprovalGate` contract (spec 4.6): holds deployments that need a
//! human decision before staging/production rollouts proceed.

use async_trait::async_trait;
use deploy_types::{ApprovalDecision, ApprovalHandle, Environment, ExecutionId};

use crate::request::ApprovalOutcome;
use crate::Result;

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Opens a pending approval for `execution_id`. Returns the handle the
    /// caller must hold on to in order to check or resolve it.
    async fn request_approval(
        &self,
        execution_id: ExecutionId,
        environment: Environment,
        requester_id: String,
    ) -> Result<ApprovalHandle>;

    /// Resolves a pending request. `decision.approver_id` MUST NOT equal the
    /// original requester (separation of duties).
    async fn resolve(&self, handle: &ApprovalHandle, decision: ApprovalDecision) -> Result<()>;

    async fn check(&self, handle: &ApprovalHandle) -> Result<ApprovalOutcome>;

    /// Auto-rejects every request still `Pending` past `timeout`, returning
    /// the count of requests timed out.
    async fn sweep_timeouts(&self, timeout: chrono::Duration) -> Result<usize>;
}
