//! An in-memory `ApprovalGate`: a map of outstanding requests, backed by
//! `DashMap` for lock-free reads across handles, covering the full
//! request/resolve/timeout contract.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use deploy_types::{ApprovalDecision, ApprovalDecisionKind, ApprovalHandle, Environment, ExecutionId};
use tracing::{info, warn};

use crate::error::{ApprovalError, Result};
use crate::gate::ApprovalGate;
use crate::request::{ApprovalOutcome, ApprovalRequest, ApprovalState};

pub struct InMemoryApprovalGate {
    requests: DashMap<ApprovalHandle, ApprovalState>,
}

impl InMemoryApprovalGate {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    /// Reconstructs the gate after a restart from the Tracker's in-progress
    /// records (spec 4.6). With no durable approval store behind this
    /// process, any execution that was `AwaitingApproval` before the crash
    /// cannot have its original pending request recovered faithfully, so
    /// this is a soft gate: every carried-over execution is immediately
    /// recorded as timed out (auto-Reject) rather than silently dropped.
    pub fn new_after_restart(stale_pending: impl IntoIterator<Item = ApprovalRequest>) -> Self {
        let gate = Self::new();
        for request in stale_pending {
            warn!(
                execution_id = %request.execution_id,
                handle = %request.handle,
                "deploy-approval: degraded restart, treating stale pending approval as timed out"
            );
            gate.requests.insert(
                request.handle,
                ApprovalState {
                    request,
                    outcome: ApprovalOutcome::TimedOut,
                },
            );
        }
        gate
    }
}

impl Default for InMemoryApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalGate for InMemoryApprovalGate {
    async fn request_approval(
        &self,
        execution_id: ExecutionId,
        environment: Environment,
        requester_id: String,
    ) -> Result<ApprovalHandle> {
        let handle = ApprovalHandle::generate();
        let request = ApprovalRequest {
            handle,
            execution_id,
            environment,
            requester_id,
            requested_at: Utc::now(),
        };
        info!(execution_id = %execution_id, handle = %handle, %environment, "deploy-approval: approval requested");
        self.requests.insert(
            handle,
            ApprovalState {
                request,
                outcome: ApprovalOutcome::Pending,
            },
        );
        Ok(handle)
    }

    async fn resolve(&self, handle: &ApprovalHandle, decision: ApprovalDecision) -> Result<()> {
        let mut state = self
            .requests
            .get_mut(handle)
            .ok_or(ApprovalError::NotFound(*handle))?;

        if !state.outcome.is_pending() {
            return Err(ApprovalError::AlreadyResolved(*handle));
        }
        if decision.approver_id == state.request.requester_id {
            return Err(ApprovalError::SeparationOfDuties {
                requester_id: state.request.requester_id.clone(),
                approver_id: decision.approver_id.clone(),
            });
        }

        info!(
            handle = %handle,
            decision = ?decision.decision,
            approver_id = %decision.approver_id,
            "deploy-approval: request resolved"
        );
        state.outcome = ApprovalOutcome::Decided(decision);
        Ok(())
    }

    async fn check(&self, handle: &ApprovalHandle) -> Result<ApprovalOutcome> {
        self.requests
            .get(handle)
            .map(|s| s.outcome.clone())
            .ok_or(ApprovalError::NotFound(*handle))
    }

    async fn sweep_timeouts(&self, timeout: chrono::Duration) -> Result<usize> {
        let now = Utc::now();
        let mut timed_out = 0;
        for mut entry in self.requests.iter_mut() {
            if entry.outcome.is_pending() && now - entry.request.requested_at > timeout {
                warn!(
                    handle = %entry.request.handle,
                    execution_id = %entry.request.execution_id,
                    "deploy-approval: approval timed out, auto-rejecting"
                );
                entry.outcome = ApprovalOutcome::Decided(ApprovalDecision {
                    decision: ApprovalDecisionKind::Reject,
                    approver_id: "system:timeout".to_string(),
                    decided_at: now,
                    reason: Some("approvalTimeout elapsed".to_string()),
                });
                timed_out += 1;
            }
        }
        Ok(timed_out)
    }
}
