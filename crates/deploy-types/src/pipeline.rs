//! Pipeline execution state: the one-way status DAG and per-stage results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ExecutionId;
use crate::request::DeploymentRequest;

/// Named stages run, in order, by the pipeline (spec 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageName {
    Validate,
    SignatureCheck,
    Prepare,
    SmokeTest,
    ApprovalGate,
    Deploy,
    PostValidate,
}

impl StageName {
    pub const SEQUENCE: [StageName; 7] = [
        StageName::Validate,
        StageName::SignatureCheck,
        StageName::Prepare,
        StageName::SmokeTest,
        StageName::ApprovalGate,
        StageName::Deploy,
        StageName::PostValidate,
    ];
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageName::Validate => "validate",
            StageName::SignatureCheck => "signature_check",
            StageName::Prepare => "prepare",
            StageName::SmokeTest => "smoke_test",
            StageName::ApprovalGate => "approval_gate",
            StageName::Deploy => "deploy",
            StageName::PostValidate => "post_validate",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub name: StageName,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl StageResult {
    pub fn pending(name: StageName) -> Self {
        Self {
            name,
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            message: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StageStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self) {
        self.status = StageStatus::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.message = Some(message.into());
    }

    pub fn skip(&mut self) {
        self.status = StageStatus::Skipped;
        self.finished_at = Some(Utc::now());
    }
}

/// Pipeline run status. Transitions are a one-way DAG (spec 4.2):
/// `Pending -> Running -> {Succeeded, Failed, RolledBack, Cancelled}`,
/// `Running -> AwaitingApproval -> Running | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Pending,
    Running,
    AwaitingApproval,
    Succeeded,
    Failed,
    RolledBack,
    Cancelled,
}

impl PipelineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStatus::Succeeded
                | PipelineStatus::Failed
                | PipelineStatus::RolledBack
                | PipelineStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal edge in the status DAG.
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Running, AwaitingApproval) => true,
            (Running, Succeeded | Failed | RolledBack | Cancelled) => true,
            (AwaitingApproval, Running | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::AwaitingApproval => "awaiting_approval",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::RolledBack => "rolled_back",
            PipelineStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// The full state of one pipeline run. `lastUpdatedAt` never decreases and
/// `status` only moves along the DAG above (spec 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecutionState {
    pub execution_id: ExecutionId,
    pub request: DeploymentRequest,
    pub status: PipelineStatus,
    pub current_stage: Option<StageName>,
    pub stages: Vec<StageResult>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub error_summary: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("illegal pipeline status transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: PipelineStatus,
    pub to: PipelineStatus,
}

impl PipelineExecutionState {
    pub fn new(execution_id: ExecutionId, request: DeploymentRequest) -> Self {
        let now = Utc::now();
        Self {
            execution_id,
            request,
            status: PipelineStatus::Pending,
            current_stage: None,
            stages: StageName::SEQUENCE.iter().map(|s| StageResult::pending(*s)).collect(),
            started_at: now,
            last_updated_at: now,
            error_summary: None,
        }
    }

    /// Transition `status`, enforcing the one-way DAG and monotonic
    /// `lastUpdatedAt`. Rejects illegal transitions rather than silently
    /// clamping them.
    pub fn transition(&mut self, next: PipelineStatus) -> Result<(), IllegalTransition> {
        if !self.status.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        // lastUpdatedAt never decreases even if Utc::now() returns an equal
        // or (on a clock step-back) earlier instant than a previous touch.
        if now > self.last_updated_at {
            self.last_updated_at = now;
        }
    }

    pub fn stage_mut(&mut self, name: StageName) -> &mut StageResult {
        self.stages
            .iter_mut()
            .find(|s| s.name == name)
            .expect("all stage names are pre-populated in StageName::SEQUENCE")
    }
}

/// Terminal snapshot of a finished execution plus rollout-level counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub state: PipelineExecutionState,
    pub nodes_updated: usize,
    pub nodes_rolled_back: usize,
    pub duration_ms: u64,
}
