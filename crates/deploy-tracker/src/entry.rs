//! A tracked execution is either still in progress or has reached a
//! terminal `DeploymentResult` (spec 4.7).

use chrono::{DateTime, Utc};
use deploy_types::{DeploymentResult, ExecutionId, PipelineExecutionState};

#[derive(Debug, Clone)]
pub enum TrackedEntry {
    InProgress(PipelineExecutionState),
    Terminal(DeploymentResult),
}

impl TrackedEntry {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            TrackedEntry::InProgress(s) => s.execution_id,
            TrackedEntry::Terminal(r) => r.state.execution_id,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            TrackedEntry::InProgress(s) => s.started_at,
            TrackedEntry::Terminal(r) => r.state.started_at,
        }
    }

    pub fn state(&self) -> &PipelineExecutionState {
        match self {
            TrackedEntry::InProgress(s) => s,
            TrackedEntry::Terminal(r) => &r.state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackedEntry::Terminal(_))
    }
}
