//! Outbound event shapes for the `Notifier` and `AuditSink` interfaces
//! (spec 6). The core only defines the payloads; hosts implement delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ExecutionId;
use crate::pipeline::{PipelineExecutionState, StageResult};

/// One event delivered to a `Notifier`. Delivery must be non-blocking to
/// the pipeline; failures are logged and swallowed by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeployEvent {
    OnStateChange {
        state: Box<PipelineExecutionState>,
    },
    OnStageComplete {
        execution_id: ExecutionId,
        stage: Box<StageResult>,
    },
    OnProgress {
        execution_id: ExecutionId,
        fraction: f64,
        message: String,
    },
}

impl DeployEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            DeployEvent::OnStateChange { state } => state.execution_id,
            DeployEvent::OnStageComplete { execution_id, .. } => *execution_id,
            DeployEvent::OnProgress { execution_id, .. } => *execution_id,
        }
    }
}

/// An append-only audit record. Approval decisions MUST be audited
/// synchronously before the pipeline resumes (spec 6); all other records
/// may be written off the hot path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl AuditRecord {
    pub fn new(event: impl Into<String>, actor: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            actor: actor.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
