//! Core entities for the deployment orchestration core.
//!
//! This crate owns the data model shared by every other `deploy-*` crate:
//! modules, deployment requests, pipeline execution state, nodes, clusters,
//! and the event/audit payloads exchanged with the host. It has no
//! behavior of its own — every operation lives in the crate that owns the
//! corresponding component (`deploy-registry`, `deploy-pipeline`, ...).

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod module;
pub mod node;
pub mod pipeline;
pub mod policy;
pub mod request;

pub use cluster::{ActiveColor, Cluster};
pub use config::DeployConfig;
pub use error::DeployErrorKind;
pub use events::{AuditRecord, DeployEvent};
pub use ids::{ApprovalHandle, ClusterId, ExecutionId, NodeId};
pub use module::{Environment, Module, ModuleName, ModuleNameError};
pub use node::{HealthSnapshot, Node, NodeState};
pub use pipeline::{
    DeploymentResult, IllegalTransition, PipelineExecutionState, PipelineStatus, StageName,
    StageResult, StageStatus,
};
pub use policy::{ApprovalDecision, ApprovalDecisionKind};
pub use request::{DeploymentRequest, StrategyChoice};
