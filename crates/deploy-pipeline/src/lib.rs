//! The deployment pipeline: the seven-stage runner (spec 4.2) that drives
//! one `DeploymentRequest` from Validate through PostValidate, wiring
//! together `deploy-registry`, `deploy-verifier`, `deploy-metrics`,
//! `deploy-strategies`, `deploy-approval` and `deploy-tracker`.
//!
//! ## Architectural boundary
//!
//! This crate owns stage sequencing and terminal-status determination. It
//! does not own cluster membership (`deploy-registry`), signature policy
//! (`deploy-verifier`), health sampling (`deploy-metrics`) or rollout
//! mechanics (`deploy-strategies`) — it calls through their interfaces.
//! Concurrency control across concurrent requests for the same
//! `(environment, module)` is the orchestrator's job, one layer up.
//!
//! ## Usage
//!
//! ```no_run
//! use deploy_pipeline::{NullAuditSink, NullNotifier, PipelineRunner, SystemClock};
//! use deploy_types::{DeployConfig, DeploymentRequest, ExecutionId};
//! use tokio_util::sync::CancellationToken;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     registry: Arc<dyn deploy_registry::Registry>,
//! #     verifier: Arc<dyn deploy_verifier::Verifier>,
//! #     probe: Arc<deploy_metrics::MetricsProbe>,
//! #     driver: Arc<dyn deploy_strategies::NodeDriver>,
//! #     tracker: Arc<dyn deploy_tracker::Tracker>,
//! #     approval_gate: Arc<dyn deploy_approval::ApprovalGate>,
//! #     request: DeploymentRequest,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let runner = PipelineRunner {
//!     registry,
//!     verifier,
//!     probe,
//!     driver,
//!     tracker,
//!     approval_gate,
//!     notifier: Arc::new(NullNotifier),
//!     audit_sink: Arc::new(NullAuditSink),
//!     clock: Arc::new(SystemClock),
//!     config: DeployConfig::default(),
//! };
//! runner.run(ExecutionId::generate(), request, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod factory;
pub mod interfaces;
pub mod runner;

pub use error::{PipelineError, Result};
pub use factory::build_strategy;
pub use interfaces::{AuditSink, Clock, NullAuditSink, NullNotifier, Notifier, SystemClock};
pub use runner::PipelineRunner;
