//! The public orchestrator (spec 4.8): `Submit`, `Get`, `List`, `Approve`,
//! `Reject`, `Cancel`. This crate adds exactly two things on top of
//! `deploy-pipeline`: per-`(environment, module)` serialization so two
//! concurrent rollouts of the same module never race, and idempotency so a
//! retried `Submit` with the same key returns the in-flight execution
//! instead of starting a second one.
//!
//! ## Usage
//!
//! ```no_run
//! use deploy_approval::InMemoryApprovalGate;
//! use deploy_orchestrator::{IndexedApprovalGate, Orchestrator};
//! use deploy_pipeline::{NullAuditSink, NullNotifier, PipelineRunner, SystemClock};
//! use deploy_types::DeployConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(
//! #     registry: Arc<dyn deploy_registry::Registry>,
//! #     verifier: Arc<dyn deploy_verifier::Verifier>,
//! #     probe: Arc<deploy_metrics::MetricsProbe>,
//! #     driver: Arc<dyn deploy_strategies::NodeDriver>,
//! #     tracker: Arc<dyn deploy_tracker::Tracker>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let approval_index = Arc::new(IndexedApprovalGate::new(Arc::new(InMemoryApprovalGate::new())));
//! let runner = Arc::new(PipelineRunner {
//!     registry,
//!     verifier,
//!     probe,
//!     driver,
//!     tracker,
//!     approval_gate: approval_index.clone(),
//!     notifier: Arc::new(NullNotifier),
//!     audit_sink: Arc::new(NullAuditSink),
//!     clock: Arc::new(SystemClock),
//!     config: DeployConfig::default(),
//! });
//! let orchestrator = Orchestrator::new(runner, approval_index, Duration::from_secs(60));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod approval_index;
pub mod error;
pub mod keyed_lock;
pub mod orchestrator;

pub use approval_index::IndexedApprovalGate;
pub use error::{OrchestratorError, Result};
pub use keyed_lock::KeyedLock;
pub use orchestrator::Orchestrator;
