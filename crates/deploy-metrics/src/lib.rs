//! Node health sampling (spec 4.4): the `MetricsSource`/`MetricsProbe`
//! contract used by every rollout strategy to decide whether a target set of
//! nodes is healthy enough to keep advancing.
//!
//! This crate deliberately knows nothing about clusters or the registry —
//! it samples whatever `&[NodeId]` it is given. Callers combine
//! `deploy_registry::Registry::available` with `MetricsProbe` results to
//! get the full "Available AND within budget" stability predicate.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod probe;
pub mod source;

pub use config::MetricsConfig;
pub use error::{MetricsError, Result};
pub use probe::{AlwaysAvailable, AvailabilityCheck, MetricsProbe, StabilityBudgets};
pub use source::MetricsSource;
