//! Cluster/node registry for the deployment orchestration core.
//!
//! This crate owns the `Cluster` and `Node` membership and the per-node
//! heartbeat state machine (spec 4.1). The `Registry` trait is the single
//! contract; `InMemoryRegistry` is the reference implementation suitable
//! for tests and single-process hosts.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod registry;

pub use error::{RegistryError, Result};
pub use memory::InMemoryRegistry;
pub use registry::Registry;
