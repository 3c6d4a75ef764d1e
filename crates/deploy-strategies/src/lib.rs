//! Rollout strategies (spec 4.5): Direct, Rolling, Blue-Green and Canary all
//! implement the same `Strategy` interface over a `Cluster` and a target
//! `Module`, mutating nodes only through a host-supplied `NodeDriver`.

#![deny(unsafe_code)]

pub mod blue_green;
pub mod canary;
pub mod direct;
pub mod driver;
pub mod error;
pub mod node_update;
pub mod rolling;
pub mod strategy;

pub use blue_green::BlueGreenStrategy;
pub use canary::CanaryStrategy;
pub use direct::DirectStrategy;
pub use driver::NodeDriver;
pub use error::{Result, StrategyError};
pub use rolling::RollingStrategy;
pub use strategy::{ApplyOutcome, NullProgressSink, ProgressSink, RollbackOutcome, Strategy};
