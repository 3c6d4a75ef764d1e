//! The `MetricsSource` contract: a single node's raw sampler.

use async_trait::async_trait;
use deploy_types::{HealthSnapshot, NodeId};

use crate::error::Result;

/// Samples a node's current health. Implementations talk to whatever the
/// fleet actually exposes (a `/metrics` endpoint, a sidecar, a cloud
/// provider API); `MetricsProbe` only ever sees this trait.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample_node(&self, node_id: &NodeId) -> Result<HealthSnapshot>;
}
