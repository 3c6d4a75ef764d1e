//! `MetricsProbe`: bounded-concurrency sampling plus the stability wait used
//! by every rollout strategy (spec 4.4).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deploy_types::{HealthSnapshot, NodeId};
use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::config::MetricsConfig;
use crate::error::{MetricsError, Result};
use crate::source::MetricsSource;

/// A narrow view onto node availability, implemented by a caller that holds
/// a `deploy_registry::Registry` — kept as a trait here so this crate stays
/// decoupled from the registry's concrete types (see the crate doc comment).
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    /// Must return `true` only if every id in `node_ids` is currently
    /// Available (spec 4.4's definition, not just metrically healthy).
    async fn all_available(&self, node_ids: &[NodeId]) -> bool;
}

/// An `AvailabilityCheck` that treats every node as available; used in
/// tests and by callers with no Registry-backed notion of availability.
pub struct AlwaysAvailable;

#[async_trait]
impl AvailabilityCheck for AlwaysAvailable {
    async fn all_available(&self, _node_ids: &[NodeId]) -> bool {
        true
    }
}

/// Budgets a target set must stay within to be considered stable. Canary
/// uses stricter values than Rolling (spec 4.4, 4.5.3).
#[derive(Debug, Clone, Copy)]
pub struct StabilityBudgets {
    pub error_rate_budget: f64,
    pub p95_latency_budget_ms: f64,
}

pub struct MetricsProbe {
    source: Arc<dyn MetricsSource>,
    config: MetricsConfig,
}

impl MetricsProbe {
    pub fn new(source: Arc<dyn MetricsSource>, config: MetricsConfig) -> Self {
        Self { source, config }
    }

    pub async fn sample_node(&self, node_id: &NodeId) -> Result<HealthSnapshot> {
        self.source.sample_node(node_id).await
    }

    /// Gathers one snapshot per node, bounded by `max_concurrency`.
    pub async fn sample_cluster(
        &self,
        node_ids: &[NodeId],
    ) -> HashMap<NodeId, Result<HealthSnapshot>> {
        let results: Vec<(NodeId, Result<HealthSnapshot>)> = stream::iter(node_ids.iter().cloned())
            .map(|id| {
                let source = Arc::clone(&self.source);
                async move {
                    let result = source.sample_node(&id).await;
                    (id, result)
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;
        results.into_iter().collect()
    }

    /// Blocks until `node_ids` is stable continuously through `window`, or
    /// returns `MetricsError::Transient` on timeout. "Stable" is spec 4.4's
    /// full predicate: all of `node_ids` Available (re-checked via
    /// `availability` every iteration, since a node can drop out of
    /// Available — e.g. sitting in `Unknown` right after an update,
    /// pending its next heartbeat — mid-window) AND within the error-rate
    /// and p95 budgets.
    pub async fn wait_for_stable(
        &self,
        node_ids: &[NodeId],
        availability: &dyn AvailabilityCheck,
        window: Duration,
        budgets: StabilityBudgets,
    ) -> Result<()> {
        if node_ids.is_empty() {
            return Ok(());
        }
        let deadline = tokio::time::Instant::now() + window;
        let mut stable_since: Option<tokio::time::Instant> = None;

        loop {
            let samples = self.sample_cluster(node_ids).await;
            let stable_now = availability.all_available(node_ids).await && Self::is_stable(&samples, budgets);
            let now = tokio::time::Instant::now();

            if stable_now {
                let since = stable_since.get_or_insert(now);
                if now.duration_since(*since) >= window {
                    return Ok(());
                }
            } else {
                stable_since = None;
                debug!(nodes = node_ids.len(), "stability window reset");
            }

            if now >= deadline && stable_since.is_none() {
                return Err(MetricsError::Transient(
                    "stability window did not settle before timeout".to_string(),
                ));
            }

            tokio::time::sleep(self.config.sample_interval).await;
        }
    }

    fn is_stable(samples: &HashMap<NodeId, Result<HealthSnapshot>>, budgets: StabilityBudgets) -> bool {
        if samples.is_empty() {
            return false;
        }
        let mut sum_error_rate = 0.0;
        let mut max_p95 = 0.0_f64;
        for result in samples.values() {
            match result {
                Ok(snapshot) => {
                    sum_error_rate += snapshot.error_rate;
                    max_p95 = max_p95.max(snapshot.p95_latency_ms);
                }
                Err(_) => return false,
            }
        }
        let mean_error_rate = sum_error_rate / samples.len() as f64;
        mean_error_rate <= budgets.error_rate_budget && max_p95 <= budgets.p95_latency_budget_ms
    }
}
