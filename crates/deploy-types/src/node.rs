//! Deployment targets and their health.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::ids::{ClusterId, NodeId};

/// A point-in-time health sample for a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub p95_latency_ms: f64,
    pub error_rate: f64,
    pub sampled_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn unknown() -> Self {
        Self {
            cpu_pct: 0.0,
            mem_pct: 0.0,
            p95_latency_ms: 0.0,
            error_rate: 0.0,
            sampled_at: Utc::now(),
        }
    }

    /// Degraded policy (spec 4.1): any threshold breach degrades the node.
    pub fn is_degraded(&self, latency_budget_ms: f64) -> bool {
        self.cpu_pct > 85.0
            || self.mem_pct > 85.0
            || self.error_rate > 0.02
            || self.p95_latency_ms > latency_budget_ms
    }
}

/// Lifecycle state of a node (spec 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
    Draining,
    Updating,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeState::Unknown => "unknown",
            NodeState::Healthy => "healthy",
            NodeState::Degraded => "degraded",
            NodeState::Unhealthy => "unhealthy",
            NodeState::Draining => "draining",
            NodeState::Updating => "updating",
        };
        write!(f, "{s}")
    }
}

/// An addressable deployment target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub cluster_id: ClusterId,
    pub address: String,
    pub state: NodeState,
    pub current_module_version: Option<Version>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub health: HealthSnapshot,
}

impl Node {
    pub fn new(id: NodeId, cluster_id: ClusterId, address: impl Into<String>) -> Self {
        Self {
            id,
            cluster_id,
            address: address.into(),
            state: NodeState::Unknown,
            current_module_version: None,
            last_heartbeat_at: Utc::now(),
            health: HealthSnapshot::unknown(),
        }
    }

    /// A node is Available for traffic iff Healthy and within heartbeat grace.
    pub fn is_available(&self, now: DateTime<Utc>, heartbeat_grace: chrono::Duration) -> bool {
        self.state == NodeState::Healthy && now - self.last_heartbeat_at <= heartbeat_grace
    }
}
