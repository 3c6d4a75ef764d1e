//! The `Registry` contract (spec 4.1): cluster/node membership, heartbeat
//! and availability queries.

use async_trait::async_trait;
use deploy_types::{ActiveColor, Cluster, Environment, HealthSnapshot, Node, NodeId};

use crate::error::Result;

#[async_trait]
pub trait Registry: Send + Sync {
    /// Register a cluster for an environment. Idempotent: re-registering
    /// an existing cluster id is a no-op on its node set.
    async fn register_cluster(&self, cluster: Cluster) -> Result<()>;

    /// `Register(node)`: idempotent; re-registering an existing id
    /// refreshes address and resets `state=Unknown`, `lastHeartbeatAt=now`.
    async fn register_node(&self, node: Node) -> Result<()>;

    /// `Deregister(nodeId)`: idempotent removal from cluster membership.
    async fn deregister_node(&self, node_id: &NodeId) -> Result<()>;

    /// `GetCluster(environment) -> Cluster`, fails `NotFound` if none
    /// configured for that environment.
    async fn get_cluster(&self, environment: Environment) -> Result<Cluster>;

    /// `Available(clusterId) -> ordered list<Node>`: nodes in stable order
    /// (insertion order, ties broken by id) that are currently Available.
    async fn available(
        &self,
        cluster_id: &deploy_types::ClusterId,
        heartbeat_grace: chrono::Duration,
    ) -> Result<Vec<Node>>;

    /// Apply a heartbeat + health sample, driving the per-node state
    /// machine (spec 4.1).
    async fn heartbeat(
        &self,
        node_id: &NodeId,
        health: HealthSnapshot,
        latency_budget_ms: f64,
    ) -> Result<()>;

    /// Sweep nodes whose heartbeat has gone stale past `heartbeatGrace`,
    /// marking them Unhealthy. Run on the periodic heartbeat schedule
    /// (spec 5), decoupled from pipeline execution.
    async fn sweep_expired_heartbeats(&self, heartbeat_grace: chrono::Duration) -> Result<usize>;

    /// Atomically flip a node into `Updating` state, the single-writer
    /// gate a strategy must hold before mutating the node (spec 5).
    async fn begin_update(&self, node_id: &NodeId) -> Result<Node>;

    /// Record the outcome of a strategy's mutation: on success the node's
    /// `currentModuleVersion` advances and state returns to `Unknown`
    /// (pending the next health sample); on failure state becomes
    /// `Unhealthy`.
    async fn complete_update(
        &self,
        node_id: &NodeId,
        new_version: Option<semver::Version>,
        success: bool,
    ) -> Result<()>;

    /// Flip the cluster's `activeColor` atomically (Blue-Green, spec 4.5.3).
    async fn set_active_color(
        &self,
        cluster_id: &deploy_types::ClusterId,
        color: ActiveColor,
    ) -> Result<()>;
}
