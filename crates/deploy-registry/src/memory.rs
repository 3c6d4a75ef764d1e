//! In-memory `Registry` implementation backed by `DashMap`: one map of
//! primary records plus secondary indexes for lookup by environment and
//! by node.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use deploy_types::{ActiveColor, Cluster, ClusterId, Environment, HealthSnapshot, Node, NodeId, NodeState};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::registry::Registry;

pub struct InMemoryRegistry {
    clusters: DashMap<ClusterId, RwLock<Cluster>>,
    env_index: DashMap<Environment, ClusterId>,
    node_index: DashMap<NodeId, ClusterId>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            clusters: DashMap::new(),
            env_index: DashMap::new(),
            node_index: DashMap::new(),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn register_cluster(&self, cluster: Cluster) -> Result<()> {
        self.env_index.insert(cluster.environment, cluster.id.clone());
        for node in &cluster.nodes {
            self.node_index.insert(node.id.clone(), cluster.id.clone());
        }
        self.clusters.insert(cluster.id.clone(), RwLock::new(cluster));
        Ok(())
    }

    async fn register_node(&self, mut node: Node) -> Result<()> {
        let cluster_id = node.cluster_id.clone();
        let cluster_lock = self
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id.clone()))?;
        let mut cluster = cluster_lock.write().await;

        node.state = NodeState::Unknown;
        node.last_heartbeat_at = Utc::now();

        if let Some(existing) = cluster.nodes.iter_mut().find(|n| n.id == node.id) {
            existing.address = node.address;
            existing.state = NodeState::Unknown;
            existing.last_heartbeat_at = node.last_heartbeat_at;
        } else {
            self.node_index.insert(node.id.clone(), cluster_id);
            cluster.nodes.push(node);
        }
        Ok(())
    }

    async fn deregister_node(&self, node_id: &NodeId) -> Result<()> {
        let Some((_, cluster_id)) = self.node_index.remove(node_id) else {
            return Ok(());
        };
        if let Some(cluster_lock) = self.clusters.get(&cluster_id) {
            let mut cluster = cluster_lock.write().await;
            cluster.nodes.retain(|n| &n.id != node_id);
        }
        Ok(())
    }

    async fn get_cluster(&self, environment: Environment) -> Result<Cluster> {
        let cluster_id = self
            .env_index
            .get(&environment)
            .ok_or_else(|| RegistryError::ClusterNotFound(environment.to_string()))?
            .clone();
        let cluster_lock = self
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id))?;
        Ok(cluster_lock.read().await.clone())
    }

    async fn available(
        &self,
        cluster_id: &ClusterId,
        heartbeat_grace: chrono::Duration,
    ) -> Result<Vec<Node>> {
        let cluster_lock = self
            .clusters
            .get(cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id.clone()))?;
        let cluster = cluster_lock.read().await;
        let now = Utc::now();
        let mut nodes: Vec<Node> = cluster
            .nodes
            .iter()
            .filter(|n| n.is_available(now, heartbeat_grace))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(nodes)
    }

    async fn heartbeat(
        &self,
        node_id: &NodeId,
        health: HealthSnapshot,
        latency_budget_ms: f64,
    ) -> Result<()> {
        let cluster_id = self
            .node_index
            .get(node_id)
            .map(|r| r.clone())
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;
        let cluster_lock = self
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id))?;
        let mut cluster = cluster_lock.write().await;
        let node = cluster
            .nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;

        // A node actively being updated is never touched by the heartbeat
        // loop; the strategy step owns it exclusively (spec 5).
        if node.state == NodeState::Updating {
            debug!(node_id = %node_id, "heartbeat skipped: node is updating");
            return Ok(());
        }

        node.last_heartbeat_at = Utc::now();
        node.health = health;

        node.state = if health.is_degraded(latency_budget_ms) {
            NodeState::Degraded
        } else {
            NodeState::Healthy
        };
        Ok(())
    }

    async fn sweep_expired_heartbeats(&self, heartbeat_grace: chrono::Duration) -> Result<usize> {
        let now = Utc::now();
        let mut expired = 0;
        for entry in self.clusters.iter() {
            let mut cluster = entry.value().write().await;
            for node in cluster.nodes.iter_mut() {
                if node.state == NodeState::Updating {
                    continue;
                }
                if now - node.last_heartbeat_at > heartbeat_grace && node.state != NodeState::Unhealthy {
                    warn!(node_id = %node.id, "heartbeat expired, marking unhealthy");
                    node.state = NodeState::Unhealthy;
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }

    async fn begin_update(&self, node_id: &NodeId) -> Result<Node> {
        let cluster_id = self
            .node_index
            .get(node_id)
            .map(|r| r.clone())
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;
        let cluster_lock = self
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id))?;
        let mut cluster = cluster_lock.write().await;
        let node = cluster
            .nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;
        node.state = NodeState::Updating;
        Ok(node.clone())
    }

    async fn complete_update(
        &self,
        node_id: &NodeId,
        new_version: Option<semver::Version>,
        success: bool,
    ) -> Result<()> {
        let cluster_id = self
            .node_index
            .get(node_id)
            .map(|r| r.clone())
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;
        let cluster_lock = self
            .clusters
            .get(&cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id))?;
        let mut cluster = cluster_lock.write().await;
        let node = cluster
            .nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .ok_or_else(|| RegistryError::NodeNotFound(node_id.clone()))?;

        if success {
            if let Some(v) = new_version {
                node.current_module_version = Some(v);
            }
            node.state = NodeState::Unknown;
            info!(node_id = %node_id, "node update completed");
        } else {
            node.state = NodeState::Unhealthy;
            warn!(node_id = %node_id, "node update failed");
        }
        Ok(())
    }

    async fn set_active_color(&self, cluster_id: &ClusterId, color: ActiveColor) -> Result<()> {
        let cluster_lock = self
            .clusters
            .get(cluster_id)
            .ok_or_else(|| RegistryError::ClusterIdNotFound(cluster_id.clone()))?;
        let mut cluster = cluster_lock.write().await;
        cluster.active_color = color;
        info!(cluster_id = %cluster_id, new_color = ?color, "active color flipped");
        Ok(())
    }
}
