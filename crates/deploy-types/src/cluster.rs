//! Clusters: the set of nodes serving one environment.

use serde::{Deserialize, Serialize};

use crate::ids::ClusterId;
use crate::module::Environment;
use crate::node::{Node, NodeState};

/// The logical color currently serving traffic in a Blue-Green cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveColor {
    Blue,
    Green,
}

impl ActiveColor {
    pub fn flipped(self) -> Self {
        match self {
            ActiveColor::Blue => ActiveColor::Green,
            ActiveColor::Green => ActiveColor::Blue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub environment: Environment,
    pub nodes: Vec<Node>,
    pub active_color: ActiveColor,
}

impl Cluster {
    pub fn new(id: ClusterId, environment: Environment) -> Self {
        Self {
            id,
            environment,
            nodes: Vec::new(),
            active_color: ActiveColor::Blue,
        }
    }

    /// `HealthyFraction = |Healthy nodes| / |nodes|` (spec 4.1).
    pub fn healthy_fraction(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let healthy = self
            .nodes
            .iter()
            .filter(|n| n.state == NodeState::Healthy)
            .count();
        healthy as f64 / self.nodes.len() as f64
    }

    /// Cluster is Serving iff `HealthyFraction >= minHealthyFraction`.
    pub fn is_serving(&self, min_healthy_fraction: f64) -> bool {
        self.healthy_fraction() >= min_healthy_fraction
    }
}
