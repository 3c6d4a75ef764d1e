//! `NodeDriver` (spec 6): the host-implemented interface through which a
//! strategy actually mutates a node. The core never prescribes how.

use async_trait::async_trait;
use deploy_types::{Module, Node};
use semver::Version;

use crate::error::Result;

#[async_trait]
pub trait NodeDriver: Send + Sync {
    async fn apply_module(&self, node: &Node, module: &Module) -> Result<()>;
    async fn rollback_module(&self, node: &Node, prior_version: Option<Version>) -> Result<()>;
}
