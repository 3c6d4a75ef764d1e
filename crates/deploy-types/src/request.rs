//! Inbound deployment requests and the strategy configuration they may carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::module::{Environment, Module};

/// A rollout strategy selection with its tunables. `None` fields fall back
/// to the environment defaults computed by `deploy-strategies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyChoice {
    Direct {
        parallelism: Option<usize>,
    },
    Rolling {
        batch_size: Option<usize>,
        max_unavailable: Option<usize>,
    },
    BlueGreen {
        readiness_fraction: Option<f64>,
    },
    Canary {
        steps: Option<Vec<u8>>,
    },
}

impl StrategyChoice {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyChoice::Direct { .. } => "direct",
            StrategyChoice::Rolling { .. } => "rolling",
            StrategyChoice::BlueGreen { .. } => "blue_green",
            StrategyChoice::Canary { .. } => "canary",
        }
    }

    /// Default strategy per environment (spec 4.5): Development → Direct,
    /// QA → Rolling, Staging → BlueGreen, Production → Canary.
    pub fn default_for(env: Environment) -> Self {
        match env {
            Environment::Development => StrategyChoice::Direct { parallelism: None },
            Environment::QA => StrategyChoice::Rolling {
                batch_size: None,
                max_unavailable: None,
            },
            Environment::Staging => StrategyChoice::BlueGreen {
                readiness_fraction: None,
            },
            Environment::Production => StrategyChoice::Canary { steps: None },
        }
    }
}

/// An immutable request to deploy a module into an environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub module: Module,
    pub target_environment: Environment,
    pub strategy: Option<StrategyChoice>,
    pub requester_id: String,
    pub requested_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

impl DeploymentRequest {
    /// The strategy this request resolves to, applying the environment
    /// default when the caller did not override it.
    pub fn resolved_strategy(&self) -> StrategyChoice {
        self.strategy
            .clone()
            .unwrap_or_else(|| StrategyChoice::default_for(self.target_environment))
    }

    /// The serialization key this request contends for (spec 3, 4.8).
    pub fn serialization_key(&self) -> (Environment, String) {
        (self.target_environment, self.module.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleName;
    use semver::Version;
    use std::collections::HashMap;

    fn sample_module() -> Module {
        Module {
            name: ModuleName::parse("auth").unwrap(),
            version: Version::parse("1.4.0").unwrap(),
            binary_ref: "blob://auth-1.4.0".into(),
            signature: vec![1, 2, 3],
            signer_cert_chain: vec![],
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn request_without_strategy_resolves_to_environment_default() {
        let req = DeploymentRequest {
            module: sample_module(),
            target_environment: Environment::Production,
            strategy: None,
            requester_id: "alice".into(),
            requested_at: Utc::now(),
            correlation_id: None,
        };
        assert_eq!(req.resolved_strategy().name(), "canary");
    }

    #[test]
    fn request_with_explicit_strategy_overrides_default() {
        let req = DeploymentRequest {
            module: sample_module(),
            target_environment: Environment::Production,
            strategy: Some(StrategyChoice::Direct { parallelism: None }),
            requester_id: "alice".into(),
            requested_at: Utc::now(),
            correlation_id: None,
        };
        assert_eq!(req.resolved_strategy().name(), "direct");
    }

    #[test]
    fn serialization_key_is_env_and_module_name() {
        let req = DeploymentRequest {
            module: sample_module(),
            target_environment: Environment::Staging,
            strategy: None,
            requester_id: "alice".into(),
            requested_at: Utc::now(),
            correlation_id: None,
        };
        assert_eq!(
            req.serialization_key(),
            (Environment::Staging, "auth".to_string())
        );
    }
}
