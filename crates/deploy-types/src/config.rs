//! Injectable configuration (spec 6), with defaults a conforming host may
//! override.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::module::Environment;

/// Serializes a `Duration` as milliseconds.
pub mod duration_serde {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,
    #[serde(with = "duration_serde")]
    pub heartbeat_grace: Duration,

    pub batch_size: usize,
    pub parallelism: usize,

    pub blue_green_readiness_fraction: f64,
    #[serde(with = "duration_serde")]
    pub blue_hold_window: Duration,

    pub canary_steps: Vec<u8>,
    #[serde(with = "duration_serde")]
    pub step_hold_window: Duration,

    pub error_rate_budget: f64,
    pub error_rate_budget_canary: f64,
    pub p95_latency_budget_ms: f64,
    pub error_rate_regression_budget: f64,
    pub latency_regression_budget_ms: f64,

    #[serde(with = "duration_serde")]
    pub approval_timeout: Duration,
    #[serde(with = "duration_serde")]
    pub queue_wait: Duration,
    #[serde(with = "duration_serde")]
    pub result_retention: Duration,
    #[serde(with = "duration_serde")]
    pub direct_settle_timeout: Duration,
    #[serde(with = "duration_serde")]
    pub batch_settle_window: Duration,
    #[serde(with = "duration_serde")]
    pub post_validate_window: Duration,
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,
    #[serde(with = "duration_serde")]
    pub stage_timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_grace: Duration::from_secs(30),
            batch_size: 2,
            parallelism: usize::MAX,
            blue_green_readiness_fraction: 0.95,
            blue_hold_window: Duration::from_secs(15 * 60),
            canary_steps: vec![10, 30, 50, 100],
            step_hold_window: Duration::from_secs(5 * 60),
            error_rate_budget: 0.01,
            error_rate_budget_canary: 0.005,
            p95_latency_budget_ms: 500.0,
            error_rate_regression_budget: 0.005,
            latency_regression_budget_ms: 50.0,
            approval_timeout: Duration::from_secs(24 * 60 * 60),
            queue_wait: Duration::from_secs(60),
            result_retention: Duration::from_secs(7 * 24 * 60 * 60),
            direct_settle_timeout: Duration::from_secs(60),
            batch_settle_window: Duration::from_secs(2 * 60),
            post_validate_window: Duration::from_secs(5 * 60),
            sample_interval: Duration::from_secs(5),
            stage_timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl DeployConfig {
    /// Config tuned per environment.
    pub fn for_environment(env: Environment) -> Self {
        let mut config = Self::default();
        match env {
            Environment::Development => {
                config.approval_timeout = Duration::from_secs(0);
            }
            Environment::QA => {
                config.batch_size = 2;
            }
            Environment::Staging => {
                config.blue_green_readiness_fraction = 0.95;
            }
            Environment::Production => {
                config.canary_steps = vec![10, 30, 50, 100];
                config.error_rate_regression_budget = 0.005;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literals() {
        let c = DeployConfig::default();
        assert_eq!(c.canary_steps, vec![10, 30, 50, 100]);
        assert_eq!(c.blue_green_readiness_fraction, 0.95);
        assert_eq!(c.heartbeat_grace, Duration::from_secs(30));
        assert_eq!(c.approval_timeout, Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn serializes_durations_as_millis() {
        let c = DeployConfig::default();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["heartbeat_grace"], serde_json::json!(30_000));
    }
}
