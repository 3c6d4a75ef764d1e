//! Configuration for sampling concurrency and stability windows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod duration_serde {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Tunables for `MetricsProbe` (spec 4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Maximum nodes sampled concurrently by `sample_cluster`.
    pub max_concurrency: usize,

    /// Interval between samples while polling in `wait_for_stable`.
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            sample_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let c = MetricsConfig::default();
        assert_eq!(c.max_concurrency, 16);
        assert_eq!(c.sample_interval, Duration::from_secs(5));
    }

    #[test]
    fn serializes_sample_interval_as_millis() {
        let json = serde_json::to_value(MetricsConfig::default()).unwrap();
        assert_eq!(json["sample_interval"], serde_json::json!(5_000));
    }
}
