//! Builds the `Strategy` named by a `StrategyChoice`, wiring in the shared
//! `Registry`, `NodeDriver` and `MetricsProbe` each strategy needs.

use std::sync::Arc;

use deploy_metrics::{MetricsProbe, StabilityBudgets};
use deploy_registry::Registry;
use deploy_strategies::{BlueGreenStrategy, CanaryStrategy, DirectStrategy, NodeDriver, RollingStrategy, Strategy};
use deploy_types::{DeployConfig, StrategyChoice};

pub fn build_strategy(
    choice: &StrategyChoice,
    registry: Arc<dyn Registry>,
    driver: Arc<dyn NodeDriver>,
    probe: Arc<MetricsProbe>,
    config: &DeployConfig,
) -> Arc<dyn Strategy> {
    match choice {
        StrategyChoice::Direct { parallelism } => Arc::new(DirectStrategy::new(
            registry,
            driver,
            parallelism.unwrap_or(config.parallelism),
            config.direct_settle_timeout,
        )),
        StrategyChoice::Rolling {
            batch_size,
            max_unavailable: _,
        } => Arc::new(RollingStrategy::new(
            registry,
            driver,
            probe,
            batch_size.unwrap_or(config.batch_size),
            config.batch_settle_window,
            StabilityBudgets {
                error_rate_budget: config.error_rate_budget,
                p95_latency_budget_ms: config.p95_latency_budget_ms,
            },
        )),
        StrategyChoice::BlueGreen { readiness_fraction } => Arc::new(BlueGreenStrategy::new(
            registry,
            driver,
            readiness_fraction.unwrap_or(config.blue_green_readiness_fraction),
            config.blue_hold_window,
        )),
        StrategyChoice::Canary { steps } => Arc::new(CanaryStrategy::new(
            registry,
            driver,
            probe,
            steps.clone().unwrap_or_else(|| config.canary_steps.clone()),
            config.step_hold_window,
            StabilityBudgets {
                error_rate_budget: config.error_rate_budget_canary,
                p95_latency_budget_ms: config.p95_latency_budget_ms,
            },
            config.error_rate_regression_budget,
            config.latency_regression_budget_ms,
        )),
    }
}
