//! The resize loop
//!
//! Every poll period the loop counts nodes, reads the container's current resources,
//! estimates what they should be and writes the estimate back when the current values
//! have drifted. Any failed cluster call abandons the cycle; the next one retries.

use crate::cluster::KubernetesClient;
use crate::drift::find_drift;
use crate::estimator::ResourceEstimator;
use crate::health::{components, HealthRegistry};
use crate::observability::{NannyMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Configuration for the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between cycles (default: 10 seconds)
    pub period: Duration,
    /// Drift tolerance in percent, 0 to 100 (default: 0)
    pub threshold: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            threshold: 0,
        }
    }
}

/// How a poll cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Counting nodes failed; cycle abandoned
    NodeCountFailed,
    /// Reading the container's resources failed; cycle abandoned
    ResourcesReadFailed,
    /// Resources are close enough to the estimate
    WithinBounds,
    /// Resources drifted and the deployment was updated
    Updated,
    /// Resources drifted but the update failed
    UpdateFailed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::NodeCountFailed => "node_count_failed",
            CycleOutcome::ResourcesReadFailed => "resources_read_failed",
            CycleOutcome::WithinBounds => "within_bounds",
            CycleOutcome::Updated => "updated",
            CycleOutcome::UpdateFailed => "update_failed",
        }
    }
}

/// Poll loop holding the immutable configuration and its collaborators
pub struct PollLoop {
    client: Arc<dyn KubernetesClient>,
    estimator: Arc<dyn ResourceEstimator>,
    config: PollConfig,
    metrics: NannyMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl PollLoop {
    pub fn new(
        client: Arc<dyn KubernetesClient>,
        estimator: Arc<dyn ResourceEstimator>,
        config: PollConfig,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            client,
            estimator,
            config,
            metrics: NannyMetrics::new(),
            health,
            logger,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll forever; the first cycle runs immediately
    pub async fn run(self) {
        info!(
            period_secs = self.config.period.as_secs(),
            threshold = self.config.threshold,
            estimator = %self.estimator.kind(),
            "Starting poll loop"
        );
        self.health.set_ready(true).await;

        let mut first = true;
        loop {
            if !first {
                tokio::time::sleep(self.config.period).await;
            }
            first = false;
            self.run_cycle().await;
        }
    }

    /// Run one count → read → estimate → compare → write cycle
    pub async fn run_cycle(&self) -> CycleOutcome {
        let start = Instant::now();
        let outcome = self.cycle().await;

        self.metrics.inc_cycle(outcome.as_str());
        self.metrics.observe_cycle_duration(start.elapsed());
        match outcome {
            CycleOutcome::WithinBounds | CycleOutcome::Updated => {
                self.health.set_healthy(components::POLL_LOOP).await;
            }
            _ => {
                self.health
                    .set_degraded(components::POLL_LOOP, outcome.as_str())
                    .await;
            }
        }
        outcome
    }

    async fn cycle(&self) -> CycleOutcome {
        let nodes = match self.client.count_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                self.logger.log_cycle_skipped("count_nodes", &e);
                self.api_failed("count_nodes", e.to_string()).await;
                return CycleOutcome::NodeCountFailed;
            }
        };
        self.metrics.set_node_count(nodes);

        let actual = match self.client.container_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                self.logger.log_cycle_skipped("container_resources", &e);
                self.api_failed("container_resources", e.to_string()).await;
                return CycleOutcome::ResourcesReadFailed;
            }
        };

        let estimate = self.estimator.estimate(nodes);
        self.metrics.set_estimate(&estimate);

        let Some(drift) = find_drift(
            self.config.threshold,
            &actual,
            &estimate.expected,
            &estimate.acceptable,
        ) else {
            self.health.set_healthy(components::CLUSTER_API).await;
            self.logger
                .log_within_bounds(nodes, &actual, &estimate.expected);
            return CycleOutcome::WithinBounds;
        };

        self.logger
            .log_resize(nodes, &drift, &actual, &estimate.expected);
        match self.client.update_deployment(&estimate.expected).await {
            Ok(()) => {
                self.health.set_healthy(components::CLUSTER_API).await;
                self.metrics.inc_resource_updates();
                self.logger.log_resized(nodes, &estimate.expected);
                CycleOutcome::Updated
            }
            Err(e) => {
                self.logger.log_update_failed(&e);
                self.api_failed("update_deployment", e.to_string()).await;
                CycleOutcome::UpdateFailed
            }
        }
    }

    async fn api_failed(&self, operation: &str, error: String) {
        self.metrics.inc_api_error(operation);
        self.health
            .set_degraded(components::CLUSTER_API, format!("{}: {}", operation, error))
            .await;
    }
}

/// Builder for the poll loop
pub struct PollLoopBuilder {
    client: Option<Arc<dyn KubernetesClient>>,
    estimator: Option<Arc<dyn ResourceEstimator>>,
    config: PollConfig,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
}

impl PollLoopBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            estimator: None,
            config: PollConfig::default(),
            health: None,
            logger: None,
        }
    }

    pub fn client(mut self, client: Arc<dyn KubernetesClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn ResourceEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<PollLoop> {
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("Kubernetes client is required"))?;
        let estimator = self
            .estimator
            .ok_or_else(|| anyhow::anyhow!("Estimator is required"))?;
        if self.config.threshold > 100 {
            anyhow::bail!("threshold must be between 0 and 100, got {}", self.config.threshold);
        }

        Ok(PollLoop::new(
            client,
            estimator,
            self.config,
            self.health.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
        ))
    }
}

impl Default for PollLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
