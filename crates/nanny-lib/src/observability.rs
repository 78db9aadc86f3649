//! Observability for the nanny
//!
//! Provides:
//! - Prometheus metrics (node count, cycle outcomes, API errors, estimated resources)
//! - Structured JSON log events with tracing

use crate::drift::Drift;
use crate::estimator::Estimate;
use crate::models::ResourceRequirements;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use rust_decimal::prelude::ToPrimitive;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Buckets for poll cycle latency (in seconds); cycles are a few API round trips
const CYCLE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static GLOBAL_METRICS: OnceLock<NannyMetricsInner> = OnceLock::new();

struct NannyMetricsInner {
    node_count: IntGauge,
    cycles: IntCounterVec,
    api_errors: IntCounterVec,
    resource_updates: IntCounter,
    cycle_duration_seconds: Histogram,
    estimated_resources: GaugeVec,
    build_info: GaugeVec,
}

impl NannyMetricsInner {
    fn new() -> Self {
        Self {
            node_count: register_int_gauge!(
                "pod_nanny_node_count",
                "Number of nodes seen in the last successful count"
            )
            .expect("Failed to register node_count"),

            cycles: register_int_counter_vec!(
                "pod_nanny_cycles_total",
                "Poll cycles by outcome",
                &["outcome"]
            )
            .expect("Failed to register cycles"),

            api_errors: register_int_counter_vec!(
                "pod_nanny_cluster_api_errors_total",
                "Failed Kubernetes API calls by operation",
                &["operation"]
            )
            .expect("Failed to register api_errors"),

            resource_updates: register_int_counter!(
                "pod_nanny_resource_updates_total",
                "Deployment resource updates applied"
            )
            .expect("Failed to register resource_updates"),

            cycle_duration_seconds: register_histogram!(
                "pod_nanny_cycle_duration_seconds",
                "Time spent in one poll cycle, excluding the sleep",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            estimated_resources: register_gauge_vec!(
                "pod_nanny_estimated_resource",
                "Estimated resource amount for the current node count",
                &["resource", "kind"]
            )
            .expect("Failed to register estimated_resources"),

            build_info: register_gauge_vec!(
                "pod_nanny_build_info",
                "Nanny version and estimator strategy",
                &["version", "estimator"]
            )
            .expect("Failed to register build_info"),
        }
    }
}

/// Handle to the process-wide nanny metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct NannyMetrics {
    _private: (),
}

impl Default for NannyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NannyMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(NannyMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &NannyMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn set_build_info(&self, version: &str, estimator: &str) {
        self.inner().build_info.reset();
        self.inner()
            .build_info
            .with_label_values(&[version, estimator])
            .set(1.0);
    }

    pub fn set_node_count(&self, nodes: u64) {
        self.inner()
            .node_count
            .set(i64::try_from(nodes).unwrap_or(i64::MAX));
    }

    pub fn inc_cycle(&self, outcome: &str) {
        self.inner().cycles.with_label_values(&[outcome]).inc();
    }

    pub fn inc_api_error(&self, operation: &str) {
        self.inner().api_errors.with_label_values(&[operation]).inc();
    }

    pub fn inc_resource_updates(&self) {
        self.inner().resource_updates.inc();
    }

    pub fn observe_cycle_duration(&self, duration: Duration) {
        self.inner()
            .cycle_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Export the requests of an estimate; limits carry the same values
    pub fn set_estimate(&self, estimate: &Estimate) {
        let gauges = &self.inner().estimated_resources;
        for (kind, requirements) in [
            ("expected", &estimate.expected),
            ("acceptable", &estimate.acceptable),
        ] {
            for (resource, quantity) in &requirements.requests {
                let value = quantity.amount().to_f64().unwrap_or(f64::MAX);
                gauges.with_label_values(&[resource, kind]).set(value);
            }
        }
    }
}

/// Structured logger for nanny events
///
/// Every record carries an `event` field and the managed deployment.
#[derive(Clone)]
pub struct StructuredLogger {
    deployment: String,
}

impl StructuredLogger {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
        }
    }

    pub fn log_startup(&self, version: &str, estimator: &str, threshold: u32, poll_period: Duration) {
        info!(
            event = "nanny_started",
            deployment = %self.deployment,
            version = %version,
            estimator = %estimator,
            threshold_percent = threshold,
            poll_period_secs = poll_period.as_secs(),
            "Pod nanny started"
        );
    }

    /// A cycle abandoned because a cluster read failed
    pub fn log_cycle_skipped(&self, stage: &str, error: &dyn std::error::Error) {
        warn!(
            event = "cycle_skipped",
            deployment = %self.deployment,
            stage = %stage,
            error = %error,
            "Skipping poll cycle"
        );
    }

    pub fn log_within_bounds(&self, nodes: u64, actual: &ResourceRequirements, expected: &ResourceRequirements) {
        debug!(
            event = "resources_within_bounds",
            deployment = %self.deployment,
            nodes = nodes,
            actual = %actual,
            expected = %expected,
            "Resources are within the expected limits"
        );
    }

    pub fn log_resize(
        &self,
        nodes: u64,
        drift: &Drift,
        actual: &ResourceRequirements,
        expected: &ResourceRequirements,
    ) {
        info!(
            event = "resources_out_of_bounds",
            deployment = %self.deployment,
            nodes = nodes,
            drift = %drift,
            actual = %actual,
            expected = %expected,
            "Resources are not within the expected limits, updating the deployment"
        );
    }

    pub fn log_resized(&self, nodes: u64, expected: &ResourceRequirements) {
        info!(
            event = "resources_updated",
            deployment = %self.deployment,
            nodes = nodes,
            resources = %expected,
            "Deployment resources updated"
        );
    }

    pub fn log_update_failed(&self, error: &dyn std::error::Error) {
        warn!(
            event = "update_failed",
            deployment = %self.deployment,
            error = %error,
            "Failed to update deployment resources, retrying next cycle"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "nanny_shutdown",
            deployment = %self.deployment,
            reason = %reason,
            "Pod nanny shutting down"
        );
    }
}
