//! Health tracking for the nanny
//!
//! Components report their state after every poll cycle; the API server turns the
//! registry into liveness and readiness responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last operation succeeded
    Healthy,
    /// Last operation failed; the loop keeps retrying
    Degraded,
}

/// Health of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failures since the last success
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// A failure following `previous`
    fn failed(previous: Option<&ComponentHealth>, message: String) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message),
            consecutive_failures: previous.map_or(0, |h| h.consecutive_failures) + 1,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    /// Calls to the Kubernetes API server
    pub const CLUSTER_API: &str = "cluster_api";
    /// The resize loop itself
    pub const POLL_LOOP: &str = "poll_loop";
}

/// Shared registry of component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record a successful operation
    pub async fn set_healthy(&self, name: &str) {
        self.components
            .write()
            .await
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record a failed operation, counting consecutive failures
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        let mut components = self.components.write().await;
        let health = ComponentHealth::failed(components.get(name), message.into());
        components.insert(name.to_string(), health);
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn component(&self, name: &str) -> Option<ComponentHealth> {
        self.components.read().await.get(name).cloned()
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once the poll loop has started. Cluster API failures do not affect readiness.
    pub async fn readiness(&self) -> ReadinessResponse {
        if *self.ready.read().await {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some("Poll loop not started".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_API).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::CLUSTER_API].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_degraded_counts_consecutive_failures() {
        let registry = HealthRegistry::new();
        registry.register(components::CLUSTER_API).await;
        registry.register(components::POLL_LOOP).await;

        registry.set_degraded(components::CLUSTER_API, "timeout").await;
        registry.set_degraded(components::CLUSTER_API, "timeout").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let api = registry.component(components::CLUSTER_API).await.unwrap();
        assert_eq!(api.consecutive_failures, 2);
        assert_eq!(api.message.as_deref(), Some("timeout"));

        registry.set_healthy(components::CLUSTER_API).await;
        let api = registry.component(components::CLUSTER_API).await.unwrap();
        assert_eq!(api.consecutive_failures, 0);
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_follows_flag() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());

        registry.set_ready(true).await;
        registry.set_degraded(components::CLUSTER_API, "connection refused").await;
        assert!(registry.readiness().await.ready);
    }
}
