//! Pod nanny library
//!
//! Resizes the resources of a single deployment in proportion to the number of nodes in
//! the cluster. This crate provides:
//! - Exact resource quantities and resource models
//! - Linear and exponential resource estimators
//! - Drift detection with a tolerance threshold and hysteresis band
//! - The poll loop and its Kubernetes client
//! - Configuration, health checks and observability

pub mod cluster;
pub mod drift;
pub mod estimator;
pub mod health;
pub mod models;
pub mod observability;
pub mod poll;
pub mod quantity;
pub mod settings;

pub use drift::{check_dimensions, find_drift, should_overwrite, DimensionCheck, Drift};
pub use estimator::{
    build_estimator, Estimate, EstimatorConfig, EstimatorError, EstimatorKind,
    ExponentialEstimator, LinearEstimator, ResourceEstimator,
};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::{NannyMetrics, StructuredLogger};
pub use poll::{CycleOutcome, PollConfig, PollLoop, PollLoopBuilder};
pub use quantity::{Quantity, QuantityError, QuantityFormat};
pub use settings::{NannySettings, SettingsError};
