//! Resource estimation from the cluster's node count
//!
//! An estimator turns a node count into two sets of requirements: the *expected* set the
//! deployment should be resized to, and the *acceptable* set marking the far edge of the
//! tolerance band. Two strategies are provided:
//! - [`LinearEstimator`]: resources grow by a fixed increment per node, with a one node band
//! - [`ExponentialEstimator`]: resources follow a geometric ladder of node counts so resizes
//!   get rarer as the cluster grows

use crate::models::{ResourceList, ResourceRequirements, ResourceSpec};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Default ladder seed: clusters smaller than this are provisioned as if they had 16 nodes
pub const DEFAULT_SEED_RUNG: u64 = 16;

/// Default growth ratio between consecutive ladder rungs
pub fn default_scale_factor() -> Decimal {
    Decimal::new(15, 1)
}

fn default_seed_rung() -> u64 {
    DEFAULT_SEED_RUNG
}

/// Errors raised while validating an estimator configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimatorError {
    #[error("resource {0:?} is configured more than once")]
    DuplicateResource(String),

    #[error("scale factor must be greater than 1, got {0}")]
    InvalidScaleFactor(Decimal),

    #[error("seed rung must be a positive node count")]
    InvalidSeedRung,
}

/// Estimation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    #[default]
    Linear,
    Exponential,
}

impl std::fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorKind::Linear => f.write_str("linear"),
            EstimatorKind::Exponential => f.write_str("exponential"),
        }
    }
}

/// Static estimator configuration, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Managed resource dimensions
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    /// Which strategy to build
    #[serde(default)]
    pub kind: EstimatorKind,
    /// Ratio between ladder rungs (exponential only)
    #[serde(default = "default_scale_factor")]
    pub scale_factor: Decimal,
    /// Smallest node count the ladder provisions for (exponential only)
    #[serde(default = "default_seed_rung")]
    pub seed_rung: u64,
}

impl EstimatorConfig {
    pub fn linear(resources: Vec<ResourceSpec>) -> Self {
        Self {
            resources,
            kind: EstimatorKind::Linear,
            scale_factor: default_scale_factor(),
            seed_rung: DEFAULT_SEED_RUNG,
        }
    }

    pub fn exponential(resources: Vec<ResourceSpec>, scale_factor: Decimal, seed_rung: u64) -> Self {
        Self {
            resources,
            kind: EstimatorKind::Exponential,
            scale_factor,
            seed_rung,
        }
    }

    /// Check the invariants every estimator relies on
    pub fn validate(&self) -> Result<(), EstimatorError> {
        validate_resources(&self.resources)?;
        if self.kind == EstimatorKind::Exponential {
            if self.scale_factor <= Decimal::ONE {
                return Err(EstimatorError::InvalidScaleFactor(self.scale_factor));
            }
            if self.seed_rung == 0 {
                return Err(EstimatorError::InvalidSeedRung);
            }
        }
        Ok(())
    }
}

fn validate_resources(resources: &[ResourceSpec]) -> Result<(), EstimatorError> {
    let mut seen = HashSet::new();
    for resource in resources {
        if !seen.insert(resource.name.as_str()) {
            return Err(EstimatorError::DuplicateResource(resource.name.clone()));
        }
    }
    Ok(())
}

/// Target and tolerance-edge requirements for one node count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Estimate {
    /// What the deployment is resized to
    pub expected: ResourceRequirements,
    /// Far edge of the band inside which no resize happens
    pub acceptable: ResourceRequirements,
}

/// Maps a node count to expected and acceptable requirements
///
/// Implementations are pure: the same node count always yields the same estimate.
pub trait ResourceEstimator: Send + Sync {
    /// Estimate requirements for a cluster of `nodes` nodes
    fn estimate(&self, nodes: u64) -> Estimate;

    /// Strategy name for logs and metrics
    fn kind(&self) -> EstimatorKind;
}

/// Resources grow by a fixed increment per node
#[derive(Debug, Clone)]
pub struct LinearEstimator {
    resources: Vec<ResourceSpec>,
}

impl LinearEstimator {
    pub fn new(resources: Vec<ResourceSpec>) -> Result<Self, EstimatorError> {
        validate_resources(&resources)?;
        Ok(Self { resources })
    }
}

impl ResourceEstimator for LinearEstimator {
    fn estimate(&self, nodes: u64) -> Estimate {
        Estimate {
            expected: requirements_for(&self.resources, nodes),
            acceptable: requirements_for(&self.resources, nodes.saturating_add(1)),
        }
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Linear
    }
}

/// Resources follow a geometric ladder of node counts
///
/// The ladder starts at `seed_rung` and each rung is `floor(previous * scale_factor)`.
/// A cluster is provisioned for the smallest rung holding it and tolerated up to the rung
/// after that, so the band widens as the cluster grows.
#[derive(Debug, Clone)]
pub struct ExponentialEstimator {
    resources: Vec<ResourceSpec>,
    scale_factor: Decimal,
    seed_rung: u64,
}

impl ExponentialEstimator {
    pub fn new(
        resources: Vec<ResourceSpec>,
        scale_factor: Decimal,
        seed_rung: u64,
    ) -> Result<Self, EstimatorError> {
        EstimatorConfig::exponential(resources.clone(), scale_factor, seed_rung).validate()?;
        Ok(Self {
            resources,
            scale_factor,
            seed_rung,
        })
    }

    /// The rung following `rung`
    ///
    /// Always strictly larger than `rung` (until `u64::MAX`), even when flooring would
    /// leave a small rung unchanged.
    pub fn next_rung(&self, rung: u64) -> u64 {
        let scaled = Decimal::from(rung)
            .checked_mul(self.scale_factor)
            .and_then(|d| d.floor().to_u64())
            .unwrap_or(u64::MAX);
        scaled.max(rung.saturating_add(1))
    }

    /// Smallest rung at or above `nodes`
    pub fn effective_rung(&self, nodes: u64) -> u64 {
        let mut rung = self.seed_rung;
        while rung < nodes {
            rung = self.next_rung(rung);
        }
        rung
    }

    /// The ladder, starting from the seed rung
    pub fn ladder(&self) -> impl Iterator<Item = u64> + '_ {
        std::iter::successors(Some(self.seed_rung), move |&rung| {
            (rung < u64::MAX).then(|| self.next_rung(rung))
        })
    }
}

impl ResourceEstimator for ExponentialEstimator {
    fn estimate(&self, nodes: u64) -> Estimate {
        let rung = self.effective_rung(nodes);
        Estimate {
            expected: requirements_for(&self.resources, rung),
            acceptable: requirements_for(&self.resources, self.next_rung(rung)),
        }
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Exponential
    }
}

fn requirements_for(resources: &[ResourceSpec], nodes: u64) -> ResourceRequirements {
    let list: ResourceList = resources
        .iter()
        .map(|r| (r.name.clone(), r.amount_for(nodes)))
        .collect();
    ResourceRequirements::uniform(list)
}

/// Build the estimator selected by the configuration
pub fn build_estimator(config: &EstimatorConfig) -> Result<Arc<dyn ResourceEstimator>, EstimatorError> {
    config.validate()?;
    match config.kind {
        EstimatorKind::Linear => {
            tracing::info!(resources = config.resources.len(), "Using linear estimator");
            Ok(Arc::new(LinearEstimator::new(config.resources.clone())?))
        }
        EstimatorKind::Exponential => {
            tracing::info!(
                resources = config.resources.len(),
                scale_factor = %config.scale_factor,
                seed_rung = config.seed_rung,
                "Using exponential estimator"
            );
            Ok(Arc::new(ExponentialEstimator::new(
                config.resources.clone(),
                config.scale_factor,
                config.seed_rung,
            )?))
        }
    }
}
