//! Nanny configuration
//!
//! Settings come from an optional file (`NANNY_CONFIG_FILE`) overlaid by `NANNY_*`
//! environment variables, and are immutable once loaded.

use crate::cluster::TargetContainer;
use crate::estimator::{
    default_scale_factor, EstimatorConfig, EstimatorError, EstimatorKind, DEFAULT_SEED_RUNG,
};
use crate::models::{resource_names, ResourceSpec};
use crate::poll::PollConfig;
use crate::quantity::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_FILE_ENV: &str = "NANNY_CONFIG_FILE";

/// Prefix of environment overrides, e.g. `NANNY_THRESHOLD`
pub const ENV_PREFIX: &str = "NANNY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// Nanny settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NannySettings {
    /// Base cpu; cpu is managed only when this is set
    #[serde(default)]
    pub cpu: Option<Quantity>,
    /// Cpu added per node
    #[serde(default)]
    pub extra_cpu: Option<Quantity>,

    #[serde(default)]
    pub memory: Option<Quantity>,
    #[serde(default)]
    pub extra_memory: Option<Quantity>,

    #[serde(default)]
    pub storage: Option<Quantity>,
    #[serde(default)]
    pub extra_storage: Option<Quantity>,

    /// `linear` or `exponential`
    #[serde(default)]
    pub estimator: EstimatorKind,

    #[serde(default = "default_scale_factor")]
    pub scale_factor: Decimal,

    #[serde(default = "default_seed_rung")]
    pub seed_rung: u64,

    /// Drift tolerance in percent
    #[serde(default)]
    pub threshold: u32,

    #[serde(default = "default_poll_period")]
    pub poll_period_secs: u64,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub deployment: Option<String>,

    #[serde(default)]
    pub container: Option<String>,

    /// Pod the current resources are read from (Kubernetes downward API)
    #[serde(default = "default_pod_name")]
    pub pod_name: Option<String>,

    /// Health and metrics port
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_seed_rung() -> u64 {
    DEFAULT_SEED_RUNG
}

fn default_poll_period() -> u64 {
    10
}

fn default_namespace() -> String {
    std::env::var("MY_POD_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

fn default_pod_name() -> Option<String> {
    std::env::var("MY_POD_NAME").ok()
}

fn default_api_port() -> u16 {
    8080
}

impl NannySettings {
    /// Load from `NANNY_CONFIG_FILE` (if set) and the environment
    pub fn load() -> Result<Self, SettingsError> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any) and the environment
    pub fn load_from(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(config)
    }

    /// Deserialize and validate an already assembled configuration
    pub fn from_config(config: config::Config) -> Result<Self, SettingsError> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.threshold > 100 {
            return Err(SettingsError::Invalid(format!(
                "threshold must be between 0 and 100, got {}",
                self.threshold
            )));
        }
        if self.poll_period_secs == 0 {
            return Err(SettingsError::Invalid(
                "poll_period_secs must be positive".to_string(),
            ));
        }
        self.estimator_config()?;
        Ok(())
    }

    /// Managed dimensions as (name, base, increment)
    fn dimensions(&self) -> [(&'static str, Option<Quantity>, Option<Quantity>); 3] {
        [
            (resource_names::CPU, self.cpu, self.extra_cpu),
            (resource_names::MEMORY, self.memory, self.extra_memory),
            (resource_names::STORAGE, self.storage, self.extra_storage),
        ]
    }

    /// Validated estimator configuration
    pub fn estimator_config(&self) -> Result<EstimatorConfig, SettingsError> {
        let mut resources = Vec::new();
        for (name, base, extra) in self.dimensions() {
            match (base, extra) {
                (Some(base), extra) => resources.push(ResourceSpec::new(
                    name,
                    base,
                    extra.unwrap_or_else(Quantity::zero),
                )),
                (None, Some(_)) => {
                    return Err(SettingsError::Invalid(format!(
                        "extra_{} is set but {} is not",
                        name, name
                    )))
                }
                (None, None) => {}
            }
        }

        let config = EstimatorConfig {
            resources,
            kind: self.estimator,
            scale_factor: self.scale_factor,
            seed_rung: self.seed_rung,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            period: Duration::from_secs(self.poll_period_secs),
            threshold: self.threshold,
        }
    }

    /// The managed container; deployment, container and pod name are required
    pub fn target(&self) -> Result<TargetContainer, SettingsError> {
        Ok(TargetContainer {
            namespace: self.namespace.clone(),
            deployment: self
                .deployment
                .clone()
                .ok_or(SettingsError::Missing("deployment"))?,
            pod: self
                .pod_name
                .clone()
                .ok_or(SettingsError::Missing("pod_name"))?,
            container: self
                .container
                .clone()
                .ok_or(SettingsError::Missing("container"))?,
        })
    }
}
