//! Access to cluster state
//!
//! The poll loop only talks to the cluster through the [`KubernetesClient`] trait: count
//! nodes, read the managed container's resources, and write new resources to its
//! deployment. [`KubeClient`] implements it against the Kubernetes API.

mod convert;
mod kube_client;

pub use convert::{from_k8s_requirements, to_k8s_requirements};
pub use kube_client::{KubeClient, TargetContainer};

use crate::models::ResourceRequirements;
use crate::quantity::QuantityError;
use thiserror::Error;

pub use async_trait::async_trait;

/// Failure reading or writing cluster state
///
/// Every variant is transient from the poll loop's point of view: the cycle is abandoned
/// and the next one retries.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubernetes api request failed: {0}")]
    Api(#[from] kube::Error),

    #[error("container {container:?} not found in {kind} {namespace}/{name}")]
    ContainerNotFound {
        kind: &'static str,
        namespace: String,
        name: String,
        container: String,
    },

    #[error("invalid quantity for {resource}: {source}")]
    Quantity {
        resource: String,
        #[source]
        source: QuantityError,
    },

    #[error("{0}")]
    Unavailable(String),
}

/// Operations the nanny needs from the cluster
#[async_trait]
pub trait KubernetesClient: Send + Sync {
    /// Current number of nodes in the cluster
    async fn count_nodes(&self) -> Result<u64, ClusterError>;

    /// Limits and requests currently applied to the managed container
    async fn container_resources(&self) -> Result<ResourceRequirements, ClusterError>;

    /// Replace the managed container's resources in its deployment
    async fn update_deployment(&self, resources: &ResourceRequirements) -> Result<(), ClusterError>;
}
