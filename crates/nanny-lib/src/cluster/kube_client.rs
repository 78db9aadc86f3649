//! Kubernetes API implementation of [`KubernetesClient`]

use super::convert::{from_k8s_requirements, to_k8s_requirements};
use super::{ClusterError, KubernetesClient};
use crate::models::ResourceRequirements;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Node, Pod};
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

/// Page size used when counting nodes
const NODE_PAGE_SIZE: u32 = 500;

/// Identity of the container whose resources are managed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContainer {
    pub namespace: String,
    /// Deployment that owns the container; resized on drift
    pub deployment: String,
    /// Running pod the current resources are read from
    pub pod: String,
    /// Container name inside both the pod and the deployment template
    pub container: String,
}

/// Cluster access through the Kubernetes API server
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    target: TargetContainer,
}

impl KubeClient {
    pub fn new(client: Client, target: TargetContainer) -> Self {
        Self { client, target }
    }

    /// Connect using the in-cluster service account or the local kubeconfig
    pub async fn try_default(target: TargetContainer) -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, target))
    }

    pub fn target(&self) -> &TargetContainer {
        &self.target
    }

    fn container_not_found(&self, kind: &'static str, name: &str) -> ClusterError {
        ClusterError::ContainerNotFound {
            kind,
            namespace: self.target.namespace.clone(),
            name: name.to_string(),
            container: self.target.container.clone(),
        }
    }

    fn find_container<'a>(&self, containers: &'a mut [Container]) -> Option<&'a mut Container> {
        containers
            .iter_mut()
            .find(|c| c.name == self.target.container)
    }
}

#[async_trait]
impl KubernetesClient for KubeClient {
    async fn count_nodes(&self) -> Result<u64, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let mut params = ListParams::default().limit(NODE_PAGE_SIZE);
        let mut count = 0u64;

        loop {
            let page = nodes.list_metadata(&params).await?;
            count += page.items.len() as u64;

            match page.metadata.continue_.filter(|token| !token.is_empty()) {
                Some(token) => params = params.continue_token(&token),
                None => break,
            }
        }

        debug!(nodes = count, "Counted cluster nodes");
        Ok(count)
    }

    async fn container_resources(&self) -> Result<ResourceRequirements, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.target.namespace);
        let pod = pods.get(&self.target.pod).await?;

        let mut containers = pod.spec.map(|spec| spec.containers).unwrap_or_default();
        let container = self
            .find_container(&mut containers)
            .ok_or_else(|| self.container_not_found("pod", &self.target.pod))?;

        match &container.resources {
            Some(resources) => from_k8s_requirements(resources),
            None => Ok(ResourceRequirements::default()),
        }
    }

    async fn update_deployment(&self, resources: &ResourceRequirements) -> Result<(), ClusterError> {
        let deployments: Api<Deployment> =
            Api::namespaced(self.client.clone(), &self.target.namespace);
        let mut deployment = deployments.get(&self.target.deployment).await?;

        let pod_spec = deployment
            .spec
            .as_mut()
            .and_then(|spec| spec.template.spec.as_mut())
            .ok_or_else(|| {
                ClusterError::Unavailable(format!(
                    "deployment {}/{} has no pod template",
                    self.target.namespace, self.target.deployment
                ))
            })?;

        let container = self
            .find_container(&mut pod_spec.containers)
            .ok_or_else(|| self.container_not_found("deployment", &self.target.deployment))?;

        let mut updated = to_k8s_requirements(resources);
        updated.claims = container.resources.take().and_then(|r| r.claims);
        container.resources = Some(updated);

        // Replace rather than patch so a concurrent edit fails the resourceVersion check.
        deployments
            .replace(&self.target.deployment, &PostParams::default(), &deployment)
            .await?;

        debug!(
            namespace = %self.target.namespace,
            deployment = %self.target.deployment,
            "Deployment resources replaced"
        );
        Ok(())
    }
}
