//! Conversions between Kubernetes API objects and the nanny's models

use super::ClusterError;
use crate::models::{ResourceList, ResourceRequirements};
use k8s_openapi::api::core::v1::ResourceRequirements as K8sRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use std::collections::BTreeMap;

/// Parse the quantities of a container's `resources` block
pub fn from_k8s_requirements(
    requirements: &K8sRequirements,
) -> Result<ResourceRequirements, ClusterError> {
    Ok(ResourceRequirements {
        limits: parse_list(requirements.limits.as_ref())?,
        requests: parse_list(requirements.requests.as_ref())?,
    })
}

fn parse_list(list: Option<&BTreeMap<String, K8sQuantity>>) -> Result<ResourceList, ClusterError> {
    let Some(list) = list else {
        return Ok(ResourceList::new());
    };
    list.iter()
        .map(|(name, quantity)| {
            quantity
                .0
                .parse()
                .map(|q| (name.clone(), q))
                .map_err(|source| ClusterError::Quantity {
                    resource: name.clone(),
                    source,
                })
        })
        .collect()
}

/// Render requirements as a container `resources` block; empty lists are left unset
pub fn to_k8s_requirements(requirements: &ResourceRequirements) -> K8sRequirements {
    K8sRequirements {
        limits: render_list(&requirements.limits),
        requests: render_list(&requirements.requests),
        ..Default::default()
    }
}

fn render_list(list: &ResourceList) -> Option<BTreeMap<String, K8sQuantity>> {
    if list.is_empty() {
        return None;
    }
    Some(
        list.iter()
            .map(|(name, quantity)| (name.clone(), K8sQuantity(quantity.to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k8s_list(entries: &[(&str, &str)]) -> BTreeMap<String, K8sQuantity> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), K8sQuantity(value.to_string())))
            .collect()
    }

    #[test]
    fn test_from_k8s_requirements() {
        let k8s = K8sRequirements {
            limits: Some(k8s_list(&[("cpu", "300m"), ("memory", "30Mi")])),
            requests: None,
            ..Default::default()
        };
        let reqs = from_k8s_requirements(&k8s).unwrap();
        assert_eq!(reqs.limits["cpu"], "0.3".parse().unwrap());
        assert_eq!(reqs.limits["memory"], "31457280".parse().unwrap());
        assert!(reqs.requests.is_empty());
    }

    #[test]
    fn test_from_k8s_requirements_rejects_bad_quantity() {
        let k8s = K8sRequirements {
            requests: Some(k8s_list(&[("cpu", "lots")])),
            ..Default::default()
        };
        let err = from_k8s_requirements(&k8s).unwrap_err();
        assert!(matches!(err, ClusterError::Quantity { ref resource, .. } if resource == "cpu"));
    }

    #[test]
    fn test_to_k8s_requirements() {
        let mut list = ResourceList::new();
        list.insert("cpu".to_string(), "3.3".parse().unwrap());
        list.insert("storage".to_string(), "33Gi".parse().unwrap());
        let reqs = ResourceRequirements {
            limits: list,
            requests: ResourceList::new(),
        };

        let k8s = to_k8s_requirements(&reqs);
        let limits = k8s.limits.unwrap();
        assert_eq!(limits["cpu"].0, "3300m");
        assert_eq!(limits["storage"].0, "33Gi");
        assert!(k8s.requests.is_none());
    }
}
