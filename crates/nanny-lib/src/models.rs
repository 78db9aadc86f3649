//! Core data models for the nanny

use crate::quantity::Quantity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Resource names understood by the drift check
pub mod resource_names {
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const STORAGE: &str = "storage";

    /// Dimensions compared on every poll cycle
    pub const CANONICAL: [&str; 3] = [CPU, MEMORY, STORAGE];
}

/// Resource name to amount
pub type ResourceList = BTreeMap<String, Quantity>;

/// One scalable resource dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub base: Quantity,
    pub extra_per_node: Quantity,
}

impl ResourceSpec {
    pub fn new(name: impl Into<String>, base: Quantity, extra_per_node: Quantity) -> Self {
        Self {
            name: name.into(),
            base,
            extra_per_node,
        }
    }

    /// `base + extra_per_node * nodes`
    pub fn amount_for(&self, nodes: u64) -> Quantity {
        self.base
            .saturating_add(&self.extra_per_node.saturating_mul(nodes))
    }
}

/// Limits and requests of a single container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub limits: ResourceList,
    #[serde(default)]
    pub requests: ResourceList,
}

impl ResourceRequirements {
    /// Requirements whose limits and requests are the same list
    pub fn uniform(list: ResourceList) -> Self {
        Self {
            limits: list.clone(),
            requests: list,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }

    pub fn list(&self, field: RequirementField) -> &ResourceList {
        match field {
            RequirementField::Limits => &self.limits,
            RequirementField::Requests => &self.requests,
        }
    }
}

impl fmt::Display for ResourceRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "limits={} requests={}",
            format_list(&self.limits),
            format_list(&self.requests)
        )
    }
}

/// Which half of a `ResourceRequirements` a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementField {
    Requests,
    Limits,
}

impl RequirementField {
    /// Fields in the order the drift check visits them
    pub const ALL: [RequirementField; 2] = [RequirementField::Requests, RequirementField::Limits];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementField::Requests => "requests",
            RequirementField::Limits => "limits",
        }
    }
}

impl fmt::Display for RequirementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{cpu: 3300m, memory: 33Mi}`
pub fn format_list(list: &ResourceList) -> String {
    let entries: Vec<String> = list
        .iter()
        .map(|(name, quantity)| format!("{}: {}", name, quantity))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
