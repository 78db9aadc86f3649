//! Drift check against a hypothetical set of applied resources

use anyhow::Result;
use colored::Colorize;
use nanny_lib::{
    build_estimator, check_dimensions, resource_names, DimensionCheck, NannySettings, Quantity,
    ResourceEstimator, ResourceList, ResourceRequirements,
};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{
    color_drift, format_quantity, print_info, print_json, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for the drift table
#[derive(Tabled)]
struct DriftRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Actual")]
    actual: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Acceptable")]
    acceptable: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&DimensionCheck> for DriftRow {
    fn from(check: &DimensionCheck) -> Self {
        Self {
            resource: check.resource.to_string(),
            field: check.field.to_string(),
            actual: format_quantity(check.actual.as_ref()),
            expected: format_quantity(check.expected.as_ref()),
            acceptable: format_quantity(check.acceptable.as_ref()),
            status: color_drift(check.drifted),
        }
    }
}

/// Drift decision for one node count
#[derive(Serialize)]
pub struct DriftReport {
    pub nodes: u64,
    pub threshold: u32,
    pub would_resize: bool,
    pub dimensions: Vec<DimensionCheck>,
    pub expected: ResourceRequirements,
}

impl DriftReport {
    /// Compare `actual` with the estimate for `nodes`
    pub fn evaluate(
        estimator: &dyn ResourceEstimator,
        nodes: u64,
        threshold: u32,
        actual: &ResourceRequirements,
    ) -> Self {
        let estimate = estimator.estimate(nodes);
        let dimensions =
            check_dimensions(threshold, actual, &estimate.expected, &estimate.acceptable);
        Self {
            nodes,
            threshold,
            would_resize: dimensions.iter().any(|d| d.drifted),
            dimensions,
            expected: estimate.expected,
        }
    }

    pub fn print(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => print_json(self)?,
            OutputFormat::Table => {
                println!(
                    "{} for {} nodes (threshold {}%)",
                    "Drift check".bold(),
                    self.nodes.to_string().cyan(),
                    self.threshold
                );
                if self.dimensions.is_empty() {
                    print_info("No cpu, memory or storage values to compare");
                } else {
                    print_table(self.dimensions.iter().map(DriftRow::from).collect());
                }

                if self.would_resize {
                    print_warning(&format!("Nanny would resize to {}", self.expected));
                } else {
                    print_success("Resources are within bounds");
                }
            }
        }
        Ok(())
    }
}

/// Evaluate the given values (applied as both requests and limits) against the estimate
pub fn check_resources(
    settings: &NannySettings,
    nodes: u64,
    cpu: Option<Quantity>,
    memory: Option<Quantity>,
    storage: Option<Quantity>,
    threshold: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    let estimator = build_estimator(&settings.estimator_config()?)?;

    let list: ResourceList = [
        (resource_names::CPU, cpu),
        (resource_names::MEMORY, memory),
        (resource_names::STORAGE, storage),
    ]
    .into_iter()
    .filter_map(|(name, quantity)| quantity.map(|q| (name.to_string(), q)))
    .collect();
    let actual = ResourceRequirements::uniform(list);

    let threshold = threshold.unwrap_or(settings.threshold);
    DriftReport::evaluate(estimator.as_ref(), nodes, threshold, &actual).print(format)
}
