//! Estimate and ladder commands

use anyhow::{bail, Result};
use colored::Colorize;
use nanny_lib::{
    build_estimator, format_list, Estimate, EstimatorKind, ExponentialEstimator, NannySettings,
    ResourceEstimator, ResourceRequirements,
};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_quantity, print_json, print_table, print_warning, OutputFormat};

/// Row for the estimate table
#[derive(Tabled)]
struct EstimateRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Acceptable")]
    acceptable: String,
}

#[derive(Serialize)]
struct EstimateReport {
    nodes: u64,
    estimator: EstimatorKind,
    expected: ResourceRequirements,
    acceptable: ResourceRequirements,
}

/// Row for the ladder table
#[derive(Tabled, Serialize)]
struct RungRow {
    #[tabled(rename = "Rung")]
    rung: usize,
    #[tabled(rename = "Nodes")]
    nodes: u64,
    #[tabled(rename = "Resources", display_with = "display_requirements")]
    resources: ResourceRequirements,
}

fn display_requirements(requirements: &ResourceRequirements) -> String {
    if requirements.requests.is_empty() {
        "-".to_string()
    } else {
        format_list(&requirements.requests)
    }
}

/// Show expected and acceptable resources for a node count
pub fn show_estimate(settings: &NannySettings, nodes: u64, format: OutputFormat) -> Result<()> {
    let estimator = build_estimator(&settings.estimator_config()?)?;
    let Estimate {
        expected,
        acceptable,
    } = estimator.estimate(nodes);

    match format {
        OutputFormat::Json => print_json(&EstimateReport {
            nodes,
            estimator: estimator.kind(),
            expected,
            acceptable,
        })?,
        OutputFormat::Table => {
            println!(
                "{} for {} nodes ({} estimator)",
                "Estimate".bold(),
                nodes.to_string().cyan(),
                estimator.kind()
            );
            if expected.requests.is_empty() {
                print_warning("No resources are configured");
                return Ok(());
            }

            let rows: Vec<EstimateRow> = expected
                .requests
                .iter()
                .map(|(resource, quantity)| EstimateRow {
                    resource: resource.clone(),
                    expected: quantity.to_string(),
                    acceptable: format_quantity(acceptable.requests.get(resource)),
                })
                .collect();
            print_table(rows);
        }
    }

    Ok(())
}

/// Show the first `count` rungs of the exponential ladder
pub fn show_ladder(settings: &NannySettings, count: usize, format: OutputFormat) -> Result<()> {
    let config = settings.estimator_config()?;
    if config.kind != EstimatorKind::Exponential {
        bail!(
            "the ladder is only defined for the exponential estimator (configured: {})",
            config.kind
        );
    }
    let estimator =
        ExponentialEstimator::new(config.resources, config.scale_factor, config.seed_rung)?;

    let rows: Vec<RungRow> = estimator
        .ladder()
        .take(count)
        .enumerate()
        .map(|(rung, nodes)| RungRow {
            rung,
            nodes,
            resources: estimator.estimate(nodes).expected,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            println!(
                "{} (scale factor {}, seed {})",
                "Exponential ladder".bold(),
                config.scale_factor,
                config.seed_rung
            );
            print_table(rows);
        }
    }

    Ok(())
}
