//! Pod nanny CLI
//!
//! Inspects what the nanny would do: estimates for a node count, the exponential
//! ladder, drift checks for hypothetical values and the live state of a deployment.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{check, estimate, status};
use nanny_lib::{NannySettings, Quantity};
use std::path::PathBuf;

/// Pod nanny CLI
#[derive(Parser)]
#[command(name = "nannyctl")]
#[command(author, version, about = "CLI for the pod nanny resource estimator", long_about = None)]
pub struct Cli {
    /// Nanny configuration file (can also be set via NANNY_CONFIG_FILE env var)
    #[arg(long, short, global = true, env = "NANNY_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, global = true, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show expected and acceptable resources for a node count
    Estimate {
        /// Number of nodes in the cluster
        #[arg(long)]
        nodes: u64,
    },

    /// Show the rungs of the exponential ladder
    Ladder {
        /// Number of rungs to show
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// Check whether the given resources would be resized
    Check {
        /// Number of nodes in the cluster
        #[arg(long)]
        nodes: u64,

        /// Applied cpu (e.g. 500m)
        #[arg(long)]
        cpu: Option<Quantity>,

        /// Applied memory (e.g. 128Mi)
        #[arg(long)]
        memory: Option<Quantity>,

        /// Applied storage (e.g. 10Gi)
        #[arg(long)]
        storage: Option<Quantity>,

        /// Drift tolerance in percent (defaults to the configured threshold)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        threshold: Option<u32>,
    },

    /// Compare the live deployment with the estimate (read-only)
    Status {
        /// Pod to read applied resources from (defaults to the configured pod_name)
        #[arg(long)]
        pod: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = NannySettings::load_from(cli.config.as_deref())
        .context("Failed to load nanny configuration")?;

    match cli.command {
        Commands::Estimate { nodes } => {
            estimate::show_estimate(&settings, nodes, cli.format)?;
        }
        Commands::Ladder { count } => {
            estimate::show_ladder(&settings, count, cli.format)?;
        }
        Commands::Check {
            nodes,
            cpu,
            memory,
            storage,
            threshold,
        } => {
            check::check_resources(&settings, nodes, cpu, memory, storage, threshold, cli.format)?;
        }
        Commands::Status { pod } => {
            status::show_status(settings, cli.kubeconfig.as_deref(), pod, cli.format).await?;
        }
    }

    Ok(())
}
