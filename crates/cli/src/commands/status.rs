//! Live status of the managed deployment

use anyhow::{Context, Result};
use colored::Colorize;
use kube::config::{KubeConfigOptions, Kubeconfig};
use nanny_lib::{
    build_estimator,
    cluster::{KubeClient, KubernetesClient},
    NannySettings,
};

use crate::commands::check::DriftReport;
use crate::output::OutputFormat;

async fn kube_client(kubeconfig: Option<&str>) -> Result<kube::Client> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path))?;
            let config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Invalid kubeconfig")?;
            Ok(kube::Client::try_from(config)?)
        }
        None => kube::Client::try_default()
            .await
            .context("Failed to create Kubernetes client"),
    }
}

/// Read the node count and applied resources and report whether the nanny would resize
pub async fn show_status(
    mut settings: NannySettings,
    kubeconfig: Option<&str>,
    pod: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    if pod.is_some() {
        settings.pod_name = pod;
    }
    let target = settings.target()?;
    let estimator = build_estimator(&settings.estimator_config()?)?;
    let client = KubeClient::new(kube_client(kubeconfig).await?, target);

    let nodes = client.count_nodes().await.context("Failed to count nodes")?;
    let actual = client
        .container_resources()
        .await
        .context("Failed to read container resources")?;

    if let OutputFormat::Table = format {
        let target = client.target();
        println!(
            "Deployment: {}/{}",
            target.namespace.cyan(),
            target.deployment.cyan()
        );
        println!("Container:  {}", target.container.cyan());
        println!("Applied:    {}", actual);
        println!();
    }

    DriftReport::evaluate(estimator.as_ref(), nodes, settings.threshold, &actual).print(format)
}
