//! Pod nanny - resizes a deployment's resources with the size of the cluster
//!
//! Runs as a sidecar of the managed deployment, polling the node count and
//! rewriting the container's requests and limits when they drift from the estimate.

use anyhow::{Context, Result};
use nanny_lib::{
    build_estimator,
    cluster::KubeClient,
    health::components,
    HealthRegistry, NannyMetrics, NannySettings, PollLoopBuilder, StructuredLogger,
};
use pod_nanny::api;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const NANNY_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting pod-nanny");

    let settings = NannySettings::load().context("Failed to load nanny configuration")?;
    let target = settings.target()?;
    let estimator = build_estimator(&settings.estimator_config()?)?;
    let poll_config = settings.poll_config();
    info!(
        namespace = %target.namespace,
        deployment = %target.deployment,
        container = %target.container,
        pod = %target.pod,
        "Nanny configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_API).await;
    health_registry.register(components::POLL_LOOP).await;

    let metrics = NannyMetrics::new();
    let estimator_name = estimator.kind().to_string();
    metrics.set_build_info(NANNY_VERSION, &estimator_name);

    let logger = StructuredLogger::new(format!("{}/{}", target.namespace, target.deployment));
    logger.log_startup(
        NANNY_VERSION,
        &estimator_name,
        poll_config.threshold,
        poll_config.period,
    );

    let client = KubeClient::try_default(target)
        .await
        .context("Failed to create Kubernetes client")?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    let api_port = settings.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let poll_loop = PollLoopBuilder::new()
        .client(Arc::new(client))
        .estimator(estimator)
        .period(poll_config.period)
        .threshold(poll_config.threshold)
        .health(health_registry)
        .logger(logger.clone())
        .build()?;

    tokio::select! {
        _ = poll_loop.run() => {}
        reason = shutdown_signal() => {
            logger.log_shutdown(reason?);
        }
    }

    info!("Shutting down");
    Ok(())
}

/// Resolves with the name of the first termination signal received
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            Ok("SIGINT received")
        }
        _ = terminate.recv() => Ok("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for SIGINT")?;
    Ok("SIGINT received")
}
