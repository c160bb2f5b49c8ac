//! Workload Scaler - pod-count metric source for an autoscaling host
//!
//! Runs one workload scaler against the cluster and exposes its
//! contract, health probes and Prometheus metrics over HTTP.

use anyhow::{Context, Result};
use scaler_lib::{
    health::{components, HealthRegistry},
    observability::{ScalerMetrics, StructuredLogger},
    KubePodLister, KubernetesWorkloadScaler, Scaler, ScalerContext,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workload_scaler::{api, config};

const SCALER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting workload-scaler");

    let config = config::DaemonConfig::load()?;
    info!(namespace = %config.namespace, scaler_index = config.scaler_index, "Scaler configured");

    let lister = KubePodLister::try_default().await?;
    let scaler = KubernetesWorkloadScaler::new(Arc::new(lister), &config.to_scaler_config())
        .context("Failed to create workload scaler")?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_QUERY).await;
    health_registry.register(components::SCALER).await;

    let metrics = ScalerMetrics::new();

    let logger = StructuredLogger::new(scaler.metric_name());
    let metadata = scaler.metadata();
    logger.log_startup(
        SCALER_VERSION,
        &metadata.namespace,
        &metadata.pod_selector.to_string(),
        metadata.value,
    );

    let scaler: Arc<dyn Scaler> = Arc::new(scaler);
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        scaler.clone(),
        logger.clone(),
        config.query_timeout(),
    ));

    health_registry.set_ready(true).await;

    let shutdown = CancellationToken::new();
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, shutdown.clone()));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    health_registry.set_ready(false).await;
    shutdown.cancel();
    scaler.close(&ScalerContext::new()).await?;
    api_handle.await??;

    info!("Shut down");
    Ok(())
}
