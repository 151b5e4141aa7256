//! pictag Server
//!
//! Loads an image classification model once, then serves uploads over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use pictag_server::{build_app, run_server, AppState, Cli, ServiceConfig};
use pictag_vision::ModelBundle;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config = ServiceConfig::load(&cli.config, &cli)?;
    info!("Model: {}", config.model_id);
    info!("Device: {}", config.device);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Model load failure is fatal: nothing is served without a model
    let bundle_config = config.bundle_config();
    let bundle = tokio::task::spawn_blocking(move || ModelBundle::load(bundle_config))
        .await?
        .with_context(|| format!("Failed to load model '{}'", config.model_id))?;

    let state = AppState::new(Arc::new(bundle)).with_metrics(metrics_handle);
    let app = build_app(state, config.max_upload_bytes);

    let addr = config.listen_addr()?;
    run_server(app, addr).await
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("pictag_server=debug,pictag_vision=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pictag_server=info,pictag_vision=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "pictag_requests_total",
        "Classification requests by outcome"
    );
    metrics::describe_histogram!(
        "pictag_inference_latency_us",
        metrics::Unit::Microseconds,
        "End-to-end latency of successful classifications in microseconds"
    );

    Ok(handle)
}
