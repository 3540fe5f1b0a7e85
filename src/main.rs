mod config;
mod metadata_store;
mod mover;
mod registry;
mod tiers;

use anyhow::{Context, Result};
use config::Config;
use metadata_store::MetadataStore;
use registry::{CameraEvent, TierRegistry};
use std::sync::Arc;
use tiers::StorageContext;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "Starting tierstore");

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Validate and resolve the tier chains; any invalid chain is fatal
    // before anything else runs
    let context =
        Arc::new(StorageContext::from_config(&config).context("Invalid tier configuration")?);

    // Bring the metadata store schema to head before any mover starts
    let store = Arc::new(
        MetadataStore::new(&config.database)
            .await
            .context("Failed to initialize metadata store")?,
    );
    store
        .bootstrap()
        .await
        .context("Failed to bootstrap metadata store schema")?;

    let shutdown = CancellationToken::new();
    let (camera_tx, camera_rx) = mpsc::channel(64);

    let registry = TierRegistry::new(context.clone(), store.clone(), shutdown.clone());
    let registry_handle = tokio::spawn(registry.run(camera_rx));

    // Feed the configured cameras. In a full deployment these arrive from
    // the capture subsystem as cameras come online.
    for camera in &config.cameras {
        camera_tx
            .send(CameraEvent::Registered {
                camera: camera.clone(),
            })
            .await
            .context("Registry stopped before startup completed")?;
        info!(
            camera = %camera,
            recordings = %context.recordings_path(camera).display(),
            segments = %context.segments_path(camera).display(),
            "Camera storage paths resolved"
        );
    }

    info!("Tierstore started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down tierstore");

    // Stop all movers; move_on_shutdown tiers get one final pass
    shutdown.cancel();
    if let Err(e) = registry_handle.await {
        warn!(error = %e, "Registry task ended abnormally");
    }

    // Release the store connection only after every mover has stopped
    store.close().await;

    info!("Tierstore stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
