//! Spot Termination Exporter - Entry Point
//!
//! Serves spot termination gauges for Prometheus.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use spot_termination_exporter::metrics::{init_metrics, MetricsServer, ScrapeRegistry};
use spot_termination_exporter::{Config, TerminationSampler, VERSION};

const DEFAULT_CONFIG: &str = "config.toml";

/// Prometheus exporter for EC2 spot termination notices
#[derive(Parser)]
#[command(name = "spot-termination-exporter")]
#[command(version = VERSION)]
#[command(about = "Prometheus exporter for EC2 spot termination notices")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicit --config must exist; the default path is optional
    let (config, config_path) = match cli.config {
        Some(path) => (
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            Some(path),
        ),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if path.exists() {
                (
                    Config::load(&path)
                        .with_context(|| format!("Failed to load config from {:?}", path))?,
                    Some(path),
                )
            } else {
                (Config::default(), None)
            }
        }
    };

    spot_termination_exporter::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        metadata_url = %config.metadata.url,
        timeout_ms = config.metadata.timeout_ms,
        "Starting Spot Termination Exporter"
    );
    if config_path.is_none() {
        warn!("No config file found, using defaults");
    }

    let self_metrics = init_metrics(&config.metrics)?;

    let sampler = TerminationSampler::from_config(&config.metadata)
        .context("Failed to build metadata client")?;
    let mut registry = ScrapeRegistry::new();
    registry.register(Arc::new(sampler))?;

    let server = MetricsServer::bind(config.metrics.bind_addr, registry, self_metrics).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut serving = tokio::spawn(server.run(shutdown_rx));

    tokio::select! {
        result = &mut serving => {
            let result = result.context("Metrics endpoint task failed")?;
            if let Err(e) = result {
                error!(error = %e, "Metrics endpoint error");
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            serving.await.context("Metrics endpoint task failed")??;
        }
    }

    info!("Exporter stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
