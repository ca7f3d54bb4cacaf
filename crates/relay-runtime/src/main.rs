//! # VOEvent Relay Node
//!
//! Receives events from authors and upstream brokers, drops duplicates, runs
//! the local handlers and forwards each new event to every subscriber.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging and metrics
//! 2. Load configuration (defaults, TOML file, environment)
//! 3. Start listeners and feeds
//! 4. Run until Ctrl-C or SIGTERM, then shut down gracefully

use anyhow::{Context, Result};
use relay_runtime::{RelayConfig, RelayNode};
use tracing::{debug, info, warn};
use vr_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialise telemetry")?;

    let config = RelayConfig::load().context("failed to load configuration")?;
    let node = RelayNode::start(config).await?;

    info!("Relay is running. Press Ctrl+C to stop.");
    wait_for_signal().await?;

    node.shutdown().await;

    match encode_metrics() {
        Ok(snapshot) => debug!(metrics = %snapshot, "final metrics"),
        Err(e) => warn!(error = %e, "failed to encode metrics"),
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
        _ = terminate.recv() => info!("SIGTERM received"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")
}
