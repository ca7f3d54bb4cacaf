//! # Relay Telemetry
//!
//! Structured logging and process metrics for the VOEvent relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber`, human or JSON
//! - **Metrics**: Prometheus counters and gauges in a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vr_telemetry::{TelemetryConfig, init_telemetry};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VR_SERVICE_NAME` | `voevent-relay` | Service name in the startup line |
//! | `VR_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` wins when set) |
//! | `VR_JSON_LOGS` | `false` | Emit JSON lines |
//! | `VR_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, CONNECTIONS_REFUSED, FAN_OUT_DURATION,
    HANDLER_FAULTS, MALFORMED_FRAMES, NAKS_RECEIVED, RECONNECT_ATTEMPTS, REGISTRY, ROUTER_EVENTS,
    SESSIONS_ENDED, SESSIONS_LIVE, SESSIONS_OPENED, SUBSCRIBERS_REGISTERED,
    SUBSCRIBER_SEND_FAILURES,
};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_tracing(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "shutting down telemetry");
    }
}
