//! Prometheus metrics for the relay subsystems.
//!
//! All metrics follow the naming convention: `vr_<subsystem>_<metric>_<unit>`
//!
//! Counters work whether or not [`register_metrics`] ran; registration only
//! makes them visible to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ROUTER METRICS (Subsystem 3)
    // =========================================================================

    /// Events offered to the router, by decision
    pub static ref ROUTER_EVENTS: CounterVec = CounterVec::new(
        Opts::new("vr_router_events_total", "Events offered to the router by decision"),
        &["decision"]  // forwarded/duplicate/rejected
    ).expect("metric creation failed");

    /// Handler errors and panics, by handler name
    pub static ref HANDLER_FAULTS: CounterVec = CounterVec::new(
        Opts::new("vr_router_handler_faults_total", "Handler errors and panics"),
        &["handler"]
    ).expect("metric creation failed");

    /// Failed submissions to subscriber queues
    pub static ref SUBSCRIBER_SEND_FAILURES: Counter = Counter::new(
        "vr_router_subscriber_send_failures_total",
        "Events that could not be queued to a subscriber"
    ).expect("metric creation failed");

    /// Live registry entries
    pub static ref SUBSCRIBERS_REGISTERED: Gauge = Gauge::new(
        "vr_router_subscribers",
        "Subscribers currently registered"
    ).expect("metric creation failed");

    /// Time spent fanning one event out
    pub static ref FAN_OUT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "vr_router_fan_out_duration_seconds",
            "Time spent queueing one event to all subscribers"
        ).buckets(exponential_buckets(0.00001, 2.0, 14).expect("bucket layout"))
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS (Subsystem 1)
    // =========================================================================

    /// Sessions opened, by local role
    pub static ref SESSIONS_OPENED: CounterVec = CounterVec::new(
        Opts::new("vr_transport_sessions_opened_total", "Sessions opened by role"),
        &["role"]
    ).expect("metric creation failed");

    /// Sessions ended, by terminal state
    pub static ref SESSIONS_ENDED: CounterVec = CounterVec::new(
        Opts::new("vr_transport_sessions_ended_total", "Sessions ended by terminal state"),
        &["state"]  // closed/faulted
    ).expect("metric creation failed");

    /// Sessions currently past the handshake
    pub static ref SESSIONS_LIVE: Gauge = Gauge::new(
        "vr_transport_sessions_live",
        "Sessions between AUTHORIZED and a terminal state"
    ).expect("metric creation failed");

    /// Frames that failed to decode
    pub static ref MALFORMED_FRAMES: Counter = Counter::new(
        "vr_transport_malformed_frames_total",
        "Frames that failed to decode"
    ).expect("metric creation failed");

    /// Negative acknowledgements received from peers
    pub static ref NAKS_RECEIVED: Counter = Counter::new(
        "vr_transport_naks_received_total",
        "Negative acknowledgements received"
    ).expect("metric creation failed");

    /// Inbound connections refused before a session was created
    pub static ref CONNECTIONS_REFUSED: Counter = Counter::new(
        "vr_transport_connections_refused_total",
        "Inbound connections refused by the address whitelist"
    ).expect("metric creation failed");

    // =========================================================================
    // SUPERVISOR METRICS (Subsystem 4)
    // =========================================================================

    /// Connection attempts per feed
    pub static ref RECONNECT_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("vr_supervisor_connect_attempts_total", "Outbound connection attempts"),
        &["feed"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Router
        Box::new(ROUTER_EVENTS.clone()),
        Box::new(HANDLER_FAULTS.clone()),
        Box::new(SUBSCRIBER_SEND_FAILURES.clone()),
        Box::new(SUBSCRIBERS_REGISTERED.clone()),
        Box::new(FAN_OUT_DURATION.clone()),
        // Transport
        Box::new(SESSIONS_OPENED.clone()),
        Box::new(SESSIONS_ENDED.clone()),
        Box::new(SESSIONS_LIVE.clone()),
        Box::new(MALFORMED_FRAMES.clone()),
        Box::new(NAKS_RECEIVED.clone()),
        Box::new(CONNECTIONS_REFUSED.clone()),
        // Supervisor
        Box::new(RECONNECT_ATTEMPTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(())
}

/// Encode all registered metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
