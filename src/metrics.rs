//! Prometheus metrics for feed health and latency.
//!
//! This module provides metrics for:
//! - Snapshot fetch latency and failures
//! - Frame decode outcomes and depth apply latency
//! - Keepalive acknowledgements and reconnects

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Snapshot fetch latency metric name.
pub const METRIC_SNAPSHOT_FETCH_LATENCY: &str = "snapshot_fetch_latency_ms";
/// Depth frame apply latency metric name.
pub const METRIC_DEPTH_APPLY_LATENCY: &str = "depth_apply_latency_ms";
/// Snapshot failures counter metric name.
pub const METRIC_SNAPSHOT_FAILURES: &str = "snapshot_failures_total";
/// WebSocket frames received counter metric name.
pub const METRIC_WS_FRAMES_RECEIVED: &str = "ws_frames_received_total";
/// Unrecognized frames counter metric name.
pub const METRIC_WS_FRAMES_UNRECOGNIZED: &str = "ws_frames_unrecognized_total";
/// Keepalive acknowledgements counter metric name.
pub const METRIC_KEEPALIVES_ANSWERED: &str = "keepalives_answered_total";
/// Applied depth deltas counter metric name.
pub const METRIC_DELTAS_APPLIED: &str = "depth_deltas_applied_total";
/// Dropped depth deltas counter metric name.
pub const METRIC_DELTAS_DROPPED: &str = "depth_deltas_dropped_total";
/// WebSocket reconnects counter metric name.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_SNAPSHOT_FETCH_LATENCY,
        "REST depth snapshot latency in milliseconds"
    );
    describe_histogram!(
        METRIC_DEPTH_APPLY_LATENCY,
        "Time to apply a depth delta and publish a projection in milliseconds"
    );

    describe_counter!(METRIC_SNAPSHOT_FAILURES, "Total number of failed snapshot fetches");
    describe_counter!(METRIC_WS_FRAMES_RECEIVED, "Total number of data frames received");
    describe_counter!(
        METRIC_WS_FRAMES_UNRECOGNIZED,
        "Total number of frames that decoded to nothing usable"
    );
    describe_counter!(METRIC_KEEPALIVES_ANSWERED, "Total number of keepalives acknowledged");
    describe_counter!(METRIC_DELTAS_APPLIED, "Total number of depth deltas applied");
    describe_counter!(
        METRIC_DELTAS_DROPPED,
        "Total number of depth deltas dropped before a snapshot loaded"
    );
    describe_counter!(METRIC_WS_RECONNECTS, "Total number of WebSocket reconnections");

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// The returned handle renders the scrape body for `/metrics`.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Record snapshot fetch latency.
pub fn record_snapshot_latency(start: Instant, symbol: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SNAPSHOT_FETCH_LATENCY, "symbol" => symbol.to_string()).record(latency_ms);
}

/// Increment snapshot failures counter.
pub fn inc_snapshot_failures() {
    counter!(METRIC_SNAPSHOT_FAILURES).increment(1);
}

/// Increment data frames received counter.
pub fn inc_ws_frames_received() {
    counter!(METRIC_WS_FRAMES_RECEIVED).increment(1);
}

/// Increment unrecognized frames counter.
pub fn inc_ws_frames_unrecognized() {
    counter!(METRIC_WS_FRAMES_UNRECOGNIZED).increment(1);
}

/// Increment keepalive acknowledgements counter.
pub fn inc_keepalives_answered() {
    counter!(METRIC_KEEPALIVES_ANSWERED).increment(1);
}

/// Increment applied deltas counter.
pub fn inc_deltas_applied() {
    counter!(METRIC_DELTAS_APPLIED).increment(1);
}

/// Increment dropped deltas counter.
pub fn inc_deltas_dropped() {
    counter!(METRIC_DELTAS_DROPPED).increment(1);
}

/// Increment WebSocket reconnects counter.
pub fn inc_ws_reconnects() {
    counter!(METRIC_WS_RECONNECTS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for depth delta application.
pub fn timer_depth_apply() -> LatencyTimer {
    LatencyTimer::new(METRIC_DEPTH_APPLY_LATENCY)
}
