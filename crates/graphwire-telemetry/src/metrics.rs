//! Prometheus metrics for Graphwire peers.
//!
//! All metrics follow the naming convention: `graphwire_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., calls_started_total)
//! - **Gauge**: Value that can go up or down (e.g., pending_calls)
//! - **Histogram**: Distribution of values (e.g., call_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

use graphwire::{CallCorrelationTable, FailureKind, InboundKind, MetricsRecorder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CALLER METRICS
    // =========================================================================

    /// Result-bearing calls transmitted
    pub static ref CALLS_STARTED: CounterVec = CounterVec::new(
        Opts::new("graphwire_calls_started_total", "Result-bearing calls transmitted"),
        &["method"]
    ).expect("metric creation failed");

    /// Calls that finished with a reply or an abort
    pub static ref CALLS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("graphwire_calls_completed_total", "Calls finished by a reply or an abort"),
        &["method", "outcome"]  // outcome: reply/abort
    ).expect("metric creation failed");

    /// Fire-and-forget calls transmitted
    pub static ref NOTIFICATIONS_SENT: CounterVec = CounterVec::new(
        Opts::new("graphwire_notifications_sent_total", "Void calls transmitted"),
        &["method"]
    ).expect("metric creation failed");

    /// Calls that failed locally or timed out
    pub static ref CALL_FAILURES: CounterVec = CounterVec::new(
        Opts::new("graphwire_call_failures_total", "Failed calls by reason"),
        &["method", "reason"]  // reason: encode/send/decode/timeout
    ).expect("metric creation failed");

    /// Round-trip time from send to reply
    pub static ref CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "graphwire_call_duration_seconds",
            "Time from transmitting a call to its reply"
        ).buckets(exponential_buckets(0.0001, 2.0, 18).expect("valid buckets")),
        &["method"]
    ).expect("metric creation failed");

    /// Calls currently awaiting a reply
    pub static ref PENDING_CALLS: Gauge = Gauge::new(
        "graphwire_pending_calls",
        "Calls registered in the correlation table"
    ).expect("metric creation failed");

    // =========================================================================
    // INBOUND METRICS
    // =========================================================================

    /// Inbound messages by dispatch outcome
    pub static ref INBOUND_MESSAGES: CounterVec = CounterVec::new(
        Opts::new("graphwire_inbound_messages_total", "Inbound messages by dispatch outcome"),
        &["outcome"]  // outcome: matched/routed/dropped
    ).expect("metric creation failed");

    /// Calls served by local handlers
    pub static ref CALLS_SERVED: CounterVec = CounterVec::new(
        Opts::new("graphwire_calls_served_total", "Inbound calls served"),
        &["method", "result"]  // result: ok/rejected
    ).expect("metric creation failed");

    /// Time to encode a call's header and arguments
    pub static ref ENCODE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "graphwire_encode_duration_seconds",
            "Time spent encoding a call"
        ).buckets(exponential_buckets(0.00001, 2.0, 15).expect("valid buckets")),
        &["method"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Caller
        Box::new(CALLS_STARTED.clone()),
        Box::new(CALLS_COMPLETED.clone()),
        Box::new(NOTIFICATIONS_SENT.clone()),
        Box::new(CALL_FAILURES.clone()),
        Box::new(CALL_DURATION.clone()),
        Box::new(PENDING_CALLS.clone()),
        Box::new(ENCODE_DURATION.clone()),
        // Inbound
        Box::new(INBOUND_MESSAGES.clone()),
        Box::new(CALLS_SERVED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Copies the table's current size into [`PENDING_CALLS`].
pub fn observe_pending(table: &CallCorrelationTable) {
    PENDING_CALLS.set(table.pending_count() as f64);
}

/// Feeds peer metrics events into the global Prometheus collectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusRecorder;

impl MetricsRecorder for PrometheusRecorder {
    fn call_encoded(&self, method: &str, elapsed: Duration) {
        ENCODE_DURATION
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    fn call_started(&self, method: &str) {
        CALLS_STARTED.with_label_values(&[method]).inc();
    }

    fn call_completed(&self, method: &str, latency: Duration, aborted: bool) {
        let outcome = if aborted { "abort" } else { "reply" };
        CALLS_COMPLETED.with_label_values(&[method, outcome]).inc();
        CALL_DURATION
            .with_label_values(&[method])
            .observe(latency.as_secs_f64());
    }

    fn notification_sent(&self, method: &str) {
        NOTIFICATIONS_SENT.with_label_values(&[method]).inc();
    }

    fn call_failed(&self, method: &str, reason: FailureKind) {
        CALL_FAILURES
            .with_label_values(&[method, reason.as_str()])
            .inc();
    }

    fn inbound(&self, outcome: InboundKind) {
        INBOUND_MESSAGES.with_label_values(&[outcome.as_str()]).inc();
    }

    fn call_served(&self, method: &str, ok: bool) {
        let result = if ok { "ok" } else { "rejected" };
        CALLS_SERVED.with_label_values(&[method, result]).inc();
    }
}
