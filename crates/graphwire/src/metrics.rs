//! Metrics hooks for calls and inbound dispatch
//!
//! Counters live in-process as atomics; an optional [`MetricsRecorder`]
//! receives the same events for export to an external system.
//!
//! ## Usage
//!
//! ```ignore
//! use graphwire::metrics::RpcMetrics;
//!
//! let metrics = RpcMetrics::new();
//! metrics.record_call_started("Fetch");
//! metrics.record_call_completed("Fetch", start.elapsed(), false);
//! println!("{:?}", metrics.snapshot());
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Receives every metrics event, e.g. to feed Prometheus.
pub trait MetricsRecorder: Send + Sync {
    /// A call was encoded, ready to transmit
    fn call_encoded(&self, _method: &str, _elapsed: Duration) {}

    /// A result-bearing call was transmitted
    fn call_started(&self, method: &str);

    /// A result-bearing call finished (reply or abort)
    fn call_completed(&self, method: &str, latency: Duration, aborted: bool);

    /// A fire-and-forget call was transmitted
    fn notification_sent(&self, _method: &str) {}

    /// A call failed before or at the channel
    fn call_failed(&self, method: &str, reason: FailureKind);

    /// An inbound message was dispatched
    fn inbound(&self, outcome: InboundKind);

    /// A registered handler served a call
    fn call_served(&self, _method: &str, _ok: bool) {}
}

/// Why a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Encode,
    Send,
    Decode,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Encode => "encode",
            FailureKind::Send => "send",
            FailureKind::Decode => "decode",
            FailureKind::Timeout => "timeout",
        }
    }
}

/// What became of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundKind {
    Matched,
    Routed,
    Dropped,
}

impl InboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::Matched => "matched",
            InboundKind::Routed => "routed",
            InboundKind::Dropped => "dropped",
        }
    }
}

/// Thread-safe counters for one peer.
#[derive(Default)]
pub struct RpcMetrics {
    /// Calls encoded, result-bearing or not
    pub calls_encoded: AtomicU64,
    /// Cumulative encode time in microseconds
    pub encode_time_us: AtomicU64,
    /// Result-bearing calls transmitted
    pub calls_started: AtomicU64,
    /// Result-bearing calls that got a non-empty reply
    pub calls_completed: AtomicU64,
    /// Calls released by the abort sentinel
    pub calls_aborted: AtomicU64,
    /// Fire-and-forget calls transmitted
    pub notifications_sent: AtomicU64,
    /// Calls rejected by the encoder
    pub encode_failures: AtomicU64,
    /// Calls the channel refused
    pub send_failures: AtomicU64,
    /// Replies that failed to decode
    pub decode_failures: AtomicU64,
    /// Calls that hit their deadline
    pub timeouts: AtomicU64,
    /// Inbound messages seen
    pub inbound_messages: AtomicU64,
    /// Inbound replies that completed a pending call
    pub replies_matched: AtomicU64,
    /// Inbound messages handed to the call handler
    pub calls_routed: AtomicU64,
    /// Inbound messages nobody could use
    pub messages_dropped: AtomicU64,
    /// Calls served by local handlers
    pub calls_served: AtomicU64,
    /// Calls whose handler failed or was missing
    pub calls_rejected: AtomicU64,
    /// Cumulative latency of completed calls in microseconds
    pub latency_us: AtomicU64,
    recorder: Option<Arc<dyn MetricsRecorder>>,
}

impl RpcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters that also forward every event to `recorder`.
    pub fn with_recorder(recorder: Arc<dyn MetricsRecorder>) -> Self {
        Self {
            recorder: Some(recorder),
            ..Self::default()
        }
    }

    pub fn record_encode(&self, method: &str, elapsed: Duration) {
        self.calls_encoded.fetch_add(1, Ordering::Relaxed);
        self.encode_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.call_encoded(method, elapsed);
        }
    }

    pub fn record_call_started(&self, method: &str) {
        self.calls_started.fetch_add(1, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.call_started(method);
        }
    }

    pub fn record_call_completed(&self, method: &str, latency: Duration, aborted: bool) {
        if aborted {
            self.calls_aborted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.calls_completed.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.call_completed(method, latency, aborted);
        }
    }

    pub fn record_notification(&self, method: &str) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.notification_sent(method);
        }
    }

    pub fn record_failure(&self, method: &str, reason: FailureKind) {
        let counter = match reason {
            FailureKind::Encode => &self.encode_failures,
            FailureKind::Send => &self.send_failures,
            FailureKind::Decode => &self.decode_failures,
            FailureKind::Timeout => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.call_failed(method, reason);
        }
    }

    pub fn record_inbound(&self, outcome: InboundKind) {
        self.inbound_messages.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            InboundKind::Matched => &self.replies_matched,
            InboundKind::Routed => &self.calls_routed,
            InboundKind::Dropped => &self.messages_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(r) = &self.recorder {
            r.inbound(outcome);
        }
    }

    pub fn record_call_served(&self, method: &str, ok: bool) {
        if ok {
            self.calls_served.fetch_add(1, Ordering::Relaxed);
        } else {
            self.calls_rejected.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(r) = &self.recorder {
            r.call_served(method, ok);
        }
    }

    /// Average latency of finished calls in microseconds
    pub fn avg_latency_us(&self) -> u64 {
        let total = self.latency_us.load(Ordering::Relaxed);
        let count = self.calls_completed.load(Ordering::Relaxed)
            + self.calls_aborted.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_encoded: self.calls_encoded.load(Ordering::Relaxed),
            encode_time_us: self.encode_time_us.load(Ordering::Relaxed),
            calls_started: self.calls_started.load(Ordering::Relaxed),
            calls_completed: self.calls_completed.load(Ordering::Relaxed),
            calls_aborted: self.calls_aborted.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            inbound_messages: self.inbound_messages.load(Ordering::Relaxed),
            replies_matched: self.replies_matched.load(Ordering::Relaxed),
            calls_routed: self.calls_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            calls_served: self.calls_served.load(Ordering::Relaxed),
            calls_rejected: self.calls_rejected.load(Ordering::Relaxed),
            avg_latency_us: self.avg_latency_us(),
        }
    }
}

impl fmt::Debug for RpcMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcMetrics")
            .field("snapshot", &self.snapshot())
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub calls_encoded: u64,
    pub encode_time_us: u64,
    pub calls_started: u64,
    pub calls_completed: u64,
    pub calls_aborted: u64,
    pub notifications_sent: u64,
    pub encode_failures: u64,
    pub send_failures: u64,
    pub decode_failures: u64,
    pub timeouts: u64,
    pub inbound_messages: u64,
    pub replies_matched: u64,
    pub calls_routed: u64,
    pub messages_dropped: u64,
    pub calls_served: u64,
    pub calls_rejected: u64,
    pub avg_latency_us: u64,
}
