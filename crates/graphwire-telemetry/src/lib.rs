//! # Graphwire Telemetry
//!
//! Observability for Graphwire peers.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter` and either JSON
//!   or pretty output
//! - **Metrics**: Prometheus collectors fed by [`PrometheusRecorder`], which
//!   plugs into `graphwire::RpcMetrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphwire_telemetry::{init_telemetry, PrometheusRecorder, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! let metrics = Arc::new(RpcMetrics::with_recorder(Arc::new(PrometheusRecorder)));
//! let peer = Peer::with_metrics(channel, types, RpcConfig::from_env()?, metrics)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GW_SERVICE_NAME` | `graphwire` | Service name in log lines |
//! | `GW_LOG_LEVEL` | `info` | Log filter, falls back to `RUST_LOG` |
//! | `GW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `GW_JSON_LOGS` | `false` (`true` in containers) | JSON log format |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    encode_metrics, observe_pending, register_metrics, PrometheusRecorder,
    CALLS_COMPLETED, CALLS_SERVED, CALLS_STARTED, CALL_DURATION, CALL_FAILURES, ENCODE_DURATION,
    INBOUND_MESSAGES, NOTIFICATIONS_SENT, PENDING_CALLS, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Registers the Prometheus collectors and installs the log subscriber.
///
/// Hold the returned guard for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        metric_inc!(CALLS_STARTED, &["MacroTest"]);
        assert_eq!(CALLS_STARTED.with_label_values(&["MacroTest"]).get(), 1.0);
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Config("bad directive".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: bad directive");
    }
}
