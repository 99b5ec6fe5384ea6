//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` built from the
//! configured level, then either a JSON layer for log shippers or a pretty
//! layer for development. JSON lines carry the standard fields
//! (`timestamp`, `level`, `target`, `fields`) plus the span context.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Parses the configured log directive.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    let json_layer = (config.console_output && config.json_logs).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let pretty_layer = (config.console_output && !config.json_logs).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Log a call-related event with standard fields.
///
/// ```rust,ignore
/// log_call_event!(warn, "Fetch", correlation_id, "Reply arrived late", elapsed_ms = 1200);
/// ```
#[macro_export]
macro_rules! log_call_event {
    ($level:ident, $method:expr, $correlation_id:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            method = $method,
            correlation_id = %$correlation_id,
            $($($field)*,)?
            $msg
        )
    };
}
