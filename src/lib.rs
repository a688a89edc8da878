//! New Relic OpenTelemetry Exporter
//!
//! Span and metric exporters for the OpenTelemetry SDK that translate
//! telemetry into New Relic ingest batches and deliver them over HTTP.
//!
//! # Features
//!
//! - Cumulative counters reported as per-interval deltas
//! - Histograms reported as summaries
//! - Flat attribute sets with fixed precedence
//! - Span events exported as logs
//! - Configurable via YAML, environment variables, or programmatic API
//! - Recording client for testing
//!
//! # Example
//!
//! ```no_run
//! use newrelic_otel_exporter::{ConfigLoader, NewRelicExporters};
//!
//! # fn example() -> Result<(), newrelic_otel_exporter::ExporterError> {
//! let config = ConfigLoader::from_env()?;
//! let exporters = NewRelicExporters::start(config)?;
//!
//! // Instrument with exporters.tracer_provider() and exporters.meter_provider()
//! exporters.shutdown()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod mock;

// Re-export public API
pub use api::public::NewRelicExporters;
pub use client::{HttpTelemetryClient, TelemetryClient};
pub use config::{ConfigLoader, ExporterConfig, ExporterConfigBuilder};
pub use error::{ConfigError, ExportError, ExporterError};
pub use export::{
    AttributeNormalizer, AttributeSet, FinishedSpan, MetricPointAdapter, NewRelicMetricExporter,
    NewRelicSpanExporter, SpanBatchAdapter, TimeTracker,
};
pub use mock::RecordingTelemetryClient;

// Initialize tracing subscriber for structured logging
use tracing_subscriber::EnvFilter;

/// Initialize structured logging
///
/// Set `RUST_LOG=newrelic_otel_exporter::audit=debug` to see outgoing payloads
/// when audit logging is enabled.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
