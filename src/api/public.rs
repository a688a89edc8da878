//! Public API for wiring the exporters into the OpenTelemetry SDK
//!
//! Builds tracer and meter providers around the New Relic exporters so an
//! application only needs an [`ExporterConfig`].

use crate::client::{HttpTelemetryClient, TelemetryClient};
use crate::config::ExporterConfig;
use crate::error::{ExportError, ExporterError};
use crate::export::model::TelemetryBatch;
use crate::export::{NewRelicMetricExporter, NewRelicSpanExporter};
use futures::future::BoxFuture;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Tracer and meter providers exporting to New Relic
///
/// Spans go through a batch span processor. Metrics are collected by a
/// periodic reader every `collection_interval_secs` seconds.
///
/// # Example
///
/// ```no_run
/// use newrelic_otel_exporter::{ExporterConfig, NewRelicExporters};
/// use opentelemetry::trace::{Tracer, TracerProvider};
///
/// # fn example() -> Result<(), newrelic_otel_exporter::ExporterError> {
/// let config = ExporterConfig::new("my-insert-key", "checkout")?;
/// let exporters = NewRelicExporters::start(config)?;
///
/// let tracer = exporters.tracer_provider().tracer("checkout");
/// tracer.in_span("place-order", |_cx| {
///     // traced work
/// });
///
/// exporters.shutdown()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NewRelicExporters {
    config: ExporterConfig,
    client: Arc<dyn TelemetryClient>,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

/// Client handle given to provider-owned exporters
///
/// Providers shut their exporters down one at a time, so the shared client
/// is closed by [`NewRelicExporters::shutdown`] once both are done.
#[derive(Debug)]
struct SharedClient(Arc<dyn TelemetryClient>);

impl TelemetryClient for SharedClient {
    fn send_batch(&self, batch: TelemetryBatch) -> BoxFuture<'static, Result<(), ExportError>> {
        self.0.send_batch(batch)
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

impl NewRelicExporters {
    /// Start providers delivering over HTTP
    ///
    /// Call from within a tokio runtime: requests are driven on the runtime
    /// that is current here.
    ///
    /// # Errors
    ///
    /// Returns `Err(ExporterError)` if the HTTP client cannot be created.
    pub fn start(config: ExporterConfig) -> Result<Self, ExporterError> {
        let client = HttpTelemetryClient::new(&config)?;
        Ok(Self::start_with_client(config, Arc::new(client)))
    }

    /// Start providers delivering through `client`
    pub fn start_with_client(config: ExporterConfig, client: Arc<dyn TelemetryClient>) -> Self {
        let resource = Resource::builder()
            .with_service_name(config.service_name().to_owned())
            .build();

        let shared: Arc<dyn TelemetryClient> = Arc::new(SharedClient(Arc::clone(&client)));

        let span_exporter = NewRelicSpanExporter::with_client(&config, Arc::clone(&shared));
        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(span_exporter)
            .build();

        let metric_exporter = NewRelicMetricExporter::with_client(&config, shared);
        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(config.collection_interval())
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build();

        info!(
            service_name = %config.service_name(),
            collection_interval_secs = config.collection_interval_secs(),
            "Started New Relic exporters"
        );

        Self {
            config,
            client,
            tracer_provider,
            meter_provider,
        }
    }

    /// Tracer provider exporting spans to New Relic
    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    /// Meter provider exporting metrics to New Relic
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// Configuration the providers were started with
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// Export everything collected so far
    pub fn force_flush(&self) -> Result<(), ExporterError> {
        self.tracer_provider
            .force_flush()
            .map_err(|e| ExporterError::Shutdown(format!("Tracer provider flush failed: {}", e)))?;
        self.meter_provider
            .force_flush()
            .map_err(|e| ExporterError::Shutdown(format!("Meter provider flush failed: {}", e)))
    }

    /// Flush and shut down both providers, then the delivery client
    ///
    /// Both providers are shut down even if the first one fails.
    pub fn shutdown(&self) -> Result<(), ExporterError> {
        let traces = self.tracer_provider.shutdown();
        let metrics = self.meter_provider.shutdown();

        if let Err(ref e) = traces {
            warn!(error = %e, "Tracer provider shutdown failed");
        }
        if let Err(ref e) = metrics {
            warn!(error = %e, "Meter provider shutdown failed");
        }

        let client = self.client.shutdown();

        traces.map_err(|e| ExporterError::Shutdown(format!("Tracer provider: {}", e)))?;
        metrics.map_err(|e| ExporterError::Shutdown(format!("Meter provider: {}", e)))?;
        client?;
        info!("New Relic exporters shut down");
        Ok(())
    }
}
