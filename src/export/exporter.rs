//! New Relic span and metric exporters
//!
//! Both exporters translate SDK telemetry into New Relic batches and hand
//! them to a [`TelemetryClient`]. They plug into the OpenTelemetry SDK through
//! [`SpanExporter`] and [`PushMetricExporter`], and also expose direct entry
//! points for callers that already hold translated input.

use crate::client::{HttpTelemetryClient, TelemetryClient};
use crate::config::ExporterConfig;
use crate::error::{ExportError, ExporterError};
use crate::export::attributes::{AttributeNormalizer, AttributeSet, names};
use crate::export::metric_adapter::MetricPointAdapter;
use crate::export::metrics_data::MetricRecord;
use crate::export::metrics_extractor::{extract_from_protobuf, extract_from_resource_metrics};
use crate::export::model::{MetricBatch, TelemetryBatch};
use crate::export::span_adapter::{FinishedSpan, SpanBatchAdapter};
use crate::export::time_tracker::TimeTracker;
use futures::FutureExt;
use futures::future::BoxFuture;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Common attributes for a configuration: extra attributes, then `service.name`
pub fn common_attributes(config: &ExporterConfig) -> AttributeSet {
    let mut attributes = AttributeSet::new();
    for (key, value) in config.common_attributes() {
        attributes.put(key.as_str(), value.as_str());
    }
    attributes.put(names::SERVICE_NAME, config.service_name());
    attributes
}

/// Send every batch, returning the first failure after all were attempted
fn send_all(
    client: &Arc<dyn TelemetryClient>,
    batches: Vec<TelemetryBatch>,
) -> BoxFuture<'static, Result<(), ExportError>> {
    let sends: Vec<_> = batches
        .into_iter()
        .map(|batch| {
            let kind = batch.kind();
            client.send_batch(batch).map(move |result| (kind, result))
        })
        .collect();

    async move {
        let mut first_error = None;
        for send in sends {
            let (kind, result) = send.await;
            if let Err(e) = result {
                warn!(kind, error = %e, "Failed to deliver batch");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
    .boxed()
}

/// Span exporter sending to the New Relic trace and log APIs
#[derive(Debug, Clone)]
pub struct NewRelicSpanExporter {
    adapter: SpanBatchAdapter,
    client: Arc<dyn TelemetryClient>,
    resource: Option<AttributeSet>,
}

impl NewRelicSpanExporter {
    /// Create an exporter delivering over HTTP
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        let client = HttpTelemetryClient::new(config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create an exporter delivering through `client`
    pub fn with_client(config: &ExporterConfig, client: Arc<dyn TelemetryClient>) -> Self {
        let normalizer = AttributeNormalizer::new(&common_attributes(config));
        info!(
            service_name = %config.service_name(),
            "Initializing New Relic span exporter"
        );
        Self {
            adapter: SpanBatchAdapter::new(normalizer),
            client,
            resource: None,
        }
    }

    /// Resource attributes paired with spans exported through the SDK
    pub fn resource(&self) -> Option<&AttributeSet> {
        self.resource.as_ref()
    }

    /// Span batches followed by event log batches, one of each per resource
    pub fn translate(&self, spans: &[FinishedSpan]) -> Vec<TelemetryBatch> {
        let mut batches: Vec<TelemetryBatch> = self
            .adapter
            .adapt_to_span_batches(spans)
            .into_iter()
            .map(TelemetryBatch::Spans)
            .collect();
        batches.extend(
            self.adapter
                .adapt_to_log_batches(spans)
                .into_iter()
                .map(TelemetryBatch::Logs),
        );
        batches
    }

    /// Translate and deliver spans
    pub fn export_spans(
        &self,
        spans: Vec<FinishedSpan>,
    ) -> BoxFuture<'static, Result<(), ExportError>> {
        if spans.is_empty() {
            return futures::future::ready(Ok(())).boxed();
        }
        let batches = self.translate(&spans);
        debug!(
            spans = spans.len(),
            batches = batches.len(),
            "Translated spans"
        );
        send_all(&self.client, batches)
    }
}

impl SpanExporter for NewRelicSpanExporter {
    #[allow(refining_impl_trait_reachable)]
    fn export(&self, batch: Vec<SpanData>) -> BoxFuture<'static, OTelSdkResult> {
        let spans = batch
            .into_iter()
            .map(|span| FinishedSpan::new(self.resource.clone(), span))
            .collect();
        let send = self.export_spans(spans);
        async move {
            send.await.map_err(|e| {
                OTelSdkError::InternalFailure(format!("New Relic span export failed: {}", e))
            })
        }
        .boxed()
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        self.client
            .shutdown()
            .map_err(|e| OTelSdkError::InternalFailure(e.to_string()))
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = Some(AttributeSet::from(resource));
    }
}

/// Metric exporter sending to the New Relic metric API
///
/// Requests cumulative temporality from the SDK and computes deltas itself,
/// so one instance must see every collection of the metrics it exports.
#[derive(Debug)]
pub struct NewRelicMetricExporter {
    normalizer: AttributeNormalizer,
    adapter: MetricPointAdapter,
    client: Arc<dyn TelemetryClient>,
    cycle: Mutex<()>,
}

impl NewRelicMetricExporter {
    /// Create an exporter delivering over HTTP
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        let client = HttpTelemetryClient::new(config)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create an exporter delivering through `client`
    pub fn with_client(config: &ExporterConfig, client: Arc<dyn TelemetryClient>) -> Self {
        Self::with_time_tracker(config, client, Arc::new(TimeTracker::system()))
    }

    /// Create an exporter reading interval boundaries from `time_tracker`
    pub fn with_time_tracker(
        config: &ExporterConfig,
        client: Arc<dyn TelemetryClient>,
        time_tracker: Arc<TimeTracker>,
    ) -> Self {
        info!(
            service_name = %config.service_name(),
            collection_interval_secs = config.collection_interval_secs(),
            "Initializing New Relic metric exporter"
        );
        Self {
            normalizer: AttributeNormalizer::new(&common_attributes(config)),
            adapter: MetricPointAdapter::new(time_tracker),
            client,
            cycle: Mutex::new(()),
        }
    }

    /// The point adapter and its delta state
    pub fn adapter(&self) -> &MetricPointAdapter {
        &self.adapter
    }

    /// Translate one collection cycle and advance the interval boundary
    ///
    /// Every count in the cycle shares one interval start. Concurrent cycles
    /// are serialized so a tick never lands inside another cycle.
    ///
    /// Returns `None` when nothing was translated.
    pub fn translate(&self, records: &[MetricRecord]) -> Option<MetricBatch> {
        let cycle_guard = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let interval_start_nanos = self.adapter.time_tracker().previous_time_nanos();
        let metrics: Vec<_> = records
            .iter()
            .flat_map(|record| self.adapter.translate_record(record, interval_start_nanos))
            .collect();
        self.adapter.time_tracker().tick();
        drop(cycle_guard);

        if metrics.is_empty() {
            return None;
        }
        Some(MetricBatch {
            attributes: self.normalizer.common_attributes().clone(),
            metrics,
        })
    }

    /// Translate and deliver one collection cycle
    pub fn export_records(
        &self,
        records: &[MetricRecord],
    ) -> BoxFuture<'static, Result<(), ExportError>> {
        let Some(batch) = self.translate(records) else {
            debug!(records = records.len(), "No metrics to export");
            return futures::future::ready(Ok(())).boxed();
        };
        debug!(
            records = records.len(),
            metrics = batch.metrics.len(),
            "Translated metrics"
        );
        send_all(&self.client, vec![TelemetryBatch::Metrics(batch)])
    }

    /// Translate and deliver an OTLP protobuf metrics request
    pub fn export_protobuf(
        &self,
        request: &ExportMetricsServiceRequest,
    ) -> BoxFuture<'static, Result<(), ExportError>> {
        match extract_from_protobuf(request) {
            Ok(records) => self.export_records(&records),
            Err(e) => {
                warn!(error = %e, "Failed to read OTLP metrics request");
                futures::future::ready(Err(ExportError::from(e))).boxed()
            }
        }
    }
}

impl PushMetricExporter for NewRelicMetricExporter {
    #[allow(refining_impl_trait_reachable)]
    fn export(&self, metrics: &ResourceMetrics) -> BoxFuture<'static, OTelSdkResult> {
        let records = extract_from_resource_metrics(metrics);
        let send = self.export_records(&records);
        async move {
            send.await.map_err(|e| {
                OTelSdkError::InternalFailure(format!("New Relic metric export failed: {}", e))
            })
        }
        .boxed()
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        self.client
            .shutdown()
            .map_err(|e| OTelSdkError::InternalFailure(e.to_string()))
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}
