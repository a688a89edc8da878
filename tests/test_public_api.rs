//! Tests for the provider bootstrap API

use newrelic_otel_exporter::export::attributes::names;
use newrelic_otel_exporter::{ExporterConfig, NewRelicExporters, RecordingTelemetryClient};
use opentelemetry::metrics::MeterProvider;
use opentelemetry::trace::{Span, Tracer, TracerProvider};
use std::sync::Arc;

fn start() -> (NewRelicExporters, RecordingTelemetryClient) {
    let config = ExporterConfig::builder()
        .api_key("test-key")
        .service_name("checkout")
        .collection_interval_secs(3600)
        .build()
        .unwrap();
    let client = RecordingTelemetryClient::new();
    let exporters = NewRelicExporters::start_with_client(config, Arc::new(client.clone()));
    (exporters, client)
}

#[test]
fn test_spans_reach_the_client() {
    let (exporters, client) = start();

    let tracer = exporters.tracer_provider().tracer("checkout-tracer");
    let mut span = tracer.start("place-order");
    span.add_event("validated", Vec::new());
    span.end();
    exporters.force_flush().unwrap();

    let batches = client.span_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].spans[0].name.as_deref(), Some("place-order"));
    assert_eq!(
        batches[0].attributes.get_str(names::SERVICE_NAME),
        Some("checkout")
    );
    assert_eq!(client.log_batches()[0].logs[0].message, "validated");

    exporters.shutdown().unwrap();
}

#[test]
fn test_metrics_reach_the_client() {
    let (exporters, client) = start();

    let gauge = exporters
        .meter_provider()
        .meter("checkout-meter")
        .i64_up_down_counter("cart.items")
        .build();
    gauge.add(4, &[]);
    exporters.force_flush().unwrap();

    let metric = client
        .metric_batches()
        .into_iter()
        .flat_map(|batch| batch.metrics)
        .find(|metric| metric.name() == "cart.items")
        .expect("cart.items should be exported");
    assert!(matches!(
        metric,
        newrelic_otel_exporter::export::model::NormalizedMetric::Gauge { value, .. } if value == 4.0
    ));

    exporters.shutdown().unwrap();
}

#[test]
fn test_shutdown_closes_the_client() {
    let (exporters, client) = start();

    exporters.shutdown().unwrap();

    assert!(client.is_shut_down());
    assert_eq!(exporters.config().service_name(), "checkout");
}
