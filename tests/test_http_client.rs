//! Unit tests for HTTP batch delivery against a mock ingest endpoint

use newrelic_otel_exporter::error::ExportError;
use newrelic_otel_exporter::export::attributes::AttributeSet;
use newrelic_otel_exporter::export::model::{
    LogBatch, MetricBatch, NormalizedLog, NormalizedMetric, SpanBatch, TelemetryBatch,
};
use newrelic_otel_exporter::{ExporterConfig, HttpTelemetryClient, TelemetryClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpTelemetryClient {
    let config = ExporterConfig::builder()
        .api_key("test-insert-key")
        .service_name("checkout")
        .trace_uri_override(server.uri())
        .metric_uri_override(server.uri())
        .log_uri_override(server.uri())
        .build()
        .unwrap();
    HttpTelemetryClient::new(&config).unwrap()
}

fn metric_batch() -> TelemetryBatch {
    TelemetryBatch::Metrics(MetricBatch {
        attributes: AttributeSet::new().with("service.name", "checkout"),
        metrics: vec![NormalizedMetric::Gauge {
            name: "queue.depth".to_string(),
            value: 12.0,
            timestamp_ms: 1_700_000_000_000,
            attributes: AttributeSet::new(),
        }],
    })
}

#[tokio::test]
async fn test_metric_batch_posted_with_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metric/v1"))
        .and(header("Api-Key", "test-insert-key"))
        .and(header("Data-Format", "newrelic"))
        .and(header("Data-Format-Version", "1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.send_batch(metric_batch()).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body[0]["metrics"][0]["name"], "queue.depth");
    assert_eq!(body[0]["metrics"][0]["type"], "gauge");
    assert_eq!(body[0]["common"]["attributes"]["service.name"], "checkout");
}

#[tokio::test]
async fn test_batches_routed_by_kind() {
    let mock_server = MockServer::start().await;

    for endpoint in ["/trace/v1", "/log/v1"] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server);
    client
        .send_batch(TelemetryBatch::Spans(SpanBatch {
            attributes: AttributeSet::new(),
            spans: Vec::new(),
        }))
        .await
        .unwrap();
    client
        .send_batch(TelemetryBatch::Logs(LogBatch {
            attributes: AttributeSet::new(),
            logs: vec![NormalizedLog {
                timestamp_ms: 1,
                message: "retry".to_string(),
                attributes: AttributeSet::new(),
            }],
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_delivery_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metric/v1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.send_batch(metric_batch()).await;

    match result {
        Err(ExportError::DeliveryFailed(message)) => assert!(message.contains("403")),
        other => panic!("Expected delivery failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_send_after_shutdown_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.shutdown().unwrap();
    client.shutdown().unwrap();

    let result = client.send_batch(metric_batch()).await;

    assert_eq!(result, Err(ExportError::ClientShutdown));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_delivery_failure() {
    let config = ExporterConfig::builder()
        .api_key("k")
        .service_name("s")
        .metric_uri_override("http://127.0.0.1:1")
        .build()
        .unwrap();
    let client = HttpTelemetryClient::new(&config).unwrap();

    let result = client.send_batch(metric_batch()).await;

    assert!(matches!(result, Err(ExportError::DeliveryFailed(_))));
}

#[test]
fn test_endpoints_resolved_from_overrides() {
    let config = ExporterConfig::builder()
        .api_key("k")
        .service_name("s")
        .log_uri_override("http://localhost:9999")
        .build()
        .unwrap();
    let client = HttpTelemetryClient::new(&config).unwrap();

    let endpoints = client.endpoints();
    assert_eq!(endpoints.log.as_str(), "http://localhost:9999/log/v1");
    assert_eq!(
        endpoints.trace.as_str(),
        "https://trace-api.newrelic.com/trace/v1"
    );
}
