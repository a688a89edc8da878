//! Unit tests for OTLP protobuf metric extraction

use newrelic_otel_exporter::export::attributes::AttributeValue;
use newrelic_otel_exporter::export::metrics_data::{AggregationType, PointValue};
use newrelic_otel_exporter::export::metrics_extractor::extract_from_protobuf;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Gauge, Histogram, HistogramDataPoint, Metric, NumberDataPoint,
    ResourceMetrics, ScopeMetrics, Sum, Summary, SummaryDataPoint, metric::Data,
    number_data_point, summary_data_point::ValueAtQuantile,
};
use opentelemetry_proto::tonic::resource::v1::Resource;

fn kv(key: &str, value: any_value::Value) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue { value: Some(value) }),
        ..Default::default()
    }
}

fn string_kv(key: &str, value: &str) -> KeyValue {
    kv(key, any_value::Value::StringValue(value.to_string()))
}

fn int_point(value: i64) -> NumberDataPoint {
    NumberDataPoint {
        attributes: vec![string_kv("method", "GET")],
        start_time_unix_nano: 1_000_000_000,
        time_unix_nano: 2_000_000_000,
        value: Some(number_data_point::Value::AsInt(value)),
        ..Default::default()
    }
}

fn double_point(value: f64) -> NumberDataPoint {
    NumberDataPoint {
        value: Some(number_data_point::Value::AsDouble(value)),
        ..int_point(0)
    }
}

fn request(metrics: Vec<Metric>) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: Some(Resource {
                attributes: vec![string_kv("host.name", "web-1")],
                ..Default::default()
            }),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope {
                    name: "io.example.http".to_string(),
                    version: "2.0.0".to_string(),
                    ..Default::default()
                }),
                metrics,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

fn metric(name: &str, data: Data) -> Metric {
    Metric {
        name: name.to_string(),
        description: "test metric".to_string(),
        unit: "1".to_string(),
        data: Some(data),
        ..Default::default()
    }
}

fn cumulative_sum(points: Vec<NumberDataPoint>, monotonic: bool) -> Data {
    Data::Sum(Sum {
        data_points: points,
        aggregation_temporality: AggregationTemporality::Cumulative as i32,
        is_monotonic: monotonic,
    })
}

#[test]
fn test_monotonic_int_sum_extracts_as_monotonic_long() {
    let req = request(vec![metric("requests", cumulative_sum(vec![int_point(7)], true))]);

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.identity.name, "requests");
    assert_eq!(record.identity.description, "test metric");
    assert_eq!(record.identity.aggregation, AggregationType::MonotonicLong);
    assert_eq!(record.points[0].value, PointValue::Long(7));
    assert_eq!(record.points[0].start_epoch_nanos, 1_000_000_000);
    assert_eq!(record.points[0].epoch_nanos, 2_000_000_000);
    assert_eq!(record.points[0].labels.get("method").map(String::as_str), Some("GET"));
}

#[test]
fn test_resource_and_scope_are_carried() {
    let req = request(vec![metric("requests", cumulative_sum(vec![int_point(1)], true))]);

    let records = extract_from_protobuf(&req).unwrap();

    let resource = records[0].resource.as_ref().unwrap();
    assert_eq!(resource.get_str("host.name"), Some("web-1"));
    let library = records[0].library.as_ref().unwrap();
    assert_eq!(library.name, "io.example.http");
    assert_eq!(library.version.as_deref(), Some("2.0.0"));
}

#[test]
fn test_gauge_double_extracts_as_non_monotonic_double() {
    let gauge = Data::Gauge(Gauge {
        data_points: vec![double_point(0.75)],
    });
    let req = request(vec![metric("cpu.utilization", gauge)]);

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(
        records[0].identity.aggregation,
        AggregationType::NonMonotonicDouble
    );
    assert_eq!(records[0].points[0].value, PointValue::Double(0.75));
}

#[test]
fn test_first_valued_point_decides_number_type() {
    let points = vec![
        NumberDataPoint {
            value: None,
            ..int_point(0)
        },
        double_point(1.5),
        int_point(2),
    ];
    let req = request(vec![metric("mixed", cumulative_sum(points, false))]);

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(
        records[0].identity.aggregation,
        AggregationType::NonMonotonicDouble
    );
    assert_eq!(
        records[0]
            .points
            .iter()
            .map(|p| p.value.clone())
            .collect::<Vec<_>>(),
        vec![PointValue::Double(1.5), PointValue::Double(2.0)]
    );
}

#[test]
fn test_delta_monotonic_sum_is_skipped() {
    let delta = Data::Sum(Sum {
        data_points: vec![int_point(3)],
        aggregation_temporality: AggregationTemporality::Delta as i32,
        is_monotonic: true,
    });
    let req = request(vec![
        metric("deltas", delta),
        metric("totals", cumulative_sum(vec![int_point(3)], true)),
    ]);

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity.name, "totals");
}

#[test]
fn test_summary_quantiles_become_percentiles() {
    let summary = Data::Summary(Summary {
        data_points: vec![SummaryDataPoint {
            count: 10,
            sum: 55.0,
            quantile_values: vec![
                ValueAtQuantile {
                    quantile: 0.0,
                    value: 1.0,
                },
                ValueAtQuantile {
                    quantile: 0.5,
                    value: 5.0,
                },
                ValueAtQuantile {
                    quantile: 1.0,
                    value: 10.0,
                },
            ],
            ..Default::default()
        }],
    });
    let req = request(vec![metric("latency", summary)]);

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(records[0].identity.aggregation, AggregationType::Summary);
    let PointValue::Summary(value) = &records[0].points[0].value else {
        panic!("Expected summary point");
    };
    assert_eq!(value.count, 10);
    assert_eq!(value.sum, 55.0);
    let percentiles: Vec<f64> = value.percentile_values.iter().map(|p| p.percentile).collect();
    assert_eq!(percentiles, vec![0.0, 50.0, 100.0]);
}

#[test]
fn test_histogram_becomes_summary_with_min_max() {
    let histogram = Data::Histogram(Histogram {
        data_points: vec![HistogramDataPoint {
            count: 4,
            sum: Some(20.0),
            min: Some(2.0),
            max: Some(8.0),
            ..Default::default()
        }],
        aggregation_temporality: AggregationTemporality::Cumulative as i32,
    });
    let req = request(vec![metric("payload.size", histogram)]);

    let records = extract_from_protobuf(&req).unwrap();

    let PointValue::Summary(value) = &records[0].points[0].value else {
        panic!("Expected summary point");
    };
    assert_eq!(value.count, 4);
    assert_eq!(value.percentile_values[0].percentile, 0.0);
    assert_eq!(value.percentile_values[0].value, 2.0);
    assert_eq!(value.percentile_values[1].percentile, 100.0);
    assert_eq!(value.percentile_values[1].value, 8.0);
}

#[test]
fn test_metric_without_name_is_rejected() {
    let req = request(vec![metric("", cumulative_sum(vec![int_point(1)], true))]);
    assert!(extract_from_protobuf(&req).is_err());
}

#[test]
fn test_non_string_labels_are_stringified() {
    let point = NumberDataPoint {
        attributes: vec![
            kv("status", any_value::Value::IntValue(200)),
            kv("cached", any_value::Value::BoolValue(true)),
        ],
        ..int_point(1)
    };
    let req = request(vec![metric("responses", cumulative_sum(vec![point], true))]);

    let records = extract_from_protobuf(&req).unwrap();

    let labels = &records[0].points[0].labels;
    assert_eq!(labels.get("status").map(String::as_str), Some("200"));
    assert_eq!(labels.get("cached").map(String::as_str), Some("true"));
}

#[test]
fn test_resource_keeps_typed_values() {
    let mut req = request(vec![metric("requests", cumulative_sum(vec![int_point(1)], true))]);
    if let Some(resource) = req.resource_metrics[0].resource.as_mut() {
        resource
            .attributes
            .push(kv("host.cpus", any_value::Value::IntValue(8)));
    }

    let records = extract_from_protobuf(&req).unwrap();

    assert_eq!(
        records[0].resource.as_ref().unwrap().get("host.cpus"),
        Some(&AttributeValue::Int(8))
    );
}

#[test]
fn test_empty_request_yields_no_records() {
    let req = ExportMetricsServiceRequest::default();
    assert!(extract_from_protobuf(&req).unwrap().is_empty());
}
