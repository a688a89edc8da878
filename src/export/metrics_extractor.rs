//! Extract metric records from SDK collections and OTLP protobuf requests
//!
//! Both sources are flattened into [`MetricRecord`]s: one record per metric,
//! carrying its resource and instrumentation library. Sums and gauges keep
//! their number type; histograms become summaries with min and max at
//! percentiles 0.0 and 100.0.

use crate::export::attributes::{AttributeSet, AttributeValue, LibraryInfo};
use crate::export::metrics_data::*;
use crate::export::time_tracker::system_time_to_nanos;
use anyhow::Result;
use opentelemetry::KeyValue;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{
    AnyValue, InstrumentationScope as ProtoScope, KeyValue as ProtoKeyValue, any_value,
};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, Metric as ProtoMetric, NumberDataPoint as ProtoNumberDataPoint,
    metric::Data as ProtoData, number_data_point,
};
use opentelemetry_sdk::metrics::data::{
    AggregatedMetrics, ExponentialHistogram, Gauge, Histogram, Metric, MetricData,
    ResourceMetrics, Sum,
};
use tracing::{trace, warn};

/// Number types the SDK aggregates
trait SdkNumber: Copy {
    fn point_value(self) -> PointValue;
    fn into_f64(self) -> f64;
    fn aggregation(monotonic: bool) -> AggregationType;
}

impl SdkNumber for u64 {
    fn point_value(self) -> PointValue {
        PointValue::Long(i64::try_from(self).unwrap_or(i64::MAX))
    }
    fn into_f64(self) -> f64 {
        self as f64
    }
    fn aggregation(monotonic: bool) -> AggregationType {
        long_aggregation(monotonic)
    }
}

impl SdkNumber for i64 {
    fn point_value(self) -> PointValue {
        PointValue::Long(self)
    }
    fn into_f64(self) -> f64 {
        self as f64
    }
    fn aggregation(monotonic: bool) -> AggregationType {
        long_aggregation(monotonic)
    }
}

impl SdkNumber for f64 {
    fn point_value(self) -> PointValue {
        PointValue::Double(self)
    }
    fn into_f64(self) -> f64 {
        self
    }
    fn aggregation(monotonic: bool) -> AggregationType {
        double_aggregation(monotonic)
    }
}

fn long_aggregation(monotonic: bool) -> AggregationType {
    if monotonic {
        AggregationType::MonotonicLong
    } else {
        AggregationType::NonMonotonicLong
    }
}

fn double_aggregation(monotonic: bool) -> AggregationType {
    if monotonic {
        AggregationType::MonotonicDouble
    } else {
        AggregationType::NonMonotonicDouble
    }
}

/// Flatten an SDK collection into metric records
pub fn extract_from_resource_metrics(metrics: &ResourceMetrics) -> Vec<MetricRecord> {
    let resource = AttributeSet::from(metrics.resource());
    let mut records = Vec::new();

    for scope_metrics in metrics.scope_metrics() {
        let library = LibraryInfo::from(scope_metrics.scope());
        for metric in scope_metrics.metrics() {
            let (aggregation, points) = match metric.data() {
                AggregatedMetrics::F64(data) => sdk_points(data),
                AggregatedMetrics::U64(data) => sdk_points(data),
                AggregatedMetrics::I64(data) => sdk_points(data),
            };
            records.push(MetricRecord {
                resource: Some(resource.clone()),
                library: Some(library.clone()),
                identity: sdk_identity(metric, aggregation),
                points,
            });
        }
    }

    trace!(records = records.len(), "Extracted metric records from SDK collection");
    records
}

fn sdk_identity(metric: &Metric, aggregation: AggregationType) -> MetricIdentity {
    MetricIdentity::new(
        metric.name(),
        metric.description(),
        metric.unit(),
        aggregation,
    )
}

fn sdk_points<T: SdkNumber>(data: &MetricData<T>) -> (AggregationType, Vec<DataPoint>) {
    match data {
        MetricData::Gauge(gauge) => (T::aggregation(false), gauge_points(gauge)),
        MetricData::Sum(sum) => (T::aggregation(sum.is_monotonic()), sum_points(sum)),
        MetricData::Histogram(hist) => (AggregationType::Summary, histogram_points(hist)),
        MetricData::ExponentialHistogram(hist) => {
            (AggregationType::Summary, exp_histogram_points(hist))
        }
    }
}

fn gauge_points<T: SdkNumber>(gauge: &Gauge<T>) -> Vec<DataPoint> {
    let end = system_time_to_nanos(gauge.time());
    let start = gauge.start_time().map(system_time_to_nanos).unwrap_or(end);
    gauge
        .data_points()
        .map(|dp| DataPoint {
            labels: labels_from_key_values(dp.attributes()),
            start_epoch_nanos: start,
            epoch_nanos: end,
            value: dp.value().point_value(),
        })
        .collect()
}

fn sum_points<T: SdkNumber>(sum: &Sum<T>) -> Vec<DataPoint> {
    let start = system_time_to_nanos(sum.start_time());
    let end = system_time_to_nanos(sum.time());
    sum.data_points()
        .map(|dp| DataPoint {
            labels: labels_from_key_values(dp.attributes()),
            start_epoch_nanos: start,
            epoch_nanos: end,
            value: dp.value().point_value(),
        })
        .collect()
}

fn histogram_points<T: SdkNumber>(hist: &Histogram<T>) -> Vec<DataPoint> {
    let start = system_time_to_nanos(hist.start_time());
    let end = system_time_to_nanos(hist.time());
    hist.data_points()
        .map(|dp| DataPoint {
            labels: labels_from_key_values(dp.attributes()),
            start_epoch_nanos: start,
            epoch_nanos: end,
            value: summary_value(
                dp.count(),
                dp.sum().into_f64(),
                dp.min().map(SdkNumber::into_f64),
                dp.max().map(SdkNumber::into_f64),
            ),
        })
        .collect()
}

fn exp_histogram_points<T: SdkNumber>(hist: &ExponentialHistogram<T>) -> Vec<DataPoint> {
    let start = system_time_to_nanos(hist.start_time());
    let end = system_time_to_nanos(hist.time());
    hist.data_points()
        .map(|dp| DataPoint {
            labels: labels_from_key_values(dp.attributes()),
            start_epoch_nanos: start,
            epoch_nanos: end,
            value: summary_value(
                dp.count() as u64,
                dp.sum().into_f64(),
                dp.min().map(SdkNumber::into_f64),
                dp.max().map(SdkNumber::into_f64),
            ),
        })
        .collect()
}

/// Summary with min/max as the 0th and 100th percentile samples when known
fn summary_value(count: u64, sum: f64, min: Option<f64>, max: Option<f64>) -> PointValue {
    let mut percentile_values = Vec::with_capacity(2);
    if let Some(min) = min {
        percentile_values.push(ValueAtPercentile::new(0.0, min));
    }
    if let Some(max) = max {
        percentile_values.push(ValueAtPercentile::new(100.0, max));
    }
    PointValue::Summary(SummaryValue {
        count,
        sum,
        percentile_values,
    })
}

fn labels_from_key_values<'a>(kvs: impl Iterator<Item = &'a KeyValue>) -> LabelSet {
    kvs.map(|kv| (kv.key.as_str().to_owned(), kv.value.as_str().into_owned()))
        .collect()
}

/// Flatten an OTLP metrics request into metric records
///
/// Every resource group is read. Points without a value are skipped, as are
/// delta-temporality monotonic sums, which carry no running total to diff.
pub fn extract_from_protobuf(request: &ExportMetricsServiceRequest) -> Result<Vec<MetricRecord>> {
    let mut records = Vec::new();

    for resource_metrics in &request.resource_metrics {
        let resource = resource_metrics
            .resource
            .as_ref()
            .map(|resource| attributes_from_proto(&resource.attributes));

        for scope_metrics in &resource_metrics.scope_metrics {
            let library = scope_metrics.scope.as_ref().map(library_from_proto);
            for metric in &scope_metrics.metrics {
                if metric.name.is_empty() {
                    anyhow::bail!("Metric without a name in OTLP request");
                }
                let Some((aggregation, points)) = proto_points(metric) else {
                    continue;
                };
                records.push(MetricRecord {
                    resource: resource.clone(),
                    library: library.clone(),
                    identity: MetricIdentity::new(
                        metric.name.as_str(),
                        metric.description.as_str(),
                        metric.unit.as_str(),
                        aggregation,
                    ),
                    points,
                });
            }
        }
    }

    trace!(records = records.len(), "Extracted metric records from protobuf");
    Ok(records)
}

fn library_from_proto(scope: &ProtoScope) -> LibraryInfo {
    let version = (!scope.version.is_empty()).then(|| scope.version.clone());
    LibraryInfo::new(scope.name.as_str(), version)
}

fn proto_points(metric: &ProtoMetric) -> Option<(AggregationType, Vec<DataPoint>)> {
    match metric.data.as_ref()? {
        ProtoData::Gauge(gauge) => number_points(&gauge.data_points, false),
        ProtoData::Sum(sum) => {
            if sum.is_monotonic
                && sum.aggregation_temporality == AggregationTemporality::Delta as i32
            {
                warn!(
                    metric = %metric.name,
                    "Skipping delta-temporality monotonic sum"
                );
                return None;
            }
            number_points(&sum.data_points, sum.is_monotonic)
        }
        ProtoData::Histogram(hist) => {
            let points = hist
                .data_points
                .iter()
                .map(|dp| DataPoint {
                    labels: labels_from_proto(&dp.attributes),
                    start_epoch_nanos: dp.start_time_unix_nano,
                    epoch_nanos: dp.time_unix_nano,
                    value: summary_value(dp.count, dp.sum.unwrap_or_default(), dp.min, dp.max),
                })
                .collect();
            Some((AggregationType::Summary, points))
        }
        ProtoData::ExponentialHistogram(hist) => {
            let points = hist
                .data_points
                .iter()
                .map(|dp| DataPoint {
                    labels: labels_from_proto(&dp.attributes),
                    start_epoch_nanos: dp.start_time_unix_nano,
                    epoch_nanos: dp.time_unix_nano,
                    value: summary_value(dp.count, dp.sum.unwrap_or_default(), dp.min, dp.max),
                })
                .collect();
            Some((AggregationType::Summary, points))
        }
        ProtoData::Summary(summary) => {
            let points = summary
                .data_points
                .iter()
                .map(|dp| DataPoint {
                    labels: labels_from_proto(&dp.attributes),
                    start_epoch_nanos: dp.start_time_unix_nano,
                    epoch_nanos: dp.time_unix_nano,
                    value: PointValue::Summary(SummaryValue {
                        count: dp.count,
                        sum: dp.sum,
                        percentile_values: dp
                            .quantile_values
                            .iter()
                            .map(|q| ValueAtPercentile::new(q.quantile * 100.0, q.value))
                            .collect(),
                    }),
                })
                .collect();
            Some((AggregationType::Summary, points))
        }
    }
}

/// Number points of one metric; the first valued point decides long vs double
fn number_points(
    data_points: &[ProtoNumberDataPoint],
    monotonic: bool,
) -> Option<(AggregationType, Vec<DataPoint>)> {
    let is_double = data_points
        .iter()
        .find_map(|dp| dp.value.as_ref())
        .map(|value| matches!(value, number_data_point::Value::AsDouble(_)))?;

    let points = data_points
        .iter()
        .filter_map(|dp| {
            let value = match (dp.value.as_ref()?, is_double) {
                (number_data_point::Value::AsDouble(d), true) => PointValue::Double(*d),
                (number_data_point::Value::AsInt(i), true) => PointValue::Double(*i as f64),
                (number_data_point::Value::AsInt(i), false) => PointValue::Long(*i),
                (number_data_point::Value::AsDouble(_), false) => return None,
            };
            Some(DataPoint {
                labels: labels_from_proto(&dp.attributes),
                start_epoch_nanos: dp.start_time_unix_nano,
                epoch_nanos: dp.time_unix_nano,
                value,
            })
        })
        .collect();

    let aggregation = if is_double {
        double_aggregation(monotonic)
    } else {
        long_aggregation(monotonic)
    };
    Some((aggregation, points))
}

fn proto_scalar(value: &AnyValue) -> Option<AttributeValue> {
    match value.value.as_ref()? {
        any_value::Value::StringValue(s) => Some(AttributeValue::String(s.clone())),
        any_value::Value::BoolValue(b) => Some(AttributeValue::Bool(*b)),
        any_value::Value::IntValue(i) => Some(AttributeValue::Int(*i)),
        any_value::Value::DoubleValue(d) => Some(AttributeValue::Double(*d)),
        any_value::Value::ArrayValue(_)
        | any_value::Value::KvlistValue(_)
        | any_value::Value::BytesValue(_) => None,
    }
}

fn attributes_from_proto(kvs: &[ProtoKeyValue]) -> AttributeSet {
    let mut attributes = AttributeSet::new();
    for kv in kvs {
        if let Some(value) = kv.value.as_ref().and_then(proto_scalar) {
            attributes.put(kv.key.as_str(), value);
        }
    }
    attributes
}

fn labels_from_proto(kvs: &[ProtoKeyValue]) -> LabelSet {
    kvs.iter()
        .filter_map(|kv| {
            let label = match kv.value.as_ref().and_then(proto_scalar)? {
                AttributeValue::String(s) => s,
                AttributeValue::Bool(b) => b.to_string(),
                AttributeValue::Int(i) => i.to_string(),
                AttributeValue::Double(d) => d.to_string(),
            };
            Some((kv.key.clone(), label))
        })
        .collect()
}
