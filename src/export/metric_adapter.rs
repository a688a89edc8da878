//! Translation of raw metric points into interval-scoped records

use crate::export::attributes::{
    AttributeSet, add_resource_attributes, names, populate_library_info,
};
use crate::export::delta::DeltaState;
use crate::export::metrics_data::{
    AggregationType, DataPoint, MetricIdentity, MetricRecord, PointValue, SummaryValue,
};
use crate::export::model::NormalizedMetric;
use crate::export::time_tracker::{TimeTracker, nanos_to_millis};
use std::sync::Arc;
use tracing::trace;

/// Turns raw points into counts, gauges and summaries
///
/// Owns the delta state for every monotonic timeseries it has seen and
/// reads the interval start from the shared [`TimeTracker`].
#[derive(Debug)]
pub struct MetricPointAdapter {
    time_tracker: Arc<TimeTracker>,
    deltas: DeltaState,
}

impl MetricPointAdapter {
    /// Create an adapter with empty delta state
    pub fn new(time_tracker: Arc<TimeTracker>) -> Self {
        Self {
            time_tracker,
            deltas: DeltaState::new(),
        }
    }

    /// The tracker supplying interval starts
    pub fn time_tracker(&self) -> &Arc<TimeTracker> {
        &self.time_tracker
    }

    /// Delta state, one counter per observed timeseries
    pub fn delta_state(&self) -> &DeltaState {
        &self.deltas
    }

    /// Translate one point of `identity`, starting counts at the tracker's previous boundary
    ///
    /// `attributes` are the caller's pre-merged attributes. Labels on scalar
    /// points are applied on top of them; summary point labels are not.
    /// Shapes that do not match the aggregation type yield nothing.
    pub fn build_metrics(
        &self,
        identity: &MetricIdentity,
        point: &DataPoint,
        attributes: &AttributeSet,
    ) -> Vec<NormalizedMetric> {
        let interval_start_nanos = self.time_tracker.previous_time_nanos();
        self.build_metrics_at(identity, point, attributes, interval_start_nanos)
    }

    /// Translate one point of `identity` with an explicit count interval start
    pub fn build_metrics_at(
        &self,
        identity: &MetricIdentity,
        point: &DataPoint,
        attributes: &AttributeSet,
        interval_start_nanos: u64,
    ) -> Vec<NormalizedMetric> {
        let metric = match (identity.aggregation, &point.value) {
            (AggregationType::MonotonicLong, PointValue::Long(value)) => {
                let delta = self.deltas.long_delta(identity, &point.labels, *value);
                count(identity, point, delta as f64, attributes, interval_start_nanos)
            }
            (AggregationType::MonotonicDouble, PointValue::Double(value)) => {
                let delta = self.deltas.double_delta(identity, &point.labels, *value);
                count(identity, point, delta, attributes, interval_start_nanos)
            }
            (AggregationType::NonMonotonicLong, PointValue::Long(value)) => {
                gauge(identity, point, *value as f64, attributes)
            }
            (AggregationType::NonMonotonicDouble, PointValue::Double(value)) => {
                gauge(identity, point, *value, attributes)
            }
            (AggregationType::Summary, PointValue::Summary(summary)) => {
                summary_metric(identity, point, summary, attributes)
            }
            (aggregation, _) => {
                trace!(
                    metric = %identity.name,
                    ?aggregation,
                    "Skipping point whose shape does not match its aggregation"
                );
                return Vec::new();
            }
        };
        vec![metric]
    }

    /// Translate every point of a record, attaching the record's own attributes
    ///
    /// Counts start at `interval_start_nanos`, which the caller reads once per
    /// export cycle.
    pub fn translate_record(
        &self,
        record: &MetricRecord,
        interval_start_nanos: u64,
    ) -> Vec<NormalizedMetric> {
        let attributes = record_attributes(record);
        record
            .points
            .iter()
            .flat_map(|point| {
                self.build_metrics_at(&record.identity, point, &attributes, interval_start_nanos)
            })
            .collect()
    }
}

/// Resource, library, descriptor and constant-label attributes for a record
///
/// Common attributes are not included; they travel on the batch.
pub fn record_attributes(record: &MetricRecord) -> AttributeSet {
    let mut attributes = AttributeSet::new();
    add_resource_attributes(&mut attributes, record.resource.as_ref());
    populate_library_info(&mut attributes, record.library.as_ref());
    let identity = &record.identity;
    if !identity.description.is_empty() {
        attributes.put(names::DESCRIPTOR_DESCRIPTION, identity.description.as_str());
    }
    if !identity.unit.is_empty() {
        attributes.put(names::DESCRIPTOR_UNIT, identity.unit.as_str());
    }
    attributes.extend_from_labels(&identity.constant_labels);
    attributes
}

fn count(
    identity: &MetricIdentity,
    point: &DataPoint,
    value: f64,
    attributes: &AttributeSet,
    interval_start_nanos: u64,
) -> NormalizedMetric {
    NormalizedMetric::Count {
        name: identity.name.clone(),
        value,
        start_ms: nanos_to_millis(interval_start_nanos),
        end_ms: nanos_to_millis(point.epoch_nanos),
        attributes: with_point_labels(attributes, point),
    }
}

fn gauge(
    identity: &MetricIdentity,
    point: &DataPoint,
    value: f64,
    attributes: &AttributeSet,
) -> NormalizedMetric {
    NormalizedMetric::Gauge {
        name: identity.name.clone(),
        value,
        timestamp_ms: nanos_to_millis(point.epoch_nanos),
        attributes: with_point_labels(attributes, point),
    }
}

fn summary_metric(
    identity: &MetricIdentity,
    point: &DataPoint,
    summary: &SummaryValue,
    attributes: &AttributeSet,
) -> NormalizedMetric {
    let (min, max) = min_max(summary);
    NormalizedMetric::Summary {
        name: identity.name.clone(),
        count: summary.count,
        sum: summary.sum,
        min,
        max,
        start_ms: nanos_to_millis(point.start_epoch_nanos),
        end_ms: nanos_to_millis(point.epoch_nanos),
        attributes: attributes.clone(),
    }
}

/// Values at percentiles 0.0 and 100.0, NaN when absent
fn min_max(summary: &SummaryValue) -> (f64, f64) {
    let mut min = f64::NAN;
    let mut max = f64::NAN;
    for sample in &summary.percentile_values {
        if sample.percentile == 0.0 {
            min = sample.value;
        } else if sample.percentile == 100.0 {
            max = sample.value;
        }
    }
    (min, max)
}

fn with_point_labels(attributes: &AttributeSet, point: &DataPoint) -> AttributeSet {
    let mut merged = attributes.clone();
    merged.extend_from_labels(&point.labels);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::metrics_data::ValueAtPercentile;

    #[test]
    fn test_min_max_absent_is_nan() {
        let summary = SummaryValue {
            count: 2,
            sum: 3.0,
            percentile_values: vec![ValueAtPercentile::new(50.0, 1.5)],
        };
        let (min, max) = min_max(&summary);
        assert!(min.is_nan());
        assert!(max.is_nan());
    }

    #[test]
    fn test_record_attributes_skip_empty_descriptor() {
        let record = MetricRecord::new(
            MetricIdentity::new("queue.depth", "", "items", AggregationType::NonMonotonicLong),
            Vec::new(),
        );
        let attributes = record_attributes(&record);
        assert!(!attributes.contains_key(names::DESCRIPTOR_DESCRIPTION));
        assert_eq!(attributes.get_str(names::DESCRIPTOR_UNIT), Some("items"));
    }
}
