//! Normalized output records and the batches handed to the delivery client
//!
//! Every record carries a flat [`AttributeSet`]. Batches render the New Relic
//! ingest payload shape with [`SpanBatch::to_payload`] and friends.

use crate::export::attributes::AttributeSet;
use serde_json::{Map, Value, json};

/// A span ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSpan {
    /// Span id, lower-case hex
    pub id: String,
    /// Trace id, lower-case hex
    pub trace_id: String,
    /// Parent span id; absent for root spans
    pub parent_id: Option<String>,
    /// Span name; absent when the span had an empty name
    pub name: Option<String>,
    /// Start time, milliseconds since the epoch
    pub timestamp_ms: u64,
    /// Duration in fractional milliseconds
    pub duration_ms: f64,
    /// Span attributes
    pub attributes: AttributeSet,
}

impl NormalizedSpan {
    fn to_json(&self) -> Value {
        let mut attributes = attributes_to_map(&self.attributes);
        if let Some(name) = &self.name {
            attributes.insert("name".into(), json!(name));
        }
        if let Some(parent_id) = &self.parent_id {
            attributes.insert("parent.id".into(), json!(parent_id));
        }
        attributes.insert("duration.ms".into(), json!(self.duration_ms));
        json!({
            "id": self.id,
            "trace.id": self.trace_id,
            "timestamp": self.timestamp_ms,
            "attributes": attributes,
        })
    }
}

/// A metric ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedMetric {
    /// Activity over an interval
    Count {
        /// Metric name
        name: String,
        /// Delta over the interval
        value: f64,
        /// Interval start, milliseconds since the epoch
        start_ms: u64,
        /// Interval end, milliseconds since the epoch
        end_ms: u64,
        /// Metric attributes
        attributes: AttributeSet,
    },
    /// Instantaneous value
    Gauge {
        /// Metric name
        name: String,
        /// Observed value
        value: f64,
        /// Observation time, milliseconds since the epoch
        timestamp_ms: u64,
        /// Metric attributes
        attributes: AttributeSet,
    },
    /// Distribution statistics over an interval
    Summary {
        /// Metric name
        name: String,
        /// Number of samples
        count: u64,
        /// Sum of samples
        sum: f64,
        /// Smallest sample, NaN when unknown
        min: f64,
        /// Largest sample, NaN when unknown
        max: f64,
        /// Interval start, milliseconds since the epoch
        start_ms: u64,
        /// Interval end, milliseconds since the epoch
        end_ms: u64,
        /// Metric attributes
        attributes: AttributeSet,
    },
}

impl NormalizedMetric {
    /// Metric name
    pub fn name(&self) -> &str {
        match self {
            Self::Count { name, .. } | Self::Gauge { name, .. } | Self::Summary { name, .. } => {
                name
            }
        }
    }

    /// Metric attributes
    pub fn attributes(&self) -> &AttributeSet {
        match self {
            Self::Count { attributes, .. }
            | Self::Gauge { attributes, .. }
            | Self::Summary { attributes, .. } => attributes,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Count {
                name,
                value,
                start_ms,
                end_ms,
                attributes,
            } => json!({
                "name": name,
                "type": "count",
                "value": value,
                "timestamp": start_ms,
                "interval.ms": end_ms.saturating_sub(*start_ms),
                "attributes": attributes,
            }),
            Self::Gauge {
                name,
                value,
                timestamp_ms,
                attributes,
            } => json!({
                "name": name,
                "type": "gauge",
                "value": value,
                "timestamp": timestamp_ms,
                "attributes": attributes,
            }),
            Self::Summary {
                name,
                count,
                sum,
                min,
                max,
                start_ms,
                end_ms,
                attributes,
            } => json!({
                "name": name,
                "type": "summary",
                "value": {
                    "count": count,
                    "sum": sum,
                    "min": min,
                    "max": max,
                },
                "timestamp": start_ms,
                "interval.ms": end_ms.saturating_sub(*start_ms),
                "attributes": attributes,
            }),
        }
    }
}

/// A log entry ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLog {
    /// Log time, milliseconds since the epoch
    pub timestamp_ms: u64,
    /// Log message
    pub message: String,
    /// Log attributes
    pub attributes: AttributeSet,
}

impl NormalizedLog {
    fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp_ms,
            "message": self.message,
            "attributes": self.attributes,
        })
    }
}

/// Spans sharing one set of common attributes
#[derive(Debug, Clone, PartialEq)]
pub struct SpanBatch {
    /// Attributes common to every span in the batch
    pub attributes: AttributeSet,
    /// Spans
    pub spans: Vec<NormalizedSpan>,
}

impl SpanBatch {
    /// Trace API payload
    pub fn to_payload(&self) -> Value {
        let spans: Vec<Value> = self.spans.iter().map(NormalizedSpan::to_json).collect();
        json!([{
            "common": { "attributes": self.attributes },
            "spans": spans,
        }])
    }
}

/// Metrics sharing one set of common attributes
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    /// Attributes common to every metric in the batch
    pub attributes: AttributeSet,
    /// Metrics
    pub metrics: Vec<NormalizedMetric>,
}

impl MetricBatch {
    /// Metric API payload
    pub fn to_payload(&self) -> Value {
        let metrics: Vec<Value> = self.metrics.iter().map(NormalizedMetric::to_json).collect();
        json!([{
            "common": { "attributes": self.attributes },
            "metrics": metrics,
        }])
    }
}

/// Logs sharing one set of common attributes
#[derive(Debug, Clone, PartialEq)]
pub struct LogBatch {
    /// Attributes common to every log in the batch
    pub attributes: AttributeSet,
    /// Logs
    pub logs: Vec<NormalizedLog>,
}

impl LogBatch {
    /// Log API payload
    pub fn to_payload(&self) -> Value {
        let logs: Vec<Value> = self.logs.iter().map(NormalizedLog::to_json).collect();
        json!([{
            "common": { "attributes": self.attributes },
            "logs": logs,
        }])
    }
}

/// Any batch the delivery client accepts
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryBatch {
    /// Span batch
    Spans(SpanBatch),
    /// Metric batch
    Metrics(MetricBatch),
    /// Log batch
    Logs(LogBatch),
}

impl TelemetryBatch {
    /// Ingest payload for this batch
    pub fn to_payload(&self) -> Value {
        match self {
            Self::Spans(batch) => batch.to_payload(),
            Self::Metrics(batch) => batch.to_payload(),
            Self::Logs(batch) => batch.to_payload(),
        }
    }

    /// Number of records in the batch
    pub fn len(&self) -> usize {
        match self {
            Self::Spans(batch) => batch.spans.len(),
            Self::Metrics(batch) => batch.metrics.len(),
            Self::Logs(batch) => batch.logs.len(),
        }
    }

    /// Whether the batch has no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the batch kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spans(_) => "spans",
            Self::Metrics(_) => "metrics",
            Self::Logs(_) => "logs",
        }
    }
}

fn attributes_to_map(attributes: &AttributeSet) -> Map<String, Value> {
    match serde_json::to_value(attributes) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
