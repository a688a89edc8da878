//! Input metric model with public fields
//!
//! Metric records flatten the SDK's resource/scope/metric nesting so each
//! record knows its own resource and instrumentation library. Records are
//! produced by [`crate::export::metrics_extractor`] or built directly.

use crate::export::attributes::{AttributeSet, LibraryInfo};
use std::collections::BTreeMap;

/// Point labels; equality ignores insertion order
pub type LabelSet = BTreeMap<String, String>;

/// How a metric's raw points must be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationType {
    /// Cumulative integer total
    MonotonicLong,
    /// Cumulative floating point total
    MonotonicDouble,
    /// Integer snapshot
    NonMonotonicLong,
    /// Floating point snapshot
    NonMonotonicDouble,
    /// Count, sum and percentile samples
    Summary,
}

impl AggregationType {
    /// Whether points are running totals needing delta conversion
    pub fn is_monotonic(self) -> bool {
        matches!(self, Self::MonotonicLong | Self::MonotonicDouble)
    }
}

/// Definition of a metric, shared by all of its timeseries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricIdentity {
    /// Metric name
    pub name: String,
    /// Metric description, may be empty
    pub description: String,
    /// Metric unit, may be empty
    pub unit: String,
    /// Aggregation semantics
    pub aggregation: AggregationType,
    /// Labels attached at definition time
    pub constant_labels: LabelSet,
}

impl MetricIdentity {
    /// Create an identity without constant labels
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        aggregation: AggregationType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            aggregation,
            constant_labels: LabelSet::new(),
        }
    }

    /// Attach constant labels
    pub fn with_constant_labels(mut self, labels: LabelSet) -> Self {
        self.constant_labels = labels;
        self
    }
}

/// One sample at a given percentile (0.0 to 100.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueAtPercentile {
    /// Percentile, 0.0 to 100.0
    pub percentile: f64,
    /// Observed value
    pub value: f64,
}

impl ValueAtPercentile {
    /// Create a percentile sample
    pub fn new(percentile: f64, value: f64) -> Self {
        Self { percentile, value }
    }
}

/// Summary point payload
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryValue {
    /// Number of samples
    pub count: u64,
    /// Sum of samples
    pub sum: f64,
    /// Percentile samples
    pub percentile_values: Vec<ValueAtPercentile>,
}

/// Value carried by a data point
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    /// Integer value
    Long(i64),
    /// Floating point value
    Double(f64),
    /// Summary statistics
    Summary(SummaryValue),
}

/// A single raw observation
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Point labels
    pub labels: LabelSet,
    /// Interval start, nanoseconds since the epoch
    pub start_epoch_nanos: u64,
    /// Interval end (or instant), nanoseconds since the epoch
    pub epoch_nanos: u64,
    /// Observed value
    pub value: PointValue,
}

impl DataPoint {
    /// Create a point with no labels
    pub fn new(start_epoch_nanos: u64, epoch_nanos: u64, value: PointValue) -> Self {
        Self {
            labels: LabelSet::new(),
            start_epoch_nanos,
            epoch_nanos,
            value,
        }
    }

    /// Attach labels
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }
}

/// A metric with its points and the context it was produced in
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Resource attributes, if a resource accompanied the metric
    pub resource: Option<AttributeSet>,
    /// Instrumentation library, if known
    pub library: Option<LibraryInfo>,
    /// Metric definition
    pub identity: MetricIdentity,
    /// Raw points
    pub points: Vec<DataPoint>,
}

impl MetricRecord {
    /// Create a record with no resource or library context
    pub fn new(identity: MetricIdentity, points: Vec<DataPoint>) -> Self {
        Self {
            resource: None,
            library: None,
            identity,
            points,
        }
    }
}
