//! Translation of OpenTelemetry telemetry into New Relic batches
//!
//! Leaves first: attribute sets and the time tracker, per-timeseries delta
//! state, the point and span adapters, and the exporters that drive them.

pub mod attributes;
pub mod delta;
pub mod exporter;
pub mod metric_adapter;
pub mod metrics_data;
pub mod metrics_extractor;
pub mod model;
pub mod span_adapter;
pub mod time_tracker;

pub use attributes::{AttributeNormalizer, AttributeSet, AttributeValue, LibraryInfo};
pub use delta::{DeltaDoubleCounter, DeltaLongCounter, DeltaState, TimeseriesKey};
pub use exporter::{NewRelicMetricExporter, NewRelicSpanExporter};
pub use metric_adapter::MetricPointAdapter;
pub use metrics_data::{
    AggregationType, DataPoint, LabelSet, MetricIdentity, MetricRecord, PointValue, SummaryValue,
    ValueAtPercentile,
};
pub use metrics_extractor::{extract_from_protobuf, extract_from_resource_metrics};
pub use model::{
    LogBatch, MetricBatch, NormalizedLog, NormalizedMetric, NormalizedSpan, SpanBatch,
    TelemetryBatch,
};
pub use span_adapter::{FinishedSpan, SpanBatchAdapter};
pub use time_tracker::{Clock, ManualClock, SystemClock, TimeTracker};
