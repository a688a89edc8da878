//! Translation of finished spans into per-resource batches
//!
//! Resource attributes belong to the batch, so spans are grouped by resource
//! first. Each group yields one [`SpanBatch`], and a [`LogBatch`] when any of
//! its spans recorded events.

use crate::export::attributes::{
    AttributeNormalizer, AttributeSet, LibraryInfo, names, populate_library_info,
};
use crate::export::model::{LogBatch, NormalizedLog, NormalizedSpan, SpanBatch};
use crate::export::time_tracker::{nanos_to_millis, system_time_to_nanos};
use opentelemetry::trace::{SpanId, SpanKind, Status};
use opentelemetry_sdk::trace::SpanData;
use std::collections::HashMap;

/// Log attribute holding the owning span id
pub const LOG_SPAN_ID: &str = "span.id";
/// Log attribute holding the owning trace id
pub const LOG_TRACE_ID: &str = "trace.id";
/// Log attribute holding the owning span name
pub const LOG_SPAN_NAME: &str = "name";

/// A finished span and the resource it was produced under
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    /// Resource attributes, if known
    pub resource: Option<AttributeSet>,
    /// The SDK span
    pub span: SpanData,
}

impl FinishedSpan {
    /// Pair a span with its resource
    pub fn new(resource: Option<AttributeSet>, span: SpanData) -> Self {
        Self { resource, span }
    }
}

/// Builds span and span-event batches
#[derive(Debug, Clone)]
pub struct SpanBatchAdapter {
    normalizer: AttributeNormalizer,
}

impl SpanBatchAdapter {
    /// Create an adapter using `normalizer` for batch-level attributes
    pub fn new(normalizer: AttributeNormalizer) -> Self {
        Self { normalizer }
    }

    /// One span batch per distinct resource, in first-seen order
    pub fn adapt_to_span_batches(&self, spans: &[FinishedSpan]) -> Vec<SpanBatch> {
        group_by_resource(spans)
            .into_iter()
            .map(|group| SpanBatch {
                attributes: self.normalizer.with_resource(group.resource),
                spans: group.spans.into_iter().map(make_span).collect(),
            })
            .collect()
    }

    /// One log batch per resource whose spans recorded events
    pub fn adapt_to_log_batches(&self, spans: &[FinishedSpan]) -> Vec<LogBatch> {
        group_by_resource(spans)
            .into_iter()
            .filter_map(|group| {
                let logs: Vec<NormalizedLog> =
                    group.spans.iter().flat_map(|span| make_logs(span)).collect();
                if logs.is_empty() {
                    return None;
                }
                Some(LogBatch {
                    attributes: self.normalizer.with_resource(group.resource),
                    logs,
                })
            })
            .collect()
    }
}

struct ResourceGroup<'a> {
    resource: Option<&'a AttributeSet>,
    spans: Vec<&'a SpanData>,
}

/// Group spans by resource value, keeping first-seen order
fn group_by_resource(spans: &[FinishedSpan]) -> Vec<ResourceGroup<'_>> {
    let mut groups: Vec<ResourceGroup<'_>> = Vec::new();
    let mut index: HashMap<Option<&AttributeSet>, usize> = HashMap::new();
    for finished in spans {
        let resource = finished.resource.as_ref();
        let position = *index.entry(resource).or_insert_with(|| {
            groups.push(ResourceGroup {
                resource,
                spans: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].spans.push(&finished.span);
    }
    groups
}

/// Normalize one span
pub fn make_span(span: &SpanData) -> NormalizedSpan {
    let start_nanos = system_time_to_nanos(span.start_time);
    let end_nanos = system_time_to_nanos(span.end_time);
    let parent_id = (span.parent_span_id != SpanId::INVALID)
        .then(|| span.parent_span_id.to_string());
    let name = (!span.name.is_empty()).then(|| span.name.to_string());

    NormalizedSpan {
        id: span.span_context.span_id().to_string(),
        trace_id: span.span_context.trace_id().to_string(),
        parent_id,
        name,
        timestamp_ms: nanos_to_millis(start_nanos),
        duration_ms: duration_millis(start_nanos, end_nanos),
        attributes: span_attributes(span),
    }
}

/// Library info, span attributes, kind and error message, in that order
fn span_attributes(span: &SpanData) -> AttributeSet {
    let mut attributes = AttributeSet::new();
    let library = LibraryInfo::from(&span.instrumentation_scope);
    populate_library_info(&mut attributes, Some(&library));
    attributes.extend_from_key_values(&span.attributes);
    attributes.put(names::SPAN_KIND, span_kind_name(&span.span_kind));
    if let Some(message) = error_message(&span.status) {
        attributes.put(names::ERROR_MESSAGE, message);
    }
    attributes
}

fn make_logs(span: &SpanData) -> Vec<NormalizedLog> {
    let span_id = span.span_context.span_id().to_string();
    let trace_id = span.span_context.trace_id().to_string();
    span.events
        .events
        .iter()
        .map(|event| {
            let mut attributes = AttributeSet::new();
            attributes.extend_from_key_values(&event.attributes);
            attributes
                .put(LOG_SPAN_ID, span_id.as_str())
                .put(LOG_TRACE_ID, trace_id.as_str());
            if !span.name.is_empty() {
                attributes.put(LOG_SPAN_NAME, span.name.as_ref());
            }
            NormalizedLog {
                timestamp_ms: nanos_to_millis(system_time_to_nanos(event.timestamp)),
                message: event.name.to_string(),
                attributes,
            }
        })
        .collect()
}

/// Upper-case kind name
pub fn span_kind_name(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Client => "CLIENT",
        SpanKind::Server => "SERVER",
        SpanKind::Producer => "PRODUCER",
        SpanKind::Consumer => "CONSUMER",
        SpanKind::Internal => "INTERNAL",
    }
}

/// Error text for a failed span; `None` unless the status is an error
pub fn error_message(status: &Status) -> Option<String> {
    match status {
        Status::Error { description } if !description.is_empty() => Some(description.to_string()),
        Status::Error { .. } => Some("ERROR".to_string()),
        Status::Ok | Status::Unset => None,
    }
}

/// Elapsed time in fractional milliseconds; negative if `end` precedes `start`
pub fn duration_millis(start_nanos: u64, end_nanos: u64) -> f64 {
    (end_nanos as i64 - start_nanos as i64) as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_duration_keeps_sub_millisecond_precision() {
        let duration = duration_millis(1_000_456_001_000, 1_001_789_021_111);
        assert!((duration - 1333.020111).abs() < 1e-9);
    }

    #[test]
    fn test_error_message_falls_back_to_code() {
        let status = Status::Error {
            description: Cow::Borrowed(""),
        };
        assert_eq!(error_message(&status).as_deref(), Some("ERROR"));
        assert_eq!(error_message(&Status::Unset), None);
        assert_eq!(error_message(&Status::Ok), None);
    }

    #[test]
    fn test_span_kind_names() {
        assert_eq!(span_kind_name(&SpanKind::Client), "CLIENT");
        assert_eq!(span_kind_name(&SpanKind::Internal), "INTERNAL");
    }
}
