//! Per-timeseries delta state for cumulative counters

use crate::export::metrics_data::{LabelSet, MetricIdentity};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Converts a cumulative `i64` counter into deltas between observations
#[derive(Debug, Default, Clone)]
pub struct DeltaLongCounter {
    previous: Option<i64>,
}

impl DeltaLongCounter {
    /// Create a counter with no baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta since the last observation; the first observation is returned unchanged
    ///
    /// A decreasing raw value yields a negative delta.
    pub fn delta(&mut self, value: i64) -> i64 {
        let delta = match self.previous {
            Some(previous) => value.wrapping_sub(previous),
            None => value,
        };
        self.previous = Some(value);
        delta
    }
}

/// Converts a cumulative `f64` counter into deltas between observations
#[derive(Debug, Default, Clone)]
pub struct DeltaDoubleCounter {
    previous: Option<f64>,
}

impl DeltaDoubleCounter {
    /// Create a counter with no baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta since the last observation; the first observation is returned unchanged
    pub fn delta(&mut self, value: f64) -> f64 {
        let delta = match self.previous {
            Some(previous) => value - previous,
            None => value,
        };
        self.previous = Some(value);
        delta
    }
}

/// Identifies one timeseries: the metric definition plus the point's labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeseriesKey {
    /// Metric definition
    pub identity: MetricIdentity,
    /// Point labels
    pub labels: LabelSet,
}

impl TimeseriesKey {
    /// Build a key from borrowed parts
    pub fn new(identity: &MetricIdentity, labels: &LabelSet) -> Self {
        Self {
            identity: identity.clone(),
            labels: labels.clone(),
        }
    }
}

/// Lazily populated counters, one per timeseries
///
/// Lookups and updates are serialized by an internal lock so overlapping
/// exports never interleave on the same counter.
#[derive(Debug, Default)]
pub struct DeltaState {
    longs: Mutex<HashMap<TimeseriesKey, DeltaLongCounter>>,
    doubles: Mutex<HashMap<TimeseriesKey, DeltaDoubleCounter>>,
}

impl DeltaState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta for a long timeseries, creating its counter on first sight
    pub fn long_delta(&self, identity: &MetricIdentity, labels: &LabelSet, value: i64) -> i64 {
        let mut counters = self.longs.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(TimeseriesKey::new(identity, labels))
            .or_default()
            .delta(value)
    }

    /// Delta for a double timeseries, creating its counter on first sight
    pub fn double_delta(&self, identity: &MetricIdentity, labels: &LabelSet, value: f64) -> f64 {
        let mut counters = self.doubles.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(TimeseriesKey::new(identity, labels))
            .or_default()
            .delta(value)
    }

    /// Number of tracked timeseries
    pub fn len(&self) -> usize {
        let longs = self.longs.lock().unwrap_or_else(PoisonError::into_inner).len();
        let doubles = self
            .doubles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        longs + doubles
    }

    /// Whether no timeseries has been observed yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
