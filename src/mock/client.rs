//! In-memory telemetry client for testing
//!
//! Records every batch it is handed and can be switched into a failing mode
//! to exercise exporter error paths.

use crate::client::TelemetryClient;
use crate::error::ExportError;
use crate::export::model::{LogBatch, MetricBatch, SpanBatch, TelemetryBatch};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Recording client state
#[derive(Debug, Default)]
struct RecordingState {
    /// Batches received, in order
    batches: Vec<TelemetryBatch>,
    /// Number of send attempts, including failed ones
    send_calls: u64,
    /// Reject every batch when set
    failing: bool,
    /// Set once `shutdown` has been called
    shut_down: bool,
}

/// Telemetry client that keeps batches in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetryClient {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingTelemetryClient {
    /// Create a client that accepts every batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that rejects every batch
    pub fn failing() -> Self {
        let client = Self::new();
        client.set_failing(true);
        client
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch failure mode on or off
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// All recorded batches
    pub fn batches(&self) -> Vec<TelemetryBatch> {
        self.state().batches.clone()
    }

    /// Recorded span batches
    pub fn span_batches(&self) -> Vec<SpanBatch> {
        self.state()
            .batches
            .iter()
            .filter_map(|batch| match batch {
                TelemetryBatch::Spans(spans) => Some(spans.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded metric batches
    pub fn metric_batches(&self) -> Vec<MetricBatch> {
        self.state()
            .batches
            .iter()
            .filter_map(|batch| match batch {
                TelemetryBatch::Metrics(metrics) => Some(metrics.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded log batches
    pub fn log_batches(&self) -> Vec<LogBatch> {
        self.state()
            .batches
            .iter()
            .filter_map(|batch| match batch {
                TelemetryBatch::Logs(logs) => Some(logs.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of send attempts, including rejected ones
    pub fn send_calls(&self) -> u64 {
        self.state().send_calls
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.state().shut_down
    }

    /// Assert that the expected number of batches were recorded
    pub fn assert_batches_received(&self, expected_count: usize) -> Result<(), String> {
        let received = self.state().batches.len();
        if received != expected_count {
            Err(format!(
                "Expected {} batches, but received {}",
                expected_count, received
            ))
        } else {
            Ok(())
        }
    }

    /// Reset the recorded state (for test isolation)
    pub fn reset(&self) {
        *self.state() = RecordingState::default();
    }
}

impl TelemetryClient for RecordingTelemetryClient {
    fn send_batch(&self, batch: TelemetryBatch) -> BoxFuture<'static, Result<(), ExportError>> {
        let result = {
            let mut state = self.state();
            state.send_calls += 1;
            if state.shut_down {
                Err(ExportError::ClientShutdown)
            } else if state.failing {
                Err(ExportError::DeliveryFailed(format!(
                    "Recording client rejected {} batch",
                    batch.kind()
                )))
            } else {
                state.batches.push(batch);
                Ok(())
            }
        };
        futures::future::ready(result).boxed()
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        self.state().shut_down = true;
        Ok(())
    }
}
