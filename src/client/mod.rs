//! Delivery of translated batches
//!
//! Exporters hand every batch to a [`TelemetryClient`]. The HTTP client posts
//! to the New Relic ingest APIs; tests use
//! [`crate::mock::RecordingTelemetryClient`].

pub mod http;

use crate::error::ExportError;
use crate::export::model::TelemetryBatch;
use futures::future::BoxFuture;
use std::fmt::Debug;

pub use http::{Endpoints, HttpTelemetryClient};

/// Sends translated batches to the backend
pub trait TelemetryClient: Send + Sync + Debug {
    /// Deliver one batch
    fn send_batch(&self, batch: TelemetryBatch) -> BoxFuture<'static, Result<(), ExportError>>;

    /// Stop accepting batches
    fn shutdown(&self) -> Result<(), ExportError>;
}
