//! Error types for the New Relic exporters
//!
//! Translation itself never fails: unknown shapes are skipped. Errors come from
//! configuration validation, payload encoding, and batch delivery.

use thiserror::Error;

/// Main error type for the New Relic exporters
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export/delivery errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tracer or meter provider failed to shut down
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing required configuration field
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Invalid URL format
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    /// Invalid interval value
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Export/delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The ingest endpoint could not be reached or rejected the batch
    #[error("Batch delivery failed: {0}")]
    DeliveryFailed(String),

    /// Input telemetry could not be read
    #[error("Format conversion error: {0}")]
    FormatConversionError(String),

    /// The delivery client has been shut down
    #[error("Telemetry client is shut down")]
    ClientShutdown,
}

impl From<anyhow::Error> for ExportError {
    fn from(err: anyhow::Error) -> Self {
        ExportError::FormatConversionError(err.to_string())
    }
}
