//! Mock collaborators module
//!
//! Provides an in-memory telemetry client for exporter tests.

pub mod client;

pub use client::RecordingTelemetryClient;
