//! HTTP delivery to the New Relic ingest APIs
//!
//! One JSON POST per batch. Retries, compression and payload splitting are
//! left to the caller.

use crate::client::TelemetryClient;
use crate::config::ExporterConfig;
use crate::error::{ConfigError, ExportError, ExporterError};
use crate::export::model::TelemetryBatch;
use futures::FutureExt;
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};
use url::Url;

/// Default trace endpoint
pub const DEFAULT_TRACE_URI: &str = "https://trace-api.newrelic.com/trace/v1";
/// Default metric endpoint
pub const DEFAULT_METRIC_URI: &str = "https://metric-api.newrelic.com/metric/v1";
/// Default log endpoint
pub const DEFAULT_LOG_URI: &str = "https://log-api.newrelic.com/log/v1";

/// Tracing target for outgoing payloads when audit logging is on
pub const AUDIT_LOG_TARGET: &str = "newrelic_otel_exporter::audit";

const DATA_FORMAT: &str = "newrelic";
const DATA_FORMAT_VERSION: &str = "1";

fn user_agent() -> String {
    format!("NewRelic-OpenTelemetry-Exporter/{}", env!("CARGO_PKG_VERSION"))
}

/// Resolved ingest endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Trace API
    pub trace: Url,
    /// Metric API
    pub metric: Url,
    /// Log API
    pub log: Url,
}

impl Endpoints {
    /// Default endpoints with the configured overrides applied
    pub fn from_config(config: &ExporterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            trace: resolve(DEFAULT_TRACE_URI, config.trace_uri_override())?,
            metric: resolve(DEFAULT_METRIC_URI, config.metric_uri_override())?,
            log: resolve(DEFAULT_LOG_URI, config.log_uri_override())?,
        })
    }

    fn for_batch(&self, batch: &TelemetryBatch) -> &Url {
        match batch {
            TelemetryBatch::Spans(_) => &self.trace,
            TelemetryBatch::Metrics(_) => &self.metric,
            TelemetryBatch::Logs(_) => &self.log,
        }
    }
}

/// Replace scheme, host and port of `default` with those of `override_uri`
fn resolve(default: &str, override_uri: Option<&Url>) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(default).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", default, e)))?;
    let Some(override_uri) = override_uri else {
        return Ok(url);
    };

    url.set_scheme(override_uri.scheme()).map_err(|_| {
        ConfigError::InvalidUrl(format!("Unsupported scheme in {}", override_uri))
    })?;
    url.set_host(override_uri.host_str())
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", override_uri, e)))?;
    url.set_port(override_uri.port())
        .map_err(|_| ConfigError::InvalidUrl(format!("Cannot set port from {}", override_uri)))?;
    Ok(url)
}

/// Posts batches to the New Relic ingest APIs
#[derive(Clone)]
pub struct HttpTelemetryClient {
    client: reqwest::Client,
    api_key: Arc<SecretString>,
    endpoints: Endpoints,
    audit_logging: bool,
    runtime: Option<tokio::runtime::Handle>,
    shut_down: Arc<AtomicBool>,
}

impl std::fmt::Debug for HttpTelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTelemetryClient")
            .field("endpoints", &self.endpoints)
            .field("audit_logging", &self.audit_logging)
            .finish_non_exhaustive()
    }
}

impl HttpTelemetryClient {
    /// Create a client from the exporter configuration
    ///
    /// When called inside a tokio runtime, requests are driven on that runtime
    /// so SDK background threads can send without one of their own.
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        let endpoints = Endpoints::from_config(config)?;

        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|e| {
                ExportError::DeliveryFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            trace_endpoint = %endpoints.trace,
            metric_endpoint = %endpoints.metric,
            log_endpoint = %endpoints.log,
            audit_logging = config.enable_audit_logging(),
            "Created New Relic HTTP telemetry client"
        );

        Ok(Self {
            client,
            api_key: Arc::new(SecretString::new(config.api_key().expose_secret().clone())),
            endpoints,
            audit_logging: config.enable_audit_logging(),
            runtime: tokio::runtime::Handle::try_current().ok(),
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Resolved endpoints
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn post(
        client: reqwest::Client,
        api_key: Arc<SecretString>,
        url: Url,
        batch: TelemetryBatch,
        audit_logging: bool,
    ) -> Result<(), ExportError> {
        let payload = batch.to_payload();
        if audit_logging {
            debug!(
                target: AUDIT_LOG_TARGET,
                kind = batch.kind(),
                endpoint = %url,
                payload = %payload,
                "Sending batch"
            );
        }

        let body = serde_json::to_vec(&payload).map_err(|e| {
            ExportError::SerializationError(format!(
                "Failed to encode {} batch: {}",
                batch.kind(),
                e
            ))
        })?;

        let response = client
            .post(url.clone())
            .header("Api-Key", api_key.expose_secret().as_str())
            .header("Data-Format", DATA_FORMAT)
            .header("Data-Format-Version", DATA_FORMAT_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                ExportError::DeliveryFailed(format!("Failed to send {}: {}", batch.kind(), e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::DeliveryFailed(format!(
                "{} returned {} for {} batch",
                url,
                status,
                batch.kind()
            )));
        }

        trace!(
            kind = batch.kind(),
            records = batch.len(),
            status = status.as_u16(),
            "Delivered batch"
        );
        Ok(())
    }
}

impl TelemetryClient for HttpTelemetryClient {
    fn send_batch(&self, batch: TelemetryBatch) -> BoxFuture<'static, Result<(), ExportError>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return futures::future::ready(Err(ExportError::ClientShutdown)).boxed();
        }

        let url = self.endpoints.for_batch(&batch).clone();
        let request = Self::post(
            self.client.clone(),
            Arc::clone(&self.api_key),
            url,
            batch,
            self.audit_logging,
        );

        match &self.runtime {
            Some(handle) => {
                let task = handle.spawn(request);
                async move {
                    task.await.map_err(|e| {
                        warn!(error = %e, "Delivery task failed");
                        ExportError::DeliveryFailed(format!("Delivery task failed: {}", e))
                    })?
                }
                .boxed()
            }
            None => request.boxed(),
        }
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("HTTP telemetry client already shut down");
        } else {
            info!("HTTP telemetry client shut down");
        }
        Ok(())
    }
}
