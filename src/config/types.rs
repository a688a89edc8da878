//! Configuration type definitions
//!
//! Defines the exporter configuration and its builder.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::error::ConfigError;

/// Smallest accepted collection interval in seconds
pub const MIN_COLLECTION_INTERVAL_SECS: u64 = 1;
/// Largest accepted collection interval in seconds
pub const MAX_COLLECTION_INTERVAL_SECS: u64 = 3600;

fn default_collection_interval_secs() -> u64 {
    5
}

fn default_enable_audit_logging() -> bool {
    false
}

/// Exporter configuration
///
/// Immutable once built. Construction validates that identity material is
/// present, so every exporter built from it can stamp `service.name` and
/// authenticate without further checks.
///
/// # Default Values
///
/// - `enable_audit_logging`: `false`
/// - `collection_interval_secs`: `5`
/// - endpoint overrides: none (New Relic US endpoints are used)
///
/// # Example
///
/// ```no_run
/// use newrelic_otel_exporter::ExporterConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExporterConfig::builder()
///     .api_key("my-insert-key")
///     .service_name("checkout")
///     .collection_interval_secs(10)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ExporterConfig {
    api_key: SecretString,
    service_name: String,
    trace_uri_override: Option<Url>,
    metric_uri_override: Option<Url>,
    log_uri_override: Option<Url>,
    enable_audit_logging: bool,
    collection_interval_secs: u64,
    common_attributes: BTreeMap<String, String>,
}

impl ExporterConfig {
    /// Create a configuration with defaults for everything but identity
    pub fn new(
        api_key: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .api_key(api_key)
            .service_name(service_name)
            .build()
    }

    /// Start a builder
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::new()
    }

    /// API key sent with every request
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Service name stamped on every record
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Trace endpoint override
    pub fn trace_uri_override(&self) -> Option<&Url> {
        self.trace_uri_override.as_ref()
    }

    /// Metric endpoint override
    pub fn metric_uri_override(&self) -> Option<&Url> {
        self.metric_uri_override.as_ref()
    }

    /// Log endpoint override
    pub fn log_uri_override(&self) -> Option<&Url> {
        self.log_uri_override.as_ref()
    }

    /// Whether outgoing payloads are logged
    pub fn enable_audit_logging(&self) -> bool {
        self.enable_audit_logging
    }

    /// Metric collection interval in seconds
    pub fn collection_interval_secs(&self) -> u64 {
        self.collection_interval_secs
    }

    /// Metric collection interval
    pub fn collection_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.collection_interval_secs)
    }

    /// Extra attributes applied below `service.name`
    pub fn common_attributes(&self) -> &BTreeMap<String, String> {
        &self.common_attributes
    }
}

impl Clone for ExporterConfig {
    fn clone(&self) -> Self {
        Self {
            api_key: SecretString::new(self.api_key.expose_secret().clone()),
            service_name: self.service_name.clone(),
            trace_uri_override: self.trace_uri_override.clone(),
            metric_uri_override: self.metric_uri_override.clone(),
            log_uri_override: self.log_uri_override.clone(),
            enable_audit_logging: self.enable_audit_logging,
            collection_interval_secs: self.collection_interval_secs,
            common_attributes: self.common_attributes.clone(),
        }
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("api_key", &"[REDACTED]")
            .field("service_name", &self.service_name)
            .field("trace_uri_override", &self.trace_uri_override)
            .field("metric_uri_override", &self.metric_uri_override)
            .field("log_uri_override", &self.log_uri_override)
            .field("enable_audit_logging", &self.enable_audit_logging)
            .field("collection_interval_secs", &self.collection_interval_secs)
            .field("common_attributes", &self.common_attributes)
            .finish()
    }
}

/// Builder for [`ExporterConfig`]
///
/// Every field is optional until [`ExporterConfigBuilder::build`], which
/// applies defaults and validates. Deserializes from YAML with the same
/// field names as the setters.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfigBuilder {
    api_key: Option<String>,
    service_name: Option<String>,
    trace_uri_override: Option<String>,
    metric_uri_override: Option<String>,
    log_uri_override: Option<String>,
    enable_audit_logging: Option<bool>,
    collection_interval_secs: Option<u64>,
    common_attributes: Option<BTreeMap<String, String>>,
}

impl fmt::Debug for ExporterConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("service_name", &self.service_name)
            .field("trace_uri_override", &self.trace_uri_override)
            .field("metric_uri_override", &self.metric_uri_override)
            .field("log_uri_override", &self.log_uri_override)
            .field("enable_audit_logging", &self.enable_audit_logging)
            .field("collection_interval_secs", &self.collection_interval_secs)
            .field("common_attributes", &self.common_attributes)
            .finish()
    }
}

impl ExporterConfigBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the service name
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Override the trace endpoint's scheme, host and port
    pub fn trace_uri_override(mut self, uri: impl Into<String>) -> Self {
        self.trace_uri_override = Some(uri.into());
        self
    }

    /// Override the metric endpoint's scheme, host and port
    pub fn metric_uri_override(mut self, uri: impl Into<String>) -> Self {
        self.metric_uri_override = Some(uri.into());
        self
    }

    /// Override the log endpoint's scheme, host and port
    pub fn log_uri_override(mut self, uri: impl Into<String>) -> Self {
        self.log_uri_override = Some(uri.into());
        self
    }

    /// Log every outgoing payload
    pub fn enable_audit_logging(mut self, enabled: bool) -> Self {
        self.enable_audit_logging = Some(enabled);
        self
    }

    /// Set the metric collection interval
    pub fn collection_interval_secs(mut self, secs: u64) -> Self {
        self.collection_interval_secs = Some(secs);
        self
    }

    /// Add an attribute applied to every record below `service.name`
    pub fn common_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Apply every field set in `other` on top of this builder
    pub fn merge(mut self, other: ExporterConfigBuilder) -> Self {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.service_name.is_some() {
            self.service_name = other.service_name;
        }
        if other.trace_uri_override.is_some() {
            self.trace_uri_override = other.trace_uri_override;
        }
        if other.metric_uri_override.is_some() {
            self.metric_uri_override = other.metric_uri_override;
        }
        if other.log_uri_override.is_some() {
            self.log_uri_override = other.log_uri_override;
        }
        if other.enable_audit_logging.is_some() {
            self.enable_audit_logging = other.enable_audit_logging;
        }
        if other.collection_interval_secs.is_some() {
            self.collection_interval_secs = other.collection_interval_secs;
        }
        if let Some(attributes) = other.common_attributes {
            self.common_attributes
                .get_or_insert_with(BTreeMap::new)
                .extend(attributes);
        }
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<ExporterConfig, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequiredField("api_key".to_string()))?;

        let service_name = self
            .service_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequiredField("service_name".to_string()))?;

        let collection_interval_secs = self
            .collection_interval_secs
            .unwrap_or_else(default_collection_interval_secs);
        if !(MIN_COLLECTION_INTERVAL_SECS..=MAX_COLLECTION_INTERVAL_SECS)
            .contains(&collection_interval_secs)
        {
            return Err(ConfigError::InvalidInterval(format!(
                "Collection interval must be between {} and {} seconds, got {}",
                MIN_COLLECTION_INTERVAL_SECS, MAX_COLLECTION_INTERVAL_SECS, collection_interval_secs
            )));
        }

        Ok(ExporterConfig {
            api_key: SecretString::new(api_key),
            service_name,
            trace_uri_override: parse_override("trace_uri_override", self.trace_uri_override)?,
            metric_uri_override: parse_override("metric_uri_override", self.metric_uri_override)?,
            log_uri_override: parse_override("log_uri_override", self.log_uri_override)?,
            enable_audit_logging: self
                .enable_audit_logging
                .unwrap_or_else(default_enable_audit_logging),
            collection_interval_secs,
            common_attributes: self.common_attributes.unwrap_or_default(),
        })
    }
}

fn parse_override(field: &str, value: Option<String>) -> Result<Option<Url>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let url = Url::parse(&value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: '{}' ({})", field, value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http:// or https:// scheme",
            field
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} must include a host", field)));
    }
    Ok(Some(url))
}
