//! Configuration loader
//!
//! Loads configuration from YAML files, environment variables, or programmatic API.
//! Priority: provided config > environment variables > defaults

use std::env;

use crate::config::types::{ExporterConfig, ExporterConfigBuilder};
use crate::error::ConfigError;
use tracing::{debug, info, warn};

/// API key
pub const ENV_API_KEY: &str = "NEW_RELIC_API_KEY";
/// Service name
pub const ENV_SERVICE_NAME: &str = "NEW_RELIC_SERVICE_NAME";
/// Trace endpoint override
pub const ENV_TRACE_URI_OVERRIDE: &str = "NEW_RELIC_TRACE_URI_OVERRIDE";
/// Metric endpoint override
pub const ENV_METRIC_URI_OVERRIDE: &str = "NEW_RELIC_METRIC_URI_OVERRIDE";
/// Log endpoint override
pub const ENV_LOG_URI_OVERRIDE: &str = "NEW_RELIC_LOG_URI_OVERRIDE";
/// Audit logging flag
pub const ENV_ENABLE_AUDIT_LOGGING: &str = "NEW_RELIC_ENABLE_AUDIT_LOGGING";
/// Collection interval in seconds
pub const ENV_COLLECTION_INTERVAL_SECS: &str = "NEW_RELIC_COLLECTION_INTERVAL_SECS";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from YAML file
    ///
    /// Environment variables fill in fields the file leaves unset.
    pub fn from_yaml(path: impl AsRef<std::path::Path>) -> Result<ExporterConfig, ConfigError> {
        let path = path.as_ref();
        info!(
            config_path = %path.display(),
            "Loading configuration from YAML file"
        );

        let content = std::fs::read_to_string(path).map_err(|e| {
            warn!(
                config_path = %path.display(),
                error = %e,
                "Failed to read configuration file"
            );
            ConfigError::ValidationFailed(format!("Failed to read config file: {}", e))
        })?;

        debug!(
            config_path = %path.display(),
            file_size_bytes = content.len(),
            "Read configuration file"
        );

        let builder: ExporterConfigBuilder = serde_yaml::from_str(&content).map_err(|e| {
            warn!(
                config_path = %path.display(),
                error = %e,
                "Failed to parse YAML configuration"
            );
            ConfigError::ValidationFailed(format!("Failed to parse YAML: {}", e))
        })?;

        debug!(
            config_path = %path.display(),
            "Parsed YAML configuration successfully"
        );

        Self::load(Some(builder))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<ExporterConfig, ConfigError> {
        info!("Loading configuration from environment variables");
        Self::load(None)
    }

    /// Load configuration with priority: provided config > environment variables > defaults
    pub fn load(provided: Option<ExporterConfigBuilder>) -> Result<ExporterConfig, ConfigError> {
        if provided.is_some() {
            info!("Loading configuration with provided config and environment variable fallbacks");
        } else {
            info!("Loading configuration with defaults and environment variables");
        }

        let mut builder = Self::env_builder();
        debug!("Read environment variables");

        if let Some(provided) = provided {
            builder = builder.merge(provided);
        }

        let config = builder.build().map_err(|e| {
            warn!(
                error = %e,
                "Configuration validation failed"
            );
            e
        })?;

        info!(
            service_name = %config.service_name(),
            collection_interval_secs = config.collection_interval_secs(),
            enable_audit_logging = config.enable_audit_logging(),
            trace_uri_override = ?config.trace_uri_override().map(|u| u.as_str()),
            metric_uri_override = ?config.metric_uri_override().map(|u| u.as_str()),
            "Configuration loaded and validated successfully"
        );

        Ok(config)
    }

    /// Builder holding every recognised environment variable
    fn env_builder() -> ExporterConfigBuilder {
        let mut builder = ExporterConfigBuilder::new();

        if let Ok(api_key) = env::var(ENV_API_KEY) {
            debug!(env_var = ENV_API_KEY, "Applying environment variable override");
            builder = builder.api_key(api_key);
        }

        if let Ok(service_name) = env::var(ENV_SERVICE_NAME) {
            debug!(
                env_var = ENV_SERVICE_NAME,
                value = %service_name,
                "Applying environment variable override"
            );
            builder = builder.service_name(service_name);
        }

        if let Ok(uri) = env::var(ENV_TRACE_URI_OVERRIDE) {
            debug!(
                env_var = ENV_TRACE_URI_OVERRIDE,
                value = %uri,
                "Applying environment variable override"
            );
            builder = builder.trace_uri_override(uri);
        }

        if let Ok(uri) = env::var(ENV_METRIC_URI_OVERRIDE) {
            debug!(
                env_var = ENV_METRIC_URI_OVERRIDE,
                value = %uri,
                "Applying environment variable override"
            );
            builder = builder.metric_uri_override(uri);
        }

        if let Ok(uri) = env::var(ENV_LOG_URI_OVERRIDE) {
            debug!(
                env_var = ENV_LOG_URI_OVERRIDE,
                value = %uri,
                "Applying environment variable override"
            );
            builder = builder.log_uri_override(uri);
        }

        if let Ok(flag) = env::var(ENV_ENABLE_AUDIT_LOGGING) {
            match flag.trim().to_lowercase().parse::<bool>() {
                Ok(enabled) => {
                    debug!(
                        env_var = ENV_ENABLE_AUDIT_LOGGING,
                        value = enabled,
                        "Applying environment variable override"
                    );
                    builder = builder.enable_audit_logging(enabled);
                }
                Err(e) => {
                    warn!(
                        env_var = ENV_ENABLE_AUDIT_LOGGING,
                        value = %flag,
                        error = %e,
                        "Failed to parse environment variable, using default"
                    );
                }
            }
        }

        if let Ok(interval) = env::var(ENV_COLLECTION_INTERVAL_SECS) {
            match interval.parse::<u64>() {
                Ok(secs) => {
                    debug!(
                        env_var = ENV_COLLECTION_INTERVAL_SECS,
                        value = secs,
                        "Applying environment variable override"
                    );
                    builder = builder.collection_interval_secs(secs);
                }
                Err(e) => {
                    warn!(
                        env_var = ENV_COLLECTION_INTERVAL_SECS,
                        value = %interval,
                        error = %e,
                        "Failed to parse environment variable, using default"
                    );
                }
            }
        }

        builder
    }
}
