//! Unit tests for environment variable configuration loading

use newrelic_otel_exporter::config::loader::{
    ENV_API_KEY, ENV_COLLECTION_INTERVAL_SECS, ENV_ENABLE_AUDIT_LOGGING, ENV_LOG_URI_OVERRIDE,
    ENV_METRIC_URI_OVERRIDE, ENV_SERVICE_NAME, ENV_TRACE_URI_OVERRIDE,
};
use newrelic_otel_exporter::config::{ConfigLoader, ExporterConfigBuilder};
use newrelic_otel_exporter::error::ConfigError;
use secrecy::ExposeSecret;
use std::sync::Mutex;

// Mutex to serialize environment variable access across parallel tests
// Environment variables are process-wide, so parallel tests can interfere with each other
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clear all New Relic environment variables
fn clear_newrelic_env_vars() {
    for key in [
        ENV_API_KEY,
        ENV_SERVICE_NAME,
        ENV_TRACE_URI_OVERRIDE,
        ENV_METRIC_URI_OVERRIDE,
        ENV_LOG_URI_OVERRIDE,
        ENV_ENABLE_AUDIT_LOGGING,
        ENV_COLLECTION_INTERVAL_SECS,
    ] {
        // SAFETY: tests touching the environment hold ENV_MUTEX
        unsafe { std::env::remove_var(key) };
    }
}

fn set_env(key: &str, value: &str) {
    // SAFETY: tests touching the environment hold ENV_MUTEX
    unsafe { std::env::set_var(key, value) };
}

#[test]
fn test_load_from_env_with_all_vars() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_newrelic_env_vars();

    set_env(ENV_API_KEY, "env-key");
    set_env(ENV_SERVICE_NAME, "inventory");
    set_env(ENV_TRACE_URI_OVERRIDE, "http://localhost:9001");
    set_env(ENV_METRIC_URI_OVERRIDE, "http://localhost:9002");
    set_env(ENV_LOG_URI_OVERRIDE, "http://localhost:9003");
    set_env(ENV_ENABLE_AUDIT_LOGGING, "TRUE");
    set_env(ENV_COLLECTION_INTERVAL_SECS, "15");

    let config = ConfigLoader::from_env();
    clear_newrelic_env_vars();
    let config = config.unwrap();

    assert_eq!(config.api_key().expose_secret(), "env-key");
    assert_eq!(config.service_name(), "inventory");
    assert_eq!(config.trace_uri_override().and_then(|u| u.port()), Some(9001));
    assert_eq!(config.metric_uri_override().and_then(|u| u.port()), Some(9002));
    assert_eq!(config.log_uri_override().and_then(|u| u.port()), Some(9003));
    assert!(config.enable_audit_logging());
    assert_eq!(config.collection_interval_secs(), 15);
}

#[test]
fn test_missing_required_env_vars() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_newrelic_env_vars();

    let result = ConfigLoader::from_env();

    assert!(matches!(result, Err(ConfigError::MissingRequiredField(_))));
}

#[test]
fn test_unparseable_values_fall_back_to_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_newrelic_env_vars();

    set_env(ENV_API_KEY, "k");
    set_env(ENV_SERVICE_NAME, "s");
    set_env(ENV_ENABLE_AUDIT_LOGGING, "sometimes");
    set_env(ENV_COLLECTION_INTERVAL_SECS, "soon");

    let config = ConfigLoader::from_env();
    clear_newrelic_env_vars();
    let config = config.unwrap();

    assert!(!config.enable_audit_logging());
    assert_eq!(config.collection_interval_secs(), 5);
}

#[test]
fn test_invalid_env_override_is_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_newrelic_env_vars();

    set_env(ENV_API_KEY, "k");
    set_env(ENV_SERVICE_NAME, "s");
    set_env(ENV_TRACE_URI_OVERRIDE, "localhost without scheme");

    let result = ConfigLoader::from_env();
    clear_newrelic_env_vars();

    assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
}

#[test]
fn test_provided_config_wins_over_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_newrelic_env_vars();

    set_env(ENV_API_KEY, "env-key");
    set_env(ENV_SERVICE_NAME, "env-service");

    let provided = ExporterConfigBuilder::new().service_name("provided-service");
    let config = ConfigLoader::load(Some(provided));
    clear_newrelic_env_vars();
    let config = config.unwrap();

    assert_eq!(config.service_name(), "provided-service");
    assert_eq!(config.api_key().expose_secret(), "env-key");
}
