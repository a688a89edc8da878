//! Unit tests for configuration validation

use newrelic_otel_exporter::config::ExporterConfig;
use newrelic_otel_exporter::error::ConfigError;
use secrecy::ExposeSecret;
use std::time::Duration;

fn valid() -> newrelic_otel_exporter::ExporterConfigBuilder {
    ExporterConfig::builder()
        .api_key("test-key")
        .service_name("checkout")
}

#[test]
fn test_valid_config_uses_defaults() {
    let config = valid().build().unwrap();

    assert_eq!(config.api_key().expose_secret(), "test-key");
    assert_eq!(config.service_name(), "checkout");
    assert_eq!(config.collection_interval_secs(), 5);
    assert_eq!(config.collection_interval(), Duration::from_secs(5));
    assert!(!config.enable_audit_logging());
    assert!(config.trace_uri_override().is_none());
    assert!(config.metric_uri_override().is_none());
    assert!(config.log_uri_override().is_none());
    assert!(config.common_attributes().is_empty());
}

#[test]
fn test_missing_api_key() {
    let result = ExporterConfig::builder().service_name("checkout").build();
    assert!(matches!(result, Err(ConfigError::MissingRequiredField(field)) if field == "api_key"));
}

#[test]
fn test_blank_api_key() {
    let result = valid().api_key("   ").build();
    assert!(matches!(result, Err(ConfigError::MissingRequiredField(field)) if field == "api_key"));
}

#[test]
fn test_missing_service_name() {
    let result = ExporterConfig::builder().api_key("key").build();
    assert!(
        matches!(result, Err(ConfigError::MissingRequiredField(field)) if field == "service_name")
    );
}

#[test]
fn test_new_validates_required_fields() {
    assert!(ExporterConfig::new("key", "svc").is_ok());
    assert!(ExporterConfig::new("", "svc").is_err());
    assert!(ExporterConfig::new("key", "").is_err());
}

#[test]
fn test_collection_interval_bounds() {
    assert!(matches!(
        valid().collection_interval_secs(0).build(),
        Err(ConfigError::InvalidInterval(_))
    ));
    assert!(matches!(
        valid().collection_interval_secs(3601).build(),
        Err(ConfigError::InvalidInterval(_))
    ));
    assert!(valid().collection_interval_secs(1).build().is_ok());
    assert!(valid().collection_interval_secs(3600).build().is_ok());
}

#[test]
fn test_override_must_be_http_url() {
    assert!(matches!(
        valid().trace_uri_override("not a url").build(),
        Err(ConfigError::InvalidUrl(_))
    ));
    assert!(matches!(
        valid().metric_uri_override("ftp://example.com").build(),
        Err(ConfigError::InvalidUrl(_))
    ));
    assert!(matches!(
        valid().log_uri_override("file:///tmp/logs").build(),
        Err(ConfigError::InvalidUrl(_))
    ));
}

#[test]
fn test_valid_overrides_are_kept() {
    let config = valid()
        .trace_uri_override("http://localhost:8080")
        .metric_uri_override("https://metrics.example.com")
        .build()
        .unwrap();

    assert_eq!(
        config.trace_uri_override().map(|u| u.as_str()),
        Some("http://localhost:8080/")
    );
    assert_eq!(
        config.metric_uri_override().and_then(|u| u.host_str()),
        Some("metrics.example.com")
    );
}

#[test]
fn test_common_attributes_accumulate() {
    let config = valid()
        .common_attribute("env", "prod")
        .common_attribute("team", "payments")
        .build()
        .unwrap();

    assert_eq!(config.common_attributes().len(), 2);
    assert_eq!(
        config.common_attributes().get("team").map(String::as_str),
        Some("payments")
    );
}

#[test]
fn test_error_messages_name_the_problem() {
    let err = valid().collection_interval_secs(0).build().unwrap_err();
    assert!(err.to_string().contains("between 1 and 3600"));

    let err = ExporterConfig::builder().build().unwrap_err();
    assert!(err.to_string().contains("api_key"));
}
