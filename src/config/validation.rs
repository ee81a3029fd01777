//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool bounds)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::AppConfig;

/// A single invalid field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every field; collect all problems.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.name.trim().is_empty() {
        errors.push(ValidationError::new("app.name", "must not be empty"));
    }

    if config.http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "http.bind_address",
            format!("invalid socket address: {}", config.http.bind_address),
        ));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be > 0"));
    }
    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::new("http.max_body_bytes", "must be > 0"));
    }

    if config.lifecycle.graceful_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "lifecycle.graceful_timeout_secs",
            "must be > 0",
        ));
    }

    let db = &config.database;
    match url::Url::parse(&db.url) {
        Ok(url) if matches!(url.scheme(), "postgres" | "postgresql") => {}
        Ok(url) => errors.push(ValidationError::new(
            "database.url",
            format!("unsupported scheme: {}", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("database.url", e.to_string())),
    }
    if db.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be > 0"));
    }
    if db.max_idle_connections > db.max_connections {
        errors.push(ValidationError::new(
            "database.max_idle_connections",
            "must not exceed max_connections",
        ));
    }
    if db.acquire_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "database.acquire_timeout_secs",
            "must be > 0",
        ));
    }

    if config.redis.address.trim().is_empty() {
        errors.push(ValidationError::new("redis.address", "must not be empty"));
    }
    if config.redis.db < 0 {
        errors.push(ValidationError::new("redis.db", "must be >= 0"));
    }

    if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::new("logging.level", e.to_string()));
    }
    if !config.logging.console && config.logging.file_path.is_none() {
        errors.push(ValidationError::new(
            "logging.console",
            "console and file output are both disabled",
        ));
    }
    if config.logging.file_path.is_some() && config.logging.file_max_size_mb == 0 {
        errors.push(ValidationError::new("logging.file_max_size_mb", "must be > 0"));
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "metrics.address",
            format!("invalid socket address: {}", config.metrics.address),
        ));
    }

    if let Some(endpoint) = &config.tracing.otlp_endpoint {
        match url::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "tracing.otlp_endpoint",
                format!("unsupported scheme: {}", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("tracing.otlp_endpoint", e.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.app.name = " ".into();
        config.http.bind_address = ":8080".into();
        config.database.url = "mysql://localhost/app".into();
        config.database.max_idle_connections = 50;

        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            [
                "app.name",
                "http.bind_address",
                "database.url",
                "database.max_idle_connections"
            ]
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.metrics.address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.metrics.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "metrics.address");
    }

    #[test]
    fn test_otlp_endpoint_must_be_http() {
        let mut config = AppConfig::default();
        config.tracing.otlp_endpoint = Some("grpc://collector:4317".into());
        assert_eq!(
            validate_config(&config).unwrap_err()[0].field,
            "tracing.otlp_endpoint"
        );

        config.tracing.otlp_endpoint = Some("https://collector:4318".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rotation_size_checked_only_with_file() {
        let mut config = AppConfig::default();
        config.logging.file_max_size_mb = 0;
        assert!(validate_config(&config).is_ok());

        config.logging.file_path = Some("app.log".into());
        assert_eq!(
            validate_config(&config).unwrap_err()[0].field,
            "logging.file_max_size_mb"
        );
    }
}
