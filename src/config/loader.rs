//! Configuration loading: file, then environment, then validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{AppConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {message}")]
    Override { var: &'static str, message: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file plus the process
/// environment, and validate it.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => AppConfig::default(),
    };

    apply_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without applying overrides or validation.
pub fn parse_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides read through `lookup`.
///
/// Unset variables leave the field untouched; a set but unparsable value is
/// an error rather than being silently ignored.
pub fn apply_overrides<L>(config: &mut AppConfig, lookup: L) -> Result<(), ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let env = Overrides { lookup };

    env.string("APP_NAME", &mut config.app.name);
    env.string("APP_ENV", &mut config.app.env);
    env.string("OTEL_ENV", &mut config.app.env);

    if let Some(addr) = lookup_addr(&env, "HTTP_ADDR") {
        config.http.bind_address = addr;
    }
    env.parse("HTTP_REQUEST_TIMEOUT_SECS", &mut config.http.request_timeout_secs)?;
    env.parse("START_TIMEOUT_SECS", &mut config.lifecycle.start_timeout_secs)?;
    env.parse("GRACEFUL_TIMEOUT_SECS", &mut config.lifecycle.graceful_timeout_secs)?;

    env.string("DB_DSN", &mut config.database.url);
    env.parse("DB_MAX_OPEN", &mut config.database.max_connections)?;
    env.parse("DB_MAX_IDLE", &mut config.database.max_idle_connections)?;
    env.parse("DB_CONN_MAX_LIFETIME_SECS", &mut config.database.max_lifetime_secs)?;
    env.parse("DB_CONN_MAX_IDLE_TIME_SECS", &mut config.database.idle_timeout_secs)?;

    env.string("REDIS_ADDR", &mut config.redis.address);
    env.optional("REDIS_PASSWORD", &mut config.redis.password);
    env.parse("REDIS_DB", &mut config.redis.db)?;

    env.string("LOG_LEVEL", &mut config.logging.level);
    if let Some(format) = (env.lookup)("LOG_FORMAT") {
        config.logging.format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            other => {
                return Err(ConfigError::Override {
                    var: "LOG_FORMAT",
                    message: format!("expected json or compact, got {other}"),
                })
            }
        };
    }
    env.parse("LOG_CONSOLE", &mut config.logging.console)?;
    env.optional("LOG_FILE_PATH", &mut config.logging.file_path);
    env.parse("LOG_FILE_MAX_SIZE_MB", &mut config.logging.file_max_size_mb)?;
    env.parse("LOG_FILE_MAX_BACKUPS", &mut config.logging.file_max_backups)?;
    env.parse("LOG_FILE_MAX_AGE_DAYS", &mut config.logging.file_max_age_days)?;
    env.parse("LOG_FILE_COMPRESS", &mut config.logging.file_compress)?;

    env.parse("METRICS_ENABLED", &mut config.metrics.enabled)?;
    if let Some(addr) = lookup_addr(&env, "METRICS_ADDR") {
        config.metrics.address = addr;
    }

    env.optional("OTEL_EXPORTER_OTLP_ENDPOINT", &mut config.tracing.otlp_endpoint);
    env.optional("OTEL_SERVICE_NAME", &mut config.tracing.service_name);

    Ok(())
}

struct Overrides<L> {
    lookup: L,
}

impl<L: Fn(&str) -> Option<String>> Overrides<L> {
    fn string(&self, var: &'static str, field: &mut String) {
        if let Some(value) = (self.lookup)(var) {
            *field = value;
        }
    }

    /// An empty value clears the field.
    fn optional(&self, var: &'static str, field: &mut Option<String>) {
        if let Some(value) = (self.lookup)(var) {
            *field = (!value.is_empty()).then_some(value);
        }
    }

    fn parse<T>(&self, var: &'static str, field: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = (self.lookup)(var) {
            *field = value.trim().parse().map_err(|e: T::Err| ConfigError::Override {
                var,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Read an address, expanding the ":8080" shorthand to all interfaces.
fn lookup_addr<L: Fn(&str) -> Option<String>>(env: &Overrides<L>, var: &str) -> Option<String> {
    (env.lookup)(var).map(|addr| {
        if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr
        }
    })
}
