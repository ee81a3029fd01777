//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber once, from the entry point
//! - Console output as JSON or compact text, optional JSON file sink
//! - Span export to an OTLP collector when one is configured
//! - Root span carrying the service name and environment
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - The file sink rotates by size and prunes by count and age
//! - A second `init` fails instead of silently replacing the subscriber

use std::sync::Mutex;

use thiserror::Error;
use tracing::Span;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{AppConfig, LogFormat};
use crate::observability::rotation::{Limits, RotatingFile};
use crate::observability::trace::TraceExport;

/// Errors encountered while configuring logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build trace exporter: {0}")]
    Trace(String),

    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Handle returned once logging is installed.
#[derive(Debug, Clone)]
pub struct Telemetry {
    root: Span,
    traces: TraceExport,
}

impl Telemetry {
    /// Span that every event of the process should be recorded under.
    pub fn root_span(&self) -> Span {
        self.root.clone()
    }

    pub fn traces(&self) -> &TraceExport {
        &self.traces
    }
}

/// Build the filter: `RUST_LOG` if set, otherwise the configured level.
pub fn filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::Filter(e.to_string())),
    }
}

/// Install the global subscriber described by `config.logging`.
pub fn init(config: &AppConfig) -> Result<Telemetry, LoggingError> {
    let logging = &config.logging;
    let filter = filter(&logging.level)?;

    let console = logging.console.then(|| match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    });

    let file = match &logging.file_path {
        Some(path) => {
            let file = RotatingFile::open(path, Limits::from_config(logging)).map_err(|source| {
                LoggingError::File {
                    path: path.clone(),
                    source,
                }
            })?;
            Some(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    let traces = TraceExport::from_config(config).map_err(|e| LoggingError::Trace(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .with(traces.layer())
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    let root = tracing::info_span!("service", service = %config.app.name, env = %config.app.env);
    Ok(Telemetry { root, traces })
}
