//! OpenTelemetry trace export.
//!
//! # Responsibilities
//! - Build an OTLP/HTTP batch exporter when an endpoint is configured
//! - Bridge `tracing` spans into it through `tracing-opentelemetry`
//! - Continue callers' W3C trace context on incoming requests
//! - Flush buffered spans from a stop hook
//!
//! Without an endpoint nothing is installed and spans stay local.

use std::fmt;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Config, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::{Span, Subscriber};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::AppConfig;
use crate::container::{BoxError, ProvideContext, ProviderRegistry};
use crate::lifecycle::Hook;

/// Handle to the trace pipeline, if one is installed.
#[derive(Clone, Default)]
pub struct TraceExport {
    pipeline: Option<(TracerProvider, Tracer)>,
}

impl fmt::Debug for TraceExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceExport")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TraceExport {
    /// Install the OTLP pipeline described by `config.tracing`.
    ///
    /// Must run inside the tokio runtime; the batch processor is spawned on it.
    pub fn from_config(config: &AppConfig) -> Result<Self, TraceError> {
        let Some(endpoint) = config.tracing.otlp_endpoint.as_deref() else {
            return Ok(Self::default());
        };

        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(endpoint)
            .build_span_exporter()?;
        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(Config::default().with_resource(resource(config)))
            .build();
        let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(provider.clone());

        Ok(Self {
            pipeline: Some((provider, tracer)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Subscriber layer exporting spans, when enabled.
    pub fn layer<S>(&self) -> Option<Box<dyn Layer<S> + Send + Sync>>
    where
        S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
    {
        self.pipeline.as_ref().map(|(_, tracer)| {
            tracing_opentelemetry::layer()
                .with_tracer(tracer.clone())
                .boxed()
        })
    }

    /// Stop hook flushing buffered spans, when enabled.
    pub fn hook(&self) -> Option<Hook> {
        let (provider, _) = self.pipeline.clone()?;
        Some(Hook::new("trace-export").on_stop(move |_| async move {
            tokio::task::spawn_blocking(move || {
                for result in provider.force_flush() {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Span flush failed");
                    }
                }
                global::shutdown_tracer_provider();
            })
            .await?;
            Ok::<(), BoxError>(())
        }))
    }

    /// Register this export so its flush runs after every other stop hook.
    ///
    /// Include the returned module before any other.
    pub fn module(&self) -> impl FnOnce(&mut ProviderRegistry) {
        let export = self.clone();
        move |registry| {
            registry.provide(move |(), ctx: &mut ProvideContext<'_>| {
                if let Some(hook) = export.hook() {
                    ctx.append(hook);
                }
                Ok(export.clone())
            });
        }
    }
}

fn resource(config: &AppConfig) -> Resource {
    let service = config
        .tracing
        .service_name
        .clone()
        .unwrap_or_else(|| config.app.name.clone());
    Resource::new([
        KeyValue::new("service.name", service),
        KeyValue::new("deployment.environment", config.app.env.clone()),
    ])
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Parent `span` on the caller's `traceparent`, if it sent one.
pub fn continue_remote_trace(span: &Span, headers: &HeaderMap) {
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(headers))
    });
    span.set_parent(parent);
}
