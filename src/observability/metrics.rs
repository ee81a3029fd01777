//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency by method, route
//!
//! # Design Decisions
//! - Recording is a no-op until the exporter installs a recorder
//! - The exporter is installed by a start hook, so a bad address fails startup

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::AppConfig;
use crate::container::{BoxError, ProvideContext, ProviderRegistry};
use crate::lifecycle::Hook;

/// Prometheus exporter component.
#[derive(Debug, Clone)]
pub struct Metrics {
    address: Option<SocketAddr>,
}

impl Metrics {
    pub fn from_config(config: &AppConfig) -> Result<Self, BoxError> {
        let address = if config.metrics.enabled {
            Some(config.metrics.address.parse()?)
        } else {
            None
        };
        Ok(Self { address })
    }

    pub fn is_enabled(&self) -> bool {
        self.address.is_some()
    }

    /// Hook that installs the exporter and its scrape listener.
    pub fn hook(&self) -> Option<Hook> {
        let address = self.address?;
        Some(Hook::new("metrics").on_start(move |_| async move {
            PrometheusBuilder::new()
                .with_http_listener(address)
                .install()?;
            tracing::info!(address = %address, "Metrics exporter listening");
            Ok::<(), BoxError>(())
        }))
    }
}

/// Record one served request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Register the metrics component.
pub fn module(registry: &mut ProviderRegistry) {
    registry.provide(|config: Arc<AppConfig>, ctx: &mut ProvideContext<'_>| {
        let metrics = Metrics::from_config(&config)?;
        if let Some(hook) = metrics.hook() {
            ctx.append(hook);
        }
        Ok(metrics)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_by_default() {
        let metrics = Metrics::from_config(&AppConfig::default()).unwrap();
        assert!(!metrics.is_enabled());
        assert!(metrics.hook().is_none());
    }

    #[test]
    fn test_enabled_exporter_gets_hook() {
        let mut config = AppConfig::default();
        config.metrics.enabled = true;
        config.metrics.address = "127.0.0.1:0".into();

        let metrics = Metrics::from_config(&config).unwrap();
        assert_eq!(metrics.hook().map(|h| h.name().to_string()), Some("metrics".into()));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_request("GET", "/healthz", 200, Instant::now());
    }
}
