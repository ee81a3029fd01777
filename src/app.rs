//! Application composition.
//!
//! # Data Flow
//! ```text
//! module(registry)
//!     → metrics        (exporter hook)
//!     → db, cache      (ping on start, close on stop)
//!     → http           (AppRouter aggregates routes, HttpServer hook last)
//!     → domain         (health, user: contribute to routes)
//! build(config, module) → resolve → lifecycle timeouts from config → Container
//! ```

use std::sync::Arc;

use crate::cache;
use crate::config::AppConfig;
use crate::container::{resolve, Container, ContainerError, ProviderRegistry};
use crate::db;
use crate::domain;
use crate::http;
use crate::observability::metrics;

/// Every component of the HTTP service.
pub fn module(registry: &mut ProviderRegistry) {
    registry
        .include(metrics::module)
        .include(infrastructure)
        .include(http::module)
        .include(domain::module);
}

/// Shared storage clients.
pub fn infrastructure(registry: &mut ProviderRegistry) {
    registry.include(db::module).include(cache::module);
}

/// Components needed by one-shot database commands (migrate, seed).
pub fn tooling(registry: &mut ProviderRegistry) {
    registry.include(db::module);
}

/// Resolve `module` against `config` and apply the configured timeouts.
pub fn build(
    config: Arc<AppConfig>,
    module: impl FnOnce(&mut ProviderRegistry),
) -> Result<Container, ContainerError> {
    let mut registry = ProviderRegistry::new();
    registry.include(module);

    let mut container = resolve(&registry, Arc::clone(&config))?;
    let lifecycle = container.lifecycle_mut();
    lifecycle.set_start_timeout(config.lifecycle.start_timeout());
    lifecycle.set_stop_timeout(config.lifecycle.graceful_timeout());

    tracing::info!(
        components = container.construction_order().len(),
        hooks = container.lifecycle().len(),
        "Container resolved"
    );
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{AppRouter, HttpServer};

    #[tokio::test]
    async fn test_service_graph_resolves_without_io() {
        let container = build(Arc::new(AppConfig::default()), module).unwrap();

        let router = container.get::<AppRouter>().unwrap();
        assert_eq!(router.registrar_count(), 2);
        assert!(container.get::<HttpServer>().is_some());

        let hooks: Vec<_> = container.lifecycle().hook_names().collect();
        assert_eq!(hooks, ["database", "cache", "http-server"]);
    }

    #[tokio::test]
    async fn test_lifecycle_timeouts_come_from_config() {
        let mut config = AppConfig::default();
        config.lifecycle.graceful_timeout_secs = 3;

        let container = build(Arc::new(config), tooling).unwrap();
        assert_eq!(container.lifecycle().stop_timeout().as_secs(), 3);
    }
}
