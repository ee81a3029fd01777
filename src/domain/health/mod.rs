//! Liveness and readiness endpoints.
//!
//! - `GET /healthz` answers as long as the process serves requests
//! - `GET /readyz` probes the database and cache; 503 when either fails

mod handler;

pub use handler::{HealthRoutes, ReadinessProbe, PROBE_TIMEOUT};

use std::sync::Arc;

use crate::cache::Cache;
use crate::container::ProviderRegistry;
use crate::db::Database;
use crate::http::RouteRegistrar;

pub fn module(registry: &mut ProviderRegistry) {
    registry.contribute::<dyn RouteRegistrar, _, _>(
        |(db, cache): (Arc<Database>, Arc<Cache>), _| {
            Ok(Arc::new(HealthRoutes::new(vec![
                ("db", db as Arc<dyn ReadinessProbe>),
                ("redis", cache as Arc<dyn ReadinessProbe>),
            ])))
        },
    );
}
