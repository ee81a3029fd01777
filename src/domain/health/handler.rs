use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::cache::Cache;
use crate::db::Database;
use crate::http::RouteRegistrar;

/// Upper bound for a single readiness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// A dependency that can report whether it is usable.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn ready(&self) -> bool;
}

#[async_trait]
impl ReadinessProbe for Database {
    async fn ready(&self) -> bool {
        self.ping().await.is_ok()
    }
}

#[async_trait]
impl ReadinessProbe for Cache {
    async fn ready(&self) -> bool {
        self.ping().await.is_ok()
    }
}

type Probes = Arc<Vec<(&'static str, Arc<dyn ReadinessProbe>)>>;

/// Routes for `/healthz` and `/readyz`.
pub struct HealthRoutes {
    probes: Probes,
}

impl HealthRoutes {
    pub fn new(probes: Vec<(&'static str, Arc<dyn ReadinessProbe>)>) -> Self {
        Self {
            probes: Arc::new(probes),
        }
    }
}

impl RouteRegistrar for HealthRoutes {
    fn register(&self, router: Router) -> Router {
        router
            .route("/healthz", get(liveness))
            .route("/readyz", get(readiness).with_state(self.probes.clone()))
    }
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok", "type": "liveness" }))
}

async fn readiness(State(probes): State<Probes>) -> impl IntoResponse {
    let mut body = Map::new();
    let mut all_ready = true;

    for (name, probe) in probes.iter() {
        let ready = tokio::time::timeout(PROBE_TIMEOUT, probe.ready())
            .await
            .unwrap_or(false);
        if !ready {
            tracing::warn!(dependency = name, "Readiness probe failed");
        }
        all_ready &= ready;
        body.insert(name.to_string(), Value::Bool(ready));
    }
    body.insert(
        "ts".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );

    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(Value::Object(body)))
}
