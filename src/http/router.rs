//! Router aggregation and middleware.
//!
//! # Data Flow
//! ```text
//! Group<dyn RouteRegistrar> (routes, registration order)
//!     → Router::new() with each registrar applied once
//!     → middleware, outermost first:
//!         request id → trace span (OTel parent from traceparent)
//!         → propagate id → catch panic
//!         → access log + metrics → timeout → body limit
//!     → AppRouter (handed to HttpServer)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, DefaultBodyLimit, MatchedPath, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::config::{AppConfig, HttpConfig};
use crate::container::{Group, ProviderRegistry};
use crate::http::registrar::RouteRegistrar;
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::observability::{metrics, trace};

/// The fully assembled application router.
#[derive(Clone)]
pub struct AppRouter {
    router: Router,
    routes: usize,
}

impl AppRouter {
    /// Apply every registrar once, in order, then wrap the middleware stack.
    pub fn build(config: &HttpConfig, registrars: &Group<dyn RouteRegistrar>) -> Self {
        let router = registrars
            .iter()
            .fold(Router::new(), |router, registrar| registrar.register(router));

        tracing::debug!(registrars = registrars.len(), "Routes registered");
        Self {
            router: with_middleware(router, config),
            routes: registrars.len(),
        }
    }

    /// Number of registrars that contributed routes.
    pub fn registrar_count(&self) -> usize {
        self.routes
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Wrap `router` in the standard middleware stack.
pub fn with_middleware(router: Router, config: &HttpConfig) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(CatchPanicLayer::new())
            .layer(middleware::from_fn(access_log))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout(),
            ))
            .layer(DefaultBodyLimit::max(config.max_body_bytes)),
    )
}

/// Server span for one request, continuing the caller's trace if any.
fn request_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(request.uri().path(), MatchedPath::as_str);
    let span = tracing::info_span!(
        "http",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = request.request_id().unwrap_or("-"),
        otel.name = %format!("{} {}", request.method(), route),
        otel.kind = "server",
    );
    trace::continue_remote_trace(&span, request.headers());
    span
}

/// Log one line per request and record request metrics.
pub async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let request_id = request.request_id().unwrap_or("-").to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        method = %method,
        path = %path,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        ip = client.as_deref().unwrap_or("-"),
        request_id = %request_id,
        "http_request"
    );
    metrics::record_request(method.as_str(), &route, status, start);

    response
}

/// Register the router aggregator that consumes the `routes` group.
pub fn module(registry: &mut ProviderRegistry) {
    registry.provide(
        |(config, routes): (Arc<AppConfig>, Group<dyn RouteRegistrar>), _| {
            Ok(AppRouter::build(&config.http, &routes))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_generated_and_echoed() {
        let router = with_middleware(
            Router::new().route("/ping", get(|| async { "pong" })),
            &HttpConfig::default(),
        );

        let response = router
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().request_id().is_some());
    }

    #[tokio::test]
    async fn test_client_request_id_is_kept() {
        let router = with_middleware(
            Router::new().route("/ping", get(|| async { "pong" })),
            &HttpConfig::default(),
        );

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(X_REQUEST_ID, "client-supplied")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().request_id(), Some("client-supplied"));
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_500() {
        async fn explode() -> &'static str {
            panic!("handler bug")
        }

        let router = with_middleware(
            Router::new().route("/boom", get(explode)),
            &HttpConfig::default(),
        );

        let response = router
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out_with_408() {
        let config = HttpConfig {
            request_timeout_secs: 1,
            ..HttpConfig::default()
        };
        let router = with_middleware(
            Router::new().route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            ),
            &config,
        );

        let response = router
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
