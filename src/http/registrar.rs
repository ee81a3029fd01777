//! The `routes` extension point.

use axum::Router;

use crate::container::Capability;

/// A feature module's contribution to the shared router.
///
/// Registrars are contributed to the `routes` group and applied once each,
/// in registration order, by [`AppRouter`](crate::http::AppRouter).
pub trait RouteRegistrar: Send + Sync {
    /// Add this module's routes to `router`.
    fn register(&self, router: Router) -> Router;
}

impl Capability for dyn RouteRegistrar {
    const GROUP: &'static str = "routes";
}
