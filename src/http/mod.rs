//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Feature modules contribute RouteRegistrar → routes group
//!     → router.rs (AppRouter: apply registrars, wrap middleware)
//!     → server.rs (HttpServer: bind on start, drain on stop)
//!     → request.rs (request ID header)
//!     → response.rs (JSON error bodies)
//! ```

pub mod registrar;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use registrar::RouteRegistrar;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use router::AppRouter;
pub use server::HttpServer;

use crate::container::ProviderRegistry;

/// Register the router aggregator and the server.
pub fn module(registry: &mut ProviderRegistry) {
    registry.include(router::module).include(server::module);
}
