//! Feature modules.
//!
//! Each module registers its own services and contributes a
//! [`RouteRegistrar`](crate::http::RouteRegistrar) to the `routes` group;
//! nothing outside the module needs to know its routes.

pub mod health;
pub mod user;

use crate::container::ProviderRegistry;

/// Register every feature module, in route registration order.
pub fn module(registry: &mut ProviderRegistry) {
    registry.include(health::module).include(user::module);
}
