//! Users: lookup by ID.

mod handler;
mod model;
mod service;

pub use handler::UserRoutes;
pub use model::User;
pub use service::{PgUserService, UserError, UserService};

use std::sync::Arc;

use crate::cache::Cache;
use crate::container::ProviderRegistry;
use crate::db::Database;
use crate::http::RouteRegistrar;

pub fn module(registry: &mut ProviderRegistry) {
    registry.provide_shared::<dyn UserService, _, _>(
        |(db, cache): (Arc<Database>, Arc<Cache>), _| Ok(Arc::new(PgUserService::new(db, cache))),
    );
    registry.contribute::<dyn RouteRegistrar, _, _>(|service: Arc<dyn UserService>, _| {
        Ok(Arc::new(UserRoutes::new(service)))
    });
}
