use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use crate::domain::user::model::User;
use crate::domain::user::service::{UserError, UserService};
use crate::http::{ApiError, RouteRegistrar};

/// Routes under `/v1/users`.
pub struct UserRoutes {
    service: Arc<dyn UserService>,
}

impl UserRoutes {
    pub fn new(service: Arc<dyn UserService>) -> Self {
        Self { service }
    }
}

impl RouteRegistrar for UserRoutes {
    fn register(&self, router: Router) -> Router {
        router.route(
            "/v1/users/{id}",
            get(get_by_id).with_state(self.service.clone()),
        )
    }
}

async fn get_by_id(
    State(service): State<Arc<dyn UserService>>,
    Path(raw): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = Uuid::parse_str(&raw).map_err(|_| ApiError::bad_request("invalid id"))?;

    match service.get_by_id(id).await {
        Ok(user) => Ok(Json(user)),
        Err(UserError::NotFound(_)) => Err(ApiError::not_found("not found")),
        Err(e) => {
            tracing::error!(error = %e, user_id = %id, "User lookup failed");
            Err(ApiError::internal())
        }
    }
}
