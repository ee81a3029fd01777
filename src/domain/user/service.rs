use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::Cache;
use crate::db::Database;
use crate::domain::user::model::User;

/// How long a looked-up user stays in the cache.
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<User, UserError>;
}

/// Postgres-backed lookups with a read-through Redis cache.
///
/// Cache failures are logged and never fail a lookup.
pub struct PgUserService {
    db: Arc<Database>,
    cache: Arc<Cache>,
}

impl PgUserService {
    pub fn new(db: Arc<Database>, cache: Arc<Cache>) -> Self {
        Self { db, cache }
    }

    fn cache_key(id: Uuid) -> String {
        format!("user:{id}")
    }
}

#[async_trait]
impl UserService for PgUserService {
    async fn get_by_id(&self, id: Uuid) -> Result<User, UserError> {
        let key = Self::cache_key(id);
        match self.cache.get_json::<User>(&key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, key = %key, "User cache read skipped"),
        }

        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or(UserError::NotFound(id))?;

        if let Err(e) = self.cache.set_json(&key, &user, CACHE_TTL).await {
            tracing::debug!(error = %e, key = %key, "User cache write skipped");
        }
        Ok(user)
    }
}
