//! Postgres connection pool.
//!
//! The pool is created lazily at construction, so building the container
//! never touches the network. The start hook proves connectivity; the stop
//! hook closes every connection.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{AppConfig, DatabaseConfig};
use crate::container::{BoxError, ProvideContext, ProviderRegistry};
use crate::lifecycle::Hook;

/// Shared handle to the Postgres pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Configure the pool without opening a connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.max_idle_connections)
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Ping on start, close on stop.
    pub fn hook(&self) -> Hook {
        let (probe, closing) = (self.clone(), self.clone());
        Hook::new("database")
            .on_start(move |_| async move {
                probe.ping().await?;
                tracing::info!("Database connected");
                Ok::<(), BoxError>(())
            })
            .on_stop(move |_| async move {
                tracing::info!("Closing database pool");
                closing.close().await;
                Ok(())
            })
    }
}

/// Register the database pool.
pub fn module(registry: &mut ProviderRegistry) {
    registry.provide(|config: Arc<AppConfig>, ctx: &mut ProvideContext<'_>| {
        let database = Database::connect_lazy(&config.database)?;
        ctx.append(database.hook());
        Ok(database)
    });
}
