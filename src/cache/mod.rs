//! Redis cache client.
//!
//! # Responsibilities
//! - Build the client from config (no I/O at construction)
//! - Open a reconnecting `ConnectionManager` on start, drop it on stop
//! - JSON get/set helpers with TTL and a readiness `ping`
//!
//! # Design Decisions
//! - The live connection sits behind an `ArcSwapOption` so every clone of
//!   `Cache` sees it appear and disappear without locking
//! - Calls made while disconnected fail fast with `NotConnected`

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::{AppConfig, RedisConfig};
use crate::container::{BoxError, ProvideContext, ProviderRegistry};
use crate::lifecycle::Hook;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid redis config: {0}")]
    Config(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache is not connected")]
    NotConnected,

    #[error("redis did not answer within {0:?}")]
    Timeout(Duration),

    #[error("cached value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Shared handle to Redis.
#[derive(Clone)]
pub struct Cache {
    client: redis::Client,
    conn: Arc<ArcSwapOption<ConnectionManager>>,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl Cache {
    pub fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        let url = connection_url(config)?;
        let client = redis::Client::open(url.as_str())?;
        Ok(Self {
            client,
            conn: Arc::new(ArcSwapOption::empty()),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            response_timeout: Duration::from_secs(config.response_timeout_secs),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.conn.load().is_some()
    }

    /// Open the managed connection and verify it answers.
    pub async fn connect(&self) -> Result<(), CacheError> {
        let manager = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.connect_timeout))??;

        self.conn.store(Some(Arc::new(manager)));
        self.ping().await
    }

    /// Release the managed connection.
    pub fn disconnect(&self) {
        self.conn.store(None);
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        self.bounded(async move { redis::cmd("PING").query_async::<_, String>(&mut conn).await })
            .await?;
        Ok(())
    }

    /// Read and decode a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut conn = self.connection()?;
        let key = key.to_string();
        let raw: Option<String> = self.bounded(async move { conn.get(key).await }).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a JSON value with a TTL.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection()?;
        let key = key.to_string();
        let raw = serde_json::to_string(value)?;
        let ttl = ttl.as_secs().max(1);
        self.bounded(async move { conn.set_ex::<_, _, ()>(key, raw, ttl).await })
            .await
    }

    /// Connect on start, release on stop.
    pub fn hook(&self) -> Hook {
        let (starting, stopping) = (self.clone(), self.clone());
        Hook::new("cache")
            .on_start(move |_| async move {
                starting.connect().await?;
                tracing::info!("Redis connected");
                Ok::<(), BoxError>(())
            })
            .on_stop(move |_| async move {
                tracing::info!("Closing redis");
                stopping.disconnect();
                Ok(())
            })
    }

    fn connection(&self) -> Result<ConnectionManager, CacheError> {
        self.conn
            .load_full()
            .map(|manager| manager.as_ref().clone())
            .ok_or(CacheError::NotConnected)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.response_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.response_timeout)),
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Build `redis://[:password@]host:port/db` from config.
pub fn connection_url(config: &RedisConfig) -> Result<Url, CacheError> {
    let mut url = Url::parse(&format!("redis://{}/{}", config.address, config.db))
        .map_err(|e| CacheError::Config(format!("{}: {e}", config.address)))?;
    if let Some(password) = config.password.as_deref() {
        url.set_password(Some(password))
            .map_err(|_| CacheError::Config("password cannot be set on this address".into()))?;
    }
    Ok(url)
}

/// Register the cache client.
pub fn module(registry: &mut ProviderRegistry) {
    registry.provide(|config: Arc<AppConfig>, ctx: &mut ProvideContext<'_>| {
        let cache = Cache::new(&config.redis)?;
        ctx.append(cache.hook());
        Ok(cache)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url_includes_password_and_db() {
        let config = RedisConfig {
            address: "cache.internal:6380".into(),
            password: Some("s3cret".into()),
            db: 2,
            ..RedisConfig::default()
        };

        let url = connection_url(&config).unwrap();
        assert_eq!(url.as_str(), "redis://:s3cret@cache.internal:6380/2");
    }

    #[test]
    fn test_connection_url_without_password() {
        let url = connection_url(&RedisConfig::default()).unwrap();
        assert_eq!(url.as_str(), "redis://localhost:6379/0");
    }

    #[tokio::test]
    async fn test_calls_fail_fast_before_connect() {
        let cache = Cache::new(&RedisConfig::default()).unwrap();

        assert!(!cache.is_connected());
        assert!(matches!(cache.ping().await, Err(CacheError::NotConnected)));
        assert!(matches!(
            cache.get_json::<String>("missing").await,
            Err(CacheError::NotConnected)
        ));
    }
}
