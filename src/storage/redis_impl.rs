//! Redis cache store.
//!
//! Uses a connection manager so one handle can be cloned per command.
//! `set` with a TTL maps to a single `SET key value EX secs`; the separate
//! `expire` maps to `EXPIRE`.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::{AppError, Result};
use crate::storage::{CacheStore, effective_ttl};

/// Redis store backed by a connection manager.
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. "redis://localhost:6379").
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        log::info!("Connected to Redis at {}", url);
        Ok(Self { conn })
    }
}

/// Maps Redis errors to cache errors.
fn map_redis_error(err: redis::RedisError) -> AppError {
    if err.is_connection_refusal() || err.is_timeout() || err.is_connection_dropped() {
        AppError::cache(format!("connection failed: {err}"))
    } else {
        AppError::cache(format!("operation failed: {err}"))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(map_redis_error)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match effective_ttl(ttl) {
            Some(duration) => conn
                .set_ex::<_, _, ()>(key, value, duration.as_secs())
                .await
                .map_err(map_redis_error),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(map_redis_error),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let Some(duration) = effective_ttl(Some(ttl)) else {
            // Nothing to attach; report whether the key is there.
            return self.exists(key).await;
        };
        let seconds = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        conn.expire(key, seconds).await.map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(map_redis_error)
    }
}
