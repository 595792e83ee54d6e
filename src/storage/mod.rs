//! Key-value stores backing the cache-aside wrapper.
//!
//! The store is an external collaborator: existence check, get, set with an
//! optional TTL and a separate expire. Two backends exist:
//!
//! - [`MemoryStore`]: process-local, lazy expiry
//! - `RedisStore`: Redis server (feature `redis`)

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_impl;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CacheBackend, CacheConfig};

// Re-export for convenience
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_impl::RedisStore;

/// Trait for cache store backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a live entry exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Stored bytes, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value`, replacing any previous entry.
    ///
    /// `None` means the entry never expires.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Attach a TTL to an existing entry. Returns `false` if there was none.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove an entry.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Open the store selected by the configuration.
pub async fn open(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "redis")]
        CacheBackend::Redis => Ok(Arc::new(RedisStore::new(&config.redis_url).await?)),
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => Err(crate::error::AppError::config(
            "cache.backend = \"redis\" requires the `redis` feature",
        )),
    }
}

/// Whole-second TTL: zero never expires, anything shorter than a second
/// lasts one second.
pub(crate) fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|d| !d.is_zero())
        .map(|d| Duration::from_secs(d.as_secs().max(1)))
}
