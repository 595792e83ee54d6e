// src/cache.rs

//! Cache-aside wrapper.
//!
//! [`CacheAside::get_or_fetch`] wraps any async fetch: it derives a key from
//! the call name and its arguments, returns the stored value on a hit without
//! running the fetch, and on a miss runs the fetch and stores the JSON result.
//!
//! The store never turns a good answer into an error. Read failures count as
//! misses and write failures are logged and ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::TtlPolicy;
use crate::storage::CacheStore;

/// Derive the cache key for a call.
///
/// `args` is serialized as JSON, so a tuple keeps positional order:
/// `cache_key("get_groups_list", &(3, 2))` is `get_groups_list:[3,2]`.
pub fn cache_key<A: Serialize + ?Sized>(name: &str, args: &A) -> Result<String> {
    Ok(format!("{}:{}", name, serde_json::to_string(args)?))
}

/// Cache-aside wrapper over a [`CacheStore`].
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    policy: TtlPolicy,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, policy: TtlPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }

    /// Return the cached result of `name(args)` or compute and cache it.
    ///
    /// `ttl` of `None` (or zero) stores the entry without expiry. Errors from
    /// `fetch` propagate and nothing is stored.
    pub async fn get_or_fetch<A, T, F, Fut>(
        &self,
        name: &str,
        args: &A,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = cache_key(name, args)?;

        if let Some(value) = self.lookup::<T>(&key).await {
            log::debug!("Cache hit: {}", key);
            return Ok(value);
        }

        log::debug!("Cache miss: {}", key);
        let value = fetch().await?;

        match serde_json::to_vec(&value) {
            Ok(bytes) => self.store_bytes(&key, &bytes, ttl).await,
            Err(e) => log::warn!("Cannot serialize result for {}: {}", key, e),
        }

        Ok(value)
    }

    /// Drop the cached result of `name(args)`.
    pub async fn invalidate<A: Serialize + ?Sized>(&self, name: &str, args: &A) -> Result<()> {
        let key = cache_key(name, args)?;
        self.store.delete(&key).await
    }

    /// Read and decode a cached value. Any failure is reported as a miss.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.exists(key).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                log::warn!("Cache exists check failed for {}: {}", key, e);
                return None;
            }
        }

        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            // Expired between the two calls.
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Store bytes under the configured TTL policy. Failures are logged only.
    async fn store_bytes(&self, key: &str, bytes: &[u8], ttl: Option<Duration>) {
        let result = match self.policy {
            TtlPolicy::Atomic => self.store.set(key, bytes, ttl).await,
            TtlPolicy::SetThenExpire => match self.store.set(key, bytes, None).await {
                Ok(()) => match ttl {
                    Some(ttl) => self.store.expire(key, ttl).await.map(|_| ()),
                    None => Ok(()),
                },
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            log::warn!("Cache write failed for {}: {}", key, e);
        }
    }
}
