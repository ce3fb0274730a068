//! Chapterly Cache - shared key-value cache and rate limiting
//!
//! Read responses and rate-limit counters live in the same key-value
//! store so that several stateless service instances see one view. Two
//! backends implement [`CacheStore`]:
//!
//! - [`MemoryCache`]: process-local, used for development and tests
//! - [`RedisCache`]: shared, backed by a Redis `ConnectionManager`
//!
//! [`ResponseCache`] wraps a store with JSON (de)serialization, per-call
//! timeouts and error absorption; [`RateLimiter`] implements fixed-window
//! counting on top of [`CacheStore::incr_window`].

pub mod adapter;
pub mod error;
pub mod memory;
pub mod rate_limit;
pub mod redis_cache;
pub mod store;

pub use adapter::ResponseCache;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use rate_limit::{RateDecision, RateLimiter, RateScope};
pub use redis_cache::RedisCache;
pub use store::{CacheStore, WindowCount, glob_match};

use std::sync::Arc;
use tracing::{info, warn};

/// Open the cache backend named by `uri`.
///
/// `memory://` (or an empty string) selects the in-process cache,
/// `redis://` / `rediss://` a Redis server.
///
/// # Errors
/// Returns `CacheError::InvalidUri` for unknown schemes and the Redis
/// error when the server cannot be reached.
pub async fn connect(uri: &str) -> CacheResult<Arc<dyn CacheStore>> {
    let uri = uri.trim();
    if uri.is_empty() || uri.starts_with("memory://") {
        info!("Using in-memory response cache");
        return Ok(Arc::new(MemoryCache::new()));
    }
    if uri.starts_with("redis://") || uri.starts_with("rediss://") {
        let cache = RedisCache::connect(uri).await?;
        return Ok(Arc::new(cache));
    }
    Err(CacheError::InvalidUri(uri.to_string()))
}

/// Like [`connect`], but a cache that cannot be reached is replaced by the
/// in-memory backend. The service stays up without a shared cache.
pub async fn connect_or_fallback(uri: &str) -> Arc<dyn CacheStore> {
    match connect(uri).await {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "Cache backend unavailable ({}), falling back to in-memory cache",
                e
            );
            Arc::new(MemoryCache::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory() {
        let store = connect("memory://").await.unwrap();
        assert_eq!(store.backend(), "memory");
        let store = connect("").await.unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        assert!(matches!(
            connect("memcached://localhost").await,
            Err(CacheError::InvalidUri(_))
        ));
        let store = connect_or_fallback("memcached://localhost").await;
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_redis_scheme_routes_to_redis() {
        assert!(matches!(
            connect("redis://bad host:6379").await,
            Err(CacheError::Redis(_))
        ));
        let store = connect_or_fallback("redis://bad host:6379").await;
        assert_eq!(store.backend(), "memory");
    }
}
