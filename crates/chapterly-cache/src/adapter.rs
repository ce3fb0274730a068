//! Typed, failure-absorbing front for a [`CacheStore`].
//!
//! Callers of [`ResponseCache`] never see a cache error: every call is
//! bounded by a timeout, failures are logged at `warn` and reported as a
//! miss (reads) or `false`/`0` (writes).

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON cache for whole API responses
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
}

impl ResponseCache {
    /// Wrap `store`, bounding each call by `timeout`
    pub fn new(store: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    async fn bounded<T>(&self, fut: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)))
    }

    /// Fetch the raw serialized value stored at `key`
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        match self.bounded(self.store.get(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    /// Fetch and decode the value at `key`. Undecodable entries count as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match decode(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry '{}': {}", key, e);
                None
            }
        }
    }

    /// Serialize `value` and store it under `key` for `ttl`
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let raw = match encode(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot serialize cache entry '{}': {}", key, e);
                return false;
            }
        };
        match self.bounded(self.store.set(key, &raw, ttl)).await {
            Ok(()) => {
                debug!("Cached '{}' for {:?}", key, ttl);
                true
            }
            Err(e) => {
                warn!("Cache write failed for '{}': {}", key, e);
                false
            }
        }
    }

    /// Remove a single entry
    pub async fn delete(&self, key: &str) -> bool {
        match self.bounded(self.store.delete(key)).await {
            Ok(existed) => existed,
            Err(e) => {
                warn!("Cache delete failed for '{}': {}", key, e);
                false
            }
        }
    }

    /// Remove every entry matching `pattern`, returning how many were removed
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        match self.bounded(self.store.delete_pattern(pattern)).await {
            Ok(removed) => {
                debug!("Invalidated {} cache entries matching '{}'", removed, pattern);
                removed
            }
            Err(e) => {
                warn!("Cache invalidation failed for '{}': {}", pattern, e);
                0
            }
        }
    }

    /// Whether the backend answers within the timeout
    pub async fn is_reachable(&self) -> bool {
        self.bounded(self.store.ping()).await.is_ok()
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> CacheResult<T> {
    Ok(serde_json::from_str(raw)?)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::MemoryCache;
    use crate::store::WindowCount;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    fn refused() -> CacheError {
        CacheError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    /// A backend that is always down
    pub(crate) struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        fn backend(&self) -> &'static str {
            "down"
        }
        async fn get(&self, _: &str) -> CacheResult<Option<String>> {
            Err(refused())
        }
        async fn set(&self, _: &str, _: &str, _: Duration) -> CacheResult<()> {
            Err(refused())
        }
        async fn delete(&self, _: &str) -> CacheResult<bool> {
            Err(refused())
        }
        async fn delete_pattern(&self, _: &str) -> CacheResult<u64> {
            Err(refused())
        }
        async fn incr_window(&self, _: &str, _: Duration) -> CacheResult<WindowCount> {
            Err(refused())
        }
        async fn ping(&self) -> CacheResult<()> {
            Err(refused())
        }
    }

    /// A backend that never answers
    pub(crate) struct HangingStore;

    #[async_trait]
    impl CacheStore for HangingStore {
        fn backend(&self) -> &'static str {
            "hanging"
        }
        async fn get(&self, _: &str) -> CacheResult<Option<String>> {
            std::future::pending().await
        }
        async fn set(&self, _: &str, _: &str, _: Duration) -> CacheResult<()> {
            std::future::pending().await
        }
        async fn delete(&self, _: &str) -> CacheResult<bool> {
            std::future::pending().await
        }
        async fn delete_pattern(&self, _: &str) -> CacheResult<u64> {
            std::future::pending().await
        }
        async fn incr_window(&self, _: &str, _: Duration) -> CacheResult<WindowCount> {
            std::future::pending().await
        }
        async fn ping(&self) -> CacheResult<()> {
            std::future::pending().await
        }
    }

    fn memory() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryCache::new()), Duration::from_millis(250))
    }

    #[tokio::test]
    async fn test_round_trip_is_identical() {
        let cache = memory();
        let payload = json!({"chapters": [{"subject": "Math", "yearWiseQuestionCount": {"2024": 5}}], "total": 1});
        assert!(cache.set_json("chapters:/x", &payload, Duration::from_secs(60)).await);

        let raw = cache.get_raw("chapters:/x").await.unwrap();
        assert_eq!(raw, serde_json::to_string(&payload).unwrap());
        let decoded: Value = cache.get_json("chapters:/x").await.unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_invalidate_namespace() {
        let cache = memory();
        let ttl = Duration::from_secs(60);
        cache.set_json("chapters:/a", &1, ttl).await;
        cache.set_json("chapters:/b", &2, ttl).await;
        cache.set_json("other:/c", &3, ttl).await;

        assert_eq!(cache.invalidate("chapters:*").await, 2);
        assert!(cache.get_json::<i32>("chapters:/a").await.is_none());
        assert_eq!(cache.get_json::<i32>("other:/c").await, Some(3));
    }

    #[tokio::test]
    async fn test_backend_errors_are_absorbed() {
        let cache = ResponseCache::new(Arc::new(DownStore), Duration::from_millis(250));
        assert!(cache.get_json::<Value>("k").await.is_none());
        assert!(!cache.set_json("k", &1, Duration::from_secs(1)).await);
        assert!(!cache.delete("k").await);
        assert_eq!(cache.invalidate("*").await, 0);
        assert!(!cache.is_reachable().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_degrade_to_miss() {
        let cache = ResponseCache::new(Arc::new(HangingStore), Duration::from_millis(50));
        assert!(cache.get_raw("k").await.is_none());
        assert!(!cache.set_json("k", &1, Duration::from_secs(1)).await);
        assert_eq!(cache.invalidate("*").await, 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryCache::new());
        store.set("k", "not json", Duration::from_secs(60)).await.unwrap();
        let cache = ResponseCache::new(store, Duration::from_millis(250));
        assert!(cache.get_json::<Value>("k").await.is_none());
        assert!(matches!(
            decode::<Value>("not json"),
            Err(CacheError::Serialization(_))
        ));
    }
}
