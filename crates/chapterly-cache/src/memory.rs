//! In-process cache backend.
//!
//! Entries live in a sharded `DashMap`. Expired entries are dropped lazily
//! on access and by a periodic sweep piggybacked on writes.

use crate::error::{CacheError, CacheResult};
use crate::store::{CacheStore, WindowCount, glob_match};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Writes between two sweeps of expired entries
const SWEEP_INTERVAL: u64 = 1024;

#[derive(Clone, Debug)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Process-local [`CacheStore`]
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Slot>,
    writes: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn note_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            let now = Instant::now();
            self.entries.retain(|_, slot| !slot.is_expired(now));
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(slot) if !slot.is_expired(now) => return Ok(Some(slot.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, slot| slot.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.entries.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        self.note_write();
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount> {
        let now = Instant::now();
        let result = {
            let mut slot = self.entries.entry(key.to_string()).or_insert_with(|| Slot {
                value: "0".to_string(),
                expires_at: now + window,
            });
            if slot.is_expired(now) {
                *slot = Slot {
                    value: "0".to_string(),
                    expires_at: now + window,
                };
            }
            let count = slot
                .value
                .parse::<u64>()
                .map_err(|_| CacheError::NotACounter(key.to_string()))?
                + 1;
            slot.value = count.to_string();
            WindowCount {
                count,
                ttl: slot.expires_at.saturating_duration_since(now),
            }
        };
        self.note_write();
        Ok(result)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("chapters:/api/v1/chapters", "a", ttl).await.unwrap();
        cache.set("chapters:/api/v1/chapters/stats", "b", ttl).await.unwrap();
        cache.set("ratelimit:127.0.0.1", "3", ttl).await.unwrap();

        assert_eq!(cache.delete_pattern("chapters:*").await.unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("ratelimit:127.0.0.1").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_window() {
        let cache = MemoryCache::new();
        let window = Duration::from_secs(60);

        let first = cache.incr_window("ratelimit:a", window).await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.ttl, window);

        tokio::time::advance(Duration::from_secs(20)).await;
        let second = cache.incr_window("ratelimit:a", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        let reset = cache.incr_window("ratelimit:a", window).await.unwrap();
        assert_eq!(reset.count, 1);
    }

    #[tokio::test]
    async fn test_incr_on_non_counter() {
        let cache = MemoryCache::new();
        cache.set("k", "text", Duration::from_secs(60)).await.unwrap();
        assert!(matches!(
            cache.incr_window("k", Duration::from_secs(60)).await,
            Err(CacheError::NotACounter(_))
        ));
    }
}
