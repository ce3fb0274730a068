//! Redis cache backend.
//!
//! Uses a `ConnectionManager`, which multiplexes one connection across
//! tasks and reconnects in the background after failures. Pattern deletes
//! walk the keyspace with `SCAN` (never `KEYS`).

use crate::error::CacheResult;
use crate::store::{CacheStore, WindowCount};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

/// Keys requested per `SCAN` round trip
const SCAN_BATCH: usize = 500;

/// [`CacheStore`] backed by a Redis server
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to the server at `url` (`redis://host:port/db`).
    ///
    /// # Errors
    /// Returns the Redis error when the URL is malformed or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let n: u64 = conn.del(&keys).await?;
                removed += n;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        debug!("Deleted {} keys matching '{}'", removed, pattern);
        Ok(removed)
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount> {
        let mut conn = self.conn.clone();
        let window_secs = window.as_secs().max(1) as i64;

        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            let _: () = conn.expire(key, window_secs).await?;
        }
        let mut ttl: i64 = conn.ttl(key).await?;
        if ttl < 0 {
            // The key lost its expiry (e.g. a crash between INCR and EXPIRE)
            let _: () = conn.expire(key, window_secs).await?;
            ttl = window_secs;
        }

        Ok(WindowCount {
            count,
            ttl: Duration::from_secs(ttl as u64),
        })
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) {
        info!("Closing Redis cache connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[tokio::test]
    async fn test_malformed_url_is_a_redis_error() {
        match RedisCache::connect("redis://bad host:6379").await {
            Ok(_) => panic!("malformed URL accepted"),
            Err(e) => {
                assert!(matches!(e, CacheError::Redis(_)));
                assert!(e.to_string().starts_with("redis error"));
            }
        }
    }

    #[test]
    fn test_redis_errors_convert() {
        let err: CacheError =
            redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into();
        assert!(matches!(err, CacheError::Redis(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
