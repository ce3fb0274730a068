//! Read-through caching of whole response payloads.
//!
//! GET responses are cached under a key derived from the request path and
//! its normalized query string. Any write to the collection drops every
//! key in the namespace.

use chapterly_cache::ResponseCache;
use chapterly_common::Error;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Prefix of every cached response key
pub const NAMESPACE: &str = "chapters:";

/// Pattern matching every cached response
pub const NAMESPACE_PATTERN: &str = "chapters:*";

/// Cache key for `path` and its raw query string.
///
/// Query pairs are decoded, sorted by name then value and re-encoded, so
/// `?b=2&a=1` and `?a=1&b=2` share a key.
#[must_use]
pub fn cache_key(path: &str, query: Option<&str>) -> String {
    let query = query.unwrap_or_default();
    if query.is_empty() {
        return format!("{NAMESPACE}{path}");
    }

    let normalized = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .ok()
        .and_then(|mut pairs| {
            pairs.sort();
            serde_urlencoded::to_string(&pairs).ok()
        })
        .unwrap_or_else(|| query.to_string());

    if normalized.is_empty() {
        format!("{NAMESPACE}{path}")
    } else {
        format!("{NAMESPACE}{path}?{normalized}")
    }
}

/// A payload and whether it came from the cache
#[derive(Clone, Debug, PartialEq)]
pub struct Cached {
    pub payload: Value,
    pub cached: bool,
}

/// Serve `key` from the cache, or run `producer` and cache its result.
///
/// Only successful results are stored. A cache that is down or slow
/// behaves like an empty one.
///
/// # Errors
/// Returns the producer's error unchanged.
pub async fn read_through<T, F, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    producer: F,
) -> Result<Cached, Error>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    if let Some(payload) = cache.get_json::<Value>(key).await {
        debug!("Cache hit: {}", key);
        return Ok(Cached {
            payload,
            cached: true,
        });
    }
    debug!("Cache miss: {}", key);

    let produced = producer().await?;
    let payload = serde_json::to_value(&produced)
        .map_err(|e| Error::internal(format!("cannot serialize response: {e}")))?;
    cache.set_json(key, &payload, ttl).await;

    Ok(Cached {
        payload,
        cached: false,
    })
}

/// Drop every cached response after a write
pub async fn invalidate_all(cache: &ResponseCache) {
    let removed = cache.invalidate(NAMESPACE_PATTERN).await;
    debug!("Invalidated {} cached responses", removed);
}
