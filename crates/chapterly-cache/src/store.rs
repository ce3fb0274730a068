//! Key-value cache contract shared by all backends.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Counter state returned by [`CacheStore::incr_window`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowCount {
    /// Requests counted in the current window, including this one
    pub count: u64,
    /// Time until the window closes
    pub ttl: Duration,
}

/// A string key-value store with expiry.
///
/// Keys are flat strings; `:` separates namespaces by convention
/// (`chapters:...`, `ratelimit:...`).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Fetch a live value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key matching a glob pattern (`*`, `?`), returning the count
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Increment the counter at `key`. The first increment opens a window
    /// of length `window`; the counter disappears when the window closes.
    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount>;

    /// Check that the backend is reachable
    async fn ping(&self) -> CacheResult<()>;

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}

/// Match `key` against a Redis-style glob supporting `*` and `?`.
#[must_use]
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    // Position of the last `*` seen and the key position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, k));
            p += 1;
        } else if let Some((star, at)) = backtrack {
            p = star + 1;
            k = at + 1;
            backtrack = Some((star, at + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_prefix() {
        assert!(glob_match("chapters:*", "chapters:/api/v1/chapters?page=1"));
        assert!(glob_match("chapters:*", "chapters:"));
        assert!(!glob_match("chapters:*", "ratelimit:10.0.0.1"));
    }

    #[test]
    fn test_glob_wildcards() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxbyy"));
        assert!(glob_match("*stats", "chapters:/api/v1/chapters/stats"));
        assert!(!glob_match("exact", "exactly"));
    }
}
