//! Fixed-window rate limiting on top of the shared cache.
//!
//! Each identity gets a counter at `ratelimit:<identity>` that expires when
//! its window closes. Public traffic is keyed by client IP, admin traffic by
//! `admin_<IP>`, so the two budgets never share a counter.

use crate::error::CacheError;
use crate::store::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "ratelimit:";

/// Which budget a limiter enforces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateScope {
    /// General traffic, keyed by client IP
    Public,
    /// Admin traffic, keyed by `admin_<IP>`
    Admin,
}

impl RateScope {
    /// Identity under which `client_ip` is counted
    #[must_use]
    pub fn identity(self, client_ip: &str) -> String {
        match self {
            Self::Public => client_ip.to_string(),
            Self::Admin => format!("admin_{client_ip}"),
        }
    }
}

/// Outcome of a rate-limit check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// The request fits in the budget
    Allowed { limit: u64, remaining: u64 },
    /// The budget is exhausted; retry after this many seconds
    Limited { limit: u64, retry_after: u64 },
}

impl RateDecision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Fixed-window request counter
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    scope: RateScope,
    limit: u64,
    window: Duration,
    timeout: Duration,
}

impl RateLimiter {
    /// Allow `limit` requests per `window` for each identity in `scope`
    pub fn new(store: Arc<dyn CacheStore>, scope: RateScope, limit: u64, window: Duration) -> Self {
        Self {
            store,
            scope,
            limit,
            window,
            timeout: Duration::from_millis(250),
        }
    }

    /// Bound each counter update by `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn scope(&self) -> RateScope {
        self.scope
    }

    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Count one request from `client_ip` and decide whether it may proceed.
    ///
    /// When the cache cannot be reached the request is allowed.
    pub async fn check(&self, client_ip: &str) -> RateDecision {
        let key = format!("{KEY_PREFIX}{}", self.scope.identity(client_ip));
        let counted = tokio::time::timeout(self.timeout, self.store.incr_window(&key, self.window))
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)));

        match counted {
            Ok(window) if window.count > self.limit => {
                let retry_after = retry_after_secs(window.ttl, self.window);
                debug!(
                    "Rate limit hit for '{}' ({} > {}), retry in {}s",
                    key, window.count, self.limit, retry_after
                );
                RateDecision::Limited {
                    limit: self.limit,
                    retry_after,
                }
            }
            Ok(window) => RateDecision::Allowed {
                limit: self.limit,
                remaining: self.limit - window.count,
            },
            Err(e) => {
                warn!("Rate limiter cache unavailable, allowing request: {}", e);
                RateDecision::Allowed {
                    limit: self.limit,
                    remaining: self.limit,
                }
            }
        }
    }
}

/// Seconds until the window closes, rounded up, within `1..=window`
fn retry_after_secs(ttl: Duration, window: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.clamp(1, window.as_secs().max(1))
}
