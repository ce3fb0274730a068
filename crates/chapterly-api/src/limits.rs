//! Rate-limit middleware.
//!
//! Read routes draw on the public budget, write routes on the admin
//! budget. Allowed responses carry `x-ratelimit-limit` and
//! `x-ratelimit-remaining`; rejected ones are 429 with `Retry-After`.
//!
//! Clients are identified by their socket peer address. `x-forwarded-for`
//! is honoured only when `server.trust_proxy` is set, since any client can
//! send it.

use crate::ApiState;
use crate::error::ApiError;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chapterly_cache::{RateDecision, RateLimiter};
use chapterly_common::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Client address: the first `x-forwarded-for` hop when `trust_proxy` is
/// set, else the socket peer, else `unknown`
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = || {
        headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    trust_proxy
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Apply the public budget
pub async fn public_budget(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.public_limiter, state.trust_proxy, request, next).await
}

/// Apply the admin budget
pub async fn admin_budget(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.admin_limiter, state.trust_proxy, request, next).await
}

async fn enforce(
    limiter: &RateLimiter,
    trust_proxy: bool,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, trust_proxy);

    match limiter.check(&ip).await {
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after, .. } => {
            ApiError(Error::RateLimited { retry_after }).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_behind_trusted_proxy() {
        let peer: SocketAddr = "10.1.1.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None, true), "unknown");
        assert_eq!(client_ip(&headers, Some(peer), true), "10.1.1.1");

        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_ignores_forwarded_for_by_default() {
        let peer: SocketAddr = "10.1.1.1:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers, Some(peer), false), "10.1.1.1");
        assert_eq!(client_ip(&headers, None, false), "unknown");
    }
}
