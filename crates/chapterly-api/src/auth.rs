//! Admin authentication middleware.
//!
//! Write routes require the shared admin secret, presented either as
//! `x-admin-key: <secret>` or `Authorization: Bearer <secret>`. Only the
//! SHA-256 digest of the configured secret is kept in memory.

use crate::ApiState;
use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use chapterly_common::Error;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the admin secret
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Digest of the configured admin secret
#[derive(Clone)]
pub struct AdminKey {
    digest: [u8; 32],
}

impl AdminKey {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Whether `presented` is the configured secret
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        // Constant-time over the digest bytes
        presented
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminKey(..)")
    }
}

/// Extract the secret the client presented, if any
#[must_use]
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reject requests without a valid admin secret
///
/// # Errors
/// `Unauthorized` (401) when no secret is presented, `Forbidden` (403) when
/// it does not match.
pub async fn require_admin(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(presented) = presented_key(request.headers()) else {
        debug!("Admin request without credentials: {} {}", request.method(), request.uri().path());
        return Err(Error::Unauthorized.into());
    };
    if !state.admin_key.verify(presented) {
        warn!("Rejected admin credential for {} {}", request.method(), request.uri().path());
        return Err(Error::Forbidden.into());
    }
    Ok(next.run(request).await)
}
