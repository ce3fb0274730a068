//! Error types for Chapterly
//!
//! This module defines the error taxonomy shared by the store, the
//! pipeline and the HTTP layer, plus the field-level error detail the
//! validator produces.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common result type for Chapterly operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level problem in client-supplied data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (`yearWiseQuestionCount.2024`)
    pub field: String,
    /// Human-readable description
    pub message: String,
    /// The offending value, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FieldError {
    /// Create a field error without a value
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    /// Attach the offending value
    #[must_use]
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Common error type for Chapterly
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("chapter not found: {0}")]
    NotFound(String),

    #[error("admin credential missing")]
    Unauthorized,

    #[error("admin credential rejected")]
    Forbidden,

    #[error("rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("invalid upload: {0}")]
    UploadFormat(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a validation error with a single field problem
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an unavailable-dependency error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the error is caused by the client rather than the service
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.http_status_code() < 500
    }

    /// Get the HTTP status code for the error
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_) | Self::UploadFormat(_) => 400,

            // 401 / 403
            Self::Unauthorized => 401,
            Self::Forbidden => 403,

            // 404 Not Found
            Self::NotFound(_) => 404,

            // 409 Conflict
            Self::Conflict(_) => 409,

            // 429 Too Many Requests
            Self::RateLimited { .. } => 429,

            // 500 Internal Server Error
            Self::Internal(_) | Self::Configuration(_) => 500,

            // 503 Service Unavailable
            Self::Unavailable(_) => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::NotFound("abc".into()).is_not_found());
        assert!(!Error::Forbidden.is_not_found());
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::invalid_field("subject", "required").http_status_code(), 400);
        assert_eq!(Error::Unauthorized.http_status_code(), 401);
        assert_eq!(Error::Forbidden.http_status_code(), 403);
        assert_eq!(Error::NotFound("x".into()).http_status_code(), 404);
        assert_eq!(Error::RateLimited { retry_after: 5 }.http_status_code(), 429);
        assert_eq!(Error::unavailable("store").http_status_code(), 503);
        assert!(!Error::internal("boom").is_client_error());
    }

    #[test]
    fn test_field_error_skips_missing_value() {
        let json = serde_json::to_value(FieldError::new("unit", "is required")).unwrap();
        assert!(json.get("value").is_none());

        let json = serde_json::to_value(
            FieldError::new("questionSolved", "must be >= 0").with_value((-1).into()),
        )
        .unwrap();
        assert_eq!(json["value"], -1);
    }
}
