//! The JSON envelope every endpoint answers with.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chapterly_common::FieldError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome marker of an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// `{ status, data?, message?, errors?, cached?, retryAfter?, timestamp }`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> Envelope<T> {
    fn new(status: Outcome, data: Option<T>) -> Self {
        Self {
            status,
            data,
            message: None,
            errors: None,
            cached: None,
            retry_after: None,
            timestamp: Utc::now(),
        }
    }

    /// A success envelope carrying `data`
    pub fn success(data: T) -> Self {
        Self::new(Outcome::Success, Some(data))
    }

    /// An error envelope carrying `data`, used for reports that failed as a whole
    pub fn failure(data: T) -> Self {
        Self::new(Outcome::Error, Some(data))
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub const fn cached(mut self, cached: bool) -> Self {
        self.cached = Some(cached);
        self
    }

    /// Render with the given status code
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl Envelope<()> {
    /// An error envelope without data
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Outcome::Error, None).message(message)
    }

    #[must_use]
    pub fn errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub const fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        self.into_response_with(StatusCode::OK)
    }
}
