//! HTTP rendering of [`chapterly_common::Error`].

use crate::response::Envelope;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chapterly_common::Error;
use chapterly_store::StoreError;
use tracing::error;

/// Error returned by handlers and middleware
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn not_found() -> Self {
        Self(Error::NotFound("Chapter not found".to_string()))
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self(Error::UploadFormat(msg.into()))
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let envelope = match self.0 {
            Error::Validation(errors) => Envelope::error("Validation failed").errors(errors),
            Error::RateLimited { retry_after } => {
                let mut response = Envelope::error("Too many requests, please try again later")
                    .retry_after(retry_after)
                    .into_response_with(status);
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            Error::Unauthorized => Envelope::error(
                "Admin authentication required: provide x-admin-key or a Bearer token",
            ),
            Error::Forbidden => Envelope::error("Invalid admin credentials"),
            Error::NotFound(msg) | Error::UploadFormat(msg) | Error::Conflict(msg) => Envelope::error(msg),
            Error::Unavailable(msg) => {
                error!("Dependency unavailable: {}", msg);
                Envelope::error("Service temporarily unavailable")
            }
            e @ (Error::Internal(_) | Error::Configuration(_)) => {
                error!("Request failed: {}", e);
                Envelope::error("Internal server error")
            }
        };
        envelope.into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError(Error::invalid_field("page", "bad")), 400),
            (ApiError(Error::Unauthorized), 401),
            (ApiError(Error::Forbidden), 403),
            (ApiError::not_found(), 404),
            (ApiError(Error::Conflict("dup".into())), 409),
            (ApiError(Error::RateLimited { retry_after: 3 }), 429),
            (ApiError(Error::internal("boom")), 500),
            (ApiError(Error::unavailable("redb")), 503),
        ];
        for (err, code) in cases {
            assert_eq!(err.into_response().status().as_u16(), code);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after_header() {
        let response = ApiError(Error::RateLimited { retry_after: 42 }).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
