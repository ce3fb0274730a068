//! Request body extractors for chapter payloads.
//!
//! Bulk creation accepts either a JSON body or a `multipart/form-data`
//! upload carrying one `.json` file. Size limits come from the router's
//! `DefaultBodyLimit`.

use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use serde_json::Value;
use tracing::debug;

/// A JSON document from the body or an uploaded `.json` file
#[derive(Debug)]
pub struct ChapterPayload(pub Value);

impl<S: Send + Sync> FromRequest<S> for ChapterPayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let JsonBody(value) = JsonBody::from_request(req, state).await?;
            return Ok(Self(value));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::upload(format!("Invalid multipart request: {}", e.body_text())))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::upload(format!("Failed to read upload: {}", e.body_text())))?
        {
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let is_json_type = field
                .content_type()
                .is_some_and(|ct| ct.starts_with("application/json"));
            if !is_json_type && !file_name.to_ascii_lowercase().ends_with(".json") {
                return Err(ApiError::upload(format!(
                    "Only JSON files are allowed, got '{file_name}'"
                )));
            }

            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::upload(format!("Failed to read upload: {}", e.body_text())))?;
            debug!("Received upload '{}' ({} bytes)", file_name, bytes.len());
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::upload(format!("Uploaded file is not valid JSON: {e}")))?;
            return Ok(Self(value));
        }

        Err(ApiError::upload("No file uploaded"))
    }
}

/// A JSON body, with parse failures reported in the response envelope
#[derive(Debug)]
pub struct JsonBody(pub Value);

impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::upload(format!("Failed to read request body: {}", e.body_text())))?;
        if bytes.is_empty() {
            return Err(ApiError::upload("Request body is empty"));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| ApiError::upload(format!("Malformed JSON body: {e}")))
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn multipart_request(file_name: &str, content_type: &str, content: &str) -> Request {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {content}\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_body() {
        let req = Request::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"[{"subject":"Math"}]"#))
            .unwrap();
        let ChapterPayload(value) = ChapterPayload::from_request(req, &()).await.unwrap();
        assert_eq!(value[0]["subject"], "Math");
    }

    #[tokio::test]
    async fn test_malformed_json_body() {
        let req = Request::builder().body(Body::from("[{")).unwrap();
        let err = ChapterPayload::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.0.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_multipart_json_file() {
        let req = multipart_request("chapters.json", "application/octet-stream", r#"[{"subject":"Bio"}]"#);
        let ChapterPayload(value) = ChapterPayload::from_request(req, &()).await.unwrap();
        assert_eq!(value[0]["subject"], "Bio");
    }

    #[tokio::test]
    async fn test_multipart_rejects_other_files() {
        let req = multipart_request("chapters.csv", "text/csv", "subject\nBio");
        let err = ChapterPayload::from_request(req, &()).await.unwrap_err();
        assert!(err.0.to_string().contains("Only JSON files"));
    }

    #[tokio::test]
    async fn test_multipart_invalid_json() {
        let req = multipart_request("chapters.json", "application/json", "{nope");
        let err = ChapterPayload::from_request(req, &()).await.unwrap_err();
        assert!(err.0.to_string().contains("not valid JSON"));
    }
}
