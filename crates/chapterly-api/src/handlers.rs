//! Axum handlers for the chapter REST API.
//!
//! Reads go through the response cache; writes invalidate it. Handlers
//! return the JSON envelope from [`crate::response`] on success and an
//! [`ApiError`] otherwise.

use crate::ApiState;
use crate::bulk::{self, BulkReport};
use crate::error::{ApiError, Result};
use crate::params::ListRequest;
use crate::read_cache::{self, Cached, cache_key};
use crate::response::Envelope;
use crate::upload::{ChapterPayload, JsonBody};
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chapterly_common::validation::{validate_one, validate_patch};
use chapterly_common::{ChapterId, ChapterRecord, Error};
use chapterly_store::{ChapterFilter, ChapterUpdate, FilterOptions};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Page metadata of a list response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: u64,
    pub total_count: u64,
    pub limit: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    #[must_use]
    pub fn new(page: usize, limit: usize, total_count: u64) -> Self {
        let total_pages = total_count.div_ceil(limit.max(1) as u64);
        Self {
            current_page: page,
            total_pages,
            total_count,
            limit,
            has_next_page: (page as u64) < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct AppliedFilters {
    applied: ChapterFilter,
    available: FilterOptions,
}

#[derive(Debug, Serialize)]
struct ChapterPage {
    chapters: Vec<ChapterRecord>,
    pagination: Pagination,
    filters: AppliedFilters,
}

fn cached_response(cached: Cached) -> Response {
    Envelope::success(cached.payload)
        .cached(cached.cached)
        .into_response()
}

fn parse_id(raw: &str) -> Result<ChapterId> {
    raw.parse().map_err(|_| {
        debug!("Malformed chapter id '{}'", raw);
        ApiError::not_found()
    })
}

/// GET /health
pub async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let store_ok = state.store.ping().await.is_ok();
    let cache_ok = state.cache.is_reachable().await;
    Envelope::success(json!({
        "service": "healthy",
        "store": { "backend": state.store.backend(), "reachable": store_ok },
        "cache": { "backend": state.cache.store().backend(), "reachable": cache_ok },
    }))
}

/// GET /api/v1/chapters
///
/// # Errors
/// Returns `ApiError` for invalid query parameters or a failing store.
pub async fn list_chapters(
    State(state): State<Arc<ApiState>>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response> {
    let request = ListRequest::from_params(&params).map_err(Error::Validation)?;
    let key = cache_key(uri.path(), uri.query());

    let producer_state = Arc::clone(&state);
    let cached = read_cache::read_through(&state.cache, &key, state.cache_ttl, || async move {
        let store = &producer_state.store;
        let (chapters, total_count) = store.find_many(&request.query).await?;
        let available = store.filter_options().await?;
        Ok::<_, Error>(ChapterPage {
            chapters,
            pagination: Pagination::new(request.page, request.limit, total_count),
            filters: AppliedFilters {
                applied: request.query.filter,
                available,
            },
        })
    })
    .await?;
    Ok(cached_response(cached))
}

/// GET /api/v1/chapters/stats
///
/// # Errors
/// Returns `ApiError` if the store fails.
pub async fn chapter_stats(
    State(state): State<Arc<ApiState>>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response> {
    let key = cache_key(uri.path(), uri.query());
    let store = Arc::clone(&state.store);
    let cached = read_cache::read_through(&state.cache, &key, state.cache_ttl, || async move {
        Ok::<_, Error>(store.statistics().await?)
    })
    .await?;
    Ok(cached_response(cached))
}

/// GET /api/v1/chapters/{id}
///
/// # Errors
/// Returns `ApiError` (404) for unknown or malformed ids.
pub async fn get_chapter(
    State(state): State<Arc<ApiState>>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let key = cache_key(uri.path(), uri.query());
    let store = Arc::clone(&state.store);
    let cached = read_cache::read_through(&state.cache, &key, state.cache_ttl, || async move {
        Ok::<_, Error>(store.find_by_id(id).await?)
    })
    .await?;
    Ok(cached_response(cached))
}

/// POST /api/v1/chapters
///
/// Accepts a JSON array or a multipart upload of a `.json` file. Answers
/// 201 when at least one chapter was saved, 400 otherwise.
///
/// # Errors
/// Returns `ApiError` when the payload is unreadable or not an array, or
/// when the store fails.
pub async fn create_chapters(
    State(state): State<Arc<ApiState>>,
    ChapterPayload(raw): ChapterPayload,
) -> Result<Response> {
    let report: BulkReport =
        bulk::create_chapters(state.store.as_ref(), &state.cache, &state.years, &raw).await?;
    let message = report.message();

    let response = if report.is_success() {
        Envelope::success(report)
            .message(message)
            .into_response_with(StatusCode::CREATED)
    } else {
        Envelope::failure(report)
            .message(message)
            .into_response_with(StatusCode::BAD_REQUEST)
    };
    Ok(response)
}

/// PUT /api/v1/chapters/{id}
///
/// # Errors
/// Returns `ApiError` for invalid bodies, unknown ids and natural-key
/// conflicts.
pub async fn replace_chapter(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    JsonBody(raw): JsonBody,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let chapter = validate_one(&raw, &state.years).map_err(Error::Validation)?;
    let updated = state
        .store
        .update_by_id(id, ChapterUpdate::Replace(chapter))
        .await?;
    read_cache::invalidate_all(&state.cache).await;

    info!("Replaced chapter {}", id);
    Ok(Envelope::success(updated)
        .message("Chapter updated successfully")
        .into_response())
}

/// PATCH /api/v1/chapters/{id}
///
/// # Errors
/// Returns `ApiError` for invalid or empty bodies, unknown ids and
/// natural-key conflicts.
pub async fn patch_chapter(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    JsonBody(raw): JsonBody,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let patch = validate_patch(&raw, &state.years).map_err(Error::Validation)?;
    let updated = state
        .store
        .update_by_id(id, ChapterUpdate::Patch(patch))
        .await?;
    read_cache::invalidate_all(&state.cache).await;

    info!("Patched chapter {}", id);
    Ok(Envelope::success(updated)
        .message("Chapter updated successfully")
        .into_response())
}

/// DELETE /api/v1/chapters/{id}
///
/// # Errors
/// Returns `ApiError` (404) for unknown ids.
pub async fn delete_chapter(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let deleted = state.store.delete_by_id(id).await?;
    read_cache::invalidate_all(&state.cache).await;

    info!("Deleted chapter {}", id);
    Ok(Envelope::success(deleted.summary())
        .message("Chapter deleted successfully")
        .into_response())
}
