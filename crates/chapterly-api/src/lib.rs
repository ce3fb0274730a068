//! Chapterly API - REST surface for chapter performance records
//!
//! Builds the axum router serving `/api/v1/chapters`:
//!
//! - reads (`GET /`, `/stats`, `/{id}`) are cached and draw on the public
//!   rate-limit budget
//! - writes (`POST /`, `PUT|PATCH|DELETE /{id}`) draw on the admin budget
//!   and require the admin secret
//! - `/health` is neither limited nor authenticated

pub mod auth;
pub mod bulk;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod params;
pub mod read_cache;
pub mod response;
pub mod upload;

pub use auth::AdminKey;
pub use error::ApiError;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use chapterly_cache::{CacheStore, RateLimiter, RateScope, ResponseCache};
use chapterly_common::{ServiceConfig, YearRange};
use chapterly_store::ChapterStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Shared state for all handlers and middleware
pub struct ApiState {
    pub store: Arc<dyn ChapterStore>,
    pub cache: ResponseCache,
    pub public_limiter: RateLimiter,
    pub admin_limiter: RateLimiter,
    pub admin_key: AdminKey,
    pub years: YearRange,
    pub cache_ttl: Duration,
    pub max_upload_bytes: usize,
    pub trust_proxy: bool,
}

impl ApiState {
    /// Wire the store and cache backends according to `config`
    pub fn new(
        config: &ServiceConfig,
        store: Arc<dyn ChapterStore>,
        cache_store: Arc<dyn CacheStore>,
    ) -> Self {
        let timeout = config.cache.timeout();
        let window = config.rate_limit.window();
        Self {
            store,
            cache: ResponseCache::new(Arc::clone(&cache_store), timeout),
            public_limiter: RateLimiter::new(
                Arc::clone(&cache_store),
                RateScope::Public,
                config.rate_limit.public_limit,
                window,
            )
            .with_timeout(timeout),
            admin_limiter: RateLimiter::new(
                cache_store,
                RateScope::Admin,
                config.rate_limit.admin_limit,
                window,
            )
            .with_timeout(timeout),
            admin_key: AdminKey::new(&config.auth.admin_key),
            years: config.records.years,
            cache_ttl: config.cache.ttl(),
            max_upload_bytes: config.server.max_upload_bytes,
            trust_proxy: config.server.trust_proxy,
        }
    }
}

/// Routes under `/api/v1/chapters`
fn chapter_routes(state: &Arc<ApiState>) -> Router<Arc<ApiState>> {
    let reads = Router::new()
        .route("/", get(handlers::list_chapters))
        .route("/stats", get(handlers::chapter_stats))
        .route("/{id}", get(handlers::get_chapter))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(state),
            limits::public_budget,
        ));

    // Layers run bottom-up: the admin budget is charged before the secret
    // is checked
    let writes = Router::new()
        .route("/", post(handlers::create_chapters))
        .route(
            "/{id}",
            put(handlers::replace_chapter)
                .patch(handlers::patch_chapter)
                .delete(handlers::delete_chapter),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(state),
            auth::require_admin,
        ))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(state),
            limits::admin_budget,
        ));

    reads
        .merge(writes)
        .route("/health", get(handlers::health))
}

/// Build the full application router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1/chapters", chapter_routes(&state))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
