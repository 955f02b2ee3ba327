use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Slack on top of the image size for the other multipart fields and framing.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + FORM_OVERHEAD;

    Router::new()
        // Image records
        .route("/api/images", get(handlers::list_images))
        .route(
            "/api/images",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/images/:id", delete(handlers::delete_image))
        .route("/api/images/:id", get(handlers::get_image))
        .route("/api/images/:id", put(handlers::update_image))
        // Image content (what `ObjectStore::resolve` points at)
        .route("/images/*key", get(handlers::serve_image))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
