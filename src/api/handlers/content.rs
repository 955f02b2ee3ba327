use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::keys::validate_key;
use crate::AppState;

/// Serve image bytes by storage key.
/// Route: GET /images/*key
pub async fn serve_image(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(key): axum::extract::Path<String>,
) -> Result<Response, ApiError> {
    if key.is_empty() {
        return Err(ApiError::bad_request("Image key is required"));
    }

    let path = validate_key(&key).map_err(|e| ApiError::bad_request(e.to_string()))?;
    // Gallery keys are flat; anything nested (such as the local `db/` directory)
    // is not an image.
    if path.components().count() != 1 {
        return Err(ApiError::not_found("Image not found"));
    }

    let (data, content_type) = state.gallery.content(&key).await.map_err(|e| {
        tracing::debug!(key = %key, error = %e, "Image content unavailable");
        ApiError::from(e)
    })?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("image/jpeg")),
    );

    // Payloads never change under a key, only the record does.
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=86400"),
    );

    Ok(response)
}
