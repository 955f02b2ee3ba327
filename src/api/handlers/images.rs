use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, AppQuery, JSend, JSendPaginated, Pagination};
use crate::gallery::NewImage;
use crate::metadata::models::ImageRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageResponse {
    pub content_type: String,
    pub created_at: String,
    pub description: String,
    pub id: String,
    pub size: u64,
    pub storage_key: String,
    pub title: String,
    pub updated_at: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateImageRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListImagesParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    let mut data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut title = String::new();
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart data", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "image" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read image", e))?;

                if bytes.len() as u64 > state.config.max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "Image exceeds maximum upload size of {} bytes",
                        state.config.max_upload_size
                    )));
                }
                data = Some(bytes);
            }
            "title" => {
                title = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Invalid title", e))?;
            }
            "description" => {
                description = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Invalid description", e))?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = data.ok_or_else(|| ApiError::bad_request("image field is required"))?;

    let record = state
        .gallery
        .upload(NewImage {
            title,
            description,
            file_name,
            content_type,
            data,
        })
        .await?;

    Ok(JSend::success(to_response(&state, &record).await?))
}

pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    let record = state.gallery.get(&id).await?;
    Ok(JSend::success(to_response(&state, &record).await?))
}

pub async fn update_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateImageRequest>,
) -> Result<Json<JSend<ImageResponse>>, ApiError> {
    if req.title.is_none() && req.description.is_none() {
        return Err(ApiError::bad_request(
            "at least one field (title, description) must be provided",
        ));
    }

    let record = state
        .gallery
        .update(&id, req.title, req.description)
        .await?;
    Ok(JSend::success(to_response(&state, &record).await?))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.gallery.delete(&id).await?;
    Ok(JSend::success(()))
}

pub async fn list_images(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListImagesParams>,
) -> Result<Json<JSendPaginated<ImageResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let records = state.gallery.list().await?;
    let total = records.len() as u64;

    let mut items = Vec::new();
    for record in records
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
    {
        items.push(to_response(&state, record).await?);
    }

    Ok(JSend::page(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

// ============================================================================
// Helpers
// ============================================================================

/// Body-limit overruns surface as multipart read errors; keep them a 413.
fn multipart_error(context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("{context}: {}", e.body_text()))
    } else {
        ApiError::bad_request(format!("{context}: {}", e.body_text()))
    }
}

async fn to_response(state: &AppState, record: &ImageRecord) -> Result<ImageResponse, ApiError> {
    let url = state.gallery.image_url(record).await?;
    Ok(ImageResponse {
        content_type: record.content_type.clone(),
        created_at: record.created_at.to_rfc3339(),
        description: record.description.clone(),
        id: record.id.clone(),
        size: record.size,
        storage_key: record.storage_key.clone(),
        title: record.title.clone(),
        updated_at: record.updated_at.to_rfc3339(),
        url,
    })
}
