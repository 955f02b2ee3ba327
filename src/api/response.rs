//! JSend envelopes for every JSON response the gallery API produces.
//!
//! `success` carries a payload, `fail` a client-side message (4xx) and
//! `error` a server-side message (5xx).

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::gallery::GalleryError;
use crate::object_store::ObjectStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

/// A page of a larger listing plus the window that produced it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

pub type JSendPaginated<T> = JSend<Page<T>>;

impl<T: Serialize> JSend<Page<T>> {
    pub fn page(items: Vec<T>, pagination: Pagination) -> Json<JSendPaginated<T>> {
        JSend::success(Page { items, pagination })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
}

/// Body of an `error` response; JSend puts the message at the top level here.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: JSendStatus,
}

/// Handler error, rendered as `fail` below 500 and `error` from 500 up.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let body = ErrorBody {
                message: self.message,
                status: JSendStatus::Error,
            };
            (self.status, Json(body)).into_response()
        } else {
            let body = JSend {
                data: FailData {
                    message: self.message,
                },
                status: JSendStatus::Fail,
            };
            (self.status, Json(body)).into_response()
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(e: GalleryError) -> Self {
        match e {
            GalleryError::NotFound(_) => ApiError::not_found("Image not found"),
            GalleryError::ObjectStore(ObjectStoreError::InvalidKey(msg)) => {
                ApiError::bad_request(msg)
            }
            other => {
                tracing::error!(error = %other, "Gallery operation failed");
                ApiError::internal(other.to_string())
            }
        }
    }
}

/// `axum::Json` that rejects with a JSend `fail` body.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(json_rejection_message(&rejection)))?;
        Ok(AppJson(value))
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => format!("Invalid request body: {}", err.body_text()),
        JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "Missing Content-Type: application/json header".to_string()
        }
        _ => "Failed to read request body".to_string(),
    }
}

/// Query-string extractor backed by `serde_qs`, rejecting with a JSend `fail` body.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        serde_qs::from_str(parts.uri.query().unwrap_or_default())
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(friendly_query_error(&e.to_string())))
    }
}

/// Swap Rust integer type names in serde messages for plain words.
fn friendly_query_error(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer");
    format!("Invalid query parameter: {cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_client_errors_render_as_fail() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["data"]["message"], "nope");
    }

    #[tokio::test]
    async fn test_server_errors_render_as_error() {
        let response = ApiError::internal("disk on fire").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "disk on fire");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_gallery_error_status_mapping() {
        let not_found = ApiError::from(GalleryError::NotFound("abc".into()));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "Image not found");

        let bad_key = ApiError::from(GalleryError::ObjectStore(ObjectStoreError::InvalidKey(
            "../x".into(),
        )));
        assert_eq!(bad_key.status, StatusCode::BAD_REQUEST);

        let backend = ApiError::from(GalleryError::Metadata(MetadataError::Backend(
            "firestore unavailable".into(),
        )));
        assert_eq!(backend.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_page_envelope_shape() {
        let Json(page) = JSend::page(
            vec!["a", "b"],
            Pagination {
                limit: 2,
                offset: 0,
                total: 5,
            },
        );
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["items"], serde_json::json!(["a", "b"]));
        assert_eq!(value["data"]["pagination"]["total"], 5);
    }

    #[test]
    fn test_friendly_query_error() {
        let msg = friendly_query_error("invalid digit found in string, expected u32");
        assert_eq!(
            msg,
            "Invalid query parameter: invalid digit found in string, expected non-negative integer"
        );
    }
}
