//! Orchestration of the object and metadata stores for one image at a time.
//!
//! Uploads write the payload before the record and deletes remove the payload
//! before the record. Neither pair is transactional: a failure between the two
//! steps leaves an orphaned payload (upload) or a record pointing at a missing
//! payload (delete). Both are logged and left for the caller to see as an
//! ordinary `NotFound` on the dangling side.

use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::metadata::models::ImageRecord;
use crate::metadata::{MetadataError, MetadataStore};
use crate::object_store::{ObjectStore, ObjectStoreError};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Image not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    ObjectStore(ObjectStoreError),
    #[error(transparent)]
    Metadata(MetadataError),
}

impl From<ObjectStoreError> for GalleryError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(key) => GalleryError::NotFound(key),
            other => GalleryError::ObjectStore(other),
        }
    }
}

impl From<MetadataError> for GalleryError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::NotFound(id) => GalleryError::NotFound(id),
            other => GalleryError::Metadata(other),
        }
    }
}

/// An uploaded image as received from the client.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub title: String,
    pub description: String,
    /// Original file name, used for the key extension and content-type guess.
    pub file_name: Option<String>,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub data: Bytes,
}

pub struct Gallery {
    object_store: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl Gallery {
    pub fn new(object_store: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            object_store,
            metadata,
        }
    }

    pub async fn upload(&self, image: NewImage) -> Result<ImageRecord, GalleryError> {
        let id = generate_id();
        let now = Utc::now();
        let record = ImageRecord {
            storage_key: storage_key(&id, image.file_name.as_deref()),
            content_type: detect_content_type(
                image.content_type.as_deref(),
                image.file_name.as_deref(),
            ),
            id,
            title: image.title,
            description: image.description,
            size: image.data.len() as u64,
            created_at: now,
            updated_at: now,
        };

        let mut body = image.data.as_ref();
        self.object_store
            .upload(&record.storage_key, &mut body, &record.content_type)
            .await?;

        if let Err(e) = self.metadata.save(&record).await {
            tracing::error!(
                image_id = %record.id,
                key = %record.storage_key,
                error = %e,
                "Saving image metadata failed; payload left orphaned"
            );
            return Err(e.into());
        }

        tracing::debug!(image_id = %record.id, key = %record.storage_key, "Uploaded image");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<ImageRecord, GalleryError> {
        Ok(self.metadata.get(id).await?)
    }

    /// All images, newest first.
    pub async fn list(&self) -> Result<Vec<ImageRecord>, GalleryError> {
        let mut records = self.metadata.list().await?;
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Change title and/or description; `None` keeps the current value.
    pub async fn update(
        &self,
        id: &str,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<ImageRecord, GalleryError> {
        let mut record = self.metadata.get(id).await?;
        record.edit(title, description);
        self.metadata.save(&record).await?;

        tracing::debug!(image_id = %id, "Updated image");
        Ok(record)
    }

    pub async fn delete(&self, id: &str) -> Result<(), GalleryError> {
        let record = self.metadata.get(id).await?;

        match self.object_store.delete(&record.storage_key).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound(_)) => {
                tracing::warn!(
                    image_id = %id,
                    key = %record.storage_key,
                    "Image payload already missing"
                );
            }
            Err(e) => return Err(GalleryError::ObjectStore(e)),
        }

        if let Err(e) = self.metadata.delete(id).await {
            tracing::error!(
                image_id = %id,
                error = %e,
                "Deleting image metadata failed; record now points at a missing payload"
            );
            return Err(e.into());
        }

        tracing::debug!(image_id = %id, "Deleted image");
        Ok(())
    }

    /// Locator for the record's payload.
    pub async fn image_url(&self, record: &ImageRecord) -> Result<String, GalleryError> {
        Ok(self.object_store.resolve(&record.storage_key).await?)
    }

    /// Payload bytes and content type for a storage key.
    pub async fn content(&self, key: &str) -> Result<(Bytes, String), GalleryError> {
        Ok(self.object_store.fetch(key).await?)
    }

    pub fn object_store_identifier(&self) -> String {
        self.object_store.identifier()
    }
}

/// New random image id: 32 lowercase hex characters.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Storage key for an image: its id plus the original file's extension.
pub fn storage_key(id: &str, file_name: Option<&str>) -> String {
    let ext = file_name
        .map(Path::new)
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());

    match ext {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

/// Content type for an upload: the declared type, unless it is missing or
/// generic, else a guess from the file name.
pub fn detect_content_type(declared: Option<&str>, file_name: Option<&str>) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .or_else(|| {
            file_name
                .and_then(|n| mime_guess::from_path(n).first())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_storage_key_uses_extension() {
        assert_eq!(storage_key("abc", Some("cat.png")), "abc.png");
        assert_eq!(storage_key("abc", Some("archive.tar.gz")), "abc.gz");
        assert_eq!(storage_key("abc", Some("README")), "abc");
        assert_eq!(storage_key("abc", Some("../../evil.jpg")), "abc.jpg");
        assert_eq!(storage_key("abc", None), "abc");
    }

    #[test]
    fn test_detect_content_type() {
        assert_eq!(
            detect_content_type(Some("image/webp"), Some("x.png")),
            "image/webp"
        );
        assert_eq!(
            detect_content_type(Some("application/octet-stream"), Some("x.png")),
            "image/png"
        );
        assert_eq!(detect_content_type(None, Some("x.gif")), "image/gif");
        assert_eq!(
            detect_content_type(None, Some("unknown")),
            "application/octet-stream"
        );
        assert_eq!(detect_content_type(None, None), "application/octet-stream");
    }
}
