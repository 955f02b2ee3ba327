mod firestore;
mod local;
pub mod models;

pub use firestore::FirestoreStore;
pub use local::LocalMetadataStore;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use models::ImageRecord;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt metadata file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over image record backends, keyed by record id.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or fully replace the record with `record.id`.
    async fn save(&self, record: &ImageRecord) -> Result<(), MetadataError>;

    async fn get(&self, id: &str) -> Result<ImageRecord, MetadataError>;

    /// Every stored record, in no particular order.
    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError>;

    async fn delete(&self, id: &str) -> Result<(), MetadataError>;
}
