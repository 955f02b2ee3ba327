mod gcs;
pub mod keys;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over image payload backends.
/// Keys are `<id>.<ext>` -- the payloads are meaningless without their records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write everything `reader` yields to `key`, replacing any existing payload.
    async fn upload(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    /// Locator an HTTP client can use to fetch the payload later.
    async fn resolve(&self, key: &str) -> Result<String, ObjectStoreError>;

    /// Full payload plus a best-effort content type.
    async fn fetch(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Bucket name or local root path.
    fn identifier(&self) -> String;
}
