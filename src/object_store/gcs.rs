use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::keys::{serve_path, validate_key, DEFAULT_CONTENT_TYPE};
use super::{ObjectStore, ObjectStoreError};
use crate::gcp::GcpAuth;

const API_BASE: &str = "https://storage.googleapis.com";

/// Google Cloud Storage object store backend.
pub struct GcsStore {
    bucket: String,
    client: Client,
    auth: Arc<GcpAuth>,
}

impl GcsStore {
    pub fn new(bucket: &str, client: Client, auth: Arc<GcpAuth>) -> Self {
        Self {
            bucket: bucket.to_string(),
            client,
            auth,
        }
    }

    async fn bearer(&self) -> Result<String, ObjectStoreError> {
        self.auth
            .token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCP auth failed: {e}")))
    }

    fn upload_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        Url::parse_with_params(
            &format!("{API_BASE}/upload/storage/v1/b/{}/o", self.bucket),
            &[("uploadType", "media"), ("name", key)],
        )
        .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    /// `.../b/<bucket>/o/<key>` with the key as a single encoded path segment.
    fn object_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url =
            Url::parse(API_BASE).map_err(|e| ObjectStoreError::Backend(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ObjectStoreError::Backend("storage URL cannot be a base".into()))?
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", key]);
        Ok(url)
    }

    fn download_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

async fn backend_failure(op: &str, resp: reqwest::Response) -> ObjectStoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    ObjectStoreError::Backend(format!("GCS {op} failed ({status}): {body}"))
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn upload(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;

        let token = self.bearer().await?;
        let resp = self
            .client
            .post(self.upload_url(key)?)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(backend_failure("upload", resp).await);
        }

        tracing::debug!(key, bucket = %self.bucket, "Uploaded object to GCS");
        Ok(())
    }

    async fn resolve(&self, key: &str) -> Result<String, ObjectStoreError> {
        // Payloads are proxied through the API rather than linked directly.
        Ok(serve_path(key))
    }

    async fn fetch(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer().await?;

        let resp = self
            .client
            .get(self.download_url(key)?)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("download", resp).await);
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let data = resp
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok((data, content_type))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer().await?;

        let resp = self
            .client
            .delete(self.object_url(key)?)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            return Err(backend_failure("delete", resp).await);
        }

        Ok(())
    }

    fn identifier(&self) -> String {
        self.bucket.clone()
    }
}
