use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::keys::{content_type_for_key, object_path, serve_path};
use super::{ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and single-host deployments.
///
/// One file per key under `base_path`. Uploads land in a hidden temp file next
/// to the target and are renamed into place, so a reader never sees a
/// half-written payload under its key.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        object_path(&self.base_path, key)
    }

    async fn write_file(
        path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, std::io::Error> {
        // Opened synchronously: a cancelled async open could still create the
        // file after the temp guard has cleaned up.
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o644);

        let mut file = tokio::fs::File::from_std(options.open(path)?);
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    /// Path of an existing regular file for `key`; directories count as missing.
    async fn existing_file(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(ObjectStoreError::NotFound(key.to_string())),
            Err(e) => Err(not_found_or_io(key, e)),
        }
    }
}

/// Removes the temp file on drop unless the upload committed it.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

fn not_found_or_io(key: &str, e: std::io::Error) -> ObjectStoreError {
    if e.kind() == ErrorKind::NotFound {
        ObjectStoreError::NotFound(key.to_string())
    } else {
        ObjectStoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = TempFile::new(temp_path(&path));
        let written = Self::write_file(&tmp.path, reader).await?;
        tokio::fs::rename(&tmp.path, &path).await?;
        tmp.committed = true;

        tracing::debug!(key, bytes = written, content_type, "Stored object");
        Ok(())
    }

    async fn resolve(&self, key: &str) -> Result<String, ObjectStoreError> {
        Ok(serve_path(key))
    }

    async fn fetch(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError> {
        let path = self.existing_file(key).await?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        Ok((Bytes::from(data), content_type_for_key(key).to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.existing_file(key).await?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))
    }

    fn identifier(&self) -> String {
        self.base_path.display().to_string()
    }
}
