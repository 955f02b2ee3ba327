use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::models::ImageRecord;
use super::{MetadataError, MetadataStore};

const DB_DIR: &str = "db";
const DB_FILE: &str = "images.json";

/// Records kept in memory and mirrored to `<root>/db/images.json`.
///
/// Every mutation rewrites the whole document while the write lock is still
/// held, so readers in this process never see the map and the file disagree.
/// The rewrite goes through a temp file and a rename; if it fails the
/// in-memory change is rolled back.
///
/// Mutations run on their own task. Dropping the caller's future does not stop
/// a save or delete halfway between the map and the file.
pub struct LocalMetadataStore {
    document: Arc<Document>,
}

struct Document {
    file_path: PathBuf,
    records: RwLock<HashMap<String, ImageRecord>>,
}

impl LocalMetadataStore {
    /// Open (or create) the store rooted at `root`.
    ///
    /// A missing document means an empty store; a document that does not
    /// parse is an error.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, MetadataError> {
        let db_dir = root.as_ref().join(DB_DIR);
        std::fs::create_dir_all(&db_dir)?;

        let file_path = db_dir.join(DB_FILE);
        let records = load_records(&file_path)?;

        tracing::debug!(
            path = %file_path.display(),
            records = records.len(),
            "Opened local metadata store"
        );

        Ok(Self {
            document: Arc::new(Document {
                file_path,
                records: RwLock::new(records),
            }),
        })
    }

    /// Location of the backing JSON document.
    pub fn file_path(&self) -> &Path {
        &self.document.file_path
    }
}

impl Document {
    async fn save(&self, record: ImageRecord) -> Result<(), MetadataError> {
        let mut records = self.records.write().await;
        let id = record.id.clone();
        let previous = records.insert(id.clone(), record);

        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(prev) => records.insert(id, prev),
                None => records.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, id: String) -> Result<(), MetadataError> {
        let mut records = self.records.write().await;
        let removed = records
            .remove(&id)
            .ok_or_else(|| MetadataError::NotFound(id.clone()))?;

        if let Err(e) = self.persist(&records).await {
            records.insert(id, removed);
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, records: &HashMap<String, ImageRecord>) -> Result<(), MetadataError> {
        let list: Vec<&ImageRecord> = records.values().collect();
        let data = serde_json::to_vec_pretty(&list)?;

        let tmp = self.file_path.with_extension("json.tmp");
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &self.file_path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn load_records(path: &Path) -> Result<HashMap<String, ImageRecord>, MetadataError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    let list: Vec<ImageRecord> =
        serde_json::from_slice(&data).map_err(|source| MetadataError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(list.into_iter().map(|r| (r.id.clone(), r)).collect())
}

fn join_error(e: tokio::task::JoinError) -> MetadataError {
    MetadataError::Backend(format!("metadata write task failed: {e}"))
}

#[async_trait]
impl MetadataStore for LocalMetadataStore {
    async fn save(&self, record: &ImageRecord) -> Result<(), MetadataError> {
        debug_assert!(!record.id.is_empty(), "record id must not be empty");

        let document = Arc::clone(&self.document);
        let record = record.clone();
        tokio::spawn(async move { document.save(record).await })
            .await
            .map_err(join_error)?
    }

    async fn get(&self, id: &str) -> Result<ImageRecord, MetadataError> {
        self.document
            .records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError> {
        Ok(self.document.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        let document = Arc::clone(&self.document);
        let id = id.to_string();
        tokio::spawn(async move { document.delete(id).await })
            .await
            .map_err(join_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> ImageRecord {
        let now = Utc::now();
        ImageRecord {
            id: id.to_string(),
            title: "t".into(),
            description: String::new(),
            storage_key: format!("{id}.png"),
            content_type: "image/png".into(),
            size: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMetadataStore::open(dir.path()).unwrap();
        store.save(&record("keep")).await.unwrap();

        // A directory in place of the temp file makes the rewrite fail.
        let tmp = store.file_path().with_extension("json.tmp");
        std::fs::create_dir(&tmp).unwrap();

        assert!(store.save(&record("lost")).await.is_err());
        assert!(matches!(
            store.get("lost").await,
            Err(MetadataError::NotFound(_))
        ));

        assert!(store.delete("keep").await.is_err());
        assert!(store.get("keep").await.is_ok());
    }

    #[tokio::test]
    async fn test_no_temp_file_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMetadataStore::open(dir.path()).unwrap();
        store.save(&record("a")).await.unwrap();

        assert!(store.file_path().exists());
        assert!(!store.file_path().with_extension("json.tmp").exists());
    }
}
