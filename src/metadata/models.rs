use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one stored image.
///
/// `id`, `storage_key`, `content_type`, `size` and `created_at` are fixed at
/// upload time; only `title` and `description` change afterwards, and every
/// change refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Key of the payload in the object store.
    #[serde(rename = "s3Key")]
    pub storage_key: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Replace the editable fields and bump `updated_at`.
    pub fn edit(&mut self, title: Option<String>, description: Option<String>) {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        self.updated_at = Utc::now();
    }
}
