//! Shared test helpers for router tests.

use std::sync::Arc;

use crate::config::{Config, ServerConfig, StorageConfig};
use crate::gallery::Gallery;
use crate::metadata::LocalMetadataStore;
use crate::object_store::LocalStore;
use crate::AppState;

/// Create a test AppState with both local stores rooted in a temporary directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let root = temp_dir.path().join("images");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            local_storage_path: root.to_string_lossy().to_string(),
            ..StorageConfig::default()
        },
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let object_store = LocalStore::new(&root).expect("Failed to create test object store");
    let metadata = LocalMetadataStore::open(&root).expect("Failed to open test metadata store");

    Arc::new(AppState {
        config,
        gallery: Gallery::new(Arc::new(object_store), Arc::new(metadata)),
    })
}
