use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use image_gallery::metadata::models::ImageRecord;
use image_gallery::metadata::{LocalMetadataStore, MetadataError, MetadataStore};

fn test_store() -> (tempfile::TempDir, LocalMetadataStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalMetadataStore::open(dir.path()).unwrap();
    (dir, store)
}

fn sample_record(id: &str) -> ImageRecord {
    let now = Utc::now();
    ImageRecord {
        id: id.to_string(),
        title: "Test Image".to_string(),
        description: "A test image".to_string(),
        storage_key: format!("{id}.png"),
        content_type: "image/png".to_string(),
        size: 1024,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_save_and_get() {
    let (_dir, store) = test_store();
    let record = sample_record("img-1");

    store.save(&record).await.unwrap();

    let retrieved = store.get("img-1").await.unwrap();
    assert_eq!(retrieved, record);
}

#[tokio::test]
async fn test_get_not_found() {
    let (_dir, store) = test_store();
    assert!(matches!(
        store.get("nonexistent").await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete() {
    let (_dir, store) = test_store();
    store.save(&sample_record("img-2")).await.unwrap();

    store.delete("img-2").await.unwrap();
    assert!(matches!(
        store.get("img-2").await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_not_found() {
    let (_dir, store) = test_store();
    assert!(matches!(
        store.delete("nonexistent").await,
        Err(MetadataError::NotFound(_))
    ));

    // Deleting twice fails the second time.
    store.save(&sample_record("once")).await.unwrap();
    store.delete("once").await.unwrap();
    assert!(matches!(
        store.delete("once").await,
        Err(MetadataError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_save_replaces_whole_record() {
    let (_dir, store) = test_store();
    let original = sample_record("img-3");
    store.save(&original).await.unwrap();

    let replacement = ImageRecord {
        title: "Renamed".to_string(),
        description: String::new(),
        updated_at: original.updated_at + Duration::seconds(5),
        ..original.clone()
    };
    store.save(&replacement).await.unwrap();

    let retrieved = store.get("img-3").await.unwrap();
    assert_eq!(retrieved, replacement);
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_is_idempotent() {
    let (_dir, store) = test_store();
    let record = sample_record("same");
    store.save(&record).await.unwrap();
    store.save(&record).await.unwrap();

    assert_eq!(store.list().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_list_returns_every_record() {
    let (_dir, store) = test_store();
    assert!(store.list().await.unwrap().is_empty());

    for id in ["a", "b", "c", "d"] {
        store.save(&sample_record(id)).await.unwrap();
    }

    let ids: HashSet<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    let expected: HashSet<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let record = sample_record("durable");
    {
        let store = LocalMetadataStore::open(dir.path()).unwrap();
        store.save(&record).await.unwrap();
        store.save(&sample_record("gone")).await.unwrap();
        store.delete("gone").await.unwrap();
    }

    let reopened = LocalMetadataStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get("durable").await.unwrap(), record);
    assert!(matches!(
        reopened.get("gone").await,
        Err(MetadataError::NotFound(_))
    ));
    assert_eq!(reopened.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_document_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalMetadataStore::open(dir.path()).unwrap();
    store.save(&sample_record("layout")).await.unwrap();

    let path = dir.path().join("db").join("images.json");
    assert_eq!(store.file_path(), path.as_path());

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let entries = doc.as_array().expect("document is a JSON array");
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry["id"], "layout");
    assert_eq!(entry["s3Key"], "layout.png");
    assert_eq!(entry["contentType"], "image/png");
    assert_eq!(entry["size"], 1024);
    assert!(entry["createdAt"].is_string());
    assert!(entry["updatedAt"].is_string());
}

#[tokio::test]
async fn test_loads_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("db")).unwrap();
    std::fs::write(
        dir.path().join("db/images.json"),
        r#"[
          {
            "id": "seeded",
            "title": "Seeded",
            "description": "",
            "s3Key": "seeded.jpg",
            "contentType": "image/jpeg",
            "size": 42,
            "createdAt": "2024-01-02T03:04:05Z",
            "updatedAt": "2024-01-02T03:04:05Z"
          }
        ]"#,
    )
    .unwrap();

    let store = LocalMetadataStore::open(dir.path()).unwrap();
    let record = store.get("seeded").await.unwrap();
    assert_eq!(record.title, "Seeded");
    assert_eq!(record.size, 42);
    assert_eq!(record.created_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
}

#[tokio::test]
async fn test_corrupt_document_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("db")).unwrap();
    std::fs::write(dir.path().join("db/images.json"), "{ not json").unwrap();

    let result = LocalMetadataStore::open(dir.path());
    assert!(matches!(result, Err(MetadataError::Corrupt { .. })));
}

#[tokio::test]
async fn test_open_creates_db_directory_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalMetadataStore::open(dir.path()).unwrap();

    assert!(dir.path().join("db").is_dir());
    // Nothing is written until the first mutation.
    assert!(!store.file_path().exists());
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_all_persist() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalMetadataStore::open(dir.path()).unwrap());

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.save(&sample_record(&format!("c-{i}"))).await.unwrap();
            store.get(&format!("c-{i}")).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.list().await.unwrap().len(), 32);

    let reopened = LocalMetadataStore::open(dir.path()).unwrap();
    assert_eq!(reopened.list().await.unwrap().len(), 32);
}

#[tokio::test]
async fn test_cancelled_save_still_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let seeded: Vec<ImageRecord> = (0..3000)
        .map(|i| sample_record(&format!("seed-{i}")))
        .collect();
    std::fs::create_dir_all(dir.path().join("db")).unwrap();
    std::fs::write(
        dir.path().join("db/images.json"),
        serde_json::to_vec(&seeded).unwrap(),
    )
    .unwrap();
    let store = LocalMetadataStore::open(dir.path()).unwrap();

    // The caller gives up long before the document rewrite can finish.
    let _ = tokio::time::timeout(
        std::time::Duration::from_micros(1),
        store.save(&sample_record("late")),
    )
    .await;
    let _ = tokio::time::timeout(
        std::time::Duration::from_micros(1),
        store.delete("seed-0"),
    )
    .await;

    // Queued behind the abandoned writes, so they have settled once this returns.
    store.save(&sample_record("after")).await.unwrap();

    assert!(store.get("late").await.is_ok());
    assert!(store.get("seed-0").await.is_err());

    let reopened = LocalMetadataStore::open(dir.path()).unwrap();
    assert!(reopened.get("late").await.is_ok());
    assert!(matches!(
        reopened.get("seed-0").await,
        Err(MetadataError::NotFound(_))
    ));
    assert_eq!(
        reopened.list().await.unwrap().len(),
        store.list().await.unwrap().len()
    );
}
