use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::models::ImageRecord;
use super::{MetadataError, MetadataStore};
use crate::gcp::GcpAuth;

const API_BASE: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: &str = "300";

/// Cloud Firestore metadata backend.
///
/// One document per record in a single collection, document id = record id.
/// Fields map 1:1 onto the record: strings as `stringValue`, `size` as
/// `integerValue`, timestamps as RFC3339 `stringValue`.
pub struct FirestoreStore {
    client: Client,
    auth: Arc<GcpAuth>,
    project_id: String,
    collection: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(project_id: &str, collection: &str, client: Client, auth: Arc<GcpAuth>) -> Self {
        Self {
            client,
            auth,
            project_id: project_id.to_string(),
            collection: collection.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String, MetadataError> {
        self.auth
            .token()
            .await
            .map_err(|e| MetadataError::Backend(format!("GCP auth failed: {e}")))
    }

    fn collection_url(&self) -> Result<Url, MetadataError> {
        let mut url = Url::parse(API_BASE).map_err(|e| MetadataError::Backend(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MetadataError::Backend("Firestore URL cannot be a base".into()))?
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                self.collection.as_str(),
            ]);
        Ok(url)
    }

    fn document_url(&self, id: &str) -> Result<Url, MetadataError> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| MetadataError::Backend("Firestore URL cannot be a base".into()))?
            .push(id);
        Ok(url)
    }
}

async fn backend_failure(op: &str, resp: reqwest::Response) -> MetadataError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    MetadataError::Backend(format!("Firestore {op} failed ({status}): {body}"))
}

fn backend(e: reqwest::Error) -> MetadataError {
    MetadataError::Backend(e.to_string())
}

/// Marshal a record into a Firestore document body.
fn to_document(record: &ImageRecord) -> Value {
    json!({
        "fields": {
            "id": { "stringValue": record.id },
            "title": { "stringValue": record.title },
            "description": { "stringValue": record.description },
            "s3Key": { "stringValue": record.storage_key },
            "contentType": { "stringValue": record.content_type },
            "size": { "integerValue": record.size.to_string() },
            "createdAt": { "stringValue": record.created_at.to_rfc3339() },
            "updatedAt": { "stringValue": record.updated_at.to_rfc3339() },
        }
    })
}

/// Unmarshal a Firestore document into a record.
fn from_document(doc: &Value) -> Result<ImageRecord, MetadataError> {
    let fields = doc
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| MetadataError::Backend("document has no fields".into()))?;

    Ok(ImageRecord {
        id: string_field(fields, "id")?,
        title: optional_string_field(fields, "title"),
        description: optional_string_field(fields, "description"),
        storage_key: string_field(fields, "s3Key")?,
        content_type: string_field(fields, "contentType")?,
        size: integer_field(fields, "size")?,
        created_at: timestamp_field(fields, "createdAt")?,
        updated_at: timestamp_field(fields, "updatedAt")?,
    })
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<String, MetadataError> {
    fields
        .get(name)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MetadataError::Backend(format!("missing string attribute '{name}'")))
}

fn optional_string_field(fields: &Map<String, Value>, name: &str) -> String {
    string_field(fields, name).unwrap_or_default()
}

fn integer_field(fields: &Map<String, Value>, name: &str) -> Result<u64, MetadataError> {
    let value = fields.get(name).and_then(|v| v.get("integerValue"));
    // The REST API sends int64 as a decimal string.
    let parsed = match value {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| MetadataError::Backend(format!("missing integer attribute '{name}'")))
}

fn timestamp_field(fields: &Map<String, Value>, name: &str) -> Result<DateTime<Utc>, MetadataError> {
    let raw = string_field(fields, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MetadataError::Backend(format!("bad timestamp in '{name}': {e}")))
}

#[async_trait]
impl MetadataStore for FirestoreStore {
    async fn save(&self, record: &ImageRecord) -> Result<(), MetadataError> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .patch(self.document_url(&record.id)?)
            .bearer_auth(&token)
            .json(&to_document(record))
            .send()
            .await
            .map_err(backend)?;

        if !resp.status().is_success() {
            return Err(backend_failure("save", resp).await);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ImageRecord, MetadataError> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(self.document_url(id)?)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(backend)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(backend_failure("get", resp).await);
        }

        let doc: Value = resp.json().await.map_err(backend)?;
        from_document(&doc)
    }

    async fn list(&self) -> Result<Vec<ImageRecord>, MetadataError> {
        let token = self.bearer().await?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url()?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(ref t) = page_token {
                    query.append_pair("pageToken", t);
                }
            }

            let resp = self
                .client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(backend)?;

            if !resp.status().is_success() {
                return Err(backend_failure("list", resp).await);
            }

            let page: ListDocumentsResponse = resp.json().await.map_err(backend)?;
            for doc in &page.documents {
                records.push(from_document(doc)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        let token = self.bearer().await?;
        let mut url = self.document_url(id)?;
        url.query_pairs_mut()
            .append_pair("currentDocument.exists", "true");

        let resp = self
            .client
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(backend)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(backend_failure("delete", resp).await);
        }
        Ok(())
    }
}
