//! Key handling shared by the object store backends.
//!
//! Keys are opaque strings to callers, but the local backend maps them
//! straight onto file names under its root, so every key is checked before it
//! touches the filesystem.

use std::path::{Component, Path, PathBuf};

use super::ObjectStoreError;

/// Prefix under which the HTTP API serves payloads.
pub const SERVE_PREFIX: &str = "/images/";

/// Content type reported when a key has no recognised image extension.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Validates and normalizes a key into a relative path.
///
/// Rejects keys that are empty, absolute, or contain `..`, root or prefix
/// components. `.` components are dropped.
pub fn validate_key(key: &str) -> Result<PathBuf, ObjectStoreError> {
    if key.is_empty() {
        return Err(ObjectStoreError::InvalidKey("key cannot be empty".into()));
    }

    let path = Path::new(key);
    if path.is_absolute() {
        return Err(ObjectStoreError::InvalidKey(format!(
            "key cannot be absolute: {key}"
        )));
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ObjectStoreError::InvalidKey(format!(
                    "key cannot contain '..': {key}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ObjectStoreError::InvalidKey(format!(
                    "key cannot contain root or prefix: {key}"
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ObjectStoreError::InvalidKey(format!(
            "key normalized to an empty path: {key}"
        )));
    }

    Ok(normalized)
}

/// Filesystem location of `key` under `root`.
pub fn object_path(root: &Path, key: &str) -> Result<PathBuf, ObjectStoreError> {
    Ok(root.join(validate_key(key)?))
}

/// Infer an image content type from the key's extension.
///
/// Extensions match exactly, so `a.PNG` falls through to the default.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = Path::new(key).extension().and_then(|e| e.to_str());

    match ext {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Locator under which the API serves the payload for `key`.
pub fn serve_path(key: &str) -> String {
    format!("{SERVE_PREFIX}{key}")
}
