//! image-gallery - An image hosting backend with swappable storage
//!
//! This crate provides image upload, metadata editing and content serving with:
//! - Swappable object storage backends for payloads (local filesystem, GCS)
//! - Swappable metadata backends for records (local JSON document, Firestore)
//! - A gallery service sequencing both stores per request
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod gallery;
pub mod gcp;
pub mod metadata;
pub mod object_store;
#[cfg(test)]
pub mod testutil;

use config::Config;
use gallery::Gallery;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub gallery: Gallery,
}
