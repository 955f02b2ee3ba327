use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// GCS for payloads, Firestore for records
    Gcp,
    /// Local directory for both
    Local,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Gcp => "gcp",
            StorageBackend::Local => "local",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend (payloads + `db/images.json`)
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcp)
    pub gcs_bucket: Option<String>,
    /// GCP project hosting Firestore (required when backend is gcp)
    pub gcp_project_id: Option<String>,
    pub firestore_collection: String,
    /// Path to a service account JSON key (optional, defaults to the metadata server)
    pub gcp_credentials_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./data/images".to_string(),
            gcs_bucket: None,
            gcp_project_id: None,
            firestore_collection: "image-gallery".to_string(),
            gcp_credentials_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat empty values as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let max_upload_size = match var("MAX_UPLOAD_SIZE") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "MAX_UPLOAD_SIZE must be a byte count, got '{raw}'"
                ))
            })?,
            None => 10 * 1024 * 1024, // 10MB
        };

        let backend = match var("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local,
            "gcp" | "gcs" => StorageBackend::Gcp,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "STORAGE_BACKEND must be 'local' or 'gcp', got '{other}'"
                )))
            }
        };

        let defaults = StorageConfig::default();
        let config = Config {
            server: ServerConfig { bind_address },
            storage: StorageConfig {
                backend,
                local_storage_path: var("LOCAL_STORAGE_PATH")
                    .unwrap_or(defaults.local_storage_path),
                gcs_bucket: var("GCS_BUCKET"),
                gcp_project_id: var("GCP_PROJECT_ID"),
                firestore_collection: var("FIRESTORE_COLLECTION")
                    .unwrap_or(defaults.firestore_collection),
                gcp_credentials_file: var("GCP_CREDENTIALS_FILE"),
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Gcp {
            if self.storage.gcs_bucket.is_none() {
                return Err(ConfigError::ValidationError(
                    "GCS_BUCKET is required when STORAGE_BACKEND=gcp".to_string(),
                ));
            }
            if self.storage.gcp_project_id.is_none() {
                return Err(ConfigError::ValidationError(
                    "GCP_PROJECT_ID is required when STORAGE_BACKEND=gcp".to_string(),
                ));
            }
        }

        if self.storage.backend == StorageBackend::Local && self.storage.gcs_bucket.is_some() {
            tracing::warn!("GCS_BUCKET is set but STORAGE_BACKEND=local; it will be ignored");
        }

        Ok(())
    }
}
