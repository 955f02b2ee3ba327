use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_gallery::{
    api,
    config::{Config, StorageBackend},
    gallery::Gallery,
    gcp::GcpAuth,
    metadata::{self as meta, MetadataStore},
    object_store::{self as obj, ObjectStore},
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "image-gallery starting");

    let config = Config::load()?;
    info!(backend = config.storage.backend.as_str(), "Loaded configuration");

    // Both stores are chosen once here and never swapped at runtime.
    let (object_store, metadata): (Arc<dyn ObjectStore>, Arc<dyn MetadataStore>) =
        match config.storage.backend {
            StorageBackend::Local => {
                let root = &config.storage.local_storage_path;
                let store: Arc<dyn ObjectStore> = Arc::new(obj::LocalStore::new(root)?);
                info!("Using local storage at: {}", root);
                let db = meta::LocalMetadataStore::open(root)?;
                info!("Using local database at: {}", db.file_path().display());
                let db: Arc<dyn MetadataStore> = Arc::new(db);
                (store, db)
            }
            StorageBackend::Gcp => {
                let bucket = config
                    .storage
                    .gcs_bucket
                    .as_deref()
                    .context("GCS_BUCKET is required for the gcp backend")?;
                let project = config
                    .storage
                    .gcp_project_id
                    .as_deref()
                    .context("GCP_PROJECT_ID is required for the gcp backend")?;

                let client = reqwest::Client::builder().build()?;
                let auth = Arc::new(
                    GcpAuth::new(client.clone(), config.storage.gcp_credentials_file.as_deref())
                        .await?,
                );

                let store: Arc<dyn ObjectStore> =
                    Arc::new(obj::GcsStore::new(bucket, client.clone(), Arc::clone(&auth)));
                let db: Arc<dyn MetadataStore> = Arc::new(meta::FirestoreStore::new(
                    project,
                    &config.storage.firestore_collection,
                    client,
                    auth,
                ));
                info!(
                    "Using GCS bucket {} and Firestore collection {}/{}",
                    bucket, project, config.storage.firestore_collection
                );
                (store, db)
            }
        };

    let state = Arc::new(AppState {
        config: config.clone(),
        gallery: Gallery::new(object_store, metadata),
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
