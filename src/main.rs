use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod errors;
mod handlers;
mod models;
mod repository;
mod routes;
mod services;
mod state;
mod storage;

use config::{AppConfig, StorageBackend};
use services::{
    ingest_service::{IngestLimits, IngestService},
    probe::FfprobeProbe,
};
use state::AppState;
use storage::{HttpObjectStore, LocalObjectStore, ObjectStore};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-ingest with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    if let Some(parent) = connect_options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    // --- Handle migration mode ---
    repository::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Ensure scratch directory exists ---
    if !cfg.temp_dir.exists() {
        fs::create_dir_all(&cfg.temp_dir)?;
        tracing::info!("Created temp directory at {}", cfg.temp_dir.display());
    }

    // --- Select object store ---
    let (objects, assets): (Arc<dyn ObjectStore>, Option<LocalObjectStore>) =
        match cfg.storage_backend {
            StorageBackend::Local => {
                if !Path::new(&cfg.storage_dir).exists() {
                    fs::create_dir_all(&cfg.storage_dir)?;
                    tracing::info!("Created storage directory at {}", cfg.storage_dir);
                }
                let public_base_url = cfg
                    .public_base_url
                    .clone()
                    .context("public base url missing for local backend")?;
                let local = LocalObjectStore::new(&cfg.storage_dir, public_base_url);
                tracing::info!("Storing assets under {}", local.base_path().display());
                let objects: Arc<dyn ObjectStore> = Arc::new(local.clone());
                (objects, Some(local))
            }
            StorageBackend::Http => {
                let endpoint = cfg
                    .storage_endpoint
                    .clone()
                    .context("storage endpoint missing for http backend")?;
                tracing::info!("Using remote object store at {}", endpoint);
                let objects: Arc<dyn ObjectStore> =
                    Arc::new(HttpObjectStore::new(endpoint, cfg.public_base_url.clone()));
                (objects, None)
            }
        };

    // --- Initialize core service ---
    let ingest = IngestService::new(
        Arc::new(repository::SqliteVideoRepository::new(db.clone())),
        objects,
        Arc::new(FfprobeProbe::new(cfg.ffprobe_path.clone(), cfg.probe_timeout)),
        auth::JwtValidator::new(&cfg.jwt_secret, &cfg.jwt_issuer),
        cfg.bucket.clone(),
        cfg.temp_dir.clone(),
        IngestLimits {
            max_thumbnail_bytes: cfg.max_thumbnail_bytes,
            max_video_bytes: cfg.max_video_bytes,
        },
    );

    // --- Build router ---
    let limits = ingest.limits();
    let app: Router = routes::routes::routes(limits).with_state(AppState { ingest, assets });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
