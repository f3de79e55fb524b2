//! Defines routes for media ingestion.
//!
//! ## Structure
//! - **Upload endpoints** (bearer token required)
//!   - `POST /videos/{id}/thumbnail`: multipart field `thumbnail`
//!   - `POST /videos/{id}/video`:     multipart field `video`
//!
//! - **Asset endpoint** (local backend only)
//!   - `GET  /assets/{bucket}/{*key}`
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`

use crate::{
    handlers::{
        asset_handlers::get_asset,
        health_handlers::{healthz, readyz},
        upload_handlers::{upload_thumbnail, upload_video},
    },
    services::ingest_service::IngestLimits,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Room for multipart boundaries and part headers on top of the payload cap.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

fn body_limit(max_payload: u64) -> DefaultBodyLimit {
    let limit = max_payload.saturating_add(MULTIPART_OVERHEAD);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

/// Build and return the router for all routes, carrying `AppState`.
///
/// Each upload route gets its own body cap derived from `limits`.
pub fn routes(limits: IngestLimits) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/videos/{id}/thumbnail",
            post(upload_thumbnail).layer(body_limit(limits.max_thumbnail_bytes)),
        )
        .route(
            "/videos/{id}/video",
            post(upload_video).layer(body_limit(limits.max_video_bytes)),
        )
        .route("/assets/{bucket}/{*key}", get(get_asset))
}
