//! Upload endpoints. Both delegate to the same pipeline with a different
//! asset kind.

use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
    },
    http::HeaderMap,
};
use uuid::Uuid;

use crate::{
    auth::bearer_token,
    errors::{AppError, IngestError},
    models::{asset::AssetKind, video::Video},
    state::AppState,
};

/// `POST /videos/{id}/thumbnail` with multipart field `thumbnail`.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    upload(state, &video_id, &headers, AssetKind::Thumbnail, multipart).await
}

/// `POST /videos/{id}/video` with multipart field `video`.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    upload(state, &video_id, &headers, AssetKind::Video, multipart).await
}

async fn upload(
    state: AppState,
    raw_id: &str,
    headers: &HeaderMap,
    kind: AssetKind,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video_id = Uuid::parse_str(raw_id)
        .map_err(|_| IngestError::BadRequest(format!("invalid video id `{}`", raw_id)))?;
    let token = bearer_token(headers).map_err(IngestError::from)?;

    let video = state
        .ingest
        .ingest(video_id, token, kind, multipart)
        .await?;
    Ok(Json(video))
}
