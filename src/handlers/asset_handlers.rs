//! Serves assets stored by the local backend.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

use crate::{errors::AppError, models::asset::MediaType, state::AppState};

/// `GET /assets/{bucket}/{*key}`, streamed from disk.
pub async fn get_asset(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let store = state
        .assets
        .as_ref()
        .ok_or_else(|| AppError::not_found("assets are not served by this instance"))?;

    let (file, len) = store.open(&bucket, &key).await?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;

    let content_type = key
        .rsplit_once('.')
        .and_then(|(_, ext)| MediaType::from_extension(ext))
        .unwrap_or("application/octet-stream");
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    Ok(response)
}
