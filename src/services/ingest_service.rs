//! The media ingestion pipeline.
//!
//! One request flows through: authenticate, pre-check ownership, extract the
//! multipart field, validate its media type, buffer it, classify (video only),
//! upload under a fresh key, then re-read the record, re-check ownership and
//! commit the new reference with a version check. The record is written at
//! most once and only after the object store accepted the payload.

use axum::extract::{
    Multipart,
    multipart::{MultipartError, MultipartRejection},
};
use futures::TryStreamExt;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    buffer::UploadBuffer, classifier::classify, key_generator::generate_key, probe::MediaProbe,
};
use crate::{
    auth::JwtValidator,
    errors::IngestError,
    models::{
        asset::{AssetKind, MediaType},
        video::Video,
    },
    repository::VideoRepository,
    storage::ObjectStore,
};

/// Per-kind upload caps, in bytes.
#[derive(Clone, Copy, Debug)]
pub struct IngestLimits {
    pub max_thumbnail_bytes: u64,
    pub max_video_bytes: u64,
}

impl IngestLimits {
    pub fn for_kind(&self, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Thumbnail => self.max_thumbnail_bytes,
            AssetKind::Video => self.max_video_bytes,
        }
    }
}

#[derive(Clone)]
pub struct IngestService {
    videos: Arc<dyn VideoRepository>,
    objects: Arc<dyn ObjectStore>,
    probe: Arc<dyn MediaProbe>,
    validator: JwtValidator,
    bucket: String,
    temp_dir: PathBuf,
    limits: IngestLimits,
}

impl IngestService {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        objects: Arc<dyn ObjectStore>,
        probe: Arc<dyn MediaProbe>,
        validator: JwtValidator,
        bucket: impl Into<String>,
        temp_dir: impl Into<PathBuf>,
        limits: IngestLimits,
    ) -> Self {
        Self {
            videos,
            objects,
            probe,
            validator,
            bucket: bucket.into(),
            temp_dir: temp_dir.into(),
            limits,
        }
    }

    pub fn videos(&self) -> &Arc<dyn VideoRepository> {
        &self.videos
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn temp_dir(&self) -> &PathBuf {
        &self.temp_dir
    }

    pub fn limits(&self) -> IngestLimits {
        self.limits
    }

    /// Attach the uploaded asset of `kind` to video `video_id`.
    #[tracing::instrument(skip_all, fields(video_id = %video_id, kind = %kind))]
    pub async fn ingest(
        &self,
        video_id: Uuid,
        token: &str,
        kind: AssetKind,
        body: Result<Multipart, MultipartRejection>,
    ) -> Result<Video, IngestError> {
        let principal = self.validator.validate(token)?;
        debug!(%principal, "authenticated");

        self.load_owned(video_id, principal).await?;

        let limit = self.limits.for_kind(kind);
        let mut multipart = body.map_err(|rej| IngestError::BadRequest(rej.body_text()))?;
        let field = loop {
            match multipart
                .next_field()
                .await
                .map_err(|err| multipart_error(err, limit))?
            {
                Some(field) if field.name() == Some(kind.field_name()) => break field,
                Some(_) => continue,
                None => {
                    return Err(IngestError::BadRequest(format!(
                        "missing form field `{}`",
                        kind.field_name()
                    )));
                }
            }
        };

        let media_type = MediaType::parse(field.content_type().unwrap_or_default())?;
        if !kind.accepts(&media_type) {
            return Err(IngestError::UnsupportedMediaType(format!(
                "`{}` is not accepted for {}, expected one of {}",
                media_type,
                kind,
                kind.allowed_media_types().join(", ")
            )));
        }

        let chunks = field.map_err(move |err| multipart_error(err, limit));
        // Lives until this function returns; dropping it releases the buffer.
        let buffer = match kind {
            AssetKind::Thumbnail => UploadBuffer::in_memory(chunks, limit).await?,
            AssetKind::Video => {
                UploadBuffer::in_temp_file(chunks, limit, &self.temp_dir, media_type.extension())
                    .await?
            }
        };
        if buffer.is_empty() {
            return Err(IngestError::BadRequest("uploaded file is empty".into()));
        }

        let class = match buffer.path() {
            Some(path) => Some(classify(self.probe.as_ref(), path).await?),
            None => None,
        };

        let key = generate_key(kind, media_type.extension(), class)
            .map_err(|err| IngestError::Internal(format!("drawing key entropy: {err}")))?;
        let payload = buffer
            .stream()
            .await
            .map_err(|err| IngestError::Internal(format!("reopening buffer: {err}")))?;
        let stored = self
            .objects
            .put(&self.bucket, key.as_str(), payload, media_type.essence())
            .await?;
        debug!(
            key = %key,
            size_bytes = stored.size_bytes,
            etag = stored.etag.as_deref().unwrap_or("-"),
            backend = self.objects.backend_name(),
            "uploaded asset"
        );

        // Ownership may have changed while the upload was in flight.
        let mut video = self.load_owned(video_id, principal).await?;
        let previous = video.asset_ref(kind).map(str::to_owned);
        video.set_asset_ref(kind, stored.location);
        let updated = self.videos.update_video(&video).await?;

        info!(
            key = %key,
            previous = previous.as_deref().unwrap_or("none"),
            version = updated.version,
            "committed asset reference"
        );
        Ok(updated)
    }

    async fn load_owned(&self, video_id: Uuid, principal: Uuid) -> Result<Video, IngestError> {
        let video = self
            .videos
            .get_video(video_id)
            .await?
            .ok_or(IngestError::NotFound(video_id))?;
        if video.user_id != principal {
            return Err(IngestError::Forbidden(video_id));
        }
        Ok(video)
    }
}

fn multipart_error(err: MultipartError, limit: u64) -> IngestError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        IngestError::PayloadTooLarge { limit }
    } else {
        IngestError::BadRequest(err.body_text())
    }
}
