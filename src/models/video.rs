//! Represents a video record whose media assets are managed by this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::asset::AssetKind;

/// A video entry owned by a single user.
///
/// Records are created elsewhere; this service only swaps the asset
/// references once the referenced object is durably stored.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,

    /// Owner allowed to mutate this record.
    pub user_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Location of the stored thumbnail image, if any.
    pub thumbnail_url: Option<String>,

    /// Location of the stored video file, if any.
    pub video_url: Option<String>,

    /// Optimistic concurrency token, bumped on every update.
    pub version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// Current reference for the given asset kind.
    pub fn asset_ref(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Thumbnail => self.thumbnail_url.as_deref(),
            AssetKind::Video => self.video_url.as_deref(),
        }
    }

    /// Point the asset reference for `kind` at `location`.
    pub fn set_asset_ref(&mut self, kind: AssetKind, location: String) {
        match kind {
            AssetKind::Thumbnail => self.thumbnail_url = Some(location),
            AssetKind::Video => self.video_url = Some(location),
        }
    }
}
