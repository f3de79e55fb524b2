//! Asset kinds, media types and aspect classes for uploaded media.

use mime::Mime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The kind of asset being attached to a video record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Thumbnail,
    Video,
}

impl AssetKind {
    /// Multipart form field carrying the payload.
    pub fn field_name(self) -> &'static str {
        match self {
            AssetKind::Thumbnail => "thumbnail",
            AssetKind::Video => "video",
        }
    }

    /// Media types accepted for this kind, compared against the parsed essence.
    pub fn allowed_media_types(self) -> &'static [&'static str] {
        match self {
            AssetKind::Thumbnail => &["image/jpeg", "image/png"],
            AssetKind::Video => &["video/mp4"],
        }
    }

    pub fn accepts(self, media_type: &MediaType) -> bool {
        self.allowed_media_types()
            .iter()
            .any(|allowed| *allowed == media_type.essence())
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Coarse aspect-ratio class of a video stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClass {
    /// Around 16:9.
    Landscape,
    /// Around 9:16.
    Portrait,
    Other,
}

impl AspectClass {
    /// Classify by `width / height`.
    ///
    /// The bands are open intervals: (1.7, 1.8) is landscape and (0.5, 0.6)
    /// is portrait. Everything else, including a zero height, is `Other`.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height == 0 {
            return AspectClass::Other;
        }
        let ratio = f64::from(width) / f64::from(height);
        if ratio > 1.7 && ratio < 1.8 {
            AspectClass::Landscape
        } else if ratio > 0.5 && ratio < 0.6 {
            AspectClass::Portrait
        } else {
            AspectClass::Other
        }
    }

    /// Key prefix segment, without the trailing slash.
    pub fn partition(self) -> &'static str {
        match self {
            AspectClass::Landscape => "landscape",
            AspectClass::Portrait => "portrait",
            AspectClass::Other => "other",
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.partition())
    }
}

#[derive(Debug, Error)]
pub enum MediaTypeError {
    #[error("no media type")]
    Empty,
    #[error("missing subtype in `{0}`")]
    MissingSubtype(String),
    #[error("malformed media type `{raw}`: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: mime::FromStrError,
    },
}

/// A parsed `Content-Type`. Parameters are validated by the parser, then ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaType(Mime);

impl MediaType {
    /// Parse a `Content-Type` value such as `image/png; charset=binary`.
    pub fn parse(raw: &str) -> Result<Self, MediaTypeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MediaTypeError::Empty);
        }
        let mime = raw
            .parse::<Mime>()
            .map_err(|source| MediaTypeError::Malformed {
                raw: raw.to_string(),
                source,
            })?;
        // the parser lets `image/` through
        if mime.subtype().as_str().is_empty() {
            return Err(MediaTypeError::MissingSubtype(raw.to_string()));
        }
        Ok(Self(mime))
    }

    /// `type/subtype`, lowercased.
    pub fn essence(&self) -> &str {
        self.0.essence_str()
    }

    pub fn subtype(&self) -> &str {
        self.0.subtype().as_str()
    }

    /// File extension used for stored keys.
    pub fn extension(&self) -> &str {
        self.subtype()
    }

    /// Reverse of [`MediaType::extension`] for the types this service stores.
    pub fn from_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "mp4" => Some("video/mp4"),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.essence())
    }
}
