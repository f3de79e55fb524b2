//! Storage keys for uploaded assets.
//!
//! A key is `[partition/]<token>.<ext>` where the token is 32 bytes of OS
//! entropy in unpadded URL-safe base64. Uniqueness is never checked.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use std::fmt;

use crate::models::asset::{AspectClass, AssetKind};

const TOKEN_BYTES: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a fresh key for an asset.
///
/// Videos are always partitioned by aspect class (`other/` when no class is
/// given); thumbnails never are.
pub fn generate_key(
    kind: AssetKind,
    extension: &str,
    class: Option<AspectClass>,
) -> Result<StorageKey, rand::Error> {
    let mut entropy = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut entropy)?;
    let token = URL_SAFE_NO_PAD.encode(entropy);

    let key = match kind {
        AssetKind::Video => format!(
            "{}/{}.{}",
            class.unwrap_or(AspectClass::Other).partition(),
            token,
            extension
        ),
        AssetKind::Thumbnail => format!("{}.{}", token, extension),
    };
    Ok(StorageKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asset::MediaType;
    use std::collections::HashSet;

    #[test]
    fn keys_do_not_repeat() {
        let keys: HashSet<_> = (0..10_000)
            .map(|_| generate_key(AssetKind::Thumbnail, "png", None).unwrap())
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn extension_follows_media_type() {
        let jpeg = MediaType::parse("image/jpeg").unwrap();
        let key = generate_key(AssetKind::Thumbnail, jpeg.extension(), None).unwrap();
        assert!(key.as_str().ends_with(".jpeg"));
        assert!(!key.as_str().contains('/'));

        let mp4 = MediaType::parse("video/mp4").unwrap();
        let key = generate_key(AssetKind::Video, mp4.extension(), Some(AspectClass::Landscape))
            .unwrap();
        assert!(key.as_str().starts_with("landscape/"));
        assert!(key.as_str().ends_with(".mp4"));
    }

    #[test]
    fn video_keys_are_always_partitioned() {
        let portrait =
            generate_key(AssetKind::Video, "mp4", Some(AspectClass::Portrait)).unwrap();
        assert!(portrait.as_str().starts_with("portrait/"));

        let unclassified = generate_key(AssetKind::Video, "mp4", None).unwrap();
        assert!(unclassified.as_str().starts_with("other/"));
    }

    #[test]
    fn token_is_url_safe() {
        let key = generate_key(AssetKind::Thumbnail, "png", None).unwrap();
        let token = key.as_str().trim_end_matches(".png");
        // 32 bytes -> 43 unpadded base64 chars
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
