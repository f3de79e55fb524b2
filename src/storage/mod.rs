//! Object storage backends.
//!
//! The ingest pipeline only sees [`ObjectStore`]; which backend sits behind
//! it is decided once at startup from configuration.

pub mod http;
pub mod local;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

/// Payload handed to [`ObjectStore::put`].
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("object store rejected `{key}` with status {status}")]
    Rejected { key: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A payload durably written to a backend.
#[derive(Clone, Debug)]
pub struct StoredObject {
    /// URL a video record may reference.
    pub location: String,
    pub size_bytes: i64,
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Durably store `body` under `bucket/key`.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Cheap reachability check used by readiness probes.
    async fn check(&self) -> StorageResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Basic key validation to avoid trivial path traversal vectors.
pub(crate) fn ensure_key_safe(key: &str) -> StorageResult<()> {
    const MAX_OBJECT_KEY_LEN: usize = 1024;

    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StorageError::InvalidObjectKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StorageError::InvalidObjectKey);
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(StorageError::InvalidObjectKey);
    }
    Ok(())
}

/// Validate bucket name format (S3 style: 3-63 chars of `[a-z0-9.-]`).
pub(crate) fn ensure_bucket_name_safe(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid("cannot contain consecutive dots"));
    }
    Ok(())
}
