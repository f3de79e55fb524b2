//! Filesystem-backed object store.
//!
//! Payloads live beneath `base_path/{bucket}/{shard}/{shard}/{key}`, where the
//! shards are the first two bytes of `md5(bucket/key)`. Writes go to a
//! temporary sibling first and are renamed into place once fsynced.

use async_trait::async_trait;
use futures::StreamExt;
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use super::{
    ByteStream, ObjectStore, StorageError, StorageResult, StoredObject, ensure_bucket_name_safe,
    ensure_key_safe,
};

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,

    /// Prefix for locations handed back to callers, e.g. `http://localhost:8091`.
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Public URL under which `bucket/key` is served by the assets route.
    pub fn location(&self, bucket: &str, key: &str) -> String {
        format!("{}/assets/{}/{}", self.public_base_url, bucket, key)
    }

    /// Two-level shard identifiers for an object key, as lowercase hex.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.base_path.join(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Open a stored object for streaming out.
    pub async fn open(&self, bucket: &str, key: &str) -> StorageResult<(File, u64)> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let path = self.object_path(bucket, key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    async fn write_stream(
        &self,
        tmp_path: &Path,
        mut body: ByteStream,
    ) -> StorageResult<(i64, String)> {
        let mut file = File::create(tmp_path).await?;
        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok((size_bytes, format!("{:x}", digest.compute())))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let (size_bytes, etag) = match self.write_stream(&tmp_path, body).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!(
            path = %file_path.display(),
            size_bytes,
            content_type,
            "stored object"
        );

        Ok(StoredObject {
            location: self.location(bucket, key),
            size_bytes,
            etag: Some(etag),
        })
    }

    /// Write/read/delete probe file under `base_path`.
    async fn check(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read? != b"readyz" {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
