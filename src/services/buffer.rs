//! Request-scoped buffering of an upload before it is classified and stored.
//!
//! Whatever variant is used, dropping the buffer releases it: the temp file
//! is unlinked by `NamedTempFile` on drop, on every exit path.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut, stream};
use std::{io, path::Path};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{errors::IngestError, storage::ByteStream};

pub enum UploadBuffer {
    Memory(Bytes),
    TempFile { file: NamedTempFile, len: u64 },
}

impl UploadBuffer {
    /// Collect `chunks` in memory, failing once more than `limit` bytes arrive.
    pub async fn in_memory<S>(chunks: S, limit: u64) -> Result<Self, IngestError>
    where
        S: Stream<Item = Result<Bytes, IngestError>>,
    {
        pin_mut!(chunks);
        let mut buf = BytesMut::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if buf.len() as u64 + chunk.len() as u64 > limit {
                return Err(IngestError::PayloadTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(UploadBuffer::Memory(buf.freeze()))
    }

    /// Spool `chunks` into a fresh temp file inside `dir`.
    pub async fn in_temp_file<S>(
        chunks: S,
        limit: u64,
        dir: &Path,
        extension: &str,
    ) -> Result<Self, IngestError>
    where
        S: Stream<Item = Result<Bytes, IngestError>>,
    {
        let tmp = tempfile::Builder::new()
            .prefix("media-ingest-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(dir)
            .map_err(|err| IngestError::Internal(format!("creating temp file: {err}")))?;
        let std_file = tmp
            .reopen()
            .map_err(|err| IngestError::Internal(format!("opening temp file: {err}")))?;
        let mut file = tokio::fs::File::from_std(std_file);

        pin_mut!(chunks);
        let mut len: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            len += chunk.len() as u64;
            if len > limit {
                return Err(IngestError::PayloadTooLarge { limit });
            }
            file.write_all(&chunk)
                .await
                .map_err(|err| IngestError::Internal(format!("writing temp file: {err}")))?;
        }
        file.flush()
            .await
            .map_err(|err| IngestError::Internal(format!("flushing temp file: {err}")))?;

        tracing::debug!(path = %tmp.path().display(), len, "spooled upload");
        Ok(UploadBuffer::TempFile { file: tmp, len })
    }

    pub fn len(&self) -> u64 {
        match self {
            UploadBuffer::Memory(bytes) => bytes.len() as u64,
            UploadBuffer::TempFile { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing file, for consumers that need random access.
    pub fn path(&self) -> Option<&Path> {
        match self {
            UploadBuffer::Memory(_) => None,
            UploadBuffer::TempFile { file, .. } => Some(file.path()),
        }
    }

    /// A fresh stream over the buffered bytes, from the start.
    pub async fn stream(&self) -> io::Result<ByteStream> {
        match self {
            UploadBuffer::Memory(bytes) => Ok(stream::once({
                let bytes = bytes.clone();
                async move { Ok::<_, io::Error>(bytes) }
            })
            .boxed()),
            UploadBuffer::TempFile { file, .. } => {
                let reader = tokio::fs::File::open(file.path()).await?;
                Ok(ReaderStream::new(reader).boxed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, IngestError>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(buffer: &UploadBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut s = buffer.stream().await.unwrap();
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn memory_buffer_enforces_limit() {
        let buffer = UploadBuffer::in_memory(chunks(&["abc", "def"]), 6)
            .await
            .unwrap();
        assert_eq!(buffer.len(), 6);
        assert!(buffer.path().is_none());
        assert_eq!(collect(&buffer).await, b"abcdef");

        let err = UploadBuffer::in_memory(chunks(&["abc", "defg"]), 6)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::PayloadTooLarge { limit: 6 }));
    }

    #[tokio::test]
    async fn temp_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = UploadBuffer::in_temp_file(chunks(&["mp4", "data"]), 1024, dir.path(), "mp4")
            .await
            .unwrap();

        let path = buffer.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".mp4"));
        assert_eq!(buffer.len(), 7);
        // the stream can be taken more than once
        assert_eq!(collect(&buffer).await, b"mp4data");
        assert_eq!(collect(&buffer).await, b"mp4data");

        drop(buffer);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_uploads_are_detectable() {
        let buffer = UploadBuffer::in_memory(chunks(&[]), 6).await.unwrap();
        assert!(buffer.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let buffer = UploadBuffer::in_temp_file(chunks(&[]), 1024, dir.path(), "mp4")
            .await
            .unwrap();
        assert!(buffer.is_empty());

        let buffer = UploadBuffer::in_memory(chunks(&["x"]), 6).await.unwrap();
        assert!(!buffer.is_empty());
    }

    #[tokio::test]
    async fn oversized_temp_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadBuffer::in_temp_file(chunks(&["0123456789"]), 4, dir.path(), "mp4")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::PayloadTooLarge { limit: 4 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn stream_errors_abort_buffering() {
        let dir = tempfile::tempdir().unwrap();
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(IngestError::BadRequest("connection reset".into())),
        ]);
        let err = UploadBuffer::in_temp_file(failing, 1024, dir.path(), "mp4")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::BadRequest(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
