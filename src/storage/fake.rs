use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;

use super::{ByteStream, ObjectStore, StorageError, StorageResult, StoredObject};

/// In-memory `ObjectStore` for tests, with switchable failures.
#[derive(Clone, Default)]
pub struct FakeObjectStore {
    objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
    fail_puts: Arc<AtomicBool>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail.
    pub fn fake_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Stored `(content_type, payload)` keyed by `bucket/key`.
    pub async fn objects(&self) -> HashMap<String, (String, Bytes)> {
        self.objects.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "fake object store is down",
            )));
        }

        let mut payload = BytesMut::new();
        while let Some(chunk) = body.next().await {
            payload.extend_from_slice(&chunk?);
        }
        let size_bytes = payload.len() as i64;
        self.objects.lock().await.insert(
            format!("{bucket}/{key}"),
            (content_type.to_string(), payload.freeze()),
        );

        Ok(StoredObject {
            location: format!("https://objects.test/{bucket}/{key}"),
            size_bytes,
            etag: None,
        })
    }

    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fake"
    }
}
