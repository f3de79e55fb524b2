//! Remote object store reached over an S3-style HTTP API.
//!
//! Objects are written with `PUT {endpoint}/{bucket}/{key}`; the payload is
//! streamed, never collected in memory.

use async_trait::async_trait;
use reqwest::{Body, Client, header};
use tracing::debug;

use super::{
    ByteStream, ObjectStore, StorageError, StorageResult, StoredObject, ensure_bucket_name_safe,
    ensure_key_safe,
};

#[derive(Clone, Debug)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    /// Base for returned locations; defaults to `endpoint`.
    public_base_url: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, public_base_url: Option<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let public_base_url = public_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());
        Self {
            client: Client::new(),
            endpoint,
            public_base_url,
        }
    }

    fn object_url(&self, base: &str, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", base, bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let url = self.object_url(&self.endpoint, bucket, key);
        let response = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::wrap_stream(body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());
        let size_bytes = response
            .headers()
            .get("x-object-size")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1);

        debug!(%url, status = status.as_u16(), "stored remote object");

        Ok(StoredObject {
            location: self.object_url(&self.public_base_url, bucket, key),
            size_bytes,
            etag,
        })
    }

    async fn check(&self) -> StorageResult<()> {
        let response = self
            .client
            .get(format!("{}/healthz", self.endpoint))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Rejected {
                key: "healthz".into(),
                status: response.status().as_u16(),
            })
        }
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
