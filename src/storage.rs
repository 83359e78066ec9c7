//! Remote object storage port
//!
//! The pipeline consumes object storage through the [`ClipStorage`] trait:
//! get-object-as-byte-stream for clip downloads, put-object for bundle
//! uploads. [`HttpClipStorage`] is the production implementation over a
//! plain HTTP object endpoint.

use bytes::Bytes;
use futures::TryStreamExt;
use std::path::Path;
use std::pin::Pin;
use url::Url;

use crate::error::{Error, Result};

/// A stream of body chunks for one remote object.
pub type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<Bytes>> + Send>>;

/// Abstraction over remote object storage, enabling testability.
#[async_trait::async_trait]
pub trait ClipStorage: Send + Sync {
    /// Open a readable byte stream for the object at `key`.
    async fn get_object(&self, key: &str) -> Result<ByteStream>;

    /// Upload the local file at `source` to `key`, returning the content length.
    async fn put_object(&self, key: &str, source: &Path) -> Result<u64>;
}

/// Production [`ClipStorage`] over an HTTP object-store endpoint.
///
/// Objects live at `<base_url>/<key>`; non-success statuses map to
/// [`Error::Storage`].
#[derive(Debug)]
pub struct HttpClipStorage {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClipStorage {
    /// Create a storage client for the given bucket endpoint.
    pub fn new(base_url: &str) -> Result<Self> {
        // A trailing slash makes Url::join treat the last path segment as a
        // directory instead of replacing it.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| Error::Config {
            message: format!("invalid bucket base URL '{base_url}': {e}"),
            key: Some("base_url".to_string()),
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        self.base_url.join(key).map_err(|e| Error::Storage {
            key: key.to_string(),
            reason: format!("invalid object key: {e}"),
        })
    }
}

#[async_trait::async_trait]
impl ClipStorage for HttpClipStorage {
    async fn get_object(&self, key: &str) -> Result<ByteStream> {
        let url = self.object_url(key)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Storage {
                key: key.to_string(),
                reason: format!("unexpected status {status}"),
            });
        }

        Ok(Box::pin(response.bytes_stream().map_err(Error::from)))
    }

    async fn put_object(&self, key: &str, source: &Path) -> Result<u64> {
        let url = self.object_url(key)?;
        let content_length = tokio::fs::metadata(source).await?.len();

        let file = tokio::fs::File::open(source).await?;
        let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));

        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Storage {
                key: key.to_string(),
                reason: format!("upload rejected with status {status}"),
            });
        }

        tracing::debug!(key, bytes = content_length, "object uploaded");
        Ok(content_length)
    }
}
