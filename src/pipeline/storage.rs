//! Object storage: the durable home for every image the pipeline touches.
//!
//! The pipeline consumes the [`ObjectStorage`] contract; [`BlobStorage`] is
//! the shipped implementation, speaking the plain HTTP blob-store protocol
//! (PUT bytes under a pathname with a bearer token, JSON `{"url": …}`
//! response). Swap in an S3- or GCS-backed implementation by implementing
//! the trait.
//!
//! Object names embed the article slug, an attempt timestamp, and the image
//! index, so repeated attempts upload uniquely named objects and never
//! corrupt a prior upload — idempotent enough to call on every retry.

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Durable storage for image bytes.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Fetch `url` and store its bytes under a name derived from the
    /// article slug and image index. Returns the durable public URL.
    async fn upload_from_url(
        &self,
        url: &str,
        alt_text: &str,
        index: usize,
        slug: &str,
    ) -> Result<String, StorageError>;

    /// Store raw bytes under `filename`. Returns the durable public URL.
    async fn upload_from_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, StorageError>;
}

/// HTTP blob-store client.
pub struct BlobStorage {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct BlobResponse {
    url: String,
}

impl BlobStorage {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Endpoint from `BLOB_STORE_URL`, token from `BLOB_STORE_TOKEN`.
    pub fn from_env(timeout_secs: u64) -> Self {
        let base = std::env::var("BLOB_STORE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "https://blob.vercel-storage.com".to_string());
        let token = std::env::var("BLOB_STORE_TOKEN").ok().filter(|v| !v.is_empty());
        Self::new(base, token, timeout_secs)
    }
}

#[async_trait]
impl ObjectStorage for BlobStorage {
    async fn upload_from_url(
        &self,
        url: &str,
        alt_text: &str,
        index: usize,
        slug: &str,
    ) -> Result<String, StorageError> {
        debug!(%url, index, "fetching image for rehosting");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(StorageError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .to_vec();

        let filename = object_name(slug, index, &mime);
        debug!(alt = alt_text, %filename, "rehosting image");
        self.upload_from_bytes(bytes, &filename, &mime).await
    }

    async fn upload_from_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let token = self.token.as_deref().ok_or(StorageError::MissingToken)?;

        let response = self
            .client
            .put(format!("{}/{}", self.base_url, filename))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Upload { reason: e.to_string() })?;

        if !response.status().is_success() {
            return Err(StorageError::Upload {
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: BlobResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Upload { reason: e.to_string() })?;
        info!(url = %body.url, "image stored");
        Ok(body.url)
    }
}

/// `articles/{slug}/{attempt-ts}-{index}.{ext}` — unique per attempt.
fn object_name(slug: &str, index: usize, mime: &str) -> String {
    let ext = match mime {
        m if m.contains("png") => "png",
        m if m.contains("webp") => "webp",
        m if m.contains("gif") => "gif",
        _ => "jpg",
    };
    format!(
        "articles/{slug}/{}-{index}.{ext}",
        Utc::now().timestamp_millis()
    )
}
