//! Cover thumbnail derivation from the finished article text.
//!
//! Takes the first image the article references, fetches it, crops it to
//! the configured cover frame, and uploads the JPEG under a unique name.
//! Everything here fails soft: a 404, a corrupt image, or a storage error
//! logs a warning and yields `None` — the article still completes, with
//! its cover simply left at whatever it was before.

use crate::config::PipelineConfig;
use crate::error::StorageError;
use crate::pipeline::codec;
use crate::pipeline::storage::ObjectStorage;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// Derive and upload a cover thumbnail for `final_text`.
///
/// Returns the durable cover URL, or `None` when there is no image in the
/// text or any step fails.
pub async fn derive_cover(
    final_text: &str,
    slug: &str,
    storage: &dyn ObjectStorage,
    config: &PipelineConfig,
) -> Option<String> {
    let first = codec::decode(final_text).entries.into_iter().next()?;
    let url = first.url().to_string();

    let bytes = match fetch_bytes(&url, config.fetch_timeout_secs).await {
        Ok(b) => b,
        Err(e) => {
            warn!(%url, "cover fetch failed: {e}");
            return None;
        }
    };

    let jpeg = match transcode_cover(
        &bytes,
        config.cover_width,
        config.cover_height,
        config.cover_quality,
    ) {
        Ok(j) => j,
        Err(e) => {
            warn!(%url, "cover transcode failed: {e}");
            return None;
        }
    };

    // Timestamped name so repeated runs never collide.
    let filename = format!("covers/{slug}-{}.jpg", Utc::now().timestamp_millis());
    match storage.upload_from_bytes(jpeg, &filename, "image/jpeg").await {
        Ok(cover_url) => {
            debug!(%cover_url, "cover stored");
            Some(cover_url)
        }
        Err(e) => {
            warn!("cover upload failed: {e}");
            None
        }
    }
}

async fn fetch_bytes(url: &str, timeout_secs: u64) -> Result<Vec<u8>, StorageError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default();
    let response = client.get(url).send().await.map_err(|e| StorageError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !response.status().is_success() {
        return Err(StorageError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    Ok(response
        .bytes()
        .await
        .map_err(|e| StorageError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec())
}

/// Decode, crop-to-fill (centred), and re-encode as JPEG at `quality`.
///
/// `resize_to_fill` scales preserving aspect ratio and crops the overflow
/// around the centre — a cover fit, not a letterbox.
pub fn transcode_cover(
    bytes: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let cover = img.resize_to_fill(width, height, FilterType::Lanczos3);

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    cover.write_with_encoder(encoder)?;
    Ok(out)
}
