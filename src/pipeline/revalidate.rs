//! Downstream cache invalidation after a successful publish.
//!
//! One fire-and-forget HTTP call telling the site to re-render the
//! article's public page. Failures are logged and swallowed — a stale cache
//! entry is preferable to failing an article that already published.

use std::time::Duration;
use tracing::{debug, warn};

/// Client for the site's revalidation endpoint.
pub struct CacheInvalidator {
    client: reqwest::Client,
    endpoint: String,
    secret: Option<String>,
}

impl CacheInvalidator {
    pub fn new(endpoint: impl Into<String>, secret: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            secret,
        }
    }

    /// Ask the site to revalidate `path` (e.g. `/blog/spring-in-paris`).
    ///
    /// Never returns an error; completion of the article does not depend on
    /// the cache layer.
    pub async fn notify(&self, path: &str) {
        let mut request = self.client.get(&self.endpoint).query(&[("path", path)]);
        if let Some(ref secret) = self.secret {
            request = request.query(&[("secret", secret.as_str())]);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%path, "cache revalidation requested");
            }
            Ok(response) => {
                warn!(%path, "cache revalidation returned HTTP {}", response.status());
            }
            Err(e) => {
                warn!(%path, "cache revalidation failed: {e}");
            }
        }
    }
}
