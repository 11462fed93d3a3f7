//! Image resolution: descriptive text → candidate photo URL.
//!
//! The resolver builds an ordered list of sanitized query variants and runs
//! each through a fixed-priority provider chain (Pexels, then Unsplash),
//! short-circuiting on the first hit. Landscape orientation, first result
//! only — we want one good hero-style photo, not a gallery.
//!
//! A provider that errors (HTTP failure, missing credential) contributes
//! "no result" and the chain continues; exhausting every variant/provider
//! combination returns `None`. Finding no image is an expected, non-fatal
//! outcome — the caller simply proceeds without that image.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest query sent to a provider; stock-photo search degrades sharply
/// beyond a handful of keywords.
const MAX_QUERY_CHARS: usize = 80;

/// One external image-search backend.
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// First landscape result for `query`, or `None` for no match.
    async fn search(&self, query: &str) -> Result<Option<String>, ProviderError>;
}

/// Ordered fallback chain over search providers.
pub struct ImageResolver {
    providers: Vec<Arc<dyn ImageSearchProvider>>,
}

impl ImageResolver {
    pub fn new(providers: Vec<Arc<dyn ImageSearchProvider>>) -> Self {
        Self { providers }
    }

    /// The default chain: Pexels first, Unsplash second, credentials from
    /// `PEXELS_API_KEY` / `UNSPLASH_ACCESS_KEY`.
    pub fn from_env(timeout_secs: u64) -> Self {
        Self::new(vec![
            Arc::new(PexelsProvider::from_env(timeout_secs)),
            Arc::new(UnsplashProvider::from_env(timeout_secs)),
        ])
    }

    /// Find a photo for an image description within an article.
    ///
    /// Tries each query variant against each provider in order and returns
    /// the first non-empty result. Returns `None` when everything is
    /// exhausted; never an error.
    pub async fn resolve(&self, alt_text: &str, article_title: &str) -> Option<String> {
        for query in query_variants(alt_text, article_title) {
            for provider in &self.providers {
                match provider.search(&query).await {
                    Ok(Some(url)) => {
                        debug!(provider = provider.name(), %query, "image found");
                        return Some(url);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // A single provider failure is never fatal.
                        warn!(provider = provider.name(), %query, "search failed: {e}");
                    }
                }
            }
        }
        debug!(alt = alt_text, "no image found for any query variant");
        None
    }
}

// ── Query construction ───────────────────────────────────────────────────

/// Strip markdown syntax, collapse punctuation to spaces, normalise
/// whitespace.
fn sanitize_query(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '*' | '_' | '#' | '`' | '[' | ']' | '(' | ')' | '!' | '>' | '|' => cleaned.push(' '),
            c if c.is_alphanumeric() || c.is_whitespace() || c == '\'' || c == '-' => {
                cleaned.push(c)
            }
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_words(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for word in s.split_whitespace() {
        if !out.is_empty() && out.len() + 1 + word.len() > max_chars {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Ordered, deduplicated query variants, most specific first:
/// combined alt + title (bounded), alt alone, title + leading alt words,
/// title alone.
fn query_variants(alt_text: &str, article_title: &str) -> Vec<String> {
    let alt = sanitize_query(alt_text);
    let title = sanitize_query(article_title);
    let leading_alt = truncate_words(&alt, 24);

    let candidates = [
        truncate_words(&format!("{alt} {title}"), MAX_QUERY_CHARS),
        alt.clone(),
        truncate_words(&format!("{title} {leading_alt}"), MAX_QUERY_CHARS),
        title.clone(),
    ];

    let mut variants = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

// ── Pexels ───────────────────────────────────────────────────────────────

/// Pexels photo search (`https://api.pexels.com/v1/search`).
pub struct PexelsProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large: String,
}

impl PexelsProvider {
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key,
        }
    }

    pub fn from_env(timeout_secs: u64) -> Self {
        Self::new(non_empty_env("PEXELS_API_KEY"), timeout_secs)
    }
}

#[async_trait]
impl ImageSearchProvider for PexelsProvider {
    fn name(&self) -> &'static str {
        "pexels"
    }

    async fn search(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential { provider: "pexels" })?;

        let response = self
            .client
            .get("https://api.pexels.com/v1/search")
            .header("Authorization", key)
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider: "pexels",
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Http {
                provider: "pexels",
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: PexelsResponse = response
            .json()
            .await
            .map_err(|_| ProviderError::UnexpectedPayload { provider: "pexels" })?;

        Ok(body.photos.into_iter().next().map(|p| p.src.large))
    }
}

// ── Unsplash ─────────────────────────────────────────────────────────────

/// Unsplash photo search (`https://api.unsplash.com/search/photos`).
pub struct UnsplashProvider {
    client: reqwest::Client,
    access_key: Option<String>,
}

#[derive(Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

impl UnsplashProvider {
    pub fn new(access_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            access_key,
        }
    }

    pub fn from_env(timeout_secs: u64) -> Self {
        Self::new(non_empty_env("UNSPLASH_ACCESS_KEY"), timeout_secs)
    }
}

#[async_trait]
impl ImageSearchProvider for UnsplashProvider {
    fn name(&self) -> &'static str {
        "unsplash"
    }

    async fn search(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let key = self.access_key.as_deref().ok_or(ProviderError::MissingCredential {
            provider: "unsplash",
        })?;

        let response = self
            .client
            .get("https://api.unsplash.com/search/photos")
            .header("Authorization", format!("Client-ID {key}"))
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider: "unsplash",
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Http {
                provider: "unsplash",
                reason: format!("HTTP {}", response.status()),
            });
        }

        let body: UnsplashResponse = response.json().await.map_err(|_| {
            ProviderError::UnexpectedPayload {
                provider: "unsplash",
            }
        })?;

        Ok(body.results.into_iter().next().map(|p| p.urls.regular))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
