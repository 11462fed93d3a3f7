//! Error types for the articleforge pipeline.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal for one article attempt**: the attempt
//!   cannot produce a finished article (source too long, empty generation,
//!   store write failed). The scheduler catches these at the per-article
//!   boundary, persists `status = failed`, and moves on — one article's
//!   failure never aborts the batch.
//!
//! * Soft failures — image search finds nothing, a single upload fails, the
//!   thumbnail fetch 404s. These are not errors at all: the functions
//!   involved return `Option`/degrade and processing continues with that
//!   image or thumbnail simply absent.
//!
//! [`FailureKind`] classifies fatal failures so a batch summary can separate
//! "broken input" (never worth an automatic retry) from "transient outage"
//! (retry after the cooldown window).

use thiserror::Error;

/// All fatal per-attempt errors produced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Admission errors ──────────────────────────────────────────────────
    /// Source text exceeds the configured maximum; content too long.
    ///
    /// Detected before any generation call is made, so oversized articles
    /// never consume API budget.
    #[error("content too long: source is {len} chars, maximum is {max}")]
    SourceTooLong { len: usize, max: usize },

    // ── Content errors ────────────────────────────────────────────────────
    /// Rewrite mode requires source text, but the article has none.
    #[error("article '{id}' is in rewrite mode but has no source text")]
    MissingSource { id: String },

    /// The generation call returned an empty body.
    #[error("generation returned an empty result")]
    EmptyGeneration,

    // ── Generation errors ─────────────────────────────────────────────────
    /// No LLM provider could be resolved (missing API key etc.).
    #[error("LLM provider is not configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The generation API returned an error.
    #[error("generation failed: {detail}")]
    Generation { detail: String },

    /// The generation call exceeded its timeout.
    #[error("generation timed out after {secs}s")]
    GenerationTimeout { secs: u64 },

    // ── Persistence errors ────────────────────────────────────────────────
    /// A content-store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of a fatal failure, driving the retry policy.
///
/// * `Admission` — rejected before processing (oversized source). Never
///   retried automatically; requires a manual edit of the source.
/// * `Content` — the input or output content itself is broken (empty
///   generation, missing source). Retried only after cooldown or explicit
///   override.
/// * `Transient` — anything else (network, provider timeout, storage).
///   Eligible for automatic retry once the cooldown window elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Admission,
    Content,
    Transient,
}

impl PipelineError {
    /// Classify this error for the batch report and retry policy.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::SourceTooLong { .. } => FailureKind::Admission,
            PipelineError::MissingSource { .. } | PipelineError::EmptyGeneration => {
                FailureKind::Content
            }
            _ => FailureKind::Transient,
        }
    }
}

/// Errors from the content store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No article with the given id.
    #[error("article not found: '{id}'")]
    NotFound { id: String },

    /// The backing storage failed (I/O, serialisation, connection).
    #[error("content store error: {detail}")]
    Backend { detail: String },
}

/// Errors from the object-storage collaborator.
///
/// Within the per-image upload loop these degrade to soft failures (the
/// image keeps its original URL); they are surfaced as a typed error so
/// implementations and tests can distinguish causes.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No storage token/credential configured.
    #[error("object storage token is not configured (set BLOB_STORE_TOKEN)")]
    MissingToken,

    /// Could not fetch the source bytes before uploading.
    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// The storage endpoint rejected or failed the upload.
    #[error("upload failed: {reason}")]
    Upload { reason: String },
}

/// Errors from a single image-search provider.
///
/// The resolver treats every variant here as "no result from this provider"
/// and continues its fallback chain; a provider error is never fatal.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's API key is not configured.
    #[error("no credential configured for provider '{provider}'")]
    MissingCredential { provider: &'static str },

    /// HTTP transport or non-2xx status.
    #[error("provider '{provider}' request failed: {reason}")]
    Http { provider: &'static str, reason: String },

    /// The response body did not match the expected shape.
    #[error("provider '{provider}' returned an unexpected payload")]
    UnexpectedPayload { provider: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_too_long_is_admission() {
        let e = PipelineError::SourceTooLong { len: 60_000, max: 50_000 };
        assert_eq!(e.kind(), FailureKind::Admission);
        let msg = e.to_string();
        assert!(msg.contains("too long"), "got: {msg}");
        assert!(msg.contains("60000"));
    }

    #[test]
    fn empty_generation_is_content_class() {
        assert_eq!(PipelineError::EmptyGeneration.kind(), FailureKind::Content);
        assert_eq!(
            PipelineError::MissingSource { id: "a1".into() }.kind(),
            FailureKind::Content
        );
    }

    #[test]
    fn everything_else_is_transient() {
        assert_eq!(
            PipelineError::GenerationTimeout { secs: 120 }.kind(),
            FailureKind::Transient
        );
        assert_eq!(
            PipelineError::Store(StoreError::Backend { detail: "io".into() }).kind(),
            FailureKind::Transient
        );
    }

    #[test]
    fn provider_error_display_names_provider() {
        let e = ProviderError::MissingCredential { provider: "pexels" };
        assert!(e.to_string().contains("pexels"));
    }
}
