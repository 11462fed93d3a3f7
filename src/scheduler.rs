//! The pipeline orchestrator: selection, admission control, and the
//! per-article state machine.
//!
//! One [`Scheduler::run_batch`] call is one scheduler invocation, whether
//! it came from a cron-style poll or an operator's "run now". Articles are
//! processed **sequentially** — each article's generation call, image
//! uploads, and thumbnail derivation run to completion before the next
//! article begins. That bounds total external-API concurrency and keeps the
//! cooldown/size-guard logic race-free against the shared content store.
//! Within one article, image uploads for distinct images are independent
//! and run under a small concurrency cap.
//!
//! ## State machine
//!
//! `pending → processing → {completed, failed}` with exactly two store
//! writes per attempt: the transition to `processing` (stamping
//! `last_attempt_at`) and the terminal transition. A failure anywhere in
//! the sequence is caught at the per-article boundary, classified, and
//! persisted — it never aborts the batch.
//!
//! A process crash mid-attempt leaves the article in `processing`
//! indefinitely; there is no timeout-based reset. Automatic selection never
//! picks `processing` rows, which doubles as a coarse lease against a
//! second orchestrator instance.

use crate::article::{Article, ArticleStatus, ArticleUpdate};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{ArticleOutcome, BatchOutput, BatchStats, Disposition, SkipReason};
use crate::pipeline::codec::{self, ImageEntry};
use crate::pipeline::generate::{GenerationAdapter, GenerationRequest};
use crate::pipeline::resolve::ImageResolver;
use crate::pipeline::revalidate::CacheInvalidator;
use crate::pipeline::storage::ObjectStorage;
use crate::pipeline::thumbnail;
use crate::store::ContentStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The finished product of one successful attempt.
struct AttemptResult {
    rendered: String,
    images_resolved: usize,
}

/// Drives articles through the processing pipeline.
pub struct Scheduler {
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn GenerationAdapter>,
    resolver: Arc<ImageResolver>,
    storage: Arc<dyn ObjectStorage>,
    invalidator: Option<Arc<CacheInvalidator>>,
    config: PipelineConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn GenerationAdapter>,
        resolver: Arc<ImageResolver>,
        storage: Arc<dyn ObjectStorage>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            resolver,
            storage,
            invalidator: None,
            config,
        }
    }

    /// Attach a cache-invalidation client, notified after each publish.
    pub fn with_invalidator(mut self, invalidator: Arc<CacheInvalidator>) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// Run one batch.
    ///
    /// With `override_id` set, only that article is selected and the
    /// cooldown guard is bypassed (the size guard still applies). Otherwise
    /// up to `limit` eligible articles are selected, oldest attempt first.
    ///
    /// Returns `Err` only when selection itself fails; per-article failures
    /// are reported in the [`BatchOutput`].
    pub async fn run_batch(
        &self,
        limit: usize,
        override_id: Option<&str>,
    ) -> Result<BatchOutput, PipelineError> {
        let batch_start = Instant::now();
        let forced = override_id.is_some();

        let selected = match override_id {
            Some(id) => vec![self.store.get(id).await?],
            None => self.store.find_eligible(limit).await?,
        };
        let total = selected.len();
        info!(total, forced, "batch selected");

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut stats = BatchStats {
            selected: total,
            ..Default::default()
        };
        let mut outcomes = Vec::with_capacity(total);

        for (i, article) in selected.into_iter().enumerate() {
            let outcome = self.process_article(article, forced, i + 1, total).await;
            stats.record(&outcome);
            outcomes.push(outcome);
        }

        stats.total_duration_ms = batch_start.elapsed().as_millis() as u64;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, stats.completed);
        }
        info!(
            completed = stats.completed,
            failed = stats.failed,
            skipped = stats.skipped,
            "batch finished in {}ms",
            stats.total_duration_ms
        );

        Ok(BatchOutput { outcomes, stats })
    }

    /// Admission control + the full attempt for one article. Never
    /// propagates an error past the article boundary.
    async fn process_article(
        &self,
        article: Article,
        forced: bool,
        position: usize,
        total: usize,
    ) -> ArticleOutcome {
        let start = Instant::now();
        let cb = self.config.progress_callback.clone();
        let outcome = |disposition| ArticleOutcome {
            article_id: article.id.clone(),
            slug: article.slug.clone(),
            disposition,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        // Only reachable via explicit override: manual articles and rows
        // another orchestrator is holding are never processed.
        if !article.mode.is_pipeline_mode() || article.status == ArticleStatus::Processing {
            warn!(id = %article.id, ?article.mode, ?article.status, "article not eligible");
            if let Some(ref cb) = cb {
                cb.on_article_skipped(position, total, &article.slug, "not eligible");
            }
            return outcome(Disposition::Skipped { reason: SkipReason::NotEligible });
        }

        // Size guard: straight to failed, no generation call consumed.
        let source_len = article.source_text.as_deref().map_or(0, |s| s.chars().count());
        if source_len > self.config.max_source_chars {
            let err = PipelineError::SourceTooLong {
                len: source_len,
                max: self.config.max_source_chars,
            };
            warn!(id = %article.id, "{err}");
            self.mark_failed(&article.id).await;
            if let Some(ref cb) = cb {
                cb.on_article_failed(position, total, &article.slug, &err.to_string());
            }
            return outcome(Disposition::Failed {
                kind: err.kind(),
                detail: err.to_string(),
            });
        }

        // Cooldown guard: skipped for explicit single-article requests.
        if !forced {
            if let Some(last) = article.last_attempt_at {
                let elapsed = Utc::now() - last;
                if elapsed < self.config.cooldown() {
                    debug!(id = %article.id, "within cooldown window, skipping");
                    if let Some(ref cb) = cb {
                        cb.on_article_skipped(position, total, &article.slug, "cooldown");
                    }
                    return outcome(Disposition::Skipped { reason: SkipReason::Cooldown });
                }
            }
        }

        if let Some(ref cb) = cb {
            cb.on_article_start(position, total, &article.slug);
        }

        match self.run_attempt(&article).await {
            Ok(result) => {
                info!(id = %article.id, slug = %article.slug, "article completed");
                if let Some(ref cb) = cb {
                    cb.on_article_complete(position, total, &article.slug);
                }
                outcome(Disposition::Completed {
                    images_resolved: result.images_resolved,
                    cover_set: result.cover_set,
                })
            }
            Err(err) => {
                warn!(id = %article.id, "attempt failed: {err}");
                self.mark_failed(&article.id).await;
                if let Some(ref cb) = cb {
                    cb.on_article_failed(position, total, &article.slug, &err.to_string());
                }
                outcome(Disposition::Failed {
                    kind: err.kind(),
                    detail: err.to_string(),
                })
            }
        }
    }

    /// The processing sequence once admitted: both store writes happen
    /// here (→ `processing`, → `completed`); the `failed` write lives with
    /// the caller so this function can use `?` freely.
    async fn run_attempt(&self, article: &Article) -> Result<CompletedAttempt, PipelineError> {
        self.store
            .update(
                &article.id,
                ArticleUpdate {
                    status: Some(ArticleStatus::Processing),
                    last_attempt_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let result = match article.mode {
            crate::article::ArticleMode::Rewrite => self.rewrite_attempt(article).await?,
            crate::article::ArticleMode::Generate => self.generate_attempt(article).await?,
            crate::article::ArticleMode::Manual => {
                return Err(PipelineError::Internal("manual article admitted".into()))
            }
        };

        let cover =
            thumbnail::derive_cover(&result.rendered, &article.slug, &*self.storage, &self.config)
                .await;

        let mut update = ArticleUpdate {
            status: Some(ArticleStatus::Completed),
            rendered_text: Some(result.rendered),
            cover_image: cover.clone(),
            ..Default::default()
        };
        // First-ever publish gets its timestamp; re-runs keep the original.
        if article.published_at.is_none() {
            update.published_at = Some(Utc::now());
        }
        self.store.update(&article.id, update).await?;

        if let Some(ref invalidator) = self.invalidator {
            invalidator.notify(&format!("/blog/{}", article.slug)).await;
        }

        Ok(CompletedAttempt {
            images_resolved: result.images_resolved,
            cover_set: cover.is_some(),
        })
    }

    /// Rewrite mode: decode placeholders, rehost source images (upgrading
    /// the stored source), one generation call, re-encode.
    async fn rewrite_attempt(&self, article: &Article) -> Result<AttemptResult, PipelineError> {
        let source = article
            .source_text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| PipelineError::MissingSource {
                id: article.id.clone(),
            })?;

        let decoded = codec::decode(source);
        debug!(id = %article.id, images = decoded.entries.len(), "decoded source");

        let entries = self.rehost_entries(decoded.entries, &article.slug).await;
        let images_resolved = entries.iter().filter(|e| e.resolved_url.is_some()).count();

        // Upgrade the stored source itself with the durable URLs, so a
        // future re-run no longer depends on the foreign hosts.
        if images_resolved > 0 {
            let upgraded = codec::encode(&decoded.stripped, &entries);
            self.store
                .update(
                    &article.id,
                    ArticleUpdate {
                        source_text: Some(upgraded),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let generated = self
            .generator
            .generate(&GenerationRequest::Rewrite {
                body: decoded.stripped,
            })
            .await?;

        Ok(AttemptResult {
            rendered: codec::encode(&generated, &entries),
            images_resolved,
        })
    }

    /// Generate mode: one generation call, then resolve each model-emitted
    /// image marker through search + upload and substitute in place.
    async fn generate_attempt(&self, article: &Article) -> Result<AttemptResult, PipelineError> {
        let generated = self
            .generator
            .generate(&GenerationRequest::Generate {
                title: article.title.clone(),
                category: article.category.clone(),
            })
            .await?;

        let markers = codec::find_markers(&generated);
        debug!(id = %article.id, markers = markers.len(), "markers emitted");

        // Distinct images are independent; resolve and upload them under a
        // small concurrency cap. Substitution stays sequential below.
        let resolutions: Vec<(codec::ImageMarker, Option<String>)> =
            stream::iter(markers.into_iter().map(|marker| {
                let resolver = Arc::clone(&self.resolver);
                let storage = Arc::clone(&self.storage);
                let title = article.title.clone();
                let slug = article.slug.clone();
                async move {
                    let found = resolver.resolve(&marker.alt_text, &title).await;
                    let url = match found {
                        Some(url) => {
                            match storage
                                .upload_from_url(&url, &marker.alt_text, marker.index, &slug)
                                .await
                            {
                                Ok(durable) => Some(durable),
                                Err(e) => {
                                    // Soft: keep the provider URL rather
                                    // than lose the image.
                                    warn!(index = marker.index, "rehost failed: {e}");
                                    Some(url)
                                }
                            }
                        }
                        None => None,
                    };
                    (marker, url)
                }
            }))
            .buffer_unordered(self.config.upload_concurrency)
            .collect()
            .await;

        let mut rendered = generated;
        let mut images_resolved = 0;
        for (marker, url) in &resolutions {
            let replacement = match url {
                Some(u) => {
                    images_resolved += 1;
                    format!("![{}]({})", marker.alt_text, u)
                }
                // No image available: drop the marker, keep the article.
                None => String::new(),
            };
            rendered = codec::replace_marker(&rendered, marker, &replacement);
        }

        Ok(AttemptResult {
            rendered,
            images_resolved,
        })
    }

    /// Upload each source image to durable storage, keeping the original
    /// URL on a per-image failure. Order is restored after the unordered
    /// concurrent uploads.
    async fn rehost_entries(&self, entries: Vec<ImageEntry>, slug: &str) -> Vec<ImageEntry> {
        let mut rehosted: Vec<ImageEntry> = stream::iter(entries.into_iter().map(|mut entry| {
            let storage = Arc::clone(&self.storage);
            let slug = slug.to_string();
            async move {
                match storage
                    .upload_from_url(&entry.source_url, &entry.alt_text, entry.index, &slug)
                    .await
                {
                    Ok(url) => entry.resolved_url = Some(url),
                    Err(e) => warn!(index = entry.index, "rehost failed: {e}"),
                }
                entry
            }
        }))
        .buffer_unordered(self.config.upload_concurrency)
        .collect()
        .await;
        rehosted.sort_by_key(|e| e.index);
        rehosted
    }

    /// Best-effort terminal write for a failed attempt. A store error here
    /// is logged and dropped — the outcome already records the failure.
    async fn mark_failed(&self, id: &str) {
        let update = ArticleUpdate {
            status: Some(ArticleStatus::Failed),
            last_attempt_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.store.update(id, update).await {
            warn!(%id, "could not persist failed status: {e}");
        }
    }
}

/// What `run_attempt` reports upward after the terminal write.
struct CompletedAttempt {
    images_resolved: usize,
    cover_set: bool,
}
