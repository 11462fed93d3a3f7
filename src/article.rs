//! The article record and its processing state machine.
//!
//! An [`Article`] row is created once by an editor and from then on mutated
//! only by the scheduler, at exactly two points per attempt: the transition
//! to `processing` (with an attempt stamp) and the transition to a terminal
//! state. Updates travel as a sparse [`ArticleUpdate`] so a store can apply
//! precisely the fields that changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an article acquires its rendered body. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleMode {
    /// Written by hand; the pipeline never touches it.
    Manual,
    /// Rewrite an existing source text into a polished article.
    Rewrite,
    /// Generate an article from the title (and category) alone.
    Generate,
}

impl ArticleMode {
    /// Whether the automatic pipeline is responsible for this mode.
    pub fn is_pipeline_mode(self) -> bool {
        matches!(self, ArticleMode::Rewrite | ArticleMode::Generate)
    }
}

/// Processing status: `pending → processing → {completed, failed}`.
///
/// `failed` is terminal for the attempt, not the article — a failed article
/// re-enters automatic selection once its cooldown elapses. `completed`
/// articles are only re-run when explicitly named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One stored article, as read from and written to the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Stable identity.
    pub id: String,
    /// URL slug; names uploaded objects and the public page path.
    pub slug: String,
    /// Title; a generation-prompt input, never mutated by the pipeline.
    pub title: String,
    /// Optional category; a generation-prompt input.
    pub category: Option<String>,
    pub mode: ArticleMode,
    pub status: ArticleStatus,
    /// Raw reference text. Required in rewrite mode, absent in generate mode.
    pub source_text: Option<String>,
    /// Finished markdown body; empty until the first `completed` transition.
    #[serde(default)]
    pub rendered_text: String,
    /// Durable URL of the derived cover thumbnail.
    pub cover_image: Option<String>,
    /// Stamped at the start of every attempt; drives the cooldown window.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Stamped on the first-ever successful publish, then never changed.
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// A fresh pending article, as an editor action would create it.
    pub fn new(id: impl Into<String>, slug: impl Into<String>, title: impl Into<String>, mode: ArticleMode) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            title: title.into(),
            category: None,
            mode,
            status: ArticleStatus::Pending,
            source_text: None,
            rendered_text: String::new(),
            cover_image: None,
            last_attempt_at: None,
            published_at: None,
        }
    }
}

/// A sparse set of field writes applied atomically by the store.
///
/// `None` means "leave unchanged". The scheduler is the only producer.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub status: Option<ArticleStatus>,
    pub source_text: Option<String>,
    pub rendered_text: Option<String>,
    pub cover_image: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticleUpdate {
    /// Apply this update to an article in place.
    pub fn apply(&self, article: &mut Article) {
        if let Some(status) = self.status {
            article.status = status;
        }
        if let Some(ref text) = self.source_text {
            article.source_text = Some(text.clone());
        }
        if let Some(ref text) = self.rendered_text {
            article.rendered_text = text.clone();
        }
        if let Some(ref url) = self.cover_image {
            article.cover_image = Some(url.clone());
        }
        if let Some(ts) = self.last_attempt_at {
            article.last_attempt_at = Some(ts);
        }
        if let Some(ts) = self.published_at {
            article.published_at = Some(ts);
        }
    }
}
