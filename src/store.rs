//! The content store: the pipeline's one external persistence collaborator.
//!
//! The scheduler is the sole writer, and it writes at exactly two points per
//! attempt, so the trait stays deliberately small: select, get, update.
//! Two implementations ship with the crate — [`MemoryStore`] for tests and
//! embedding, and [`JsonFileStore`] for the CLI, which keeps a whole blog's
//! article set in one JSON file with atomic rewrites.
//!
//! A real deployment backs this trait with its database; nothing in the
//! pipeline assumes more than these three operations.

use crate::article::{Article, ArticleStatus, ArticleUpdate};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Durable article storage consumed by the scheduler.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Articles eligible for automatic processing: pipeline mode
    /// (`rewrite` or `generate`), status `pending` or `failed`, ordered by
    /// `last_attempt_at` ascending with never-attempted articles first,
    /// limited to `limit`.
    ///
    /// `processing` rows are never returned; the status filter doubles as a
    /// coarse lease against a second orchestrator picking up the same row.
    async fn find_eligible(&self, limit: usize) -> Result<Vec<Article>, StoreError>;

    /// Fetch one article by id.
    async fn get(&self, id: &str) -> Result<Article, StoreError>;

    /// Apply a sparse field update to one article.
    async fn update(&self, id: &str, update: ArticleUpdate) -> Result<(), StoreError>;
}

/// Shared eligibility filter + ordering, so every store selects identically.
fn select_eligible(articles: &HashMap<String, Article>, limit: usize) -> Vec<Article> {
    let mut eligible: Vec<Article> = articles
        .values()
        .filter(|a| a.mode.is_pipeline_mode())
        .filter(|a| matches!(a.status, ArticleStatus::Pending | ArticleStatus::Failed))
        .cloned()
        .collect();
    // Nulls (never attempted) first, then oldest attempt first.
    eligible.sort_by(|a, b| match (a.last_attempt_at, b.last_attempt_at) {
        (None, None) => a.id.cmp(&b.id),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    });
    eligible.truncate(limit);
    eligible
}

// ── In-memory store ──────────────────────────────────────────────────────

/// A `HashMap`-backed store for tests and in-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    articles: Mutex<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with articles.
    pub fn with_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let store = Self::new();
        {
            let mut map = store.articles.lock().unwrap();
            for a in articles {
                map.insert(a.id.clone(), a);
            }
        }
        store
    }

    /// Insert or replace an article.
    pub fn insert(&self, article: Article) {
        self.articles.lock().unwrap().insert(article.id.clone(), article);
    }

    /// Snapshot of every stored article (test inspection).
    pub fn all(&self) -> Vec<Article> {
        self.articles.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_eligible(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        let map = self.articles.lock().unwrap();
        Ok(select_eligible(&map, limit))
    }

    async fn get(&self, id: &str) -> Result<Article, StoreError> {
        self.articles
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn update(&self, id: &str, update: ArticleUpdate) -> Result<(), StoreError> {
        let mut map = self.articles.lock().unwrap();
        let article = map
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        update.apply(article);
        Ok(())
    }
}

// ── JSON file store ──────────────────────────────────────────────────────

/// A single-file JSON store, enough to run the pipeline from the CLI.
///
/// The whole article set is rewritten on every update via a temp file +
/// rename, so a crash mid-write never leaves a truncated store behind.
pub struct JsonFileStore {
    path: PathBuf,
    articles: Mutex<HashMap<String, Article>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let articles = if path.exists() {
            let data = std::fs::read_to_string(&path).map_err(|e| StoreError::Backend {
                detail: format!("read {}: {e}", path.display()),
            })?;
            let list: Vec<Article> =
                serde_json::from_str(&data).map_err(|e| StoreError::Backend {
                    detail: format!("parse {}: {e}", path.display()),
                })?;
            list.into_iter().map(|a| (a.id.clone(), a)).collect()
        } else {
            HashMap::new()
        };
        debug!("Opened JSON store: {} ({} articles)", path.display(), articles.len());
        Ok(Self {
            path,
            articles: Mutex::new(articles),
        })
    }

    /// Insert or replace an article and persist.
    pub fn insert(&self, article: Article) -> Result<(), StoreError> {
        let mut map = self.articles.lock().unwrap();
        map.insert(article.id.clone(), article);
        self.persist(&map)
    }

    /// Snapshot of every stored article.
    pub fn all(&self) -> Vec<Article> {
        let mut list: Vec<Article> = self.articles.lock().unwrap().values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    fn persist(&self, map: &HashMap<String, Article>) -> Result<(), StoreError> {
        let mut list: Vec<&Article> = map.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        let data = serde_json::to_string_pretty(&list).map_err(|e| StoreError::Backend {
            detail: format!("serialise: {e}"),
        })?;

        // Atomic write: temp file in the same directory, then rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| StoreError::Backend {
            detail: format!("write {}: {e}", tmp.display()),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Backend {
            detail: format!("rename {}: {e}", self.path.display()),
        })
    }
}

#[async_trait]
impl ContentStore for JsonFileStore {
    async fn find_eligible(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        let map = self.articles.lock().unwrap();
        Ok(select_eligible(&map, limit))
    }

    async fn get(&self, id: &str) -> Result<Article, StoreError> {
        self.articles
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn update(&self, id: &str, update: ArticleUpdate) -> Result<(), StoreError> {
        let mut map = self.articles.lock().unwrap();
        let article = map
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        update.apply(article);
        self.persist(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleMode;
    use chrono::{Duration, Utc};

    fn article(id: &str, mode: ArticleMode, status: ArticleStatus) -> Article {
        let mut a = Article::new(id, id, id, mode);
        a.status = status;
        a
    }

    #[tokio::test]
    async fn eligibility_filters_mode_and_status() {
        let store = MemoryStore::with_articles([
            article("manual", ArticleMode::Manual, ArticleStatus::Pending),
            article("done", ArticleMode::Rewrite, ArticleStatus::Completed),
            article("busy", ArticleMode::Rewrite, ArticleStatus::Processing),
            article("ready", ArticleMode::Rewrite, ArticleStatus::Pending),
            article("retry", ArticleMode::Generate, ArticleStatus::Failed),
        ]);

        let eligible = store.find_eligible(10).await.unwrap();
        let mut ids: Vec<&str> = eligible.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["ready", "retry"]);
    }

    #[tokio::test]
    async fn eligibility_orders_never_attempted_first_then_oldest() {
        let now = Utc::now();
        let mut old = article("old", ArticleMode::Rewrite, ArticleStatus::Failed);
        old.last_attempt_at = Some(now - Duration::hours(48));
        let mut recent = article("recent", ArticleMode::Rewrite, ArticleStatus::Failed);
        recent.last_attempt_at = Some(now - Duration::hours(1));
        let fresh = article("fresh", ArticleMode::Rewrite, ArticleStatus::Pending);

        let store = MemoryStore::with_articles([recent, old, fresh]);
        let eligible = store.find_eligible(10).await.unwrap();
        let ids: Vec<&str> = eligible.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "old", "recent"]);
    }

    #[tokio::test]
    async fn eligibility_respects_limit() {
        let store = MemoryStore::with_articles(
            (0..8).map(|i| article(&format!("a{i}"), ArticleMode::Generate, ArticleStatus::Pending)),
        );
        assert_eq!(store.find_eligible(3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn memory_store_update_round_trip() {
        let store = MemoryStore::with_articles([article(
            "a1",
            ArticleMode::Rewrite,
            ArticleStatus::Pending,
        )]);
        store
            .update(
                "a1",
                ArticleUpdate {
                    status: Some(ArticleStatus::Processing),
                    last_attempt_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let a = store.get("a1").await.unwrap();
        assert_eq!(a.status, ArticleStatus::Processing);
        assert!(a.last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.json");

        let store = JsonFileStore::open(&path).unwrap();
        store
            .insert(article("a1", ArticleMode::Rewrite, ArticleStatus::Pending))
            .unwrap();
        store
            .update(
                "a1",
                ArticleUpdate {
                    status: Some(ArticleStatus::Completed),
                    rendered_text: Some("# Done\n".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        let a = reopened.get("a1").await.unwrap();
        assert_eq!(a.status, ArticleStatus::Completed);
        assert_eq!(a.rendered_text, "# Done\n");
    }
}
