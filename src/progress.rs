//! Progress-callback trait for per-article batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the scheduler works through a batch. Callbacks are the
//! least-invasive integration point: forward events to a channel, a
//! database record, or a terminal progress bar without the library knowing
//! how the host application communicates.
//!
//! Articles are processed sequentially, so unlike concurrent pipelines the
//! events for one batch arrive in order; implementations still must be
//! `Send + Sync` because the scheduler itself may run on any worker thread.

use std::sync::Arc;

/// Called by the scheduler as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after selection, before any article is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before an article's attempt begins (after admission).
    fn on_article_start(&self, position: usize, total: usize, slug: &str) {
        let _ = (position, total, slug);
    }

    /// Called when an article reaches `completed`.
    fn on_article_complete(&self, position: usize, total: usize, slug: &str) {
        let _ = (position, total, slug);
    }

    /// Called when admission control skips an article.
    fn on_article_skipped(&self, position: usize, total: usize, slug: &str, reason: &str) {
        let _ = (position, total, slug, reason);
    }

    /// Called when an attempt fails and the article is marked `failed`.
    fn on_article_failed(&self, position: usize, total: usize, slug: &str, error: &str) {
        let _ = (position, total, slug, error);
    }

    /// Called once after every selected article has been handled.
    fn on_batch_complete(&self, total: usize, completed: usize) {
        let _ = (total, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        fails: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_article_start(&self, _p: usize, _t: usize, _slug: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_article_complete(&self, _p: usize, _t: usize, _slug: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_article_skipped(&self, _p: usize, _t: usize, _slug: &str, _r: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }
        fn on_article_failed(&self, _p: usize, _t: usize, _slug: &str, _e: &str) {
            self.fails.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_article_start(1, 3, "a");
        cb.on_article_complete(1, 3, "a");
        cb.on_article_skipped(2, 3, "b", "cooldown");
        cb.on_article_failed(3, 3, "c", "boom");
        cb.on_batch_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback::default();
        cb.on_article_start(1, 2, "a");
        cb.on_article_complete(1, 2, "a");
        cb.on_article_start(2, 2, "b");
        cb.on_article_failed(2, 2, "b", "generation failed");
        assert_eq!(cb.starts.load(Ordering::SeqCst), 2);
        assert_eq!(cb.completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.fails.load(Ordering::SeqCst), 1);
        assert_eq!(cb.skips.load(Ordering::SeqCst), 0);
    }
}
