//! Batch report types returned by [`crate::scheduler::Scheduler::run_batch`].
//!
//! One [`ArticleOutcome`] per selected article plus aggregate [`BatchStats`].
//! Everything is serialisable so operators can log a run as JSON or feed it
//! to whatever triggered the batch.

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};

/// The result of one scheduler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Per-article dispositions, in processing order.
    pub outcomes: Vec<ArticleOutcome>,
    /// Aggregate statistics for the run.
    pub stats: BatchStats,
}

/// What happened to one selected article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleOutcome {
    pub article_id: String,
    pub slug: String,
    pub disposition: Disposition,
    /// Wall-clock time spent on this article (zero for skips).
    pub duration_ms: u64,
}

impl ArticleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.disposition, Disposition::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.disposition, Disposition::Failed { .. })
    }
}

/// Terminal disposition of one article within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Disposition {
    /// The article reached `completed`.
    Completed {
        /// Images resolved to durable URLs during this attempt.
        images_resolved: usize,
        /// Whether a cover thumbnail was derived and stored.
        cover_set: bool,
    },
    /// Admission control skipped the article without changing its status.
    Skipped { reason: SkipReason },
    /// The attempt failed; the article is now `failed`.
    Failed {
        kind: FailureKind,
        detail: String,
    },
}

/// Why an article was skipped rather than processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `last_attempt_at` is still inside the cooldown window.
    Cooldown,
    /// The article is not a pipeline-mode article (e.g. manual) or is not
    /// in a selectable status. Only reachable via explicit override.
    NotEligible,
}

/// Aggregate statistics for one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Articles selected for this run (before admission control).
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Total wall-clock duration of the batch.
    pub total_duration_ms: u64,
}

impl BatchStats {
    /// Tally an outcome into the aggregate counters.
    pub(crate) fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome.disposition {
            Disposition::Completed { .. } => self.completed += 1,
            Disposition::Skipped { .. } => self.skipped += 1,
            Disposition::Failed { .. } => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_record_tallies() {
        let mut stats = BatchStats::default();
        for disposition in [
            Disposition::Completed { images_resolved: 2, cover_set: true },
            Disposition::Skipped { reason: SkipReason::Cooldown },
            Disposition::Failed { kind: FailureKind::Transient, detail: "net".into() },
            Disposition::Failed { kind: FailureKind::Admission, detail: "len".into() },
        ] {
            let outcome = ArticleOutcome {
                article_id: "a".into(),
                slug: "a".into(),
                disposition,
                duration_ms: 1,
            };
            stats.record(&outcome);
        }
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 2);
    }

    #[test]
    fn disposition_serialises_with_tag() {
        let d = Disposition::Failed {
            kind: FailureKind::Content,
            detail: "empty generation".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"result\":\"failed\""), "got: {json}");
        assert!(json.contains("\"content\""));
    }
}
