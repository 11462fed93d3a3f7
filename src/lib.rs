//! # articleforge
//!
//! Turn a stored source document — or a bare title — into a finished,
//! SEO-formatted article with every image rehosted to durable storage and a
//! derived cover thumbnail.
//!
//! ## Why this crate?
//!
//! Feeding raw markdown with embedded images to an LLM is how images get
//! paraphrased away, dropped, or hallucinated. This crate swaps every image
//! for an opaque indexed token before the generation call and restores the
//! tokens afterwards, with a structural fallback that re-anchors any image
//! the model lost — so a rewrite never silently discards sourced imagery.
//! Around that transform sits an idempotent batch scheduler with admission
//! control and a cooldown policy that stops permanently-failing inputs from
//! burning the generation budget on every run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Article (pending)
//!  │
//!  ├─ 1. Admit    size guard, cooldown window
//!  ├─ 2. Decode   ![alt](url) → [[img:N]] + ordered image table
//!  ├─ 3. Rehost   source images → durable storage (bounded concurrency)
//!  ├─ 4. Generate one LLM call (rewrite-from-source / generate-from-title)
//!  ├─ 5. Resolve  generate mode: [IMAGE_n: …] markers → search → upload
//!  ├─ 6. Encode   tokens back to markup, fallback re-insertion
//!  ├─ 7. Cover    first image → crop-to-fill JPEG → upload
//!  └─ 8. Publish  completed + rendered text + cover, cache invalidation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use articleforge::{
//!     JsonFileStore, LlmGenerator, PipelineConfig, Scheduler,
//!     pipeline::resolve::ImageResolver, pipeline::storage::BlobStorage,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::default();
//!     let store = Arc::new(JsonFileStore::open("articles.json")?);
//!     let scheduler = Scheduler::new(
//!         store,
//!         Arc::new(LlmGenerator::from_config(&config)?),
//!         Arc::new(ImageResolver::from_env(config.fetch_timeout_secs)),
//!         Arc::new(BlobStorage::from_env(config.fetch_timeout_secs)),
//!         config,
//!     );
//!     let output = scheduler.run_batch(5, None).await?;
//!     println!("{} completed, {} failed", output.stats.completed, output.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! | Class | Example | Effect |
//! |-------|---------|--------|
//! | Admission | source too long | `failed`, never auto-retried |
//! | Content | empty generation | `failed`, retry after cooldown/override |
//! | Transient | provider timeout | `failed`, auto-retry after cooldown |
//! | Soft | no photo found, cover 404 | processing continues without it |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `articleforge` binary (clap + anyhow + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod article;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scheduler;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use article::{Article, ArticleMode, ArticleStatus, ArticleUpdate};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{FailureKind, PipelineError, ProviderError, StorageError, StoreError};
pub use output::{ArticleOutcome, BatchOutput, BatchStats, Disposition, SkipReason};
pub use pipeline::generate::{GenerationAdapter, GenerationRequest, LlmGenerator};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use scheduler::Scheduler;
pub use store::{ContentStore, JsonFileStore, MemoryStore};
