//! Pipeline stages for article processing.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. a different storage backend) without touching the
//! others.
//!
//! ## Data Flow (one article)
//!
//! ```text
//! source ──▶ codec.decode ──▶ generate ──▶ resolve + storage ──▶ codec.encode ──▶ thumbnail ──▶ revalidate
//! (store)    (placeholders)   (LLM call)   (per-image, bounded)  (tokens back)    (cover jpg)   (signal)
//! ```
//!
//! 1. [`codec`]      — reversible placeholder transform + the generate-mode
//!    marker family; pure, no I/O
//! 2. [`generate`]   — the single LLM call per attempt, behind an injected
//!    adapter trait
//! 3. [`resolve`]    — alt text → photo URL through the provider fallback
//!    chain
//! 4. [`storage`]    — durable object uploads (by URL or by bytes)
//! 5. [`thumbnail`]  — first image → cropped, re-encoded cover; all-soft
//!    failure
//! 6. [`revalidate`] — fire-and-forget cache invalidation after publish

pub mod codec;
pub mod generate;
pub mod resolve;
pub mod revalidate;
pub mod storage;
pub mod thumbnail;
