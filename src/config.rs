//! Configuration for the article pipeline.
//!
//! All behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it easy
//! to share a config across the scheduler and its stages, and to diff two
//! runs to understand why their outcomes differ.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use articleforge::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .batch_limit(10)
///     .cooldown_hours(12)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum articles selected per automatic batch. Default: 5.
    ///
    /// Articles are processed sequentially, so the batch limit bounds the
    /// wall-clock time of one scheduler invocation as well as total
    /// external-API pressure.
    pub batch_limit: usize,

    /// Cooldown window in hours after a failed attempt. Default: 24.
    ///
    /// A failed article is skipped by automatic selection until this much
    /// time has passed since `last_attempt_at`. Explicitly named articles
    /// bypass the window.
    pub cooldown_hours: i64,

    /// Maximum source text length in characters. Default: 50 000.
    ///
    /// Oversized sources are moved straight to `failed` without spending a
    /// generation call. The bound keeps rewrite prompts inside typical
    /// context windows with room for the system instruction.
    pub max_source_chars: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for generation. Default: 0.7.
    ///
    /// Articles want some variety of phrasing; transcription-grade
    /// determinism would make every generated post read the same.
    pub temperature: f32,

    /// Maximum tokens one generation call may produce. Default: 4096.
    ///
    /// The output-length budget of the whole article. The adapter does not
    /// enforce input length; that is the scheduler's admission check.
    pub max_tokens: usize,

    /// Per-generation-call timeout in seconds. Default: 180.
    pub generation_timeout_secs: u64,

    /// Timeout for image-provider searches and byte fetches in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Concurrent image resolutions/uploads within one article. Default: 4.
    ///
    /// Distinct images have no ordering dependency, so a small worker cap
    /// cuts per-article latency without flooding the providers. Re-encoding
    /// waits for all uploads before substituting URLs.
    pub upload_concurrency: usize,

    /// Cover thumbnail width in pixels. Default: 1200.
    pub cover_width: u32,

    /// Cover thumbnail height in pixels. Default: 630.
    ///
    /// 1200×630 is the canonical Open Graph card size, so the derived cover
    /// doubles as the social-share image without a second transcode.
    pub cover_height: u32,

    /// JPEG quality for the re-encoded cover, 1–100. Default: 80.
    pub cover_quality: u8,

    /// Progress callback for batch/article events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_limit: 5,
            cooldown_hours: 24,
            max_source_chars: 50_000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            generation_timeout_secs: 180,
            fetch_timeout_secs: 30,
            upload_concurrency: 4,
            cover_width: 1200,
            cover_height: 630,
            cover_quality: 80,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("batch_limit", &self.batch_limit)
            .field("cooldown_hours", &self.cooldown_hours)
            .field("max_source_chars", &self.max_source_chars)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("upload_concurrency", &self.upload_concurrency)
            .field("cover_width", &self.cover_width)
            .field("cover_height", &self.cover_height)
            .field("cover_quality", &self.cover_quality)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The cooldown window as a `chrono::Duration`.
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cooldown_hours)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn batch_limit(mut self, n: usize) -> Self {
        self.config.batch_limit = n.max(1);
        self
    }

    pub fn cooldown_hours(mut self, hours: i64) -> Self {
        self.config.cooldown_hours = hours.max(0);
        self
    }

    pub fn max_source_chars(mut self, n: usize) -> Self {
        self.config.max_source_chars = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn generation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.generation_timeout_secs = secs;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn cover_size(mut self, width: u32, height: u32) -> Self {
        self.config.cover_width = width.max(16);
        self.config.cover_height = height.max(16);
        self
    }

    pub fn cover_quality(mut self, q: u8) -> Self {
        self.config.cover_quality = q.clamp(1, 100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_source_chars == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_source_chars must be > 0".into(),
            ));
        }
        if c.cover_quality == 0 || c.cover_quality > 100 {
            return Err(PipelineError::InvalidConfig(format!(
                "cover_quality must be 1–100, got {}",
                c.cover_quality
            )));
        }
        if c.upload_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "upload_concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = PipelineConfig::builder().build().unwrap();
        assert_eq!(c.batch_limit, 5);
        assert_eq!(c.cooldown_hours, 24);
        assert_eq!(c.max_source_chars, 50_000);
        assert_eq!((c.cover_width, c.cover_height), (1200, 630));
    }

    #[test]
    fn builder_clamps() {
        let c = PipelineConfig::builder()
            .batch_limit(0)
            .temperature(5.0)
            .cover_quality(250)
            .upload_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.batch_limit, 1);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.cover_quality, 100);
        assert_eq!(c.upload_concurrency, 1);
    }

    #[test]
    fn cooldown_duration() {
        let c = PipelineConfig::builder().cooldown_hours(12).build().unwrap();
        assert_eq!(c.cooldown(), chrono::Duration::hours(12));
    }
}
