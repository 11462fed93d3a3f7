//! The generation adapter: one external text-generation call per attempt.
//!
//! The adapter is an explicit, injected dependency — a trait with one
//! concrete LLM-backed implementation — rather than a module-level client
//! singleton, so the scheduler and its tests can substitute a stub without
//! touching the environment.
//!
//! The adapter does not enforce input length; that is the scheduler's
//! admission check. It does enforce the output budget (`max_tokens`) and a
//! per-call timeout, and it treats an empty response body as a
//! content-class failure rather than a transient one: an empty body means
//! the model had nothing to say about this input, and retrying immediately
//! would say it again.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::prompts::{generate_system_prompt, REWRITE_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which prompt family to use and its inputs.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    /// Rewrite `body` (source text with placeholder tokens substituted)
    /// into a polished article.
    Rewrite { body: String },
    /// Generate an article from scratch for `title` (and `category`),
    /// emitting `[IMAGE_n: …]` markers inline.
    Generate {
        title: String,
        category: Option<String>,
    },
}

/// The external text-generation collaborator.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Produce raw article text. Exactly one external call per invocation.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, PipelineError>;
}

/// LLM-backed adapter over an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.generation_timeout_secs,
        }
    }

    /// Resolve a provider from the config, most-specific to least-specific:
    ///
    /// 1. Pre-built provider (`config.provider`) — used as-is.
    /// 2. Named provider + model (`config.provider_name`), key from env.
    /// 3. Full auto-detection (`ProviderFactory::from_env`) scanning the
    ///    known API-key variables.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        if let Some(ref provider) = config.provider {
            return Ok(Self::new(Arc::clone(provider), config));
        }

        if let Some(ref name) = config.provider_name {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
            let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
                PipelineError::ProviderNotConfigured {
                    hint: format!("provider '{name}': {e}"),
                }
            })?;
            return Ok(Self::new(provider, config));
        }

        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                     Error: {e}"
                ),
            })?;
        Ok(Self::new(provider, config))
    }

    fn messages(request: &GenerationRequest) -> Vec<ChatMessage> {
        match request {
            GenerationRequest::Rewrite { body } => vec![
                ChatMessage::system(REWRITE_SYSTEM_PROMPT),
                ChatMessage::user(body),
            ],
            GenerationRequest::Generate { title, category } => vec![
                ChatMessage::system(generate_system_prompt(title, category.as_deref())),
                ChatMessage::user(format!("Write the article \"{title}\" now.")),
            ],
        }
    }
}

#[async_trait]
impl GenerationAdapter for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, PipelineError> {
        let messages = Self::messages(request);
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| PipelineError::GenerationTimeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| PipelineError::Generation {
                detail: e.to_string(),
            })?;

        debug!(
            "generation: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(PipelineError::EmptyGeneration);
        }
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_messages_carry_source_as_user_turn() {
        let request = GenerationRequest::Rewrite {
            body: "Visit [[img:1]] in spring.".into(),
        };
        let messages = LlmGenerator::messages(&request);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("[[img:1]]"));
    }

    #[test]
    fn generate_messages_parameterise_title() {
        let request = GenerationRequest::Generate {
            title: "City Gardens".into(),
            category: Some("Urban".into()),
        };
        let messages = LlmGenerator::messages(&request);
        assert!(messages[0].content.contains("City Gardens"));
        assert!(messages[0].content.contains("Urban"));
    }
}
