//! Capability seams for the external services the pipeline calls.
//!
//! Each generator receives its collaborators as trait objects, so tests swap
//! in deterministic fakes and production code plugs in real clients:
//!
//! | Trait | Production implementation |
//! |-------|---------------------------|
//! | [`TextCompletionProvider`] | [`LlmTextProvider`] over any `edgequake_llm` provider |
//! | [`ImageProvider`] | [`crate::pipeline::image::OpenAiImageProvider`] |
//! | [`BlogPublisher`] | [`crate::pipeline::publish::DevToPublisher`] |

use crate::config::PipelineConfig;
use crate::error::{CallError, ScholarError};
use crate::records::{BlogRecord, PublishMode, PublishReceipt};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

// ── Text ─────────────────────────────────────────────────────────────────

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn after the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub turns: Vec<Turn>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            system: system.into(),
            turns: vec![Turn::user(user)],
            temperature,
            max_tokens,
        }
    }

    /// The last user turn; fakes route on it.
    pub fn last_user(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }
}

/// Text returned by a completion, with token usage when the service reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Prompt in, text out.
#[async_trait]
pub trait TextCompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "llm"
    }
}

/// Adapter from an `edgequake_llm` provider to [`TextCompletionProvider`].
#[derive(Clone)]
pub struct LlmTextProvider {
    inner: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmTextProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }
}

#[async_trait]
impl TextCompletionProvider for LlmTextProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError> {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        messages.push(ChatMessage::system(request.system.as_str()));
        for turn in &request.turns {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.content.as_str()),
                Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
            });
        }

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .inner
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                let message = e.to_string();
                CallError::Service {
                    transient: looks_transient(&message),
                    message,
                }
            })?;

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Classify a provider error message: rate limits, timeouts and server
/// errors are transient.
pub(crate) fn looks_transient(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    ["429", "rate limit", "timeout", "timed out", "overloaded", "500", "502", "503", "504", "connection"]
        .iter()
        .any(|needle| m.contains(needle))
}

fn create_text_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn TextCompletionProvider>, ScholarError> {
    let llm = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScholarError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(LlmTextProvider::new(llm, format!("{provider_name}/{model}"))))
}

/// Resolve the text provider, from most-specific to least-specific.
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` + `config.model`.
/// 3. `SCHOLARSHARE_LLM_PROVIDER` + `SCHOLARSHARE_MODEL`, when both are set.
/// 4. `OPENAI_API_KEY` present: OpenAI with the configured or default model.
/// 5. Full auto-detection via `ProviderFactory::from_env`.
pub fn resolve_text_provider(
    config: &PipelineConfig,
) -> Result<Arc<dyn TextCompletionProvider>, ScholarError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_text_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("SCHOLARSHARE_LLM_PROVIDER"),
        std::env::var("SCHOLARSHARE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_text_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_text_provider("openai", model);
    }

    let (llm, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScholarError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(Arc::new(LlmTextProvider::new(llm, "auto")))
}

// ── Images ───────────────────────────────────────────────────────────────

/// An image-generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    /// e.g. "1024x1024".
    pub size: String,
}

/// Raw image bytes and the detected file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// "png", "jpg", "webp" …
    pub format: String,
}

/// Prompt in, image bytes out.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, CallError>;
}

// ── Publishing ───────────────────────────────────────────────────────────

/// Creates a post on a blogging platform from a [`BlogRecord`].
#[async_trait]
pub trait BlogPublisher: Send + Sync {
    async fn publish(&self, blog: &BlogRecord, mode: PublishMode) -> Result<PublishReceipt, ScholarError>;
}
