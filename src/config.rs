//! Configuration for the content pipeline.
//!
//! All behaviour is controlled through one [`PipelineConfig`], built once at
//! process start via [`PipelineConfigBuilder`] and passed by reference into
//! every stage. Nothing in the library reads global state; the CLI is the only
//! place where environment variables are consulted.

use crate::error::ScholarError;
use crate::platform::Platform;
use crate::progress::ProgressCallback;
use crate::provider::TextCompletionProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a pipeline run.
///
/// # Example
/// ```rust
/// use scholarshare::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4.1-mini")
///     .api_timeout_secs(90)
///     .output_dir("outputs")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed text provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn TextCompletionProvider>>,

    /// Sampling temperature for the analysis call. Default: 0.3.
    ///
    /// Extraction must stay faithful to the paper, so this is kept low.
    pub analysis_temperature: f32,

    /// Sampling temperature for the blog call. Default: 0.7.
    pub blog_temperature: f32,

    /// Sampling temperature for social posts. Default: 0.8.
    pub social_temperature: f32,

    /// Sampling temperature for poster content. Default: 0.3.
    pub poster_temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Paper text longer than this (in characters) is truncated with a
    /// visible marker before analysis. Default: 120 000 (~30k tokens).
    pub max_input_chars: usize,

    /// Retries for a transient LLM or image failure (timeout, 429, 5xx).
    /// 0 or 1; default 1. Publishing is never retried.
    pub max_retries: u32,

    /// Delay before the retry, in milliseconds. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Per-image-call timeout in seconds. Default: 180.
    pub image_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// LaTeX compile timeout in seconds. Default: 120.
    pub compile_timeout_secs: u64,

    /// Blogging API timeout in seconds. Default: 30.
    pub publish_timeout_secs: u64,

    /// Image-generation service settings.
    pub image: ImageSettings,

    /// Blogging platform settings.
    pub publish: PublishSettings,

    /// LaTeX compiler program (e.g. "pdflatex"). `None` skips compilation.
    pub latex_compiler: Option<String>,

    /// Directory for generated images. `None` keeps images in memory only.
    pub output_dir: Option<PathBuf>,

    /// Platforms to generate social posts for. Default: all four.
    pub platforms: Vec<Platform>,

    /// Maximum characters of a generated image prompt. Default: 1000.
    pub max_image_prompt_chars: usize,

    /// Optional progress callback for stage and platform events.
    pub progress_callback: Option<ProgressCallback>,
}

/// OpenAI-compatible image generation settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageSettings {
    /// API base URL, e.g. "https://api.openai.com/v1".
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Overrides every platform's preferred size when set.
    pub size: Option<String>,
    pub quality: String,
    /// "vivid" or "natural".
    pub style: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "dall-e-3".to_string(),
            size: None,
            quality: "standard".to_string(),
            style: "vivid".to_string(),
        }
    }
}

impl fmt::Debug for ImageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("size", &self.size)
            .field("quality", &self.quality)
            .field("style", &self.style)
            .finish()
    }
}

/// DEV.to-compatible blogging API settings.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dev.to/api".to_string(),
            api_key: None,
        }
    }
}

impl fmt::Debug for PublishSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            analysis_temperature: 0.3,
            blog_temperature: 0.7,
            social_temperature: 0.8,
            poster_temperature: 0.3,
            max_tokens: 4096,
            max_input_chars: 120_000,
            max_retries: 1,
            retry_backoff_ms: 1000,
            api_timeout_secs: 120,
            image_timeout_secs: 180,
            download_timeout_secs: 60,
            compile_timeout_secs: 120,
            publish_timeout_secs: 30,
            image: ImageSettings::default(),
            publish: PublishSettings::default(),
            latex_compiler: None,
            output_dir: None,
            platforms: Platform::ALL.to_vec(),
            max_image_prompt_chars: 1000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn TextCompletionProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("image", &self.image)
            .field("publish", &self.publish)
            .field("latex_compiler", &self.latex_compiler)
            .field("output_dir", &self.output_dir)
            .field("platforms", &self.platforms)
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
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn TextCompletionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn analysis_temperature(mut self, t: f32) -> Self {
        self.config.analysis_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn blog_temperature(mut self, t: f32) -> Self {
        self.config.blog_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn social_temperature(mut self, t: f32) -> Self {
        self.config.social_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn poster_temperature(mut self, t: f32) -> Self {
        self.config.poster_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn compile_timeout_secs(mut self, secs: u64) -> Self {
        self.config.compile_timeout_secs = secs;
        self
    }

    pub fn publish_timeout_secs(mut self, secs: u64) -> Self {
        self.config.publish_timeout_secs = secs;
        self
    }

    pub fn image_settings(mut self, image: ImageSettings) -> Self {
        self.config.image = image;
        self
    }

    pub fn publish_settings(mut self, publish: PublishSettings) -> Self {
        self.config.publish = publish;
        self
    }

    pub fn latex_compiler(mut self, program: impl Into<String>) -> Self {
        self.config.latex_compiler = Some(program.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.config.platforms = platforms;
        self
    }

    pub fn max_image_prompt_chars(mut self, n: usize) -> Self {
        self.config.max_image_prompt_chars = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<PipelineConfig, ScholarError> {
        let c = &mut self.config;
        if c.max_input_chars < 1000 {
            return Err(ScholarError::InvalidConfig(format!(
                "max_input_chars must be ≥ 1000, got {}",
                c.max_input_chars
            )));
        }
        if c.max_tokens == 0 {
            return Err(ScholarError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        for (name, secs) in [
            ("api_timeout_secs", c.api_timeout_secs),
            ("image_timeout_secs", c.image_timeout_secs),
            ("download_timeout_secs", c.download_timeout_secs),
            ("compile_timeout_secs", c.compile_timeout_secs),
            ("publish_timeout_secs", c.publish_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ScholarError::InvalidConfig(format!("{name} must be ≥ 1")));
            }
        }
        c.platforms.sort_unstable();
        c.platforms.dedup();
        if c.platforms.is_empty() {
            return Err(ScholarError::InvalidConfig(
                "at least one social platform must be selected".into(),
            ));
        }
        Ok(self.config)
    }
}
