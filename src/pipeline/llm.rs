//! Model calls with a timeout and at most one retry.
//!
//! Every generator goes through [`call_text`] / [`call_image`] so timeout and
//! retry behaviour is identical across stages. All prompt engineering lives
//! in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Timeouts, HTTP 429 and 5xx are retried once after `retry_backoff_ms`;
//! everything else (bad credentials, content policy, malformed request) fails
//! immediately. Publishing never goes through here and is never retried.

use crate::config::PipelineConfig;
use crate::error::CallError;
use crate::provider::{
    Completion, CompletionRequest, GeneratedImage, ImageProvider, ImageRequest,
    TextCompletionProvider,
};
use std::future::Future;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Run one text completion under the configured timeout and retry policy.
pub async fn call_text(
    provider: &dyn TextCompletionProvider,
    request: &CompletionRequest,
    config: &PipelineConfig,
    label: &str,
) -> Result<Completion, CallError> {
    let start = Instant::now();
    let completion = with_retry(config, config.api_timeout_secs, label, || {
        provider.complete(request)
    })
    .await?;

    if completion.content.trim().is_empty() {
        return Err(CallError::Empty);
    }
    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        label,
        completion.prompt_tokens,
        completion.completion_tokens,
        start.elapsed()
    );
    Ok(completion)
}

/// Run one image generation under the image timeout and retry policy.
pub async fn call_image(
    provider: &dyn ImageProvider,
    request: &ImageRequest,
    config: &PipelineConfig,
    label: &str,
) -> Result<GeneratedImage, CallError> {
    let image = with_retry(config, config.image_timeout_secs, label, || {
        provider.generate(request)
    })
    .await?;
    if image.bytes.is_empty() {
        return Err(CallError::Empty);
    }
    Ok(image)
}

async fn with_retry<T, F, Fut>(
    config: &PipelineConfig,
    timeout_secs: u64,
    label: &str,
    mut call: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CallError>>,
{
    let mut attempt = 0u32;
    loop {
        let result = match timeout(Duration::from_secs(timeout_secs), call()).await {
            Ok(inner) => inner,
            Err(_) => Err(CallError::Timeout { secs: timeout_secs }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    "{}: attempt {} failed ({}); retrying in {}ms",
                    label, attempt, e, config.retry_backoff_ms
                );
                sleep(Duration::from_millis(config.retry_backoff_ms)).await;
            }
            Err(e) => {
                warn!("{}: failed after {} attempt(s): {}", label, attempt + 1, e);
                return Err(e);
            }
        }
    }
}
