//! Streaming social generation: emit each post as its platform finishes.
//!
//! [`crate::Pipeline::social`] waits for every platform. [`social_stream`]
//! yields each [`SocialPost`] as soon as its text and image are done, so a UI
//! can show LinkedIn while the Instagram image is still rendering. Posts
//! arrive in completion order; sort by `platform` if order matters.

use crate::config::PipelineConfig;
use crate::pipeline::social;
use crate::provider::{ImageProvider, TextCompletionProvider};
use crate::records::{AnalysisRecord, SocialPost};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of finished posts.
pub type PostStream = Pin<Box<dyn Stream<Item = SocialPost> + Send>>;

/// Generate posts for `config.platforms`, yielding each as it completes.
///
/// Every platform runs concurrently. Failures are carried on the post itself
/// (`text_error`, `image_error`), so the stream always yields one item per
/// platform.
pub fn social_stream(
    text: Arc<dyn TextCompletionProvider>,
    images: Option<Arc<dyn ImageProvider>>,
    analysis: AnalysisRecord,
    config: PipelineConfig,
) -> PostStream {
    info!(
        "Starting streaming social generation for {} platform(s)",
        config.platforms.len()
    );
    let concurrency = config.platforms.len().max(1);
    let platforms = config.platforms.clone();
    let analysis = Arc::new(analysis);
    let config = Arc::new(config);

    let posts = stream::iter(platforms)
        .map(move |platform| {
            let text = Arc::clone(&text);
            let images = images.clone();
            let analysis = Arc::clone(&analysis);
            let config = Arc::clone(&config);
            async move {
                social::generate_post(
                    text.as_ref(),
                    images.as_deref(),
                    &analysis,
                    platform,
                    &config,
                )
                .await
            }
        })
        .buffer_unordered(concurrency);

    Box::pin(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use crate::platform::Platform;
    use crate::provider::{Completion, CompletionRequest};
    use crate::records::Complexity;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Canned;

    #[async_trait]
    impl TextCompletionProvider for Canned {
        async fn complete(&self, _: &CompletionRequest) -> Result<Completion, CallError> {
            Ok(Completion {
                content: "Transformers replace recurrence with attention. #AI".into(),
                ..Default::default()
            })
        }
    }

    fn analysis() -> AnalysisRecord {
        AnalysisRecord {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into()],
            abstract_text: "A".into(),
            methodology: "M".into(),
            findings: vec!["F".into()],
            results: "R".into(),
            conclusion: "C".into(),
            complexity: Complexity::Advanced,
            technical_terms: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn yields_one_post_per_platform() {
        let config = PipelineConfig::builder()
            .platforms(vec![Platform::Linkedin, Platform::Facebook])
            .build()
            .unwrap();
        let mut posts: Vec<SocialPost> = social_stream(Arc::new(Canned), None, analysis(), config)
            .collect()
            .await;
        posts.sort_by_key(|p| p.platform);

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].platform, Platform::Linkedin);
        assert_eq!(posts[1].platform, Platform::Facebook);
        assert!(posts.iter().all(|p| p.text.is_some() && p.image.is_none()));
    }
}
