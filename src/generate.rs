//! The end-to-end pipeline: one source document in, a [`ContentBundle`] out.
//!
//! [`Pipeline`] owns the three external capabilities (text model, image
//! service, blog publisher) and the configuration. Each stage is also exposed
//! on its own so callers can, for example, re-run only the poster with a
//! different style against an analysis they already have.

use crate::config::PipelineConfig;
use crate::error::ScholarError;
use crate::output::{ContentBundle, RunStats};
use crate::pipeline::image::OpenAiImageProvider;
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::publish::DevToPublisher;
use crate::pipeline::{analyze, blog, poster, social};
use crate::progress::Stage;
use crate::provider::{resolve_text_provider, BlogPublisher, ImageProvider, TextCompletionProvider};
use crate::records::{
    AnalysisRecord, BlogRecord, NormalizedDocument, Orientation, PosterOutcome, PosterStyle,
    PublishMode, PublishReceipt, SocialPost,
};
use crate::stream::{social_stream, PostStream};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Per-run choices that are not part of the long-lived configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub style: PosterStyle,
    pub orientation: Orientation,
    /// Publish the blog post after generation.
    pub publish: Option<PublishMode>,
}

/// Text model, image service and publisher wired to one configuration.
#[derive(Clone)]
pub struct Pipeline {
    text: Arc<dyn TextCompletionProvider>,
    images: Option<Arc<dyn ImageProvider>>,
    publisher: Option<Arc<dyn BlogPublisher>>,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("text", &self.text.name())
            .field("images", &self.images.is_some())
            .field("publisher", &self.publisher.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    /// A pipeline with only a text model; social posts get no images and
    /// publishing is unavailable until the other capabilities are attached.
    pub fn new(text: Arc<dyn TextCompletionProvider>, config: PipelineConfig) -> Self {
        Self {
            text,
            images: None,
            publisher: None,
            config,
        }
    }

    /// Build every capability the configuration allows.
    ///
    /// The text model is resolved through [`resolve_text_provider`]. The image
    /// service is attached when an image API key is configured, the DEV.to
    /// publisher when a publishing key is.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ScholarError> {
        let text = resolve_text_provider(&config)?;
        let mut pipeline = Self::new(text, config);

        if pipeline.config.image.api_key.is_some() {
            let provider =
                OpenAiImageProvider::new(pipeline.config.image.clone(), pipeline.config.image_timeout_secs)
                    .map_err(|e| ScholarError::Internal(e.to_string()))?;
            pipeline.images = Some(Arc::new(provider));
        } else {
            warn!("No image API key configured; social posts will have no images");
        }

        if pipeline.config.publish.api_key.is_some() {
            let publisher =
                DevToPublisher::new(&pipeline.config.publish, pipeline.config.publish_timeout_secs)?;
            pipeline.publisher = Some(Arc::new(publisher));
        }
        Ok(pipeline)
    }

    pub fn with_image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.images = Some(provider);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn BlogPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── Single stages ────────────────────────────────────────────────────

    pub async fn normalize(&self, source: &SourceDocument) -> Result<NormalizedDocument, ScholarError> {
        self.staged(
            Stage::Input,
            input::normalize(source, self.config.download_timeout_secs),
        )
        .await
    }

    pub async fn analyze(&self, document: &NormalizedDocument) -> Result<AnalysisRecord, ScholarError> {
        self.staged(
            Stage::Analysis,
            analyze::analyze(self.text.as_ref(), document, &self.config),
        )
        .await
    }

    /// Normalize and analyze in one step.
    pub async fn analyze_source(
        &self,
        source: &SourceDocument,
    ) -> Result<(NormalizedDocument, AnalysisRecord), ScholarError> {
        let document = self.normalize(source).await?;
        let analysis = self.analyze(&document).await?;
        Ok((document, analysis))
    }

    pub async fn blog(&self, analysis: &AnalysisRecord) -> Result<BlogRecord, ScholarError> {
        self.staged(
            Stage::Blog,
            blog::generate_blog(self.text.as_ref(), analysis, &self.config),
        )
        .await
    }

    /// Posts for every configured platform; failures are recorded per post.
    pub async fn social(&self, analysis: &AnalysisRecord) -> Vec<SocialPost> {
        let start = Instant::now();
        self.notify_start(Stage::Social);
        let posts = social::generate_social(
            self.text.as_ref(),
            self.images.as_deref(),
            analysis,
            &self.config,
        )
        .await;
        self.notify_complete(Stage::Social, start);
        posts
    }

    /// Like [`Pipeline::social`], but yields each post as it finishes.
    pub fn social_stream(&self, analysis: &AnalysisRecord) -> PostStream {
        social_stream(
            Arc::clone(&self.text),
            self.images.clone(),
            analysis.clone(),
            self.config.clone(),
        )
    }

    pub async fn poster(
        &self,
        analysis: &AnalysisRecord,
        style: PosterStyle,
        orientation: Orientation,
    ) -> Result<PosterOutcome, ScholarError> {
        self.staged(
            Stage::Poster,
            poster::generate_poster(self.text.as_ref(), analysis, style, orientation, &self.config),
        )
        .await
    }

    /// Publish a blog post. Fails with `PublisherNotConfigured` when no
    /// publisher is attached; never retried.
    pub async fn publish(&self, blog: &BlogRecord, mode: PublishMode) -> Result<PublishReceipt, ScholarError> {
        let publisher = self
            .publisher
            .as_ref()
            .ok_or_else(|| ScholarError::PublisherNotConfigured {
                hint: "set DEVTO_API_KEY or attach a publisher".into(),
            })?;
        self.staged(Stage::Publish, publisher.publish(blog, mode)).await
    }

    // ── Full run ─────────────────────────────────────────────────────────

    /// Normalize, analyze, then generate blog, social posts and poster
    /// concurrently.
    ///
    /// # Errors
    /// Only input and analysis failures are fatal. Generator failures are
    /// recorded on the bundle (`blog_error`, `poster_error`, per-post errors)
    /// so one failing output never discards the others.
    pub async fn run(&self, source: &SourceDocument, options: &RunOptions) -> Result<ContentBundle, ScholarError> {
        let total_start = Instant::now();

        // ── Step 1: Normalize + analyze ──────────────────────────────────
        let (document, analysis) = self.analyze_source(source).await?;
        let analysis_ms = total_start.elapsed().as_millis() as u64;

        // ── Step 2: Independent generators ───────────────────────────────
        let generation_start = Instant::now();
        let (blog_result, posts, poster_result) = tokio::join!(
            self.blog(&analysis),
            self.social(&analysis),
            self.poster(&analysis, options.style, options.orientation),
        );
        let generation_ms = generation_start.elapsed().as_millis() as u64;

        let (blog, blog_error) = split(blog_result);
        let (poster, poster_error) = split(poster_result);

        // ── Step 3: Optional publish ─────────────────────────────────────
        let (publish, publish_error) = match (options.publish, blog.as_ref()) {
            (Some(mode), Some(b)) => split(self.publish(b, mode).await),
            (Some(_), None) => (None, Some("blog generation failed; nothing to publish".to_string())),
            (None, _) => (None, None),
        };

        let stats = RunStats {
            analysis_ms,
            generation_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
            posts_with_text: posts.iter().filter(|p| p.text.is_some()).count(),
            posts_with_image: posts.iter().filter(|p| p.image.is_some()).count(),
            unit_failures: posts.iter().map(|p| p.errors().count()).sum::<usize>()
                + poster
                    .as_ref()
                    .map_or(0, |p: &PosterOutcome| usize::from(p.compile_error.is_some())),
        };
        info!(
            "Run complete: blog {}, {}/{} posts with text, poster {}, {}ms total",
            if blog.is_some() { "ok" } else { "failed" },
            stats.posts_with_text,
            posts.len(),
            if poster.is_some() { "ok" } else { "failed" },
            stats.total_ms
        );

        Ok(ContentBundle {
            source: document.metadata,
            analysis,
            blog,
            blog_error,
            social: posts,
            poster,
            poster_error,
            publish,
            publish_error,
            stats,
            generated_at: Utc::now(),
        })
    }

    // ── Progress plumbing ────────────────────────────────────────────────

    async fn staged<T, F>(&self, stage: Stage, fut: F) -> Result<T, ScholarError>
    where
        F: Future<Output = Result<T, ScholarError>>,
    {
        let start = Instant::now();
        self.notify_start(stage);
        let result = fut.await;
        match result {
            Ok(_) => self.notify_complete(stage, start),
            Err(ref e) => {
                warn!("{} stage failed: {}", stage, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_stage_error(stage, &e.to_string());
                }
            }
        }
        result
    }

    fn notify_start(&self, stage: Stage) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
        }
    }

    fn notify_complete(&self, stage: Stage, start: Instant) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, start.elapsed().as_millis() as u64);
        }
    }
}

fn split<T>(result: Result<T, ScholarError>) -> (Option<T>, Option<String>) {
    match result {
        Ok(v) => (Some(v), None),
        Err(e) => (None, Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use crate::provider::{Completion, CompletionRequest};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl TextCompletionProvider for Unreachable {
        async fn complete(&self, _: &CompletionRequest) -> Result<Completion, CallError> {
            Err(CallError::Service {
                message: "unreachable".into(),
                transient: false,
            })
        }
    }

    fn blog_record() -> BlogRecord {
        BlogRecord {
            title: "T".into(),
            sections: vec![],
            tags: Default::default(),
            reading_time_minutes: 1,
            description: "d".into(),
            markdown: "# T\n".into(),
        }
    }

    #[tokio::test]
    async fn publish_without_publisher_is_not_configured() {
        let pipeline = Pipeline::new(Arc::new(Unreachable), PipelineConfig::default());
        let err = pipeline.publish(&blog_record(), PublishMode::Draft).await.unwrap_err();
        assert!(matches!(err, ScholarError::PublisherNotConfigured { .. }));
    }

    #[tokio::test]
    async fn analysis_failure_is_fatal() {
        let pipeline = Pipeline::new(Arc::new(Unreachable), PipelineConfig::default());
        let source = SourceDocument::Text("Some paper text.".into());
        let err = pipeline.run(&source, &RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, ScholarError::Generation { stage: "analysis", .. }));
    }

    #[test]
    fn from_config_attaches_configured_capabilities() {
        let config = PipelineConfig::builder()
            .provider(Arc::new(Unreachable))
            .publish_settings(crate::config::PublishSettings {
                api_key: Some("k".into()),
                ..Default::default()
            })
            .build()
            .unwrap();
        let pipeline = Pipeline::from_config(config).unwrap();
        assert!(pipeline.publisher.is_some());
        assert!(pipeline.images.is_none());
    }
}
