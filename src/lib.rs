//! # scholarshare
//!
//! Turn a research paper into a blog post, social media posts with images and
//! a LaTeX poster using Large Language Models, and optionally publish the blog
//! post to DEV.to.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / URL / text
//!  │
//!  ├─ 1. Input     extract plain text (pdf-extract, scraper for HTML)
//!  ├─ 2. Analyze   one LLM call → AnalysisRecord (one re-prompt on bad JSON)
//!  ├─ 3. Generate  concurrently:
//!  │     ├─ blog    LLM sections → templates/blog.md
//!  │     ├─ social  per platform: LLM text ∥ image service
//!  │     └─ poster  LLM-condensed slots → tikzposter template → pdflatex
//!  ├─ 4. Publish   blog → DEV.to (draft or live, never retried)
//!  └─ 5. Output    analysis, blog, poster and posts written atomically
//! ```
//!
//! Every generated record is derived from the [`AnalysisRecord`]: prompts only
//! embed analysis fields, and titles and authors are copied from the analysis
//! verbatim.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scholarshare::{Pipeline, PipelineConfig, RunOptions, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PipelineConfig::builder().output_dir("outputs").build()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!
//!     let source = SourceDocument::from_input("https://arxiv.org/pdf/1706.03762")?;
//!     let bundle = pipeline.run(&source, &RunOptions::default()).await?;
//!
//!     if let Some(blog) = &bundle.blog {
//!         println!("{}", blog.markdown);
//!     }
//!     scholarshare::write_bundle(&bundle, std::path::Path::new("outputs")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scholarshare` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Failure Model
//!
//! Input and analysis failures are fatal ([`ScholarError`]). After analysis,
//! the blog, each social platform and the poster succeed or fail on their own;
//! per-unit failures are [`UnitError`]s recorded on the result.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod records;
pub mod stream;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ImageSettings, PipelineConfig, PipelineConfigBuilder, PublishSettings};
pub use error::{CallError, ScholarError, UnitError};
pub use generate::{Pipeline, RunOptions};
pub use output::{write_bundle, ContentBundle, RunStats};
pub use pipeline::image::OpenAiImageProvider;
pub use pipeline::input::SourceDocument;
pub use pipeline::publish::DevToPublisher;
pub use platform::{Platform, PlatformProfile};
pub use progress::{NoopProgressCallback, PipelineProgress, ProgressCallback, Stage};
pub use provider::{
    BlogPublisher, Completion, CompletionRequest, GeneratedImage, ImageProvider, ImageRequest,
    LlmTextProvider, TextCompletionProvider,
};
pub use records::{
    AnalysisRecord, BlogRecord, BlogSection, Complexity, DocumentMetadata, NormalizedDocument,
    Orientation, PosterOutcome, PosterSpec, PosterStyle, PublishMode, PublishReceipt, SocialImage,
    SocialPost, SourceKind,
};
pub use stream::{social_stream, PostStream};
