//! Progress-callback trait for stage and platform events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through analysis, blog, social, poster and
//! publish. Social platforms run concurrently, so platform events may arrive
//! from several tasks at once.
//!
//! # Example
//!
//! ```rust
//! use scholarshare::{PipelineConfig, PipelineProgress, Platform};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     platforms: AtomicUsize,
//! }
//!
//! impl PipelineProgress for CountingCallback {
//!     fn on_platform_complete(&self, platform: Platform, has_image: bool) {
//!         self.platforms.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{platform} done (image: {has_image})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { platforms: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgress>)
//!     .build()
//!     .unwrap();
//! ```

use crate::platform::Platform;
use std::fmt;
use std::sync::Arc;

/// A top-level pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Input,
    Analysis,
    Blog,
    Social,
    Poster,
    Publish,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Analysis => "analysis",
            Stage::Blog => "blog",
            Stage::Social => "social",
            Stage::Poster => "poster",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as stages and platforms start and finish.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must protect shared mutable state
/// with `Mutex` or atomics.
pub trait PipelineProgress: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails fatally.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called just before a platform's text and image requests are sent.
    fn on_platform_start(&self, platform: Platform) {
        let _ = platform;
    }

    /// Called when a platform has finished, with or without an image.
    fn on_platform_complete(&self, platform: Platform, has_image: bool) {
        let _ = (platform, has_image);
    }

    /// Called for each non-fatal failure of a platform unit (text or image).
    fn on_platform_error(&self, platform: Platform, error: &str) {
        let _ = (platform, error);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgress for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;
