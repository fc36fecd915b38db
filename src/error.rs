//! Error types for the scholarshare library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScholarError`]: **Fatal** for the stage that returns it: the input
//!   cannot be read, the analysis cannot be parsed, the blog cannot be
//!   completed, or publishing failed. Returned as `Err(ScholarError)`.
//!
//! * [`UnitError`]: **Non-fatal**: a single unit of work failed (one
//!   platform's text or image, the poster compile) while its siblings are
//!   fine. Stored inside [`crate::records::SocialPost`] and
//!   [`crate::records::PosterOutcome`] so callers can present partial results.

use crate::platform::Platform;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scholarshare library.
#[derive(Debug, Error)]
pub enum ScholarError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The source document is empty or contains only whitespace.
    #[error("Input document is empty ({source_kind}); nothing to analyze")]
    EmptyInput { source_kind: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The input string is neither an existing file nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The bytes were expected to be a PDF but are not.
    #[error("Input is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// The PDF was readable but its text layer could not be extracted.
    #[error("Failed to extract text from PDF: {detail}")]
    PdfExtractionFailed { detail: String },

    /// URL download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// URL download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The model output did not match the analysis schema, even after the
    /// single re-prompt.
    #[error("Could not parse paper analysis after {attempts} attempt(s): {detail}")]
    AnalysisParse { attempts: u32, detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// Text generation for a stage failed or came back incomplete.
    #[error("{stage} generation failed: {detail}")]
    Generation { stage: &'static str, detail: String },

    /// The configured LLM provider cannot be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Publish errors ────────────────────────────────────────────────────
    /// The blogging API rejected the credentials (401/403).
    #[error("Publishing rejected: authentication failed (HTTP {status}): {detail}")]
    PublishAuth { status: u16, detail: String },

    /// The blogging API rejected the article (4xx validation error).
    #[error("Publishing rejected by the blogging API (HTTP {status}): {detail}")]
    PublishRejected { status: u16, detail: String },

    /// Network error, timeout, 5xx, or an unreadable response.
    #[error("Publishing failed: {detail}")]
    PublishFailed { detail: String },

    /// No API key configured for the blogging platform.
    #[error("Blog publisher is not configured: {hint}")]
    PublisherNotConfigured { hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScholarError {
    /// True for the malformed/unreadable source document family.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScholarError::EmptyInput { .. }
                | ScholarError::FileNotFound { .. }
                | ScholarError::InvalidInput { .. }
                | ScholarError::NotAPdf { .. }
                | ScholarError::PdfExtractionFailed { .. }
                | ScholarError::DownloadFailed { .. }
                | ScholarError::DownloadTimeout { .. }
        )
    }

    /// True for every blogging-API failure.
    pub fn is_publish_error(&self) -> bool {
        matches!(
            self,
            ScholarError::PublishAuth { .. }
                | ScholarError::PublishRejected { .. }
                | ScholarError::PublishFailed { .. }
                | ScholarError::PublisherNotConfigured { .. }
        )
    }
}

/// A non-fatal error for a single unit of work.
///
/// The surrounding generation continues; the error is recorded next to the
/// partial result it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// Platform text could not be generated.
    #[error("{platform}: text generation failed: {detail}")]
    TextGeneration { platform: Platform, detail: String },

    /// Platform image could not be generated or saved.
    #[error("{platform}: image generation failed: {detail}")]
    ImageGeneration { platform: Platform, detail: String },

    /// The LaTeX compiler failed; `log_tail` holds the end of its log.
    #[error("Poster compilation failed: {detail}")]
    Compilation { detail: String, log_tail: String },
}

/// Failure of a single external call, before it is mapped to a stage error.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// The call did not finish within the timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with an error; `transient` errors may be retried.
    #[error("{message}")]
    Service { message: String, transient: bool },

    /// The service answered, but with nothing usable.
    #[error("empty response")]
    Empty,
}

impl CallError {
    /// Timeouts, 429 and 5xx are worth a second attempt; nothing else is.
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::Timeout { .. } => true,
            CallError::Service { transient, .. } => *transient,
            CallError::Empty => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_input_error() {
        let e = ScholarError::EmptyInput {
            source_kind: "text".into(),
        };
        assert!(e.is_input_error());
        assert!(!e.is_publish_error());
        assert!(e.to_string().contains("empty"));
    }

    #[test]
    fn publish_auth_display() {
        let e = ScholarError::PublishAuth {
            status: 401,
            detail: "invalid api key".into(),
        };
        assert!(e.is_publish_error());
        assert!(e.to_string().contains("401"), "got: {e}");
    }

    #[test]
    fn analysis_parse_display() {
        let e = ScholarError::AnalysisParse {
            attempts: 2,
            detail: "missing field `title`".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2 attempt"));
        assert!(msg.contains("title"));
    }

    #[test]
    fn image_error_names_platform() {
        let e = UnitError::ImageGeneration {
            platform: Platform::Twitter,
            detail: "HTTP 500".into(),
        };
        assert!(e.to_string().starts_with("twitter"));
    }

    #[test]
    fn call_error_transience() {
        assert!(CallError::Timeout { secs: 5 }.is_transient());
        assert!(!CallError::Empty.is_transient());
        assert!(!CallError::Service {
            message: "401".into(),
            transient: false
        }
        .is_transient());
    }
}
