//! Pipeline stages for paper-to-content generation.
//!
//! Each submodule implements one step and is testable on its own with the
//! fakes of [`crate::provider`]'s traits.
//!
//! ## Data Flow
//!
//! ```text
//!                         ┌──▶ blog ─────────▶ publish
//! input ──▶ analyze ──────┼──▶ social (+ image)
//! (PDF/URL/text)  (LLM)   └──▶ poster ──▶ compile
//! ```
//!
//! 1. [`input`]  : PDF bytes, path, URL or raw text to one plain-text document
//! 2. [`analyze`]: the document to a validated [`crate::records::AnalysisRecord`];
//!    one re-prompt when the reply does not parse
//! 3. [`blog`], [`social`], [`poster`]: independent generators over the
//!    analysis; they share nothing mutable and run concurrently
//! 4. [`image`]  : image-service client and image persistence for social posts
//! 5. [`compile`]: optional LaTeX → PDF via an external process
//! 6. [`publish`]: blog post to a DEV.to-compatible API; never retried
//!
//! [`llm`] wraps every model and image call with a timeout and the single
//! transient retry; [`postprocess`] cleans model replies before parsing.

pub mod analyze;
pub mod blog;
pub mod compile;
pub mod image;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod poster;
pub mod publish;
pub mod social;
