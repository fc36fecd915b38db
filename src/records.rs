//! Records produced by each pipeline stage.
//!
//! Every record is plain data (`Serialize`/`Deserialize`) so callers can log,
//! cache or ship it to a UI without touching the generators.

use crate::error::UnitError;
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ── Input ────────────────────────────────────────────────────────────────

/// Where a normalized document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Url,
    Html,
    Text,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Url => "url",
            SourceKind::Html => "html",
            SourceKind::Text => "text",
        })
    }
}

/// Lightweight metadata gathered while normalizing the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_kind: SourceKind,
    /// Page count for PDFs; `None` for text and HTML.
    pub page_count: Option<usize>,
    /// Original URL for downloaded inputs.
    pub source_url: Option<String>,
    /// Character count of `NormalizedDocument::text`.
    pub char_count: usize,
}

/// A paper reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// Reading level of a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Beginner => "beginner",
            Complexity::Intermediate => "intermediate",
            Complexity::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" | "basic" | "introductory" => Ok(Complexity::Beginner),
            "intermediate" | "moderate" => Ok(Complexity::Intermediate),
            "advanced" | "expert" => Ok(Complexity::Advanced),
            other => Err(format!("unknown complexity level '{other}'")),
        }
    }
}

/// Structured extraction of a paper's key content.
///
/// Created once per input document and never mutated; every generator reads
/// from the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub methodology: String,
    pub findings: Vec<String>,
    pub results: String,
    pub conclusion: String,
    pub complexity: Complexity,
    /// Term → plain-language explanation.
    pub technical_terms: BTreeMap<String, String>,
}

impl AnalysisRecord {
    /// "A", "A and B", "A, B, and C".
    pub fn authors_line(&self) -> String {
        match self.authors.as_slice() {
            [] => "Unknown Author".to_string(),
            [one] => one.clone(),
            [a, b] => format!("{a} and {b}"),
            [rest @ .., last] => format!("{}, and {last}", rest.join(", ")),
        }
    }

    /// Human-readable Markdown summary of the analysis.
    pub fn summary_markdown(&self) -> String {
        let findings = self
            .findings
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        let terms = if self.technical_terms.is_empty() {
            "None identified".to_string()
        } else {
            self.technical_terms
                .iter()
                .map(|(term, meaning)| format!("- **{term}**: {meaning}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "# Paper Analysis Summary\n\n\
             ## Title\n{}\n\n\
             ## Authors\n{}\n\n\
             ## Abstract\n{}\n\n\
             ## Methodology\n{}\n\n\
             ## Key Findings\n{}\n\n\
             ## Results\n{}\n\n\
             ## Conclusion\n{}\n\n\
             ## Complexity Level\n{}\n\n\
             ## Technical Terms\n{}\n",
            self.title,
            self.authors_line(),
            self.abstract_text,
            self.methodology,
            findings,
            self.results,
            self.conclusion,
            self.complexity,
            terms,
        )
    }
}

// ── Blog ─────────────────────────────────────────────────────────────────

/// One named body section of a blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogSection {
    /// Section key, matching a template placeholder (e.g. `introduction`).
    pub name: String,
    pub text: String,
}

/// Structured blog-post content derived from an [`AnalysisRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogRecord {
    pub title: String,
    /// Body sections in template order.
    pub sections: Vec<BlogSection>,
    pub tags: BTreeSet<String>,
    pub reading_time_minutes: u32,
    /// SEO meta description.
    pub description: String,
    /// The blog template filled with every value above.
    pub markdown: String,
}

impl BlogRecord {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.text.as_str())
    }
}

// ── Social ───────────────────────────────────────────────────────────────

/// A generated image saved for a social post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialImage {
    /// Where the image was written; `None` when no output directory is set.
    pub path: Option<PathBuf>,
    /// Raw image bytes. Not serialised.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// File extension detected from the bytes (`png`, `jpg`).
    pub format: String,
    /// Prompt sent to the image service.
    pub prompt: String,
}

/// Platform-tailored text and optional image for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub platform: Platform,
    /// Post text; for threads, the items joined by blank lines.
    pub text: Option<String>,
    /// Individual thread items (Twitter); a single item otherwise.
    pub thread: Vec<String>,
    pub image: Option<SocialImage>,
    pub text_error: Option<UnitError>,
    pub image_error: Option<UnitError>,
}

impl SocialPost {
    /// Both text and image were produced.
    pub fn is_complete(&self) -> bool {
        self.text.is_some() && self.image.is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &UnitError> {
        self.text_error.iter().chain(self.image_error.iter())
    }
}

// ── Poster ───────────────────────────────────────────────────────────────

/// Poster template family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterStyle {
    #[default]
    Ieee,
    Acm,
    Nature,
}

impl PosterStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            PosterStyle::Ieee => "ieee",
            PosterStyle::Acm => "acm",
            PosterStyle::Nature => "nature",
        }
    }
}

impl fmt::Display for PosterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosterStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ieee" => Ok(PosterStyle::Ieee),
            "acm" => Ok(PosterStyle::Acm),
            "nature" => Ok(PosterStyle::Nature),
            other => Err(format!("unknown poster style '{other}' (expected ieee, acm or nature)")),
        }
    }
}

/// Poster page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            other => Err(format!("unknown orientation '{other}' (expected landscape or portrait)")),
        }
    }
}

/// Template-driven LaTeX poster content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterSpec {
    pub style: PosterStyle,
    pub orientation: Orientation,
    /// Placeholder name → LaTeX-ready text.
    pub filled_content: BTreeMap<String, String>,
    pub latex_source: String,
    /// Compiled PDF, when compilation was requested and succeeded. Not serialised.
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,
}

/// A poster plus the outcome of the optional compile step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterOutcome {
    pub poster: PosterSpec,
    /// Set when compilation was requested and failed.
    pub compile_error: Option<UnitError>,
}

// ── Publish ──────────────────────────────────────────────────────────────

/// Whether a blog post is created unpublished or immediately public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    #[default]
    Draft,
    Live,
}

impl FromStr for PublishMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PublishMode::Draft),
            "live" | "publish" | "published" => Ok(PublishMode::Live),
            other => Err(format!("unknown publish mode '{other}' (expected draft or live)")),
        }
    }
}

/// What the blogging platform returned for a created post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub id: String,
    pub url: Option<String>,
    pub published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(authors: &[&str]) -> AnalysisRecord {
        AnalysisRecord {
            title: "T".into(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            abstract_text: "A".into(),
            methodology: "M".into(),
            findings: vec!["F1".into(), "F2".into()],
            results: "R".into(),
            conclusion: "C".into(),
            complexity: Complexity::Advanced,
            technical_terms: BTreeMap::from([("attention".into(), "weighting".into())]),
        }
    }

    #[test]
    fn authors_line_variants() {
        assert_eq!(analysis(&[]).authors_line(), "Unknown Author");
        assert_eq!(analysis(&["Ada"]).authors_line(), "Ada");
        assert_eq!(analysis(&["Ada", "Bob"]).authors_line(), "Ada and Bob");
        assert_eq!(
            analysis(&["Ada", "Bob", "Cy"]).authors_line(),
            "Ada, Bob, and Cy"
        );
    }

    #[test]
    fn analysis_serialises_abstract_key() {
        let json = serde_json::to_value(analysis(&["Ada"])).unwrap();
        assert_eq!(json["abstract"], "A");
        assert_eq!(json["complexity"], "advanced");
    }

    #[test]
    fn summary_lists_findings_and_terms() {
        let md = analysis(&["Ada"]).summary_markdown();
        assert!(md.contains("- F1\n- F2"));
        assert!(md.contains("**attention**: weighting"));
        assert!(md.contains("## Complexity Level\nadvanced"));
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("IEEE".parse::<PosterStyle>().unwrap(), PosterStyle::Ieee);
        assert_eq!("Nature".parse::<PosterStyle>().unwrap(), PosterStyle::Nature);
        assert_eq!("Portrait".parse::<Orientation>().unwrap(), Orientation::Portrait);
        assert_eq!("Expert".parse::<Complexity>().unwrap(), Complexity::Advanced);
        assert_eq!("live".parse::<PublishMode>().unwrap(), PublishMode::Live);
        assert!("poster".parse::<PublishMode>().is_err());
    }

    #[test]
    fn social_post_completeness() {
        let post = SocialPost {
            platform: Platform::Facebook,
            text: Some("hi".into()),
            thread: vec!["hi".into()],
            image: None,
            text_error: None,
            image_error: Some(UnitError::ImageGeneration {
                platform: Platform::Facebook,
                detail: "boom".into(),
            }),
        };
        assert!(!post.is_complete());
        assert_eq!(post.errors().count(), 1);
    }
}
