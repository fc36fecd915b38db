//! Input normalization: PDF bytes, a file path, a URL or raw text in,
//! a [`NormalizedDocument`] out.
//!
//! Empty input is rejected here, before any model call is made. PDF text is
//! extracted with `pdf-extract` on a blocking thread; `lopdf` supplies the
//! page count. HTML pages are reduced to their visible text with `scraper`.

use crate::error::ScholarError;
use crate::records::{DocumentMetadata, NormalizedDocument, SourceKind};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the paper comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDocument {
    /// Raw PDF bytes (e.g. an upload).
    PdfBytes(Vec<u8>),
    /// A local file: PDF, HTML or plain text, detected from content and extension.
    Path(PathBuf),
    /// An HTTP/HTTPS URL serving a PDF or an HTML page.
    Url(String),
    /// Plain text pasted by the user.
    Text(String),
}

impl SourceDocument {
    /// Interpret a CLI-style input string as a URL or a local path.
    pub fn from_input(input: &str) -> Result<Self, ScholarError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScholarError::EmptyInput {
                source_kind: "path".into(),
            });
        }
        if is_url(input) {
            Ok(SourceDocument::Url(input.to_string()))
        } else {
            Ok(SourceDocument::Path(PathBuf::from(input)))
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            SourceDocument::PdfBytes(_) => "pdf",
            SourceDocument::Path(_) => "file",
            SourceDocument::Url(_) => "url",
            SourceDocument::Text(_) => "text",
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reduce any supported source to plain text plus metadata.
pub async fn normalize(
    source: &SourceDocument,
    download_timeout_secs: u64,
) -> Result<NormalizedDocument, ScholarError> {
    let doc = match source {
        SourceDocument::PdfBytes(bytes) => {
            if bytes.is_empty() {
                return Err(empty(source));
            }
            from_pdf(bytes.clone(), None).await?
        }
        SourceDocument::Text(text) => from_text(text, SourceKind::Text, None),
        SourceDocument::Path(path) => from_path(path).await?,
        SourceDocument::Url(url) => from_url(url, download_timeout_secs).await?,
    };

    if doc.text.trim().is_empty() {
        return Err(empty(source));
    }
    info!(
        "Normalized {} input: {} chars{}",
        doc.metadata.source_kind,
        doc.metadata.char_count,
        doc.metadata
            .page_count
            .map(|n| format!(", {n} pages"))
            .unwrap_or_default()
    );
    Ok(doc)
}

fn empty(source: &SourceDocument) -> ScholarError {
    ScholarError::EmptyInput {
        source_kind: source.kind_label().to_string(),
    }
}

fn from_text(text: &str, kind: SourceKind, url: Option<&str>) -> NormalizedDocument {
    let text = normalise_whitespace(text);
    NormalizedDocument {
        metadata: DocumentMetadata {
            source_kind: kind,
            page_count: None,
            source_url: url.map(str::to_string),
            char_count: text.chars().count(),
        },
        text,
    }
}

async fn from_pdf(bytes: Vec<u8>, url: Option<&str>) -> Result<NormalizedDocument, ScholarError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ScholarError::NotAPdf { magic });
    }

    let (text, page_count) = tokio::task::spawn_blocking(move || {
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ScholarError::PdfExtractionFailed {
                detail: e.to_string(),
            })?;
        let pages = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => Some(doc.get_pages().len()),
            Err(e) => {
                debug!("lopdf could not count pages: {}", e);
                None
            }
        };
        Ok::<_, ScholarError>((text, pages))
    })
    .await
    .map_err(extraction_task_failed)??;

    // pdf-extract separates pages with form feeds.
    let page_count = page_count.or_else(|| Some(text.matches('\x0C').count() + 1));
    let mut doc = from_text(&text.replace('\x0C', "\n\n"), SourceKind::Pdf, url);
    doc.metadata.page_count = page_count;
    if doc.text.is_empty() {
        warn!("PDF has no extractable text layer (scanned document?)");
    }
    Ok(doc)
}

/// pdf-extract can panic on malformed documents; that is still unreadable input.
fn extraction_task_failed(e: tokio::task::JoinError) -> ScholarError {
    let detail = if e.is_panic() {
        "the PDF parser crashed on this document".to_string()
    } else {
        format!("extraction task failed: {e}")
    };
    ScholarError::PdfExtractionFailed { detail }
}

fn from_html(html: &str, url: Option<&str>) -> NormalizedDocument {
    from_text(&html_to_text(html), SourceKind::Html, url)
}

async fn from_path(path: &Path) -> Result<NormalizedDocument, ScholarError> {
    if !path.exists() {
        return Err(ScholarError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ScholarError::InvalidInput {
            input: path.display().to_string(),
            reason: e.to_string(),
        })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ScholarError::EmptyInput {
            source_kind: "file".into(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    debug!("Resolved local input: {} (.{})", path.display(), ext);

    if bytes.starts_with(b"%PDF") || ext == "pdf" {
        return from_pdf(bytes, None).await;
    }
    let text = String::from_utf8(bytes).map_err(|_| ScholarError::InvalidInput {
        input: path.display().to_string(),
        reason: "not a PDF and not UTF-8 text".into(),
    })?;
    if matches!(ext.as_str(), "html" | "htm") || looks_like_html(&text) {
        Ok(from_html(&text, None))
    } else {
        Ok(from_text(&text, SourceKind::Text, None))
    }
}

async fn from_url(url: &str, timeout_secs: u64) -> Result<NormalizedDocument, ScholarError> {
    info!("Downloading paper from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScholarError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ScholarError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ScholarError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;
    if !response.status().is_success() {
        return Err(ScholarError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let bytes = response.bytes().await.map_err(map_send_err)?;

    let mut doc = if bytes.starts_with(b"%PDF") || content_type.contains("application/pdf") {
        from_pdf(bytes.to_vec(), Some(url)).await?
    } else {
        let text = String::from_utf8_lossy(&bytes);
        if content_type.contains("html") || looks_like_html(&text) {
            from_html(&text, Some(url))
        } else {
            from_text(&text, SourceKind::Text, Some(url))
        }
    };
    if doc.metadata.source_kind == SourceKind::Text {
        doc.metadata.source_kind = SourceKind::Url;
    }
    Ok(doc)
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.chars().take(512).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype html")
}

static SKIP_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer", "svg"];

/// Visible text of an HTML page, one text run per line.
///
/// Prefers `<article>` or `<main>` when present, else `<body>`.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = ["article", "main", "body"]
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .find_map(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| SKIP_TAGS.contains(&el.value().name()));
        if skipped {
            continue;
        }
        let run = text.trim();
        if !run.is_empty() {
            lines.push(run.to_string());
        }
    }
    lines.join("\n")
}

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static RE_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse runs of spaces and blank lines; normalise line endings.
fn normalise_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = text
        .lines()
        .map(|l| RE_SPACES.replace_all(l.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANKS.replace_all(&text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn from_input_dispatch() {
        assert_eq!(
            SourceDocument::from_input("https://arxiv.org/pdf/1706.03762").unwrap(),
            SourceDocument::Url("https://arxiv.org/pdf/1706.03762".into())
        );
        assert!(matches!(
            SourceDocument::from_input("paper.pdf").unwrap(),
            SourceDocument::Path(_)
        ));
        assert!(SourceDocument::from_input("   ").is_err());
    }

    #[tokio::test]
    async fn parser_crash_is_an_input_error() {
        let join_err = tokio::task::spawn_blocking::<_, ()>(|| panic!("bad xref table"))
            .await
            .unwrap_err();
        let err = extraction_task_failed(join_err);
        assert!(matches!(err, ScholarError::PdfExtractionFailed { .. }));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn malformed_pdf_never_escapes_as_internal_error() {
        let bytes = b"%PDF-1.4\n1 0 obj << /Type /Catalog broken".to_vec();
        match normalize(&SourceDocument::PdfBytes(bytes), 5).await {
            Err(e) => assert!(e.is_input_error(), "got {e:?}"),
            Ok(doc) => assert!(doc.text.is_empty()),
        }
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let err = normalize(&SourceDocument::Text(" \n\t ".into()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::EmptyInput { .. }));
    }

    #[tokio::test]
    async fn empty_pdf_bytes_rejected() {
        let err = normalize(&SourceDocument::PdfBytes(vec![]), 5).await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn non_pdf_bytes_rejected() {
        let err = normalize(&SourceDocument::PdfBytes(b"hello world".to_vec()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::NotAPdf { magic } if &magic == b"hell"));
    }

    #[tokio::test]
    async fn text_is_normalised() {
        let doc = normalize(&SourceDocument::Text("A  title\r\n\r\n\r\n\r\nBody\ttext ".into()), 5)
            .await
            .unwrap();
        assert_eq!(doc.text, "A title\n\nBody text");
        assert_eq!(doc.metadata.source_kind, SourceKind::Text);
        assert_eq!(doc.metadata.char_count, doc.text.chars().count());
    }

    #[tokio::test]
    async fn missing_file() {
        let err = normalize(&SourceDocument::Path("/nonexistent/paper.pdf".into()), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ScholarError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn text_file_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Attention Is All You Need\n\nWe propose the Transformer.").unwrap();
        let doc = normalize(&SourceDocument::Path(path), 5).await.unwrap();
        assert!(doc.text.starts_with("Attention"));
    }

    #[test]
    fn html_text_skips_scripts_and_chrome() {
        let html = r#"<html><head><title>x</title><style>p{}</style></head>
            <body><nav>Home | About</nav>
            <article><h1>Paper Title</h1><p>First <b>bold</b> paragraph.</p>
            <script>var x = 1;</script></article></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Paper Title"));
        assert!(text.contains("First\nbold\nparagraph."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("Home"));
    }
}
