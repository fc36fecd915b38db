//! Run results and writing them to disk.
//!
//! Every file is written atomically (uniquely named temp file + rename), so
//! an interrupted run never leaves a half-written post or poster behind.
//! File names carry the run's timestamp and a short hash, so runs never
//! overwrite each other.

use crate::error::ScholarError;
use crate::records::{
    AnalysisRecord, BlogRecord, DocumentMetadata, PosterOutcome, PublishReceipt, SocialPost,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAX_SLUG_CHARS: usize = 60;

/// Everything one pipeline run produced.
///
/// The analysis is always present; each generator's output is independent,
/// so one of them failing leaves the others intact and records the error
/// message alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBundle {
    pub source: DocumentMetadata,
    pub analysis: AnalysisRecord,
    pub blog: Option<BlogRecord>,
    pub blog_error: Option<String>,
    pub social: Vec<SocialPost>,
    pub poster: Option<PosterOutcome>,
    pub poster_error: Option<String>,
    /// Set when the blog was published as part of the run.
    pub publish: Option<PublishReceipt>,
    pub publish_error: Option<String>,
    pub stats: RunStats,
    pub generated_at: DateTime<Utc>,
}

/// Timing and outcome counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub analysis_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
    pub posts_with_text: usize,
    pub posts_with_image: usize,
    pub unit_failures: usize,
}

impl ContentBundle {
    /// Title slug, without the run suffix.
    pub fn slug(&self) -> String {
        slugify(&self.analysis.title)
    }

    /// File-name stem shared by every output of this run:
    /// `<slug>_<YYYYMMDDTHHMMSS>_<hash8>`.
    ///
    /// The hash covers the full-precision timestamp and the analysis, so two
    /// runs in the same second, or two papers sharing a title, still differ.
    pub fn file_stem(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            self.generated_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        if let Ok(json) = serde_json::to_vec(&self.analysis) {
            hasher.update(&json);
        }
        let digest = format!("{:x}", hasher.finalize());
        format!(
            "{}_{}_{}",
            self.slug(),
            self.generated_at.format("%Y%m%dT%H%M%S"),
            &digest[..8]
        )
    }
}

/// Lowercase ASCII words joined by `-`, cut at a word boundary.
///
/// Falls back to `paper` when the title has no usable characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let words = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase);
    for word in words {
        let extra = if slug.is_empty() { word.len() } else { word.len() + 1 };
        if slug.len() + extra > MAX_SLUG_CHARS {
            if slug.is_empty() {
                slug.push_str(&word[..MAX_SLUG_CHARS]);
            }
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }
    if slug.is_empty() {
        "paper".to_string()
    } else {
        slug
    }
}

/// Write `bytes` to `path` through a uniquely named sibling temp file,
/// creating parent directories as needed.
///
/// Concurrent writers of one path each get their own temp file; the last
/// rename wins.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await?;

    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || {
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(|e| std::io::Error::other(format!("write task failed: {e}")))?
}

async fn write_file(path: PathBuf, bytes: &[u8], written: &mut Vec<PathBuf>) -> Result<(), ScholarError> {
    atomic_write(&path, bytes)
        .await
        .map_err(|e| ScholarError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    written.push(path);
    Ok(())
}

/// Write the bundle's text artefacts under `dir` and return the paths.
///
/// ```text
/// analysis/<stem>_analysis.md
/// analysis/<stem>_analysis.json
/// blog/<stem>_blog.md
/// posters/<stem>_<style>_<orientation>.tex
/// posters/<stem>_<style>_<orientation>.pdf
/// social/<stem>_<platform>.txt
/// ```
///
/// `<stem>` is [`ContentBundle::file_stem`].
///
/// Social images are saved by the generator itself, under `images/`.
pub async fn write_bundle(bundle: &ContentBundle, dir: &Path) -> Result<Vec<PathBuf>, ScholarError> {
    let slug = bundle.file_stem();
    let mut written = Vec::new();

    let analysis_dir = dir.join("analysis");
    write_file(
        analysis_dir.join(format!("{slug}_analysis.md")),
        bundle.analysis.summary_markdown().as_bytes(),
        &mut written,
    )
    .await?;
    let json = serde_json::to_string_pretty(&bundle.analysis)
        .map_err(|e| ScholarError::Internal(format!("serialise analysis: {e}")))?;
    write_file(
        analysis_dir.join(format!("{slug}_analysis.json")),
        json.as_bytes(),
        &mut written,
    )
    .await?;

    if let Some(ref blog) = bundle.blog {
        write_file(
            dir.join("blog").join(format!("{slug}_blog.md")),
            blog.markdown.as_bytes(),
            &mut written,
        )
        .await?;
    }

    if let Some(ref outcome) = bundle.poster {
        let poster = &outcome.poster;
        let stem = format!("{slug}_{}_{}", poster.style, poster.orientation);
        let posters_dir = dir.join("posters");
        write_file(
            posters_dir.join(format!("{stem}.tex")),
            poster.latex_source.as_bytes(),
            &mut written,
        )
        .await?;
        if let Some(ref pdf) = poster.pdf {
            write_file(posters_dir.join(format!("{stem}.pdf")), pdf, &mut written).await?;
        }
    }

    for post in &bundle.social {
        if let Some(ref text) = post.text {
            let mut body = text.clone();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            write_file(
                dir.join("social").join(format!("{slug}_{}.txt", post.platform)),
                body.as_bytes(),
                &mut written,
            )
            .await?;
        }
    }

    info!("Wrote {} files under {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::records::{Complexity, Orientation, PosterSpec, PosterStyle, SourceKind};
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn slug_is_lowercase_words() {
        assert_eq!(slugify("Attention Is All You Need!"), "attention-is-all-you-need");
        assert_eq!(slugify("  BERT: Pre-training  "), "bert-pre-training");
        assert_eq!(slugify("???"), "paper");
        assert_eq!(slugify("Ünïcode Title"), "n-code-title");
    }

    #[test]
    fn slug_is_bounded_at_word_boundary() {
        let title = "word ".repeat(40);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_CHARS);
        assert!(slug.ends_with("word"));

        let long = "x".repeat(100);
        assert_eq!(slugify(&long).len(), MAX_SLUG_CHARS);
    }

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");
        atomic_write(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");

        atomic_write(&path, b"again").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"again");
        let entries = std::fs::read_dir(dir.path().join("a/b")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_path_do_not_clash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let writes = (0..8u8).map(|i| {
            let path = path.clone();
            async move { atomic_write(&path, &[b'a' + i; 64]).await }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }
        let body = std::fs::read(&path).unwrap();
        assert_eq!(body.len(), 64);
        assert!(body.iter().all(|b| *b == body[0]));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    fn bundle() -> ContentBundle {
        let analysis = AnalysisRecord {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into()],
            abstract_text: "A".into(),
            methodology: "M".into(),
            findings: vec!["F".into()],
            results: "R".into(),
            conclusion: "C".into(),
            complexity: Complexity::Advanced,
            technical_terms: BTreeMap::new(),
        };
        ContentBundle {
            source: DocumentMetadata {
                source_kind: SourceKind::Text,
                page_count: None,
                source_url: None,
                char_count: 10,
            },
            analysis,
            blog: Some(BlogRecord {
                title: "Attention Is All You Need".into(),
                sections: vec![],
                tags: BTreeSet::new(),
                reading_time_minutes: 1,
                description: "d".into(),
                markdown: "# Attention\n".into(),
            }),
            blog_error: None,
            social: vec![
                SocialPost {
                    platform: Platform::Linkedin,
                    text: Some("Post".into()),
                    thread: vec!["Post".into()],
                    image: None,
                    text_error: None,
                    image_error: None,
                },
                SocialPost {
                    platform: Platform::Twitter,
                    text: None,
                    thread: vec![],
                    image: None,
                    text_error: None,
                    image_error: None,
                },
            ],
            poster: Some(PosterOutcome {
                poster: PosterSpec {
                    style: PosterStyle::Acm,
                    orientation: Orientation::Portrait,
                    filled_content: BTreeMap::new(),
                    latex_source: "\\documentclass{tikzposter}".into(),
                    pdf: Some(b"%PDF-1.5".to_vec()),
                },
                compile_error: None,
            }),
            poster_error: None,
            publish: None,
            publish_error: None,
            stats: RunStats::default(),
            generated_at: "2026-10-18T09:30:00.123456789Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn bundle_layout() {
        let dir = tempfile::tempdir().unwrap();
        let b = bundle();
        let stem = b.file_stem();
        assert!(stem.starts_with("attention-is-all-you-need_20261018T093000_"));
        assert_eq!(stem.len(), "attention-is-all-you-need_20261018T093000_".len() + 8);

        let written = write_bundle(&b, dir.path()).await.unwrap();
        let rel: Vec<String> = written
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            rel,
            vec![
                format!("analysis/{stem}_analysis.md"),
                format!("analysis/{stem}_analysis.json"),
                format!("blog/{stem}_blog.md"),
                format!("posters/{stem}_acm_portrait.tex"),
                format!("posters/{stem}_acm_portrait.pdf"),
                format!("social/{stem}_linkedin.txt"),
            ]
        );
        let json = std::fs::read_to_string(&written[1]).unwrap();
        let back: AnalysisRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.title, "Attention Is All You Need");
        assert_eq!(std::fs::read_to_string(&written[5]).unwrap(), "Post\n");
    }

    #[tokio::test]
    async fn runs_sharing_a_title_do_not_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let first = bundle();

        // same second, later instant
        let mut rerun = bundle();
        rerun.generated_at = first.generated_at + chrono::Duration::milliseconds(5);
        rerun.blog.as_mut().unwrap().markdown = "# Rerun\n".into();

        // another paper with the same title
        let mut other = bundle();
        other.analysis.authors = vec!["Someone Else".into()];
        other.blog.as_mut().unwrap().markdown = "# Other\n".into();

        let mut all = Vec::new();
        for b in [&first, &rerun, &other] {
            all.extend(write_bundle(b, dir.path()).await.unwrap());
        }
        let unique: BTreeSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(all.len(), 18);

        let blogs: BTreeSet<String> = std::fs::read_dir(dir.path().join("blog"))
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        assert_eq!(blogs.len(), 3);
    }
}
