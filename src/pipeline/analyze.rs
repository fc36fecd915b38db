//! Paper analysis: normalized text in, validated [`AnalysisRecord`] out.
//!
//! The model is asked for a single JSON object. A reply that does not parse
//! or fails validation gets exactly one corrective re-prompt inside the same
//! conversation; a second bad reply is a fatal
//! [`ScholarError::AnalysisParse`].

use crate::config::PipelineConfig;
use crate::error::{CallError, ScholarError};
use crate::pipeline::{llm, postprocess};
use crate::prompts::{analysis_prompt, analysis_reprompt, truncation_marker, ANALYSIS_SYSTEM_PROMPT};
use crate::provider::{CompletionRequest, TextCompletionProvider, Turn};
use crate::records::{AnalysisRecord, Complexity, NormalizedDocument};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Analyze a paper with one corrective re-prompt on a malformed reply.
pub async fn analyze(
    provider: &dyn TextCompletionProvider,
    document: &NormalizedDocument,
    config: &PipelineConfig,
) -> Result<AnalysisRecord, ScholarError> {
    if document.text.trim().is_empty() {
        return Err(ScholarError::EmptyInput {
            source_kind: document.metadata.source_kind.to_string(),
        });
    }

    let paper = truncate_paper(&document.text, config.max_input_chars);
    let mut request = CompletionRequest::new(
        ANALYSIS_SYSTEM_PROMPT,
        analysis_prompt(&paper),
        config.analysis_temperature,
        config.max_tokens,
    );

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let outcome = match llm::call_text(provider, &request, config, "analysis").await {
            Ok(reply) => parse_analysis(&reply.content).map_err(|problem| (problem, reply.content)),
            Err(CallError::Empty) => Err(("the reply was empty".to_string(), String::new())),
            Err(other) => {
                return Err(ScholarError::Generation {
                    stage: "analysis",
                    detail: other.to_string(),
                })
            }
        };

        match outcome {
            Ok(record) => {
                info!(
                    "Analysis complete: \"{}\" ({} authors, {} findings, {})",
                    record.title,
                    record.authors.len(),
                    record.findings.len(),
                    record.complexity
                );
                return Ok(record);
            }
            Err((problem, content)) if attempts == 1 => {
                warn!("Analysis reply rejected ({}); re-prompting once", problem);
                if !content.trim().is_empty() {
                    request.turns.push(Turn::assistant(content));
                }
                request.turns.push(Turn::user(analysis_reprompt(&problem)));
            }
            Err((problem, _)) => {
                return Err(ScholarError::AnalysisParse {
                    attempts,
                    detail: problem,
                });
            }
        }
    }
}

/// Keep the head of a long paper and mark the cut.
pub fn truncate_paper(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    warn!("Paper truncated from {} to {} characters", total, max_chars);
    format!("{kept}{}", truncation_marker(total - max_chars))
}

/// Wire shape of the model's reply; every field optional so validation can
/// name exactly what is missing.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    title: Option<String>,
    authors: Option<StringOrList>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    methodology: Option<String>,
    findings: Option<StringOrList>,
    key_findings: Option<StringOrList>,
    results: Option<String>,
    conclusion: Option<String>,
    #[serde(alias = "complexity_level")]
    complexity: Option<String>,
    technical_terms: Option<TermsShape>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    List(Vec<String>),
    One(String),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            StringOrList::List(v) => v,
            StringOrList::One(s) => s.split([',', ';']).map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Models return the glossary as an object, a list of pairs, or a bare list
/// of terms with no explanations.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TermsShape {
    Map(BTreeMap<String, String>),
    Pairs(Vec<TermPair>),
    Names(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct TermPair {
    term: String,
    #[serde(alias = "definition", alias = "meaning")]
    explanation: String,
}

/// Parse and validate a reply; the error string is fed back to the model.
pub fn parse_analysis(reply: &str) -> Result<AnalysisRecord, String> {
    let json = postprocess::extract_json_object(reply)
        .ok_or_else(|| "the reply does not contain a JSON object".to_string())?;
    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| format!("the JSON is invalid ({e})"))?;

    let mut missing = Vec::new();
    let mut text = |value: Option<String>, name: &'static str| {
        let v = value.map(|s| s.trim().to_string()).unwrap_or_default();
        if v.is_empty() {
            missing.push(name);
        }
        v
    };
    let title = text(raw.title, "title");
    let abstract_text = text(raw.abstract_text, "abstract");
    let methodology = text(raw.methodology, "methodology");
    let results = text(raw.results, "results");
    let conclusion = text(raw.conclusion, "conclusion");

    let authors = raw.authors.map(StringOrList::into_vec).unwrap_or_default();
    if authors.is_empty() {
        missing.push("authors");
    }
    let findings = raw
        .findings
        .or(raw.key_findings)
        .map(StringOrList::into_vec)
        .unwrap_or_default();
    if findings.is_empty() {
        missing.push("findings");
    }
    if !missing.is_empty() {
        return Err(format!("missing or empty field(s): {}", missing.join(", ")));
    }

    let complexity: Complexity = raw
        .complexity
        .as_deref()
        .ok_or_else(|| "missing field: complexity".to_string())?
        .parse()?;

    let technical_terms = match raw.technical_terms {
        None => BTreeMap::new(),
        Some(TermsShape::Map(m)) => m,
        Some(TermsShape::Pairs(pairs)) => pairs
            .into_iter()
            .map(|p| (p.term, p.explanation))
            .collect(),
        Some(TermsShape::Names(names)) => {
            warn!(
                "Dropping {} technical terms returned without explanations",
                names.len()
            );
            BTreeMap::new()
        }
    }
    .into_iter()
    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    .filter(|(k, v)| !k.is_empty() && !v.is_empty())
    .collect();

    Ok(AnalysisRecord {
        title,
        authors,
        abstract_text,
        methodology,
        findings,
        results,
        conclusion,
        complexity,
        technical_terms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, Role};
    use crate::records::{DocumentMetadata, SourceKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a fixed script and records every request.
    struct Scripted {
        replies: Mutex<Vec<&'static str>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: &[&'static str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().copied().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextCompletionProvider for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CallError> {
            self.seen.lock().unwrap().push(request.clone());
            let content = self.replies.lock().unwrap().pop().unwrap_or("");
            Ok(Completion {
                content: content.to_string(),
                ..Default::default()
            })
        }
    }

    fn document() -> NormalizedDocument {
        let text = "Attention Is All You Need\n\nWe propose the Transformer.".to_string();
        NormalizedDocument {
            metadata: DocumentMetadata {
                source_kind: SourceKind::Text,
                page_count: None,
                source_url: None,
                char_count: text.chars().count(),
            },
            text,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::builder().retry_backoff_ms(1).build().unwrap()
    }

    const GOOD: &str = r#"{
        "title": "Attention Is All You Need",
        "authors": ["Ashish Vaswani", "Noam Shazeer"],
        "abstract": "We propose the Transformer.",
        "methodology": "Encoder-decoder built only from attention.",
        "findings": ["28.4 BLEU on WMT14 En-De", "Trains in 3.5 days on 8 GPUs"],
        "results": "New state of the art.",
        "conclusion": "Attention suffices.",
        "complexity": "Advanced",
        "technical_terms": {"self-attention": "relates positions in one sequence"}
    }"#;

    #[test]
    fn parses_well_formed_reply() {
        let a = parse_analysis(GOOD).unwrap();
        assert_eq!(a.title, "Attention Is All You Need");
        assert_eq!(a.authors.len(), 2);
        assert_eq!(a.complexity, Complexity::Advanced);
        assert_eq!(a.technical_terms.len(), 1);
    }

    #[test]
    fn parses_fenced_reply_with_prose() {
        let reply = format!("Here is the analysis:\n```json\n{GOOD}\n```\nLet me know!");
        assert!(parse_analysis(&reply).is_ok());
    }

    #[test]
    fn accepts_alternate_shapes() {
        let reply = r#"{"title":"T","authors":"Ada Lovelace, Charles Babbage","abstract":"A",
            "methodology":"M","key_findings":["F"],"results":"R","conclusion":"C",
            "complexity_level":"intermediate",
            "technical_terms":[{"term":"engine","definition":"a machine"}]}"#;
        let a = parse_analysis(reply).unwrap();
        assert_eq!(a.authors, vec!["Ada Lovelace", "Charles Babbage"]);
        assert_eq!(a.findings, vec!["F"]);
        assert_eq!(a.technical_terms["engine"], "a machine");
    }

    #[test]
    fn names_missing_fields() {
        let err = parse_analysis(r#"{"title": "", "authors": []}"#).unwrap_err();
        assert!(err.contains("title"));
        assert!(err.contains("authors"));
        assert!(err.contains("findings"));
    }

    #[test]
    fn rejects_unknown_complexity() {
        let reply = GOOD.replace("Advanced", "galaxy-brain");
        assert!(parse_analysis(&reply).unwrap_err().contains("complexity"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_analysis("I could not read the paper.").is_err());
    }

    #[test]
    fn truncation_marks_the_cut() {
        let t = truncate_paper(&"a".repeat(50), 20);
        assert!(t.starts_with(&"a".repeat(20)));
        assert!(t.contains("[... 30 characters truncated ...]"));
        assert_eq!(truncate_paper("short", 20), "short");
    }

    #[tokio::test]
    async fn bad_reply_then_good_reply_succeeds() {
        let model = Scripted::new(&["not json at all", GOOD]);
        let record = analyze(&model, &document(), &config()).await.unwrap();
        assert_eq!(record.title, "Attention Is All You Need");
        assert_eq!(model.calls(), 2);

        let seen = model.seen.lock().unwrap();
        let second = &seen[1].turns;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        assert_eq!(second[1].content, "not json at all");
        assert_eq!(second[2].role, Role::User);
        assert!(second[2].content.contains("could not be used"));
    }

    #[tokio::test]
    async fn two_bad_replies_are_fatal() {
        let model = Scripted::new(&["nope", "still nope"]);
        let err = analyze(&model, &document(), &config()).await.unwrap_err();
        assert!(matches!(err, ScholarError::AnalysisParse { attempts: 2, .. }));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn empty_reply_is_re_prompted() {
        let model = Scripted::new(&["   ", GOOD]);
        let record = analyze(&model, &document(), &config()).await.unwrap();
        assert_eq!(record.authors.len(), 2);
        assert_eq!(model.calls(), 2);

        let seen = model.seen.lock().unwrap();
        let second = &seen[1].turns;
        assert!(second.iter().all(|t| t.role == Role::User));
        assert!(second[1].content.contains("the reply was empty"));
    }

    #[test]
    fn bare_term_list_does_not_reject_reply() {
        let reply = GOOD.replace(
            r#"{"self-attention": "relates positions in one sequence"}"#,
            r#"["self-attention", "positional encoding"]"#,
        );
        let a = parse_analysis(&reply).unwrap();
        assert!(a.technical_terms.is_empty());
        assert_eq!(a.findings.len(), 2);
    }
}
