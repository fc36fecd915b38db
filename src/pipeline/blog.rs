//! Blog generation: [`AnalysisRecord`] in, [`BlogRecord`] out.
//!
//! The model writes the body sections as JSON; the title and author line come
//! straight from the analysis. Everything is substituted into
//! `templates/blog.md`, and a reply that leaves any section empty fails the
//! stage instead of producing a post with holes in it.

use crate::config::PipelineConfig;
use crate::error::ScholarError;
use crate::pipeline::{llm, postprocess};
use crate::platform::truncate_chars;
use crate::prompts::{blog_prompt, BLOG_SYSTEM_PROMPT};
use crate::provider::{CompletionRequest, TextCompletionProvider};
use crate::records::{AnalysisRecord, BlogRecord, BlogSection, Complexity};
use crate::template::{unfilled_placeholders, Template};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

static BLOG_TEMPLATE: Lazy<Template> =
    Lazy::new(|| Template::parse(include_str!("../../templates/blog.md")));

/// Body sections requested from the model, in template order.
pub const BLOG_SECTIONS: [&str; 6] = [
    "introduction",
    "background",
    "methodology",
    "findings",
    "implications",
    "conclusion",
];

/// Maximum number of tags kept on a blog record.
pub const MAX_TAGS: usize = 10;

const WORDS_PER_MINUTE: usize = 200;

// Topic phrase → tags, checked on word boundaries against the analysis.
const FIELD_TAGS: &[(&str, [&str; 2])] = &[
    ("machine learning", ["machinelearning", "datascience"]),
    ("deep learning", ["deeplearning", "ai"]),
    ("neural network", ["deeplearning", "ai"]),
    ("language model", ["nlp", "ai"]),
    ("ai", ["ai", "machinelearning"]),
    ("computer science", ["computerscience", "algorithms"]),
    ("data science", ["datascience", "statistics"]),
    ("cybersecurity", ["cybersecurity", "security"]),
    ("cryptography", ["cryptography", "security"]),
    ("software", ["softwareengineering", "programming"]),
    ("cloud", ["cloudcomputing", "devops"]),
];

/// Generate the blog post for an analysis.
pub async fn generate_blog(
    provider: &dyn TextCompletionProvider,
    analysis: &AnalysisRecord,
    config: &PipelineConfig,
) -> Result<BlogRecord, ScholarError> {
    let request = CompletionRequest::new(
        BLOG_SYSTEM_PROMPT,
        blog_prompt(analysis, &BLOG_SECTIONS),
        config.blog_temperature,
        config.max_tokens,
    );
    let reply = llm::call_text(provider, &request, config, "blog")
        .await
        .map_err(|e| generation(e.to_string()))?;

    let blog = build_blog(analysis, &reply.content)?;
    info!(
        "Blog generated: {} sections, {} tags, {} min read",
        blog.sections.len(),
        blog.tags.len(),
        blog.reading_time_minutes
    );
    Ok(blog)
}

fn generation(detail: String) -> ScholarError {
    ScholarError::Generation {
        stage: "blog",
        detail,
    }
}

/// Turn the model's JSON reply into a complete [`BlogRecord`].
pub fn build_blog(analysis: &AnalysisRecord, reply: &str) -> Result<BlogRecord, ScholarError> {
    let json = postprocess::extract_json_object(reply)
        .ok_or_else(|| generation("reply does not contain a JSON object".into()))?;
    let value: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| generation(format!("invalid JSON: {e}")))?;

    let mut sections = Vec::with_capacity(BLOG_SECTIONS.len());
    let mut missing = Vec::new();
    for name in BLOG_SECTIONS {
        let text = value
            .get(name)
            .and_then(|v| v.as_str())
            .map(clean_section)
            .unwrap_or_default();
        if text.is_empty() {
            missing.push(name);
        }
        sections.push(BlogSection {
            name: name.to_string(),
            text,
        });
    }
    if !missing.is_empty() {
        return Err(generation(format!(
            "reply left section(s) empty: {}",
            missing.join(", ")
        )));
    }

    let model_tags: Vec<String> = value
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let tags = merge_tags(analysis, &model_tags);

    let word_count = analysis.title.split_whitespace().count()
        + sections
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum::<usize>();
    let reading_time_minutes = reading_time(word_count);
    let description = meta_description(analysis);

    let mut values: BTreeMap<String, String> = sections
        .iter()
        .map(|s| (s.name.to_ascii_uppercase(), s.text.clone()))
        .collect();
    values.insert("TITLE".into(), analysis.title.clone());
    values.insert("AUTHORS".into(), analysis.authors_line());
    values.insert("READING_TIME".into(), reading_time_minutes.to_string());
    values.insert(
        "TAGS".into(),
        tags.iter().map(|t| format!("#{t}")).collect::<Vec<_>>().join(" "),
    );

    let markdown = BLOG_TEMPLATE
        .fill(&values)
        .map_err(|e| generation(e.to_string()))?;
    let leftover = unfilled_placeholders(&markdown);
    if !leftover.is_empty() {
        return Err(generation(format!(
            "placeholders left in output: {}",
            leftover.join(", ")
        )));
    }
    debug!("Blog markdown: {} chars, {} words", markdown.len(), word_count);

    Ok(BlogRecord {
        title: analysis.title.clone(),
        sections,
        tags,
        reading_time_minutes,
        description,
        markdown: postprocess::ensure_final_newline(&markdown),
    })
}

/// Section text with model quirks removed; stray `{{`/`}}` are flattened so
/// they cannot look like template placeholders.
fn clean_section(raw: &str) -> String {
    let text = postprocess::clean_text(raw);
    let text = text.trim_start_matches('#').trim_start();
    text.replace("{{", "{").replace("}}", "}")
}

/// Estimated reading time at 200 words per minute, never below one minute.
pub fn reading_time(word_count: usize) -> u32 {
    word_count.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

/// Lowercase ASCII alphanumerics only, as DEV.to requires.
pub fn normalise_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Merge model tags with research, complexity and field tags.
pub fn merge_tags(analysis: &AnalysisRecord, model_tags: &[String]) -> BTreeSet<String> {
    let mut ordered: Vec<String> = vec!["research".into(), "science".into()];
    ordered.extend(model_tags.iter().map(|t| normalise_tag(t)));
    ordered.extend(
        match analysis.complexity {
            Complexity::Beginner => ["beginners", "explained"],
            Complexity::Intermediate => ["explained", "academic"],
            Complexity::Advanced => ["advanced", "technical"],
        }
        .map(String::from),
    );

    let haystack = format!(
        "{} {} {}",
        analysis.title,
        analysis.abstract_text,
        analysis.technical_terms.keys().cloned().collect::<Vec<_>>().join(" ")
    )
    .to_lowercase();
    if let Some((_, tags)) = FIELD_TAGS
        .iter()
        .find(|(phrase, _)| contains_phrase(&haystack, phrase))
    {
        ordered.extend(tags.iter().map(|t| t.to_string()));
    }

    let mut out = BTreeSet::new();
    for tag in ordered.into_iter().filter(|t| !t.is_empty() && t.len() <= 30) {
        if out.len() == MAX_TAGS {
            break;
        }
        out.insert(tag);
    }
    out
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// SEO meta description built from the first finding.
pub fn meta_description(analysis: &AnalysisRecord) -> String {
    match analysis.findings.first() {
        Some(finding) => format!(
            "{}. Research insights explained in plain language.",
            truncate_chars(finding.trim_end_matches('.'), 110)
        ),
        None => format!(
            "{}, explained for everyone.",
            truncate_chars(&analysis.title, 110)
        ),
    }
}
