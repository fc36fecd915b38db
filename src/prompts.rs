//! Prompts for every LLM call in the pipeline.
//!
//! Prompts only embed fields of the [`AnalysisRecord`]; the generators never
//! see the raw paper.

use crate::platform::Platform;
use crate::records::{AnalysisRecord, Orientation, PosterStyle};

// ── Analysis ─────────────────────────────────────────────────────────────

pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are an expert research paper analyzer with deep knowledge across multiple academic fields. \
You answer with a single JSON object and nothing else.";

/// User prompt asking the model to analyze `paper_text`.
pub fn analysis_prompt(paper_text: &str) -> String {
    format!(
        r#"Analyze the following research paper and extract its key information.

Paper content:
"""
{paper_text}
"""

Respond with ONLY a JSON object with exactly these fields:
{{
  "title": "Paper title",
  "authors": ["Author 1", "Author 2"],
  "abstract": "The paper's abstract or a faithful summary of it",
  "methodology": "How the research was carried out",
  "findings": ["Key finding 1", "Key finding 2", "Key finding 3"],
  "results": "Summary of the main results, with numbers where the paper gives them",
  "conclusion": "The authors' main conclusions",
  "complexity": "beginner | intermediate | advanced",
  "technical_terms": {{"term": "one-sentence plain-language explanation"}}
}}

Rules:
- Use only information stated in the paper. Do not invent authors, numbers or claims.
- "complexity" is exactly one of: beginner, intermediate, advanced.
- "technical_terms" maps each important term to a short explanation a newcomer understands.
- Do not wrap the JSON in markdown fences and do not add commentary."#
    )
}

/// Follow-up sent once when the first analysis reply could not be parsed.
pub fn analysis_reprompt(problem: &str) -> String {
    format!(
        "Your previous reply could not be used: {problem}.\n\
Reply again with ONLY the JSON object described above. Every field is required, \
\"authors\" and \"findings\" are non-empty arrays of strings, \"technical_terms\" is an \
object mapping term to explanation, and \"complexity\" is beginner, intermediate or advanced."
    )
}

/// Marker appended to paper text cut at the context limit.
pub fn truncation_marker(dropped_chars: usize) -> String {
    format!("\n\n[... {dropped_chars} characters truncated ...]")
}

// ── Shared analysis block ────────────────────────────────────────────────

/// The analysis rendered as a prompt block.
pub fn analysis_block(analysis: &AnalysisRecord) -> String {
    let findings = analysis
        .findings
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    let terms = analysis
        .technical_terms
        .iter()
        .map(|(t, e)| format!("- {t}: {e}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Title: {}\nAuthors: {}\nAbstract: {}\nMethodology: {}\nKey findings:\n{}\nResults: {}\nConclusion: {}\nComplexity level: {}\nTechnical terms:\n{}",
        analysis.title,
        analysis.authors.join(", "),
        analysis.abstract_text,
        analysis.methodology,
        findings,
        analysis.results,
        analysis.conclusion,
        analysis.complexity,
        if terms.is_empty() { "- none".to_string() } else { terms },
    )
}

const GROUNDING_RULE: &str =
    "Use only the facts in the analysis above. Do not add results, numbers, names or claims that are not in it, and do not contradict it.";

// ── Blog ─────────────────────────────────────────────────────────────────

pub const BLOG_SYSTEM_PROMPT: &str =
    "You are an expert science writer who makes complex research accessible without losing accuracy. \
You answer with a single JSON object and nothing else.";

/// Ask for every blog section as a JSON field.
pub fn blog_prompt(analysis: &AnalysisRecord, sections: &[&str]) -> String {
    let fields = sections
        .iter()
        .map(|s| format!("  \"{s}\": \"markdown text\""))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"Turn this research paper analysis into an engaging, technically accurate blog post for a general technical audience.

{block}

{GROUNDING_RULE}

Writing guidelines:
- Hook the reader in the introduction and explain why the research matters.
- Explain technical terms with simple analogies.
- Explain the methodology and key findings in detail.
- Use markdown inside sections (lists, **bold**, `code`, $equations$) but no top-level # headings.

Respond with ONLY a JSON object with these fields, each a non-empty string unless noted:
{{
{fields},
  "tags": ["up to 6 lowercase single-word tags"]
}}"#,
        block = analysis_block(analysis),
    )
}

// ── Social ───────────────────────────────────────────────────────────────

pub const SOCIAL_SYSTEM_PROMPT: &str =
    "You are a social media expert who writes engaging, platform-specific posts about research.";

/// Text prompt for one platform, driven by its profile.
pub fn social_prompt(analysis: &AnalysisRecord, platform: Platform, hashtags: &[String]) -> String {
    let profile = platform.profile();
    let requirements = profile
        .requirements
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Write a {name} post ({tone} tone) about this research.\n\n{block}\n\n{GROUNDING_RULE}\n\n\
Requirements:\n{requirements}\n- Suggested hashtags: {tags}\n\n\
Output only the post content. No headers, labels or closing remarks.",
        name = profile.display_name,
        tone = profile.tone,
        block = analysis_block(analysis),
        tags = hashtags.join(" "),
    )
}

/// Image prompt built from the analysis and the platform's visual style.
///
/// The prompt asks for abstract, text-free imagery; words in generated images
/// are usually garbled.
pub fn image_prompt(analysis: &AnalysisRecord, platform: Platform, max_chars: usize) -> String {
    let profile = platform.profile();
    let concepts = analysis
        .technical_terms
        .keys()
        .take(4)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let finding = analysis.findings.first().map(String::as_str).unwrap_or("");

    let prompt = format!(
        "Abstract, symbolic illustration of the research \"{title}\". Core idea: {finding}. \
Visual motifs inspired by: {concepts}. Style: {style}, {name} social media image, \
modern scientific art, high quality, no text, no letters, no logos.",
        title = analysis.title,
        style = profile.visual_style,
        name = profile.display_name,
    );
    crate::platform::truncate_chars(&prompt.replace('\n', " "), max_chars)
}

// ── Poster ───────────────────────────────────────────────────────────────

pub const POSTER_SYSTEM_PROMPT: &str =
    "You condense research summaries into poster-sized text. You answer with a single JSON object and nothing else.";

/// Ask for condensed poster text for each named content slot.
pub fn poster_prompt(
    analysis: &AnalysisRecord,
    style: PosterStyle,
    orientation: Orientation,
    slots: &[(&str, &str)],
) -> String {
    let fields = slots
        .iter()
        .map(|(name, hint)| format!("  \"{name}\": \"{hint}\""))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"Condense this research analysis into text for a {style} style academic conference poster in {orientation} orientation.

{block}

{GROUNDING_RULE}

Keep every field short enough to fit a poster column: plain sentences, no LaTeX commands, no markdown.
Respond with ONLY a JSON object with these fields:
{{
{fields},
  "key_points": ["3-5 short bullet points taken from the key findings"]
}}"#,
        style = style.as_str().to_uppercase(),
        block = analysis_block(analysis),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Complexity;
    use std::collections::BTreeMap;

    fn analysis() -> AnalysisRecord {
        AnalysisRecord {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into(), "Noam Shazeer".into()],
            abstract_text: "We propose the Transformer.".into(),
            methodology: "Self-attention only.".into(),
            findings: vec!["28.4 BLEU on WMT 2014 English-to-German".into()],
            results: "State of the art translation.".into(),
            conclusion: "Attention suffices.".into(),
            complexity: Complexity::Advanced,
            technical_terms: BTreeMap::from([
                ("self-attention".into(), "relating positions of one sequence".into()),
                ("BLEU".into(), "translation quality score".into()),
            ]),
        }
    }

    #[test]
    fn analysis_prompt_embeds_text_and_schema() {
        let p = analysis_prompt("PAPER BODY");
        assert!(p.contains("PAPER BODY"));
        for field in ["\"title\"", "\"findings\"", "\"technical_terms\"", "\"complexity\""] {
            assert!(p.contains(field), "missing {field}");
        }
    }

    #[test]
    fn analysis_block_contains_every_field() {
        let block = analysis_block(&analysis());
        assert!(block.contains("Attention Is All You Need"));
        assert!(block.contains("Ashish Vaswani, Noam Shazeer"));
        assert!(block.contains("- 28.4 BLEU"));
        assert!(block.contains("- BLEU: translation quality score"));
        assert!(block.contains("advanced"));
    }

    #[test]
    fn social_prompt_uses_profile_rules() {
        let p = social_prompt(&analysis(), Platform::Twitter, &["#AI".to_string()]);
        assert!(p.contains("Twitter post (concise thread tone)"));
        assert!(p.contains("1/5"));
        assert!(p.contains("#AI"));
        assert!(p.contains(GROUNDING_RULE));
    }

    #[test]
    fn image_prompt_is_bounded_and_styled() {
        let p = image_prompt(&analysis(), Platform::Instagram, 600);
        assert!(p.chars().count() <= 600);
        assert!(p.contains("vibrant"));
        assert!(p.contains("no text"));
        assert!(!p.contains('\n'));
    }

    #[test]
    fn blog_prompt_lists_sections() {
        let p = blog_prompt(&analysis(), &["introduction", "conclusion"]);
        assert!(p.contains("\"introduction\": \"markdown text\""));
        assert!(p.contains("\"conclusion\": \"markdown text\""));
        assert!(p.contains("\"tags\""));
    }

    #[test]
    fn poster_prompt_names_style() {
        let p = poster_prompt(
            &analysis(),
            PosterStyle::Acm,
            Orientation::Portrait,
            &[("abstract", "2-3 sentences")],
        );
        assert!(p.contains("ACM style"));
        assert!(p.contains("portrait orientation"));
        assert!(p.contains("\"abstract\": \"2-3 sentences\""));
    }
}
