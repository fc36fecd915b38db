//! Poster generation: analysis + style + orientation → LaTeX source.
//!
//! The model condenses the analysis into poster-sized slots; title and authors
//! are copied verbatim from the analysis. Every value is LaTeX-escaped and
//! whitespace-collapsed before substitution, which keeps the filled template
//! invertible: [`Template::extract`] on `latex_source` gives back
//! `filled_content`.

use crate::config::PipelineConfig;
use crate::error::ScholarError;
use crate::pipeline::{compile, llm, postprocess};
use crate::prompts::{poster_prompt, POSTER_SYSTEM_PROMPT};
use crate::provider::{CompletionRequest, TextCompletionProvider};
use crate::records::{AnalysisRecord, Orientation, PosterOutcome, PosterSpec, PosterStyle};
use crate::template::Template;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tracing::{info, warn};

static IEEE: Lazy<Template> =
    Lazy::new(|| Template::parse(include_str!("../../templates/poster/ieee.tex")));
static ACM: Lazy<Template> =
    Lazy::new(|| Template::parse(include_str!("../../templates/poster/acm.tex")));
static NATURE: Lazy<Template> =
    Lazy::new(|| Template::parse(include_str!("../../templates/poster/nature.tex")));

/// Slots condensed by the model, with the length hint sent in the prompt.
pub const POSTER_SLOTS: [(&str, &str); 4] = [
    ("abstract", "2-3 sentence summary of the abstract"),
    ("methodology", "2-3 sentences on how the study was done"),
    ("results", "2-3 sentences with the key numbers"),
    ("conclusion", "1-2 sentence take-away"),
];

const MAX_KEY_POINTS: usize = 5;

/// The parsed template for a style.
pub fn template_for(style: PosterStyle) -> &'static Template {
    match style {
        PosterStyle::Ieee => &*IEEE,
        PosterStyle::Acm => &*ACM,
        PosterStyle::Nature => &*NATURE,
    }
}

/// Generate a poster and, when a compiler is configured, compile it.
///
/// A compile failure is recorded on the outcome; the LaTeX source is always
/// returned.
pub async fn generate_poster(
    provider: &dyn TextCompletionProvider,
    analysis: &AnalysisRecord,
    style: PosterStyle,
    orientation: Orientation,
    config: &PipelineConfig,
) -> Result<PosterOutcome, ScholarError> {
    let request = CompletionRequest::new(
        POSTER_SYSTEM_PROMPT,
        poster_prompt(analysis, style, orientation, &POSTER_SLOTS),
        config.poster_temperature,
        config.max_tokens,
    );
    let reply = llm::call_text(provider, &request, config, "poster")
        .await
        .map_err(|e| ScholarError::Generation {
            stage: "poster",
            detail: e.to_string(),
        })?;

    let mut poster = build_poster(analysis, style, orientation, &reply.content)?;
    info!(
        "Poster generated: {} style, {}, {} chars of LaTeX",
        style,
        orientation,
        poster.latex_source.len()
    );

    let compile_error = match config.latex_compiler {
        Some(ref program) => {
            match compile::compile_latex(&poster.latex_source, program, config.compile_timeout_secs)
                .await
            {
                Ok(pdf) => {
                    poster.pdf = Some(pdf);
                    None
                }
                Err(e) => {
                    warn!("{}", e);
                    Some(e)
                }
            }
        }
        None => None,
    };

    Ok(PosterOutcome {
        poster,
        compile_error,
    })
}

/// Fill the style template from the model's JSON reply.
///
/// Slots the model leaves empty fall back to the matching analysis field.
pub fn build_poster(
    analysis: &AnalysisRecord,
    style: PosterStyle,
    orientation: Orientation,
    reply: &str,
) -> Result<PosterSpec, ScholarError> {
    let parsed: serde_json::Map<String, serde_json::Value> = postprocess::extract_json_object(reply)
        .and_then(|json| serde_json::from_str(json).ok())
        .ok_or_else(|| ScholarError::Generation {
            stage: "poster",
            detail: "reply does not contain a valid JSON object".into(),
        })?;

    let mut values = BTreeMap::new();
    values.insert("ORIENTATION".to_string(), orientation.as_str().to_string());
    values.insert("TITLE".to_string(), escape_latex(&analysis.title));
    values.insert("AUTHORS".to_string(), escape_latex(&analysis.authors.join(", ")));

    for (slot, _) in POSTER_SLOTS {
        let condensed = parsed
            .get(slot)
            .and_then(|v| v.as_str())
            .map(escape_latex)
            .filter(|s| !s.is_empty());
        let value = match condensed {
            Some(v) => v,
            None => {
                warn!("Poster reply has no '{}'; using the analysis text", slot);
                escape_latex(analysis_field(analysis, slot))
            }
        };
        values.insert(slot.to_ascii_uppercase(), value);
    }

    let mut points: Vec<String> = parsed
        .get("key_points")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|p| p.as_str()).map(escape_latex).collect())
        .unwrap_or_default();
    points.retain(|p| !p.is_empty());
    if points.is_empty() {
        points = analysis.findings.iter().map(|f| escape_latex(f)).collect();
    }
    points.truncate(MAX_KEY_POINTS);
    values.insert(
        "KEY_FINDINGS".to_string(),
        points
            .iter()
            .map(|p| format!("  \\item {p}"))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    let latex_source = template_for(style)
        .fill(&values)
        .map_err(|e| ScholarError::Generation {
            stage: "poster",
            detail: e.to_string(),
        })?;

    Ok(PosterSpec {
        style,
        orientation,
        filled_content: values,
        latex_source,
        pdf: None,
    })
}

fn analysis_field<'a>(analysis: &'a AnalysisRecord, slot: &str) -> &'a str {
    match slot {
        "abstract" => &analysis.abstract_text,
        "methodology" => &analysis.methodology,
        "results" => &analysis.results,
        _ => &analysis.conclusion,
    }
}

/// Escape LaTeX special characters and collapse all whitespace to single
/// spaces.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        for c in word.chars() {
            match c {
                '\\' => out.push_str("\\textbackslash{}"),
                '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                    out.push('\\');
                    out.push(c);
                }
                '~' => out.push_str("\\textasciitilde{}"),
                '^' => out.push_str("\\textasciicircum{}"),
                _ => out.push(c),
            }
        }
    }
    out
}
