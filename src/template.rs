//! `{{PLACEHOLDER}}` templates for the blog post and the posters.
//!
//! Placeholders are upper-case identifiers in double braces. [`Template::fill`]
//! refuses to leave any placeholder unfilled or empty, and
//! [`Template::extract`] inverts a fill so tests can check that substitution
//! is lossless.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").unwrap());

/// Why a template could not be filled or inverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no value for placeholder(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("empty value for placeholder(s): {}", .0.join(", "))]
    Empty(Vec<String>),

    #[error("filled text does not match the template near placeholder {0}")]
    Mismatch(String),

    #[error("placeholder {0} has two different values")]
    Inconsistent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in RE_PLACEHOLDER.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(caps[1].to_string()));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }
        Self { segments }
    }

    /// Distinct placeholder names in first-appearance order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for seg in &self.segments {
            if let Segment::Placeholder(name) = seg {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Substitute every placeholder; each one needs a non-blank value.
    pub fn fill(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let names = self.placeholders();
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !values.contains_key(*n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::Missing(missing));
        }
        let empty: Vec<String> = names
            .iter()
            .filter(|n| values[*n].trim().is_empty())
            .cloned()
            .collect();
        if !empty.is_empty() {
            return Err(TemplateError::Empty(empty));
        }

        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(&values[name]),
            }
        }
        Ok(out)
    }

    /// Recover placeholder values from a filled template.
    ///
    /// Each value extends up to the first occurrence of the literal text that
    /// follows it, so values must not contain that literal. Adjacent
    /// placeholders with no literal between them cannot be separated.
    pub fn extract(&self, filled: &str) -> Result<BTreeMap<String, String>, TemplateError> {
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        let mut pos = 0;
        let mut i = 0;

        while i < self.segments.len() {
            match &self.segments[i] {
                Segment::Literal(text) => {
                    if !filled[pos..].starts_with(text.as_str()) {
                        return Err(TemplateError::Mismatch(self.name_near(i)));
                    }
                    pos += text.len();
                }
                Segment::Placeholder(name) => {
                    let value = match self.segments.get(i + 1) {
                        None => &filled[pos..],
                        Some(Segment::Literal(next)) => {
                            // The final literal anchors to the end of the text.
                            let end = if i + 2 == self.segments.len() {
                                if !filled.ends_with(next.as_str()) || filled.len() - next.len() < pos {
                                    return Err(TemplateError::Mismatch(name.clone()));
                                }
                                filled.len() - next.len()
                            } else {
                                filled[pos..]
                                    .find(next.as_str())
                                    .map(|off| pos + off)
                                    .ok_or_else(|| TemplateError::Mismatch(name.clone()))?
                            };
                            &filled[pos..end]
                        }
                        Some(Segment::Placeholder(_)) => {
                            return Err(TemplateError::Mismatch(name.clone()));
                        }
                    };
                    match values.get(name) {
                        Some(prev) if prev != value => {
                            return Err(TemplateError::Inconsistent(name.clone()));
                        }
                        _ => {
                            values.insert(name.clone(), value.to_string());
                        }
                    }
                    pos += value.len();
                }
            }
            i += 1;
        }

        if pos != filled.len() {
            return Err(TemplateError::Mismatch(self.name_near(self.segments.len())));
        }
        Ok(values)
    }

    fn name_near(&self, idx: usize) -> String {
        self.segments[..idx.min(self.segments.len())]
            .iter()
            .rev()
            .find_map(|s| match s {
                Segment::Placeholder(n) => Some(n.clone()),
                Segment::Literal(_) => None,
            })
            .unwrap_or_else(|| "<start>".to_string())
    }
}

/// Placeholders left in already-rendered text.
pub fn unfilled_placeholders(text: &str) -> Vec<String> {
    RE_PLACEHOLDER
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}
