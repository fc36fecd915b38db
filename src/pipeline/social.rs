//! Social post generation: one independent unit per platform.
//!
//! Inside a unit the text and image requests run concurrently, and each can
//! fail without affecting the other. Across units nothing is shared, so one
//! platform's failure never stops the rest. Failures are recorded on the
//! returned [`SocialPost`] rather than returned as errors.

use crate::config::PipelineConfig;
use crate::error::UnitError;
use crate::output::slugify;
use crate::pipeline::{image, llm, postprocess};
use crate::platform::Platform;
use crate::prompts::{image_prompt, social_prompt, SOCIAL_SYSTEM_PROMPT};
use crate::provider::{CompletionRequest, ImageProvider, ImageRequest, TextCompletionProvider};
use crate::records::{AnalysisRecord, SocialImage, SocialPost};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{info, warn};

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "have", "will", "from", "they", "been", "each", "which", "their",
    "would", "there", "could", "other", "into", "over", "than", "when", "what", "towards",
    "using", "based", "study", "paper", "your", "about", "through", "without", "research",
];

/// Generate posts for every configured platform, concurrently.
///
/// Results come back in `config.platforms` order regardless of which
/// platform finished first.
pub async fn generate_social(
    text_provider: &dyn TextCompletionProvider,
    image_provider: Option<&dyn ImageProvider>,
    analysis: &AnalysisRecord,
    config: &PipelineConfig,
) -> Vec<SocialPost> {
    let mut posts: Vec<SocialPost> = stream::iter(config.platforms.iter().copied())
        .map(|platform| generate_post(text_provider, image_provider, analysis, platform, config))
        .buffer_unordered(config.platforms.len().max(1))
        .collect()
        .await;

    let order: HashMap<Platform, usize> = config
        .platforms
        .iter()
        .enumerate()
        .map(|(i, p)| (*p, i))
        .collect();
    posts.sort_by_key(|p| order.get(&p.platform).copied().unwrap_or(usize::MAX));

    let with_text = posts.iter().filter(|p| p.text.is_some()).count();
    let with_image = posts.iter().filter(|p| p.image.is_some()).count();
    info!(
        "Social posts: {}/{} with text, {}/{} with image",
        with_text,
        posts.len(),
        with_image,
        posts.len()
    );
    posts
}

/// Generate the text and image for a single platform.
pub async fn generate_post(
    text_provider: &dyn TextCompletionProvider,
    image_provider: Option<&dyn ImageProvider>,
    analysis: &AnalysisRecord,
    platform: Platform,
    config: &PipelineConfig,
) -> SocialPost {
    if let Some(ref cb) = config.progress_callback {
        cb.on_platform_start(platform);
    }

    let text_fut = generate_text(text_provider, analysis, platform, config);
    let image_fut = async {
        match image_provider {
            Some(provider) => Some(generate_image(provider, analysis, platform, config).await),
            None => None,
        }
    };
    let (text_result, image_result) = tokio::join!(text_fut, image_fut);

    let mut post = SocialPost {
        platform,
        text: None,
        thread: Vec::new(),
        image: None,
        text_error: None,
        image_error: None,
    };

    match text_result {
        Ok(thread) => {
            post.text = Some(thread.join("\n\n"));
            post.thread = thread;
        }
        Err(e) => post.text_error = Some(e),
    }
    match image_result {
        Some(Ok(img)) => post.image = Some(img),
        Some(Err(e)) => post.image_error = Some(e),
        None => {}
    }

    for err in post.errors() {
        warn!("{}", err);
        if let Some(ref cb) = config.progress_callback {
            cb.on_platform_error(platform, &err.to_string());
        }
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_platform_complete(platform, post.image.is_some());
    }
    post
}

/// Platform text as thread items (a single item for non-thread platforms).
async fn generate_text(
    provider: &dyn TextCompletionProvider,
    analysis: &AnalysisRecord,
    platform: Platform,
    config: &PipelineConfig,
) -> Result<Vec<String>, UnitError> {
    let fail = |detail: String| UnitError::TextGeneration { platform, detail };
    let profile = platform.profile();

    let request = CompletionRequest::new(
        SOCIAL_SYSTEM_PROMPT,
        social_prompt(analysis, platform, &hashtags(analysis)),
        config.social_temperature,
        config.max_tokens,
    );
    let label = format!("social/{platform}");
    let reply = llm::call_text(provider, &request, config, &label)
        .await
        .map_err(|e| fail(e.to_string()))?;

    let cleaned = postprocess::clean_text(&reply.content);
    let items = if profile.thread {
        profile.split_thread(&cleaned)
    } else if cleaned.is_empty() {
        Vec::new()
    } else {
        vec![profile.fit(&cleaned)]
    };
    if items.is_empty() {
        return Err(fail("model returned no usable text".into()));
    }
    Ok(items)
}

async fn generate_image(
    provider: &dyn ImageProvider,
    analysis: &AnalysisRecord,
    platform: Platform,
    config: &PipelineConfig,
) -> Result<SocialImage, UnitError> {
    let fail = |detail: String| UnitError::ImageGeneration { platform, detail };
    let request = ImageRequest {
        prompt: image_prompt(analysis, platform, config.max_image_prompt_chars),
        size: platform.profile().image_size.to_string(),
    };
    let label = format!("image/{platform}");
    let generated = llm::call_image(provider, &request, config, &label)
        .await
        .map_err(|e| fail(e.to_string()))?;

    let path = match config.output_dir {
        Some(ref dir) => Some(
            image::persist_image(dir, &slugify(&analysis.title), platform, &generated)
                .await
                .map_err(|e| fail(format!("could not save image: {e}")))?,
        ),
        None => None,
    };

    Ok(SocialImage {
        path,
        bytes: generated.bytes,
        format: generated.format,
        prompt: request.prompt,
    })
}

/// Up to five hashtags from the most frequent title keywords.
pub fn hashtags(analysis: &AnalysisRecord) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let words = analysis
        .title
        .split(|c: char| !c.is_alphanumeric())
        .chain(analysis.technical_terms.keys().flat_map(|t| t.split_whitespace()))
        .filter(|w| w.chars().count() >= 4 && w.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()));
    for word in words {
        match counts.iter_mut().find(|(w, _)| *w == word) {
            Some((_, n)) => *n += 1,
            None => counts.push((word, 1)),
        }
    }
    // Stable sort keeps first-appearance order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut tags: Vec<String> = counts
        .into_iter()
        .take(4)
        .map(|(w, _)| format!("#{}", capitalise(&w)))
        .collect();
    tags.push("#Research".to_string());
    tags
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Complexity;
    use std::collections::BTreeMap;

    fn analysis() -> AnalysisRecord {
        AnalysisRecord {
            title: "Attention Is All You Need: Attention Without Recurrence".into(),
            authors: vec!["Ashish Vaswani".into()],
            abstract_text: "A".into(),
            methodology: "M".into(),
            findings: vec!["F".into()],
            results: "R".into(),
            conclusion: "C".into(),
            complexity: Complexity::Advanced,
            technical_terms: BTreeMap::from([("transformer model".into(), "x".into())]),
        }
    }

    #[test]
    fn hashtags_prefer_frequent_title_words() {
        let tags = hashtags(&analysis());
        assert_eq!(tags[0], "#Attention");
        assert!(tags.contains(&"#Recurrence".to_string()));
        assert!(tags.contains(&"#Transformer".to_string()));
        assert_eq!(tags.last().map(String::as_str), Some("#Research"));
        assert!(tags.len() <= 5);
    }

    #[test]
    fn hashtags_skip_stop_words() {
        let mut a = analysis();
        a.title = "Towards Using Study Of Things".into();
        a.technical_terms.clear();
        assert_eq!(hashtags(&a), vec!["#Things".to_string(), "#Research".to_string()]);
    }
}
