//! Social platforms and their tone/style rules.
//!
//! Every platform-specific decision (tone, length limit, thread splitting,
//! visual style, image size) lives in one [`PlatformProfile`] per
//! [`Platform`], so the generator never branches on platform names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A target social media platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
    Facebook,
    Instagram,
}

impl Platform {
    /// All platforms in presentation order.
    pub const ALL: [Platform; 4] = [
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    /// The static tone/style record for this platform.
    pub fn profile(self) -> &'static PlatformProfile {
        match self {
            Platform::Linkedin => &LINKEDIN,
            Platform::Twitter => &TWITTER,
            Platform::Facebook => &FACEBOOK,
            Platform::Instagram => &INSTAGRAM,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" | "x" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            other => Err(format!(
                "unknown platform '{other}' (expected linkedin, twitter, facebook or instagram)"
            )),
        }
    }
}

/// Tone and visual rules for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Display name used inside prompts.
    pub display_name: &'static str,
    /// One-line tone description.
    pub tone: &'static str,
    /// Prompt requirements, one per line.
    pub requirements: &'static [&'static str],
    /// Hard character limit for a single post (or a single tweet).
    pub max_chars: usize,
    /// Split the reply into a numbered thread instead of one post.
    pub thread: bool,
    /// Maximum number of posts in a thread.
    pub max_thread_len: usize,
    /// Visual style appended to the image prompt.
    pub visual_style: &'static str,
    /// Requested image size (OpenAI `size` parameter).
    pub image_size: &'static str,
    /// Question appended to a post that does not already ask one.
    pub engagement_hook: Option<&'static str>,
}

static LINKEDIN: PlatformProfile = PlatformProfile {
    display_name: "LinkedIn",
    tone: "professional",
    requirements: &[
        "Professional tone aimed at practitioners and researchers",
        "Key findings and methodology as short bullet points",
        "Highlight practical implications",
        "End with a question that invites discussion",
        "3-5 relevant hashtags at the end",
    ],
    max_chars: 1300,
    thread: false,
    max_thread_len: 1,
    visual_style: "professional, clean, business-appropriate, muted blues and greys, minimal composition",
    image_size: "1792x1024",
    engagement_hook: None,
};

static TWITTER: PlatformProfile = PlatformProfile {
    display_name: "Twitter",
    tone: "concise thread",
    requirements: &[
        "A thread of 3-5 tweets",
        "Each tweet on its own line starting with its number, e.g. 1/5",
        "Each tweet at most 280 characters including the number",
        "First tweet is a hook, last tweet is a call to action",
        "At most 2 hashtags in the whole thread",
    ],
    max_chars: 280,
    thread: true,
    max_thread_len: 5,
    visual_style: "eye-catching, modern, tech-focused, bold contrast, high energy",
    image_size: "1792x1024",
    engagement_hook: None,
};

static FACEBOOK: PlatformProfile = PlatformProfile {
    display_name: "Facebook",
    tone: "conversational",
    requirements: &[
        "Conversational, friendly tone for a general audience",
        "Ask the reader a question to encourage comments",
        "Use a few emojis where they fit naturally",
        "At most 500 characters",
    ],
    max_chars: 500,
    thread: false,
    max_thread_len: 1,
    visual_style: "engaging, accessible, community-friendly, warm colours, approachable illustration",
    image_size: "1024x1024",
    engagement_hook: Some("What do you think about this research? Share your thoughts!"),
};

static INSTAGRAM: PlatformProfile = PlatformProfile {
    display_name: "Instagram",
    tone: "visual, emoji-rich",
    requirements: &[
        "Visual-first caption with emojis",
        "Short lines separated by line breaks",
        "A block of 8-12 hashtags at the end",
        "At most 2200 characters",
    ],
    max_chars: 2200,
    thread: false,
    max_thread_len: 1,
    visual_style: "vibrant, aesthetic, visual-first, saturated gradients, square composition",
    image_size: "1024x1024",
    engagement_hook: None,
};

impl PlatformProfile {
    /// Fit a single post within `max_chars`, cutting on a word boundary and
    /// appending the engagement hook when the post asks no question.
    pub fn fit(&self, text: &str) -> String {
        let text = text.trim();
        match self.engagement_hook {
            Some(hook) if !text.contains('?') => {
                let budget = self.max_chars.saturating_sub(hook.chars().count() + 2);
                format!("{}\n\n{hook}", truncate_chars(text, budget))
            }
            _ => truncate_chars(text, self.max_chars),
        }
    }

    /// Split a model reply into thread items, numbering them `i/n`.
    ///
    /// Lines starting with `1/`, `2.` and similar open a new item; other
    /// non-empty lines continue the current one.
    pub fn split_thread(&self, text: &str) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();
        let mut current = String::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if starts_with_item_number(line) {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
                current = strip_item_number(line).to_string();
            } else if current.is_empty() {
                current = line.to_string();
            } else {
                current.push(' ');
                current.push_str(line);
            }
        }
        if !current.is_empty() {
            items.push(current);
        }
        items.truncate(self.max_thread_len);

        let n = items.len();
        items
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let prefix = format!("{}/{} ", i + 1, n);
                let budget = self.max_chars.saturating_sub(prefix.chars().count());
                format!("{prefix}{}", truncate_chars(&body, budget))
            })
            .collect()
    }
}

/// `1/ `, `1/5 `, `2. `, `3) `: a short number and a delimiter followed by
/// whitespace. `28.4 BLEU` is not a marker.
static RE_ITEM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(?:/\d{0,2}|[.)])(?:\s+|$)").unwrap());

fn starts_with_item_number(line: &str) -> bool {
    RE_ITEM_MARKER.is_match(line)
}

fn strip_item_number(line: &str) -> &str {
    match RE_ITEM_MARKER.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Truncate to at most `max` characters, preferring the last space and
/// marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let cut: String = text.chars().take(max - 1).collect();
    let cut = match cut.rfind(' ') {
        Some(pos) if pos > cut.len() / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}
