//! Turning notification rows and comment lists into structured data.
//!
//! Everything here is pure: the orchestrator scrapes raw text and `href`s
//! off the page and hands them in.

use crate::core::types::MentionNotification;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static MENTION_FILTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)mentioned you.*comment").expect("valid mention regex"));

static EXCERPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)mentioned you in a comment:\s*(.+)").expect("valid excerpt regex")
});

static TRAILING_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|\s+)(?:\d+\s*[smhdwy]|\d+\s+(?:second|minute|hour|day|week|month|year)s?(?:\s+ago)?|just now|yesterday)\s*$",
    )
    .expect("valid timestamp regex")
});

/// Path roots that are site sections rather than user profiles.
const RESERVED_ROOTS: [&str; 12] = [
    "p", "reel", "reels", "explore", "accounts", "stories", "direct", "notifications", "about",
    "legal", "developer", "tv",
];

/// One notification row as scraped: visible text plus every link `href`.
#[derive(Debug, Clone, Default)]
pub struct RawNotification {
    pub text: String,
    pub hrefs: Vec<String>,
}

pub fn is_comment_mention(text: &str) -> bool {
    MENTION_FILTER.is_match(text)
}

/// `{base}/p/{code}/` (or `/reel/`) for any link that points at a post.
pub fn canonical_post_url(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let url = base.join(href).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let kind_at = segments.iter().position(|s| *s == "p" || *s == "reel")?;
    let code = segments.get(kind_at + 1)?;
    Some(format!(
        "{}/{}/{}/",
        base_url.trim_end_matches('/'),
        segments[kind_at],
        code
    ))
}

/// Username for a same-site single-segment link such as `/alice/`.
pub fn profile_handle(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let url = base.join(href).ok()?;
    if url.host_str() != base.host_str() {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [handle] if !RESERVED_ROOTS.contains(handle) => Some(handle.to_string()),
        _ => None,
    }
}

/// Comment text following "mentioned you in a comment:", minus any trailing
/// relative timestamps (`2h`, `3 d`, `5 minutes ago`).
pub fn extract_excerpt(text: &str) -> Option<String> {
    let captured = EXCERPT.captures(text)?.get(1)?.as_str();
    let mut excerpt = captured.trim().to_string();
    loop {
        let stripped = TRAILING_TIMESTAMP.replace(&excerpt, "").trim_end().to_string();
        if stripped == excerpt {
            break;
        }
        excerpt = stripped;
    }
    (!excerpt.is_empty()).then_some(excerpt)
}

pub fn parse_notification(raw: &RawNotification, base_url: &str) -> Option<MentionNotification> {
    if !is_comment_mention(&raw.text) {
        return None;
    }
    let post_url = raw
        .hrefs
        .iter()
        .find_map(|h| canonical_post_url(base_url, h))?;
    let author = raw
        .hrefs
        .iter()
        .filter(|h| canonical_post_url(base_url, h).is_none())
        .find_map(|h| profile_handle(base_url, h));
    Some(MentionNotification::new(
        post_url,
        author,
        extract_excerpt(&raw.text),
    ))
}

/// Parse every row, keeping the first occurrence of each key.
pub fn collect_mentions(raws: &[RawNotification], base_url: &str) -> Vec<MentionNotification> {
    let mut seen = HashSet::new();
    raws.iter()
        .filter_map(|raw| parse_notification(raw, base_url))
        .filter(|m| seen.insert(m.key.clone()))
        .collect()
}

/// Handle a rendered comment starts with, lowercased.
fn leading_handle(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?;
    let handle = token
        .trim_start_matches('@')
        .trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'));
    (!handle.is_empty()).then(|| handle.to_lowercase())
}

/// Index of the comment a mention refers to.
///
/// Comment rows render as `<author> <text>`, so the author is compared
/// against the leading handle of each row, never as a substring. Tries, in
/// order: author plus the first 20 characters of the comment, author alone,
/// the snippet alone, then any comment tagging `@{bot_handle}`.
pub fn match_comment(
    comment_texts: &[String],
    author: Option<&str>,
    comment_text: Option<&str>,
    bot_handle: &str,
) -> Option<usize> {
    let lowered: Vec<String> = comment_texts.iter().map(|t| t.to_lowercase()).collect();
    let snippet = comment_text
        .map(|t| t.trim().chars().take(20).collect::<String>().to_lowercase())
        .filter(|s| !s.is_empty());
    let author = author
        .map(|a| a.trim().trim_start_matches('@').to_lowercase())
        .filter(|a| !a.is_empty());
    let by_author = |t: &str| match &author {
        Some(author) => leading_handle(t).as_deref() == Some(author.as_str()),
        None => false,
    };

    if let Some(snippet) = &snippet {
        if let Some(i) = lowered
            .iter()
            .position(|t| by_author(t) && t.contains(snippet.as_str()))
        {
            return Some(i);
        }
    }
    if let Some(i) = lowered.iter().position(|t| by_author(t)) {
        return Some(i);
    }
    if let Some(snippet) = &snippet {
        if let Some(i) = lowered.iter().position(|t| t.contains(snippet.as_str())) {
            return Some(i);
        }
    }
    let tag = format!("@{}", bot_handle.to_lowercase());
    lowered.iter().position(|t| t.contains(&tag))
}
