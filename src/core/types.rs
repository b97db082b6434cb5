use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A "mentioned you in a comment" notification, resolved to its post.
///
/// `key` is computed once at discovery time from the identifying triple and is
/// the only thing the dedup store ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionNotification {
    pub key: String,
    pub post_url: String,
    #[serde(default)]
    pub commenter_username: Option<String>,
    #[serde(default)]
    pub comment_text: Option<String>,
}

impl MentionNotification {
    pub fn new(
        post_url: impl Into<String>,
        commenter_username: Option<String>,
        comment_text: Option<String>,
    ) -> Self {
        let post_url = post_url.into();
        let key = build_mention_key(
            &post_url,
            commenter_username.as_deref(),
            comment_text.as_deref(),
        );
        Self {
            key,
            post_url,
            commenter_username,
            comment_text,
        }
    }

    /// Post shortcode (`/p/{code}/` or `/reel/{code}/`), used to name artifacts.
    pub fn shortcode(&self) -> String {
        url::Url::parse(&self.post_url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut s| s.nth(1).map(|c| c.to_string()))
            })
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "post".to_string())
    }
}

/// Deterministic dedup key: hex SHA-256 of `post_url|commenter|text`.
///
/// Absent fields hash as the empty string, so the key is stable across
/// process restarts for the same real-world event.
pub fn build_mention_key(post_url: &str, commenter: Option<&str>, text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(post_url.as_bytes());
    hasher.update(b"|");
    hasher.update(commenter.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(text.unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Terminal classification of one comment/reply attempt.
///
/// `Success` and `Skipped` are both "handled" outcomes and mark the mention
/// seen; `Failed` leaves it eligible for the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionResult {
    Success,
    Skipped,
    Failed,
}

impl InteractionResult {
    pub fn is_handled(self) -> bool {
        matches!(self, Self::Success | Self::Skipped)
    }
}

impl fmt::Display for InteractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Pacing window between successive top-level actions (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ActionDelayWindow {
    /// Builds a window, swapping the bounds if they arrive reversed.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        if min_ms > max_ms {
            Self {
                min_ms: max_ms,
                max_ms: min_ms,
            }
        } else {
            Self { min_ms, max_ms }
        }
    }

    /// Fixed window used under the fast timing profile.
    pub fn fast() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 2000,
        }
    }
}

impl Default for ActionDelayWindow {
    fn default() -> Self {
        Self {
            min_ms: 30_000,
            max_ms: 90_000,
        }
    }
}

/// What the orchestrator extracted from an opened post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDetails {
    pub owner: Option<String>,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

/// Tally of one discover+resolve pass for an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub discovered: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn record(&mut self, result: InteractionResult) {
        match result {
            InteractionResult::Success => self.success += 1,
            InteractionResult::Skipped => self.skipped += 1,
            InteractionResult::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_key_is_deterministic() {
        let a = build_mention_key("P1", Some("alice"), Some("@bot nice!"));
        let b = build_mention_key("P1", Some("alice"), Some("@bot nice!"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_mention_key_changes_with_any_field() {
        let base = build_mention_key("P1", Some("alice"), Some("@bot nice!"));
        assert_ne!(base, build_mention_key("P2", Some("alice"), Some("@bot nice!")));
        assert_ne!(base, build_mention_key("P1", Some("bob"), Some("@bot nice!")));
        assert_ne!(base, build_mention_key("P1", Some("alice"), Some("@bot nice?")));
        assert_ne!(base, build_mention_key("P1", None, Some("@bot nice!")));
    }

    #[test]
    fn test_mention_key_known_value() {
        // sha256("P1|alice|@bot nice!") must never change between releases.
        let key = build_mention_key("P1", Some("alice"), Some("@bot nice!"));
        let mut hasher = Sha256::new();
        hasher.update(b"P1|alice|@bot nice!");
        assert_eq!(key, format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn test_shortcode_from_post_url() {
        let m = MentionNotification::new("https://example.com/p/AbC123/", None, None);
        assert_eq!(m.shortcode(), "AbC123");
        let r = MentionNotification::new("https://example.com/reel/XyZ/", None, None);
        assert_eq!(r.shortcode(), "XyZ");
        let bad = MentionNotification::new("not a url", None, None);
        assert_eq!(bad.shortcode(), "post");
    }

    #[test]
    fn test_delay_window_swaps_reversed_bounds() {
        let w = ActionDelayWindow::new(900, 100);
        assert_eq!((w.min_ms, w.max_ms), (100, 900));
    }

    #[test]
    fn test_handled_outcomes() {
        assert!(InteractionResult::Success.is_handled());
        assert!(InteractionResult::Skipped.is_handled());
        assert!(!InteractionResult::Failed.is_handled());
    }
}
