//! Content generation for comments and mention replies.
//!
//! The orchestrator only sees the [`ContentGenerator`] trait. The shipped
//! implementation talks to any OpenAI-compatible `/chat/completions`
//! endpoint (OpenAI, Ollama, LM Studio, ...).

use crate::core::config::GeneratorConfig;
use crate::core::types::PostDetails;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Everything known about a post we are about to comment on.
#[derive(Debug, Clone, Default)]
pub struct CommentRequest {
    pub post: PostDetails,
    /// Per-account steering from config.
    pub prompt_hint: Option<String>,
}

/// A mention to answer, with the post it lives under.
#[derive(Debug, Clone, Default)]
pub struct ReplyRequest {
    pub post: PostDetails,
    pub commenter: Option<String>,
    pub comment_text: Option<String>,
    pub prompt_hint: Option<String>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_comment(&self, request: &CommentRequest) -> Result<String>;
    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String>;
}

const COMMENT_SYSTEM_PROMPT: &str = "You write short, natural social-media comments. One or two sentences, casual tone, at most one emoji, no hashtags, no quotation marks. Never mention that you are automated.";
const REPLY_SYSTEM_PROMPT: &str = "Someone mentioned this account in a comment. Write a short, friendly reply to them: one sentence, casual tone, at most one emoji, no hashtags, no quotation marks. Never mention that you are automated.";

pub struct OpenAiContentGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiContentGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build generator http client")?;
        let generator = Self {
            client,
            base_url: config.resolve_base_url(),
            api_key: config.resolve_api_key(),
            model: config.resolve_model(),
            temperature: config.resolve_temperature(),
        };
        info!(
            "🧠 content generator: model={} endpoint={}",
            generator.model, generator.base_url
        );
        Ok(generator)
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str, image_url: Option<&str>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": build_messages(system_prompt, user_prompt, image_url),
        });

        let builder = self.client.post(url).json(&body);
        let builder = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        };
        let response = builder
            .send()
            .await
            .context("chat.completions request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat.completions failed: status={} body={}",
                status,
                text
            ));
        }

        let value: Value = response
            .json()
            .await
            .context("chat.completions response json parse failed")?;
        let raw = extract_content(&value).ok_or_else(|| anyhow!("chat.completions returned no content"))?;
        let cleaned = clean_generated_text(&raw);
        if cleaned.is_empty() {
            return Err(anyhow!("generated text was empty after cleanup"));
        }
        debug!("generator: {} chars", cleaned.chars().count());
        Ok(cleaned)
    }
}

#[async_trait]
impl ContentGenerator for OpenAiContentGenerator {
    async fn generate_comment(&self, request: &CommentRequest) -> Result<String> {
        let prompt = comment_prompt(request);
        self.complete(COMMENT_SYSTEM_PROMPT, &prompt, request.post.image_url.as_deref())
            .await
            .context("comment generation failed")
    }

    async fn generate_reply(&self, request: &ReplyRequest) -> Result<String> {
        let prompt = reply_prompt(request);
        self.complete(REPLY_SYSTEM_PROMPT, &prompt, request.post.image_url.as_deref())
            .await
            .context("reply generation failed")
    }
}

fn post_context(post: &PostDetails) -> String {
    let mut out = String::new();
    if let Some(owner) = &post.owner {
        out.push_str(&format!("Post by @{}\n", owner));
    }
    if let Some(caption) = post.caption.as_deref().filter(|c| !c.trim().is_empty()) {
        out.push_str(&format!("Caption: {}\n", caption.trim()));
    }
    if let Some(video) = &post.video_url {
        out.push_str(&format!("The post is a video: {}\n", video));
    }
    out
}

fn comment_prompt(request: &CommentRequest) -> String {
    let mut prompt = post_context(&request.post);
    if let Some(hint) = &request.prompt_hint {
        prompt.push_str(&format!("Style notes: {}\n", hint));
    }
    prompt.push_str("Write a comment for this post.");
    prompt
}

fn reply_prompt(request: &ReplyRequest) -> String {
    let mut prompt = post_context(&request.post);
    match (&request.commenter, &request.comment_text) {
        (Some(who), Some(text)) => prompt.push_str(&format!("@{} commented: {}\n", who, text)),
        (Some(who), None) => prompt.push_str(&format!("@{} mentioned us in a comment.\n", who)),
        (None, Some(text)) => prompt.push_str(&format!("Someone commented: {}\n", text)),
        (None, None) => prompt.push_str("Someone mentioned us in a comment.\n"),
    }
    if let Some(hint) = &request.prompt_hint {
        prompt.push_str(&format!("Style notes: {}\n", hint));
    }
    prompt.push_str("Write the reply.");
    prompt
}

/// System + user messages; the image, when present, rides along as an
/// `image_url` content part.
pub fn build_messages(system_prompt: &str, user_prompt: &str, image_url: Option<&str>) -> Value {
    let user_content = match image_url {
        Some(url) => json!([
            {"type": "text", "text": user_prompt},
            {"type": "image_url", "image_url": {"url": url}}
        ]),
        None => json!(user_prompt),
    };
    json!([
        {"role": "system", "content": system_prompt},
        {"role": "user", "content": user_content}
    ])
}

fn extract_content(value: &Value) -> Option<String> {
    value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
}

/// Make model output safe to type: control characters become spaces,
/// whitespace runs collapse, and one layer of wrapping quotes is removed.
pub fn clean_generated_text(raw: &str) -> String {
    let flattened: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = flattened.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_wrapping_quotes(&collapsed).trim().to_string()
}

fn strip_wrapping_quotes(s: &str) -> &str {
    const PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];
    for (open, close) in PAIRS {
        if s.chars().count() >= 2 && s.starts_with(open) && s.ends_with(close) {
            return &s[open.len_utf8()..s.len() - close.len_utf8()];
        }
    }
    s
}
