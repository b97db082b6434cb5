//! Single-target comment task: open a profile, pick its newest non-pinned
//! post, and leave one generated comment.

use super::{selectors as sel, MentionOrchestrator, ResolutionStep};
use crate::core::config::normalize_handle;
use crate::core::types::InteractionResult;
use crate::generator::CommentRequest;
use crate::store::InteractionAction;
use crate::surface::{ElementRef, Locator, ResponseFilter};
use anyhow::Context;
use tracing::{debug, info, warn};

impl MentionOrchestrator {
    /// Comment once on `target`'s latest post. Never fails: errors become
    /// [`InteractionResult::Failed`] with a diagnostic screenshot.
    pub async fn comment_on_target(&mut self, target: &str) -> InteractionResult {
        let target = normalize_handle(target);
        let result = match self.comment_flow(&target).await {
            Ok(result) => result,
            Err(e) => {
                warn!("❌ comment on {} failed: {:#}", target, e);
                self.capture_diagnostic("comment_error", &target).await;
                InteractionResult::Failed
            }
        };
        self.stats.record(InteractionAction::Comment, result);
        info!("🏁 comment on {} → {}", target, result);
        result
    }

    async fn comment_flow(&self, target: &str) -> anyhow::Result<InteractionResult> {
        let profile_url = format!("{}/{}/", self.base_url, target);
        self.surface
            .navigate(&profile_url)
            .await
            .context("failed to open target profile")?;
        self.human.wait(2000, 4000).await;

        if self
            .visible_first(&Locator::text(sel::PRIVATE_MARKER_CSS, sel::PRIVATE_MARKER_TEXT), None)
            .await
            .is_some()
        {
            info!("🔒 {} is private; skipping", target);
            return Ok(InteractionResult::Skipped);
        }

        let Some(link) = self.latest_unpinned_post().await? else {
            info!("📭 {} has no eligible post", target);
            return Ok(InteractionResult::Skipped);
        };
        let post_url = self
            .surface
            .attribute(link, "href")
            .await?
            .and_then(|h| super::discovery::canonical_post_url(&self.base_url, &h))
            .unwrap_or_else(|| profile_url.clone());

        self.log_step(ResolutionStep::OpenPost, &post_url);
        let capture = self
            .surface
            .observe_responses(ResponseFilter::new("video/", &sel::MEDIA_HOSTS))
            .await?;
        self.human.click(link).await?;
        self.human.wait(2000, 4000).await;
        let root = self.post_root().await?;
        let post = self.extract_post(root, &capture).await;
        drop(capture);

        self.log_step(ResolutionStep::Generate(InteractionAction::Comment), &post_url);
        let text = self
            .generator
            .generate_comment(&CommentRequest {
                post,
                prompt_hint: self.account.prompt_hint.clone(),
            })
            .await?;

        self.log_step(ResolutionStep::Type(InteractionAction::Comment), &post_url);
        self.type_into_composer(root, &text).await?;

        self.log_step(ResolutionStep::Submit, &post_url);
        self.submit(root).await?;

        self.log_step(ResolutionStep::Verify, &post_url);
        if !self.verify_posted(root, &text).await {
            warn!("⚠️  comment not visible on {} after submit; counting as sent", post_url);
        }

        self.record_interaction(&post_url, InteractionAction::Comment, &text);
        Ok(InteractionResult::Success)
    }

    /// First post link in grid order that does not carry a pinned marker.
    async fn latest_unpinned_post(&self) -> anyhow::Result<Option<ElementRef>> {
        let links = self.surface.locate(&Locator::css(sel::POST_LINK), None).await?;
        for link in links {
            let pinned = !self
                .surface
                .locate(&Locator::css(sel::PINNED_MARKER), Some(link))
                .await?
                .is_empty();
            if pinned {
                debug!("profile: skipping pinned post");
                continue;
            }
            return Ok(Some(link));
        }
        Ok(None)
    }
}
