//! Mention Task Orchestrator.
//!
//! One orchestrator drives one account session: log in (or reuse a stored
//! session), read the notifications page, and answer every comment mention it
//! has not handled before. Outcomes are classified as
//! [`InteractionResult`]s; `Success` and `Skipped` are remembered in the
//! seen-mention store so re-runs are idempotent, `Failed` is retried next
//! cycle.
//!
//! State machine:
//!
//! ```text
//! Uninitialized → LoggingIn → Ready → DiscoveringMentions
//!       → ResolvingMention{index,total} … → Idle
//! ```

pub mod comment_task;
pub mod discovery;
pub mod selectors;

use crate::core::config::{normalize_handle, AccountConfig, BotConfig};
use crate::core::types::{ActionDelayWindow, CycleSummary, InteractionResult, MentionNotification, PostDetails};
use crate::generator::{ContentGenerator, ReplyRequest};
use crate::human::{HumanSimulator, PauseToken, TimingProfile, TypingOptions};
use crate::store::{InteractionAction, InteractionLog, InteractionRecord, SeenMentionStore, StatsStore};
use crate::surface::{ElementRef, Locator, ResponseCapture, ResponseFilter, SurfaceError, UiSurface};
use anyhow::{anyhow, Context};
use discovery::RawNotification;
use selectors as sel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const DIALOG_PROBE: Duration = Duration::from_secs(3);
const ARTICLE_WAIT: Duration = Duration::from_secs(15);
const LOGIN_WAIT: Duration = Duration::from_secs(15);
const INPUT_WAIT: Duration = Duration::from_secs(10);
const VERIFY_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("persistence error: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    LoggingIn,
    Ready,
    DiscoveringMentions,
    ResolvingMention { index: usize, total: usize },
    Idle,
}

/// Reply and comment workflow steps, logged as each one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    OpenPost,
    LocateComment,
    ClickReply,
    Generate(InteractionAction),
    Type(InteractionAction),
    Submit,
    Verify,
}

impl std::fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenPost => f.write_str("open_post"),
            Self::LocateComment => f.write_str("locate_comment"),
            Self::ClickReply => f.write_str("click_reply"),
            Self::Generate(action) => write!(f, "generate_{}", action.as_str()),
            Self::Type(action) => write!(f, "type_{}", action.as_str()),
            Self::Submit => f.write_str("submit"),
            Self::Verify => f.write_str("verify"),
        }
    }
}

pub struct MentionOrchestrator {
    account: AccountConfig,
    handle: String,
    base_url: String,
    surface: Arc<dyn UiSurface>,
    human: HumanSimulator,
    generator: Arc<dyn ContentGenerator>,
    seen: SeenMentionStore,
    stats: StatsStore,
    log: InteractionLog,
    account_dir: PathBuf,
    session_path: PathBuf,
    screenshots_dir: PathBuf,
    action_window: ActionDelayWindow,
    state: OrchestratorState,
}

impl MentionOrchestrator {
    pub fn new(
        config: &BotConfig,
        account: AccountConfig,
        surface: Arc<dyn UiSurface>,
        generator: Arc<dyn ContentGenerator>,
        pause: PauseToken,
    ) -> Self {
        let fast = config.resolve_fast_mode();
        let profile = TimingProfile::from_fast_flag(fast);
        let account_dir = config.account_dir(&account);
        Self {
            handle: account.handle(),
            base_url: config.resolve_base_url(),
            human: HumanSimulator::new(Arc::clone(&surface), pause, profile),
            surface,
            generator,
            seen: SeenMentionStore::load(account_dir.join("seen_mentions.json")),
            stats: StatsStore::load(account_dir.join("stats.json")),
            log: InteractionLog::new(config.interaction_log_path()),
            session_path: account_dir.join("session.json"),
            screenshots_dir: config.screenshots_dir(),
            action_window: account.action_delay_window(fast),
            account_dir,
            account,
            state: OrchestratorState::Uninitialized,
        }
    }

    /// Replace the simulator with a deterministically seeded one.
    pub fn with_simulator_seed(mut self, seed: u64) -> Self {
        self.human = HumanSimulator::with_seed(
            Arc::clone(&self.surface),
            self.human.pause_token().clone(),
            self.human.profile(),
            seed,
        );
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn seen_store(&self) -> &SeenMentionStore {
        &self.seen
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    pub fn simulator(&self) -> &HumanSimulator {
        &self.human
    }

    fn set_state(&mut self, state: OrchestratorState) {
        self.state = state;
        info!("orchestrator_state={:?} account={}", state, self.handle);
    }

    fn log_step(&self, step: ResolutionStep, target: &str) {
        info!("➡️  step={} account={} target={}", step, self.handle, target);
    }

    // ── Session ─────────────────────────────────────────────────────────────

    /// Bring the account to an authenticated `Ready` state.
    pub async fn initialize(&mut self) -> Result<(), OrchestratorError> {
        self.set_state(OrchestratorState::LoggingIn);
        match self.establish_session().await {
            Ok(()) => {
                if let Err(e) = self.surface.save_session_state(&self.session_path).await {
                    warn!("session: failed to persist cookies for {}: {}", self.handle, e);
                }
                self.set_state(OrchestratorState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("❌ login failed for {}: {:#}", self.handle, e);
                self.capture_diagnostic("login_error", "session").await;
                Err(OrchestratorError::Initialization(format!("{:#}", e)))
            }
        }
    }

    async fn establish_session(&self) -> anyhow::Result<()> {
        match self.surface.restore_session_state(&self.session_path).await {
            Ok(true) => info!("🍪 restored stored session for {}", self.handle),
            Ok(false) => debug!("session: nothing stored for {}", self.handle),
            Err(e) => warn!("session: restore failed for {}: {}", self.handle, e),
        }

        self.surface
            .navigate(&format!("{}/", self.base_url))
            .await
            .context("failed to open site")?;
        self.human.wait(1500, 3000).await;
        self.dismiss_popups().await;

        if self.is_authenticated().await {
            info!("✅ {} already authenticated", self.handle);
            return Ok(());
        }

        info!("🔐 logging in as {}", self.handle);
        let form = self
            .surface
            .find_first(&Locator::css(sel::LOGIN_FORM), None)
            .await
            .unwrap_or(None);
        let username = self
            .surface
            .wait_for(&Locator::css(sel::USERNAME_INPUT), form, INPUT_WAIT)
            .await
            .context("username input not found")?;
        let credentials = TypingOptions::default().without_typos();
        self.human
            .type_text(username, &self.account.username, &credentials)
            .await?;
        self.human.wait(400, 900).await;

        let password = self
            .surface
            .wait_for(&Locator::css(sel::PASSWORD_INPUT), form, INPUT_WAIT)
            .await
            .context("password input not found")?;
        self.human
            .type_text(password, &self.account.password, &credentials)
            .await?;
        self.human.wait(500, 1200).await;

        let submit = self
            .surface
            .find_first(&Locator::css(sel::SUBMIT_BUTTON), form)
            .await?
            .ok_or_else(|| anyhow!("login submit button not found"))?;
        self.human.click(submit).await?;
        self.human.wait(3000, 5000).await;
        self.dismiss_popups().await;

        self.surface
            .wait_for(&sel::authenticated(&self.handle), None, LOGIN_WAIT)
            .await
            .context("no authenticated affordance after login")?;
        self.dismiss_popups().await;
        info!("✅ logged in as {}", self.handle);
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        self.visible_first(&sel::authenticated(&self.handle), None)
            .await
            .is_some()
    }

    async fn dismiss_popups(&self) {
        for text in sel::POPUP_DISMISS_TEXTS {
            if let Some(button) = self.visible_first(&sel::clickable_with_text(text), None).await {
                debug!("popup: dismissing \"{}\"", text);
                if let Err(e) = self.human.click(button).await {
                    debug!("popup: click failed: {}", e);
                }
                self.human.wait(500, 1200).await;
            }
        }
    }

    /// First visible match, swallowing lookup errors.
    async fn visible_first(&self, locator: &Locator, scope: Option<ElementRef>) -> Option<ElementRef> {
        let candidates = self.surface.locate(locator, scope).await.ok()?;
        for el in candidates {
            if self.surface.is_visible(el).await.unwrap_or(false) {
                return Some(el);
            }
        }
        None
    }

    // ── Discovery ───────────────────────────────────────────────────────────

    /// Comment mentions currently listed on the notifications page.
    ///
    /// Any failure yields an empty list.
    pub async fn discover_mentions(&mut self) -> Vec<MentionNotification> {
        self.set_state(OrchestratorState::DiscoveringMentions);
        match self.scrape_notifications().await {
            Ok(rows) => {
                let mentions = discovery::collect_mentions(&rows, &self.base_url);
                info!("🔔 {} comment mention(s) for {}", mentions.len(), self.handle);
                mentions
            }
            Err(e) => {
                warn!("notifications: discovery failed for {}: {:#}", self.handle, e);
                Vec::new()
            }
        }
    }

    async fn scrape_notifications(&self) -> anyhow::Result<Vec<RawNotification>> {
        self.surface
            .navigate(&format!("{}/notifications/", self.base_url))
            .await
            .context("failed to open notifications")?;
        self.human.wait(2500, 4500).await;

        let mut rows = Vec::new();
        for item in self.surface.locate(&Locator::css(sel::NOTIFICATION_ITEM), None).await? {
            let text = self.surface.text(item).await?;
            if !discovery::is_comment_mention(&text) {
                continue;
            }
            let mut hrefs = Vec::new();
            for link in self.surface.locate(&Locator::css(sel::LINK), Some(item)).await? {
                if let Some(href) = self.surface.attribute(link, "href").await? {
                    hrefs.push(href);
                }
            }
            rows.push(RawNotification { text, hrefs });
        }
        Ok(rows)
    }

    // ── Cycle ───────────────────────────────────────────────────────────────

    /// Discover and resolve every pending mention once.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, OrchestratorError> {
        std::fs::create_dir_all(&self.account_dir).map_err(|e| {
            OrchestratorError::Persistence(format!("{}: {}", self.account_dir.display(), e))
        })?;

        let mentions = self.discover_mentions().await;
        let mut summary = CycleSummary {
            discovered: mentions.len(),
            ..Default::default()
        };
        let total = mentions.len();
        for (index, mention) in mentions.iter().enumerate() {
            self.set_state(OrchestratorState::ResolvingMention { index, total });
            let quick = self.seen.contains(&mention.key) || self.is_self_mention(mention);
            let result = self.resolve_mention(mention).await;
            summary.record(result);
            if !quick && index + 1 < total {
                self.human.pace(self.action_window).await;
            }
        }

        self.stats.finish_cycle(&summary);
        info!(
            "📊 {}: {} discovered, {} success, {} skipped, {} failed",
            self.handle, summary.discovered, summary.success, summary.skipped, summary.failed
        );
        self.set_state(OrchestratorState::Idle);
        Ok(summary)
    }

    fn is_self_mention(&self, mention: &MentionNotification) -> bool {
        mention
            .commenter_username
            .as_deref()
            .is_some_and(|c| normalize_handle(c) == self.handle)
    }

    // ── Resolution ──────────────────────────────────────────────────────────

    /// Answer one mention. Never fails: errors become [`InteractionResult::Failed`].
    pub async fn resolve_mention(&mut self, mention: &MentionNotification) -> InteractionResult {
        if self.seen.contains(&mention.key) {
            debug!("⏭️  mention {} already handled", &mention.key[..12.min(mention.key.len())]);
            return InteractionResult::Skipped;
        }
        if self.is_self_mention(mention) {
            info!("⏭️  self-mention on {}; skipping", mention.post_url);
            self.finish_mention(mention, InteractionResult::Skipped);
            return InteractionResult::Skipped;
        }

        let result = match self.reply_to_mention(mention).await {
            Ok(result) => result,
            Err(e) => {
                warn!("❌ reply failed on {}: {:#}", mention.post_url, e);
                self.capture_diagnostic("reply_error", &mention.shortcode()).await;
                InteractionResult::Failed
            }
        };
        self.finish_mention(mention, result);
        info!("🏁 {} → {}", mention.post_url, result);
        result
    }

    fn finish_mention(&mut self, mention: &MentionNotification, result: InteractionResult) {
        if result.is_handled() {
            self.seen.mark_seen(&mention.key);
        }
        self.stats.record(InteractionAction::Reply, result);
    }

    async fn reply_to_mention(&self, mention: &MentionNotification) -> anyhow::Result<InteractionResult> {
        let target = mention.post_url.as_str();

        self.log_step(ResolutionStep::OpenPost, target);
        let capture = self
            .surface
            .observe_responses(ResponseFilter::new("video/", &sel::MEDIA_HOSTS))
            .await?;
        self.surface.navigate(target).await.context("failed to open post")?;
        self.human.wait(2000, 4000).await;
        let root = self.post_root().await?;
        let post = self.extract_post(root, &capture).await;
        drop(capture);

        self.log_step(ResolutionStep::LocateComment, target);
        self.expand_comments(root).await;
        let Some(comment) = self.find_comment(root, mention).await? else {
            info!("💬 mentioned comment not found on {}", target);
            return Ok(InteractionResult::Skipped);
        };

        self.log_step(ResolutionStep::ClickReply, target);
        let Some(reply) = self
            .visible_first(&sel::clickable_with_text(sel::REPLY_TEXT), Some(comment))
            .await
        else {
            info!("💬 no Reply affordance on {}", target);
            return Ok(InteractionResult::Skipped);
        };
        self.human.click(reply).await?;
        self.human.wait(600, 1400).await;

        self.log_step(ResolutionStep::Generate(InteractionAction::Reply), target);
        let text = self
            .generator
            .generate_reply(&ReplyRequest {
                post,
                commenter: mention.commenter_username.clone(),
                comment_text: mention.comment_text.clone(),
                prompt_hint: self.account.prompt_hint.clone(),
            })
            .await?;

        self.log_step(ResolutionStep::Type(InteractionAction::Reply), target);
        self.type_into_composer(root, &text).await?;

        self.log_step(ResolutionStep::Submit, target);
        self.submit(root).await?;

        self.log_step(ResolutionStep::Verify, target);
        if !self.verify_posted(root, &text).await {
            warn!("⚠️  reply not visible on {} after submit; counting as sent", target);
        }

        self.record_interaction(target, InteractionAction::Reply, &text);
        Ok(InteractionResult::Success)
    }

    // ── Shared post primitives ──────────────────────────────────────────────

    /// The opened post's container: a modal dialog if one appears quickly,
    /// else the page's article.
    async fn post_root(&self) -> anyhow::Result<ElementRef> {
        if let Ok(dialog) = self
            .surface
            .wait_for(&Locator::css(sel::DIALOG), None, DIALOG_PROBE)
            .await
        {
            return Ok(dialog);
        }
        self.surface
            .wait_for(&Locator::css(sel::ARTICLE), None, ARTICLE_WAIT)
            .await
            .context("post did not render")
    }

    async fn extract_post(&self, root: ElementRef, capture: &ResponseCapture) -> PostDetails {
        let mut post = PostDetails::default();

        if let Some(link) = self.first_in(sel::OWNER_LINK, root).await {
            let href = self.surface.attribute(link, "href").await.ok().flatten();
            post.owner = href
                .and_then(|h| discovery::profile_handle(&self.base_url, &h))
                .or(self.surface.text(link).await.ok().filter(|t| !t.trim().is_empty()));
        }
        if let Some(caption) = self.first_in(sel::CAPTION, root).await {
            post.caption = self.surface.text(caption).await.ok().filter(|t| !t.trim().is_empty());
        }
        for img in self.surface.locate(&Locator::css(sel::IMAGE), Some(root)).await.unwrap_or_default() {
            let alt = self.surface.attribute(img, "alt").await.ok().flatten().unwrap_or_default();
            if alt.to_lowercase().contains("profile picture") {
                continue;
            }
            if let Some(src) = self.surface.attribute(img, "src").await.ok().flatten() {
                if !src.starts_with("blob:") {
                    post.image_url = Some(src);
                    break;
                }
            }
        }
        post.video_url = match capture.captured() {
            Some(url) => Some(url),
            None => match self.first_in(sel::VIDEO, root).await {
                Some(video) => self
                    .surface
                    .attribute(video, "src")
                    .await
                    .ok()
                    .flatten()
                    .filter(|s| !s.starts_with("blob:")),
                None => None,
            },
        };
        debug!(
            "post: owner={:?} caption={} image={} video={}",
            post.owner,
            post.caption.is_some(),
            post.image_url.is_some(),
            post.video_url.is_some()
        );
        post
    }

    async fn first_in(&self, css: &str, root: ElementRef) -> Option<ElementRef> {
        self.surface
            .find_first(&Locator::css(css), Some(root))
            .await
            .ok()
            .flatten()
    }

    async fn expand_comments(&self, root: ElementRef) {
        if let Some(more) = self
            .visible_first(&sel::clickable_with_text(sel::VIEW_ALL_TEXT), Some(root))
            .await
        {
            debug!("comments: expanding thread");
            if self.human.click(more).await.is_ok() {
                self.human.wait(1200, 2500).await;
            }
        }
    }

    async fn find_comment(
        &self,
        root: ElementRef,
        mention: &MentionNotification,
    ) -> anyhow::Result<Option<ElementRef>> {
        let items = self
            .surface
            .locate(&Locator::css(sel::COMMENT_ITEM), Some(root))
            .await?;
        let mut texts = Vec::with_capacity(items.len());
        for item in &items {
            texts.push(self.surface.text(*item).await.unwrap_or_default());
        }
        Ok(discovery::match_comment(
            &texts,
            mention.commenter_username.as_deref(),
            mention.comment_text.as_deref(),
            &self.handle,
        )
        .map(|i| items[i]))
    }

    async fn type_into_composer(&self, root: ElementRef, text: &str) -> anyhow::Result<()> {
        let input = self
            .surface
            .wait_for(&Locator::css(sel::COMMENT_INPUT), Some(root), INPUT_WAIT)
            .await
            .context("comment box not found")?;
        self.human
            .type_text(input, text, &TypingOptions::default())
            .await?;
        self.human.wait(500, 1500).await;
        Ok(())
    }

    async fn submit(&self, root: ElementRef) -> anyhow::Result<()> {
        let candidates = self
            .surface
            .locate(&sel::clickable_with_text(sel::POST_TEXT), Some(root))
            .await?;
        let mut post_button = None;
        for el in candidates {
            if self.surface.is_visible(el).await.unwrap_or(false)
                && self.surface.is_enabled(el).await.unwrap_or(false)
            {
                post_button = Some(el);
                break;
            }
        }
        let button = post_button.ok_or_else(|| anyhow!("no enabled Post control"))?;
        self.human.click(button).await?;
        self.human.wait(2000, 4000).await;
        Ok(())
    }

    /// Look for the first 30 characters of `text` among the post's comments.
    async fn verify_posted(&self, root: ElementRef, text: &str) -> bool {
        let snippet: String = text.chars().take(30).collect();
        self.surface
            .wait_for(&Locator::text(sel::COMMENT_ITEM, snippet), Some(root), VERIFY_WAIT)
            .await
            .is_ok()
    }

    fn record_interaction(&self, target: &str, action: InteractionAction, text: &str) {
        let record = InteractionRecord::now(&self.handle, target, action, text);
        if let Err(e) = self.log.append(&record) {
            warn!("interactions: failed to append to {}: {}", self.log.path().display(), e);
        }
    }

    async fn capture_diagnostic(&self, operation: &str, target: &str) {
        let path = self
            .screenshots_dir
            .join(screenshot_name(operation, &self.handle, target));
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match self.surface.screenshot(&path).await {
            Ok(()) => info!("📸 diagnostic screenshot: {}", path.display()),
            Err(e) => warn!("screenshot failed ({}): {}", path.display(), e),
        }
    }
}

/// `{operation}_{account}_{target}.png`, with path-hostile characters replaced.
pub fn screenshot_name(operation: &str, account: &str, target: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect()
    };
    format!("{}_{}_{}.png", clean(operation), clean(account), clean(target))
}
