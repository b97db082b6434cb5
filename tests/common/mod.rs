//! Shared fixtures: a scripted in-memory page model behind `UiSurface`, a
//! launcher that hands out those surfaces, and a generator that counts calls.
#![allow(dead_code)]

use async_trait::async_trait;
use mention_responder::core::config::{AccountConfig, BotConfig};
use mention_responder::generator::{CommentRequest, ContentGenerator, ReplyRequest};
use mention_responder::human::PauseToken;
use mention_responder::orchestrator::MentionOrchestrator;
use mention_responder::orchestrator::selectors as sel;
use mention_responder::surface::{
    BoundingBox, ElementRef, Key, Locator, Point, ResponseCapture, ResponseFilter, SurfaceError,
    SurfaceLauncher, SurfaceResult, UiSurface, Viewport,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE: &str = "https://www.instagram.com";

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

// ── Page model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum OnClick {
    Navigate(String),
    Reveal(u64),
    /// Append the current value of `input` as a new comment under `container`.
    Publish { input: u64, container: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Navigate(String),
    Click(u64),
    ForceClick(u64),
    Fill(u64, String),
    Key(Key),
    MouseMove(Point),
    MouseDown(Point),
    MouseUp(Point),
    Scroll(f64),
    ObserveResponses,
    Screenshot(PathBuf),
    SaveSession(PathBuf),
    RestoreSession(PathBuf),
    Close,
}

#[derive(Debug, Clone)]
struct Node {
    id: u64,
    page: String,
    selectors: Vec<String>,
    text: String,
    attrs: HashMap<String, String>,
    parent: Option<u64>,
    visible: bool,
    enabled: bool,
    on_click: Option<OnClick>,
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    selectors: Vec<String>,
    text: String,
    attrs: HashMap<String, String>,
    parent: Option<u64>,
    visible: bool,
    enabled: bool,
    on_click: Option<OnClick>,
}

/// A node matched by `selector` (compared verbatim with locator CSS).
pub fn node(selector: &str) -> NodeSpec {
    NodeSpec {
        selectors: vec![selector.to_string()],
        text: String::new(),
        attrs: HashMap::new(),
        parent: None,
        visible: true,
        enabled: true,
        on_click: None,
    }
}

impl NodeSpec {
    pub fn also(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }
    pub fn inside(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
    pub fn on_click(mut self, action: OnClick) -> Self {
        self.on_click = Some(action);
        self
    }
}

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    current_url: String,
    focused: Option<u64>,
    values: HashMap<u64, String>,
    events: Vec<Event>,
    media_url: Option<String>,
    stored_session: bool,
    failing_urls: HashSet<String>,
}

impl MockState {
    fn node(&self, id: u64) -> SurfaceResult<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or(SurfaceError::StaleElement(id))
    }

    fn is_within(&self, id: u64, ancestor: u64) -> bool {
        let mut cursor = self.nodes.iter().find(|n| n.id == id).and_then(|n| n.parent);
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.nodes.iter().find(|n| n.id == p).and_then(|n| n.parent);
        }
        false
    }

    fn insert(&mut self, page: &str, spec: NodeSpec) -> u64 {
        let id = self.nodes.len() as u64 + 1;
        self.nodes.push(Node {
            id,
            page: page.to_string(),
            selectors: spec.selectors,
            text: spec.text,
            attrs: spec.attrs,
            parent: spec.parent,
            visible: spec.visible,
            enabled: spec.enabled,
            on_click: spec.on_click,
        });
        id
    }

    fn activate(&mut self, id: u64) -> SurfaceResult<()> {
        let action = self.node(id)?.on_click.clone();
        self.focused = Some(id);
        match action {
            Some(OnClick::Navigate(url)) => {
                self.current_url = url.clone();
                self.events.push(Event::Navigate(url));
            }
            Some(OnClick::Reveal(target)) => {
                if let Some(n) = self.nodes.iter_mut().find(|n| n.id == target) {
                    n.visible = true;
                }
            }
            Some(OnClick::Publish { input, container }) => {
                let text = self.values.get(&input).cloned().unwrap_or_default();
                let page = self.current_url.clone();
                self.insert(&page, node(sel::COMMENT_ITEM).text(&text).inside(container));
            }
            None => {}
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSurface {
    state: Mutex<MockState>,
}

impl MockSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, page: &str, spec: NodeSpec) -> u64 {
        self.lock().insert(page, spec)
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Navigate(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Screenshot(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn value_of(&self, id: u64) -> Option<String> {
        self.lock().values.get(&id).cloned()
    }

    pub fn texts_matching(&self, selector: &str) -> Vec<String> {
        self.lock()
            .nodes
            .iter()
            .filter(|n| n.selectors.iter().any(|s| s == selector))
            .map(|n| n.text.clone())
            .collect()
    }

    pub fn set_media_url(&self, url: &str) {
        self.lock().media_url = Some(url.to_string());
    }

    pub fn set_stored_session(&self, stored: bool) {
        self.lock().stored_session = stored;
    }

    pub fn fail_navigation_to(&self, url: &str) {
        self.lock().failing_urls.insert(url.to_string());
    }
}

#[async_trait]
impl UiSurface for MockSurface {
    async fn navigate(&self, url: &str) -> SurfaceResult<()> {
        let mut s = self.lock();
        if s.failing_urls.contains(url) {
            return Err(SurfaceError::Browser(format!("net::ERR_FAILED {}", url)));
        }
        s.current_url = url.to_string();
        s.focused = None;
        s.events.push(Event::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> SurfaceResult<String> {
        Ok(self.lock().current_url.clone())
    }

    async fn locate(&self, locator: &Locator, scope: Option<ElementRef>) -> SurfaceResult<Vec<ElementRef>> {
        let s = self.lock();
        let css = locator.css_selector();
        Ok(s.nodes
            .iter()
            .filter(|n| n.page == s.current_url)
            .filter(|n| n.selectors.iter().any(|sel| sel == css))
            .filter(|n| locator.matches_text(&n.text))
            .filter(|n| scope.map_or(true, |root| s.is_within(n.id, root.0)))
            .map(|n| ElementRef(n.id))
            .collect())
    }

    async fn is_visible(&self, el: ElementRef) -> SurfaceResult<bool> {
        Ok(self.lock().node(el.0)?.visible)
    }

    async fn is_enabled(&self, el: ElementRef) -> SurfaceResult<bool> {
        Ok(self.lock().node(el.0)?.enabled)
    }

    async fn text(&self, el: ElementRef) -> SurfaceResult<String> {
        Ok(self.lock().node(el.0)?.text.clone())
    }

    async fn attribute(&self, el: ElementRef, name: &str) -> SurfaceResult<Option<String>> {
        Ok(self.lock().node(el.0)?.attrs.get(name).cloned())
    }

    async fn bounding_box(&self, el: ElementRef) -> SurfaceResult<Option<BoundingBox>> {
        let s = self.lock();
        let n = s.node(el.0)?;
        if !n.visible {
            return Ok(None);
        }
        Ok(Some(BoundingBox {
            x: 40.0 + (n.id % 20) as f64 * 50.0,
            y: 60.0 + (n.id % 10) as f64 * 40.0,
            width: 120.0,
            height: 32.0,
        }))
    }

    async fn viewport(&self) -> SurfaceResult<Viewport> {
        Ok(Viewport::default())
    }

    async fn mouse_move(&self, to: Point) -> SurfaceResult<()> {
        self.lock().events.push(Event::MouseMove(to));
        Ok(())
    }

    async fn mouse_down(&self, at: Point) -> SurfaceResult<()> {
        self.lock().events.push(Event::MouseDown(at));
        Ok(())
    }

    async fn mouse_up(&self, at: Point) -> SurfaceResult<()> {
        self.lock().events.push(Event::MouseUp(at));
        Ok(())
    }

    async fn click(&self, el: ElementRef) -> SurfaceResult<()> {
        let mut s = self.lock();
        s.events.push(Event::Click(el.0));
        s.activate(el.0)
    }

    async fn force_click(&self, el: ElementRef) -> SurfaceResult<()> {
        let mut s = self.lock();
        s.events.push(Event::ForceClick(el.0));
        s.activate(el.0)
    }

    async fn fill(&self, el: ElementRef, text: &str) -> SurfaceResult<()> {
        let mut s = self.lock();
        s.node(el.0)?;
        s.events.push(Event::Fill(el.0, text.to_string()));
        s.values.insert(el.0, text.to_string());
        s.focused = Some(el.0);
        Ok(())
    }

    async fn press_key(&self, key: Key) -> SurfaceResult<()> {
        let mut s = self.lock();
        s.events.push(Event::Key(key));
        let Some(focused) = s.focused else {
            return Ok(());
        };
        let value = s.values.entry(focused).or_default();
        match key {
            Key::Char(c) => value.push(c),
            Key::Backspace => {
                value.pop();
            }
            Key::Enter => {}
        }
        Ok(())
    }

    async fn scroll_by(&self, dy: f64) -> SurfaceResult<()> {
        self.lock().events.push(Event::Scroll(dy));
        Ok(())
    }

    async fn observe_responses(&self, filter: ResponseFilter) -> SurfaceResult<ResponseCapture> {
        let mut s = self.lock();
        s.events.push(Event::ObserveResponses);
        let (capture, slot) = ResponseCapture::detached();
        if let Some(media) = s.media_url.as_deref() {
            if filter.accepts(media, "video/mp4") {
                ResponseCapture::offer(&slot, media);
            }
        }
        Ok(capture)
    }

    async fn screenshot(&self, path: &Path) -> SurfaceResult<()> {
        self.lock().events.push(Event::Screenshot(path.to_path_buf()));
        Ok(())
    }

    async fn save_session_state(&self, path: &Path) -> SurfaceResult<()> {
        self.lock().events.push(Event::SaveSession(path.to_path_buf()));
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> SurfaceResult<bool> {
        let mut s = self.lock();
        s.events.push(Event::RestoreSession(path.to_path_buf()));
        Ok(s.stored_session)
    }

    async fn close(&self) -> SurfaceResult<()> {
        self.lock().events.push(Event::Close);
        Ok(())
    }
}

// ── Launcher & generator ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLauncher {
    surfaces: HashMap<String, Arc<MockSurface>>,
    pub launches: AtomicUsize,
}

impl MockLauncher {
    pub fn with(mut self, handle: &str, surface: Arc<MockSurface>) -> Self {
        self.surfaces.insert(handle.to_string(), surface);
        self
    }
}

#[async_trait]
impl SurfaceLauncher for MockLauncher {
    async fn launch(&self, account: &AccountConfig) -> anyhow::Result<Arc<dyn UiSurface>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let surface: Arc<dyn UiSurface> = self
            .surfaces
            .get(&account.handle())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no browser for {}", account.handle()))?;
        Ok(surface)
    }
}

pub struct CountingGenerator {
    pub text: String,
    pub fail: bool,
    pub comments: AtomicUsize,
    pub replies: AtomicUsize,
    pub last_reply: Mutex<Option<ReplyRequest>>,
    pub last_comment: Mutex<Option<CommentRequest>>,
}

impl CountingGenerator {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            fail: false,
            comments: AtomicUsize::new(0),
            replies: AtomicUsize::new(0),
            last_reply: Mutex::new(None),
            last_comment: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: String::new(),
            fail: true,
            comments: AtomicUsize::new(0),
            replies: AtomicUsize::new(0),
            last_reply: Mutex::new(None),
            last_comment: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.comments.load(Ordering::SeqCst) + self.replies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for CountingGenerator {
    async fn generate_comment(&self, request: &CommentRequest) -> anyhow::Result<String> {
        self.comments.fetch_add(1, Ordering::SeqCst);
        *self.last_comment.lock().unwrap() = Some(request.clone());
        if self.fail {
            anyhow::bail!("generator offline");
        }
        Ok(self.text.clone())
    }

    async fn generate_reply(&self, request: &ReplyRequest) -> anyhow::Result<String> {
        self.replies.fetch_add(1, Ordering::SeqCst);
        *self.last_reply.lock().unwrap() = Some(request.clone());
        if self.fail {
            anyhow::bail!("generator offline");
        }
        Ok(self.text.clone())
    }
}

// ── Scenario builders ───────────────────────────────────────────────────────

pub fn account(username: &str) -> AccountConfig {
    AccountConfig {
        username: username.to_string(),
        password: "hunter2".to_string(),
        ..Default::default()
    }
}

/// Fast-profile config rooted in `data_dir`.
pub fn test_config(data_dir: &Path, usernames: &[&str]) -> BotConfig {
    BotConfig {
        base_url: Some(BASE.to_string()),
        data_dir: Some(data_dir.to_path_buf()),
        fast_mode: Some(true),
        headless: Some(true),
        poll_interval_min_secs: Some(1),
        poll_interval_max_secs: Some(2),
        accounts: usernames.iter().map(|u| account(u)).collect(),
        ..Default::default()
    }
}

/// Orchestrator for the config's first account with a fixed simulator seed.
pub fn orchestrator(
    config: &BotConfig,
    surface: &Arc<MockSurface>,
    generator: &Arc<CountingGenerator>,
) -> MentionOrchestrator {
    MentionOrchestrator::new(
        config,
        config.accounts[0].clone(),
        surface.clone(),
        generator.clone(),
        PauseToken::new(),
    )
    .with_simulator_seed(7)
}

/// Home page already showing the account's profile link.
pub fn logged_in(surface: &MockSurface, handle: &str) -> u64 {
    surface.add(
        &url("/"),
        node(sel::authenticated(handle).css_selector()).attr("href", &format!("/{}/", handle)),
    )
}

/// Home page with a login form whose submit reveals the authenticated link.
pub struct LoginFixture {
    pub username: u64,
    pub password: u64,
    pub submit: u64,
    pub affordance: u64,
}

pub fn login_page(surface: &MockSurface, handle: &str, submit_works: bool) -> LoginFixture {
    let home = url("/");
    let affordance = surface.add(&home, node(sel::authenticated(handle).css_selector()).hidden());
    let form = surface.add(&home, node(sel::LOGIN_FORM));
    let username = surface.add(&home, node(sel::USERNAME_INPUT).inside(form));
    let password = surface.add(&home, node(sel::PASSWORD_INPUT).inside(form));
    let mut submit = node(sel::SUBMIT_BUTTON).text("Log in").inside(form);
    if submit_works {
        submit = submit.on_click(OnClick::Reveal(affordance));
    }
    let submit = surface.add(&home, submit);
    LoginFixture {
        username,
        password,
        submit,
        affordance,
    }
}

/// One notification row with its links.
pub fn notification(surface: &MockSurface, text: &str, hrefs: &[&str]) -> u64 {
    let page = url("/notifications/");
    let item = surface.add(&page, node(sel::NOTIFICATION_ITEM).text(text));
    for href in hrefs {
        surface.add(&page, node(sel::LINK).attr("href", href).inside(item));
    }
    item
}

pub struct PostFixture {
    pub url: String,
    pub dialog: u64,
    pub comment: u64,
    pub reply: Option<u64>,
    pub input: u64,
    pub post_button: u64,
}

#[derive(Clone, Copy)]
pub struct PostOptions {
    pub with_reply: bool,
    pub with_post_button: bool,
    pub publishes: bool,
}

impl Default for PostOptions {
    fn default() -> Self {
        Self {
            with_reply: true,
            with_post_button: true,
            publishes: true,
        }
    }
}

/// A post opened as a dialog, with one comment from `commenter`.
pub fn post_page(surface: &MockSurface, code: &str, commenter: &str, comment: &str, opts: PostOptions) -> PostFixture {
    let page = url(&format!("/p/{}/", code));
    let dialog = surface.add(&page, node(sel::DIALOG));
    surface.add(&page, node(sel::OWNER_LINK).text("bob").attr("href", "/bob/").inside(dialog));
    surface.add(&page, node(sel::CAPTION).text("sunset run").inside(dialog));
    surface.add(
        &page,
        node(sel::IMAGE)
            .attr("src", "https://scontent.cdninstagram.com/p.jpg")
            .attr("alt", "Photo by bob")
            .inside(dialog),
    );
    let comment = surface.add(
        &page,
        node(sel::COMMENT_ITEM)
            .text(&format!("{} {}", commenter, comment))
            .inside(dialog),
    );
    let reply = opts.with_reply.then(|| {
        surface.add(&page, node(sel::CLICKABLE).text("Reply").inside(comment))
    });
    let input = surface.add(&page, node(sel::COMMENT_INPUT).inside(dialog));
    let post_button = if opts.with_post_button {
        let mut button = node(sel::CLICKABLE).text("Post").inside(dialog);
        if opts.publishes {
            button = button.on_click(OnClick::Publish { input, container: dialog });
        }
        surface.add(&page, button)
    } else {
        0
    };
    PostFixture {
        url: page,
        dialog,
        comment,
        reply,
        input,
        post_button,
    }
}
