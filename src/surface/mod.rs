//! UI automation surface: the narrow capability set the simulator and the
//! orchestrator drive.
//!
//! Everything above this module talks to a `dyn UiSurface`; the only concrete
//! browser binding is [`cdp::CdpSurface`] (native Chromium via chromiumoxide).
//! Element handles are opaque [`ElementRef`] ids owned by the surface.

pub mod cdp;
pub mod session_store;

use crate::core::config::AccountConfig;
use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub use cdp::{CdpLauncher, CdpSurface};

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("element handle {0} is no longer attached")]
    StaleElement(u64),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

// ── Geometry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 900.0,
        }
    }
}

// ── Locators & handles ──────────────────────────────────────────────────────

/// How to find elements. `Text` narrows a CSS match to elements whose
/// visible text contains `contains` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    Text { css: String, contains: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn text(css: impl Into<String>, contains: impl Into<String>) -> Self {
        Self::Text {
            css: css.into(),
            contains: contains.into(),
        }
    }

    pub fn css_selector(&self) -> &str {
        match self {
            Self::Css(css) | Self::Text { css, .. } => css,
        }
    }

    /// Whether an element's visible text satisfies this locator's text filter.
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::Css(_) => true,
            Self::Text { contains, .. } => text
                .to_lowercase()
                .contains(&contains.to_lowercase()),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{}", css),
            Self::Text { css, contains } => write!(f, "{} ~ \"{}\"", css, contains),
        }
    }
}

/// Opaque handle to an element resolved by a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
}

// ── Scoped network observation ──────────────────────────────────────────────

/// Predicate over observed network responses: content-type prefix plus a set
/// of host substrings (any match, ASCII case-insensitive).
#[derive(Debug, Clone)]
pub struct ResponseFilter {
    content_type_prefix: String,
    hosts: Option<Arc<AhoCorasick>>,
}

impl ResponseFilter {
    /// An empty `host_patterns` slice accepts any host.
    pub fn new(content_type_prefix: &str, host_patterns: &[&str]) -> Self {
        let hosts = if host_patterns.is_empty() {
            None
        } else {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(host_patterns)
                .ok()
                .map(Arc::new)
        };
        Self {
            content_type_prefix: content_type_prefix.to_ascii_lowercase(),
            hosts,
        }
    }

    pub fn accepts(&self, url: &str, content_type: &str) -> bool {
        if !content_type
            .to_ascii_lowercase()
            .starts_with(&self.content_type_prefix)
        {
            return false;
        }
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        match &self.hosts {
            Some(matcher) => matcher.is_match(host),
            None => true,
        }
    }
}

/// At most one captured URL from a scoped response observation.
///
/// Dropping the capture tears down the underlying listener.
pub struct ResponseCapture {
    slot: Arc<Mutex<Option<String>>>,
    listener: Option<tokio::task::JoinHandle<()>>,
}

impl ResponseCapture {
    pub fn new(slot: Arc<Mutex<Option<String>>>, listener: Option<tokio::task::JoinHandle<()>>) -> Self {
        Self { slot, listener }
    }

    /// A capture with no listener; whoever holds `slot` may fill it.
    pub fn detached() -> (Self, Arc<Mutex<Option<String>>>) {
        let slot = Arc::new(Mutex::new(None));
        (Self::new(Arc::clone(&slot), None), slot)
    }

    /// Store `url` unless a URL was already captured. Returns `true` if stored.
    pub fn offer(slot: &Mutex<Option<String>>, url: &str) -> bool {
        match slot.lock() {
            Ok(mut guard) if guard.is_none() => {
                *guard = Some(url.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn captured(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|g| g.clone())
    }
}

impl Drop for ResponseCapture {
    fn drop(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
    }
}

/// Creates one browser-backed surface per account session.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn launch(&self, account: &AccountConfig) -> anyhow::Result<Arc<dyn UiSurface>>;
}

// ── The surface ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait UiSurface: Send + Sync {
    async fn navigate(&self, url: &str) -> SurfaceResult<()>;
    async fn current_url(&self) -> SurfaceResult<String>;

    /// All elements matching `locator`, optionally inside `scope`, in document order.
    async fn locate(
        &self,
        locator: &Locator,
        scope: Option<ElementRef>,
    ) -> SurfaceResult<Vec<ElementRef>>;

    async fn is_visible(&self, el: ElementRef) -> SurfaceResult<bool>;
    async fn is_enabled(&self, el: ElementRef) -> SurfaceResult<bool>;
    async fn text(&self, el: ElementRef) -> SurfaceResult<String>;
    async fn attribute(&self, el: ElementRef, name: &str) -> SurfaceResult<Option<String>>;
    async fn bounding_box(&self, el: ElementRef) -> SurfaceResult<Option<BoundingBox>>;
    async fn viewport(&self) -> SurfaceResult<Viewport>;

    async fn mouse_move(&self, to: Point) -> SurfaceResult<()>;
    async fn mouse_down(&self, at: Point) -> SurfaceResult<()>;
    async fn mouse_up(&self, at: Point) -> SurfaceResult<()>;

    /// Logical element click (scrolls into view first).
    async fn click(&self, el: ElementRef) -> SurfaceResult<()>;
    /// Click dispatched straight to the element, ignoring overlays.
    async fn force_click(&self, el: ElementRef) -> SurfaceResult<()>;
    /// Replace the element's value in one shot.
    async fn fill(&self, el: ElementRef, text: &str) -> SurfaceResult<()>;
    /// One key press against the focused element.
    async fn press_key(&self, key: Key) -> SurfaceResult<()>;
    async fn scroll_by(&self, dy: f64) -> SurfaceResult<()>;

    /// Install a scoped observer that keeps the first response URL accepted by `filter`.
    async fn observe_responses(&self, filter: ResponseFilter) -> SurfaceResult<ResponseCapture>;

    async fn screenshot(&self, path: &Path) -> SurfaceResult<()>;
    async fn save_session_state(&self, path: &Path) -> SurfaceResult<()>;
    /// Returns `false` when there was nothing to restore.
    async fn restore_session_state(&self, path: &Path) -> SurfaceResult<bool>;
    async fn close(&self) -> SurfaceResult<()>;

    /// First element matching `locator`, if any.
    async fn find_first(
        &self,
        locator: &Locator,
        scope: Option<ElementRef>,
    ) -> SurfaceResult<Option<ElementRef>> {
        Ok(self.locate(locator, scope).await?.into_iter().next())
    }

    /// Poll until a visible element matches, or fail with [`SurfaceError::Timeout`].
    async fn wait_for(
        &self,
        locator: &Locator,
        scope: Option<ElementRef>,
        timeout: Duration,
    ) -> SurfaceResult<ElementRef> {
        let poll = Duration::from_millis(250);
        let start = tokio::time::Instant::now();
        loop {
            for el in self.locate(locator, scope).await? {
                if self.is_visible(el).await.unwrap_or(false) {
                    return Ok(el);
                }
            }
            if start.elapsed() >= timeout {
                return Err(SurfaceError::Timeout {
                    what: locator.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(poll).await;
        }
    }
}
