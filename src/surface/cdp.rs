//! Native Chromium binding for [`UiSurface`] using `chromiumoxide`.
//!
//! One [`CdpSurface`] owns one browser process and one tab for one account.
//! Element handles returned to callers are small integer ids mapped onto
//! chromiumoxide `Element`s held here.

use super::session_store;
use super::{
    BoundingBox, ElementRef, Key, Locator, Point, ResponseCapture, ResponseFilter, SurfaceError,
    SurfaceLauncher, SurfaceResult, UiSurface, Viewport,
};
use crate::core::config::{chrome_executable_override, AccountConfig, BotConfig};
use anyhow::anyhow;
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::element::Element;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const WINDOW_WIDTH: u32 = 1366;
const WINDOW_HEIGHT: u32 = 900;

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan
/// 3. OS-specific well-known install paths
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
            "brave-browser",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Build a `BrowserConfig` bound to a persistent per-account profile directory.
pub fn build_account_config(exe: &str, profile_dir: &Path, headless: bool) -> anyhow::Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .user_data_dir(profile_dir)
        .viewport(CdpViewport {
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-dev-shm-usage")
        .arg("--mute-audio");

    if !headless {
        builder = builder.with_head();
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Surface ──────────────────────────────────────────────────────────────────

pub struct CdpSurface {
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
    elements: Mutex<HashMap<u64, Arc<Element>>>,
    next_id: AtomicU64,
}

impl CdpSurface {
    /// Launch a browser on `profile_dir` and open a single working tab.
    pub async fn launch(profile_dir: &Path, headless: bool) -> anyhow::Result<Self> {
        let exe = find_chrome_executable().ok_or_else(|| {
            anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.")
        })?;
        std::fs::create_dir_all(profile_dir)?;

        info!(
            "🚀 launching browser ({}) with profile {}",
            exe,
            profile_dir.display()
        );
        let config = build_account_config(&exe, profile_dir, headless)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open tab: {}", e))?;

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            page,
            handler_task,
            elements: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn register(&self, element: Element) -> ElementRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.elements.lock() {
            map.insert(id, Arc::new(element));
        }
        ElementRef(id)
    }

    fn element(&self, el: ElementRef) -> SurfaceResult<Arc<Element>> {
        self.elements
            .lock()
            .ok()
            .and_then(|map| map.get(&el.0).cloned())
            .ok_or(SurfaceError::StaleElement(el.0))
    }

    /// Handles from the previous document are dead after navigation.
    fn forget_elements(&self) {
        if let Ok(mut map) = self.elements.lock() {
            map.clear();
        }
    }

    async fn call_bool(&self, el: ElementRef, function: &str) -> SurfaceResult<bool> {
        let element = self.element(el)?;
        let ret = element.call_js_fn(function, false).await.map_err(browser_err)?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn dispatch_mouse(&self, kind: DispatchMouseEventType, at: Point) -> SurfaceResult<()> {
        let params = mouse_event(kind, at).map_err(SurfaceError::Browser)?;
        self.page.execute(params).await.map_err(browser_err)?;
        Ok(())
    }

    async fn dispatch_key(
        &self,
        kind: DispatchKeyEventType,
        key: &str,
        code: &str,
        vk: i64,
        text: Option<&str>,
    ) -> SurfaceResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key)
            .code(code)
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk);
        if let Some(t) = text {
            builder = builder.text(t);
        }
        let params = builder.build().map_err(SurfaceError::Browser)?;
        self.page.execute(params).await.map_err(browser_err)?;
        Ok(())
    }
}

fn browser_err(e: impl std::fmt::Display) -> SurfaceError {
    SurfaceError::Browser(e.to_string())
}

#[async_trait]
impl UiSurface for CdpSurface {
    async fn navigate(&self, url: &str) -> SurfaceResult<()> {
        self.forget_elements();
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn current_url(&self) -> SurfaceResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(browser_err)?
            .unwrap_or_default())
    }

    async fn locate(
        &self,
        locator: &Locator,
        scope: Option<ElementRef>,
    ) -> SurfaceResult<Vec<ElementRef>> {
        let css = locator.css_selector();
        let found = match scope {
            Some(s) => self.element(s)?.find_elements(css).await,
            None => self.page.find_elements(css).await,
        };
        // chromiumoxide reports "no node" as an error; treat it as an empty match.
        let found = found.unwrap_or_default();

        let mut out = Vec::with_capacity(found.len());
        for element in found {
            if let Locator::Text { .. } = locator {
                let text = element.inner_text().await.ok().flatten().unwrap_or_default();
                if !locator.matches_text(&text) {
                    continue;
                }
            }
            out.push(self.register(element));
        }
        Ok(out)
    }

    async fn is_visible(&self, el: ElementRef) -> SurfaceResult<bool> {
        self.call_bool(
            el,
            "function() { const r = this.getBoundingClientRect(); const s = getComputedStyle(this); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }",
        )
        .await
    }

    async fn is_enabled(&self, el: ElementRef) -> SurfaceResult<bool> {
        self.call_bool(
            el,
            "function() { return !this.disabled && this.getAttribute('aria-disabled') !== 'true'; }",
        )
        .await
    }

    async fn text(&self, el: ElementRef) -> SurfaceResult<String> {
        let element = self.element(el)?;
        Ok(element
            .inner_text()
            .await
            .map_err(browser_err)?
            .unwrap_or_default())
    }

    async fn attribute(&self, el: ElementRef, name: &str) -> SurfaceResult<Option<String>> {
        let element = self.element(el)?;
        element.attribute(name).await.map_err(browser_err)
    }

    async fn bounding_box(&self, el: ElementRef) -> SurfaceResult<Option<BoundingBox>> {
        let element = self.element(el)?;
        match element.bounding_box().await {
            Ok(b) if b.width > 0.0 && b.height > 0.0 => Ok(Some(BoundingBox {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
            })),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!("bounding box unavailable for element {}: {}", el.0, e);
                Ok(None)
            }
        }
    }

    async fn viewport(&self) -> SurfaceResult<Viewport> {
        let v: serde_json::Value = self
            .page
            .evaluate("({ w: window.innerWidth, h: window.innerHeight })")
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;
        Ok(Viewport {
            width: v.get("w").and_then(|w| w.as_f64()).unwrap_or(WINDOW_WIDTH as f64),
            height: v.get("h").and_then(|h| h.as_f64()).unwrap_or(WINDOW_HEIGHT as f64),
        })
    }

    async fn mouse_move(&self, to: Point) -> SurfaceResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, to).await
    }

    async fn mouse_down(&self, at: Point) -> SurfaceResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, at).await
    }

    async fn mouse_up(&self, at: Point) -> SurfaceResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, at).await
    }

    async fn click(&self, el: ElementRef) -> SurfaceResult<()> {
        let element = self.element(el)?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn force_click(&self, el: ElementRef) -> SurfaceResult<()> {
        let element = self.element(el)?;
        element
            .call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn fill(&self, el: ElementRef, text: &str) -> SurfaceResult<()> {
        let element = self.element(el)?;
        element.focus().await.map_err(browser_err)?;
        element
            .call_js_fn(
                "function() { if ('value' in this) { this.value = ''; } else { this.textContent = ''; } }",
                false,
            )
            .await
            .map_err(browser_err)?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> SurfaceResult<()> {
        match key {
            Key::Char(c) => {
                let s = c.to_string();
                self.dispatch_key(DispatchKeyEventType::KeyDown, &s, "", 0, Some(&s))
                    .await?;
                self.dispatch_key(DispatchKeyEventType::KeyUp, &s, "", 0, None)
                    .await
            }
            Key::Backspace => {
                self.dispatch_key(DispatchKeyEventType::RawKeyDown, "Backspace", "Backspace", 8, None)
                    .await?;
                self.dispatch_key(DispatchKeyEventType::KeyUp, "Backspace", "Backspace", 8, None)
                    .await
            }
            Key::Enter => {
                self.dispatch_key(DispatchKeyEventType::KeyDown, "Enter", "Enter", 13, Some("\r"))
                    .await?;
                self.dispatch_key(DispatchKeyEventType::KeyUp, "Enter", "Enter", 13, None)
                    .await
            }
        }
    }

    async fn scroll_by(&self, dy: f64) -> SurfaceResult<()> {
        self.page
            .evaluate(format!(
                "window.scrollBy({{top: {}, behavior: 'smooth'}});",
                dy.round() as i64
            ))
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn observe_responses(&self, filter: ResponseFilter) -> SurfaceResult<ResponseCapture> {
        let mut events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err)?;
        let slot = Arc::new(Mutex::new(None));
        let slot_for_task = Arc::clone(&slot);
        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = &event.response.url;
                if filter.accepts(url, &event.response.mime_type)
                    && ResponseCapture::offer(&slot_for_task, url)
                {
                    debug!("captured media response: {}", url);
                }
            }
        });
        Ok(ResponseCapture::new(slot, Some(listener)))
    }

    async fn screenshot(&self, path: &Path) -> SurfaceResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(browser_err)?;
        info!("📸 screenshot saved: {}", path.display());
        Ok(())
    }

    async fn save_session_state(&self, path: &Path) -> SurfaceResult<()> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;
        let raw: Vec<serde_json::Value> = cookies
            .iter()
            .filter_map(|c| serde_json::to_value(c).ok())
            .collect();
        session_store::save_raw(path, &raw)?;
        Ok(())
    }

    async fn restore_session_state(&self, path: &Path) -> SurfaceResult<bool> {
        match session_store::load_raw(path) {
            Some(raw) => Ok(session_store::inject_into_page(&self.page, &raw).await),
            None => Ok(false),
        }
    }

    async fn close(&self) -> SurfaceResult<()> {
        self.forget_elements();
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for CdpSurface {
    fn drop(&mut self) {
        // Drop cannot await; hand the browser to the runtime so Chromium is not orphaned.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if let Ok(mut guard) = self.browser.try_lock() {
            if let Some(mut browser) = guard.take() {
                handle.spawn(async move {
                    let _ = browser.close().await;
                });
            }
        }
        self.handler_task.abort();
    }
}

// ── Launcher ─────────────────────────────────────────────────────────────────

pub struct CdpLauncher {
    data_dir: PathBuf,
    headless: bool,
}

impl CdpLauncher {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            data_dir: config.resolve_data_dir(),
            headless: config.resolve_headless(),
        }
    }

    pub fn profile_dir(&self, account: &AccountConfig) -> PathBuf {
        self.data_dir
            .join("accounts")
            .join(account.handle())
            .join("browser-profile")
    }
}

#[async_trait]
impl SurfaceLauncher for CdpLauncher {
    async fn launch(&self, account: &AccountConfig) -> anyhow::Result<Arc<dyn UiSurface>> {
        let surface = CdpSurface::launch(&self.profile_dir(account), self.headless).await?;
        Ok(Arc::new(surface))
    }
}

/// Input event for one pointer step. Moves carry no pressed button.
fn mouse_event(kind: DispatchMouseEventType, at: Point) -> Result<DispatchMouseEventParams, String> {
    let builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(at.x).y(at.y);
    match kind {
        DispatchMouseEventType::MouseMoved => builder.button(MouseButton::None).build(),
        _ => builder.button(MouseButton::Left).click_count(1).build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_are_hover_only() {
        let at = Point { x: 10.0, y: 20.0 };
        let moved = mouse_event(DispatchMouseEventType::MouseMoved, at).unwrap();
        assert_eq!(moved.button, Some(MouseButton::None));
        assert_eq!(moved.click_count, None);

        for kind in [DispatchMouseEventType::MousePressed, DispatchMouseEventType::MouseReleased] {
            let press = mouse_event(kind, at).unwrap();
            assert_eq!(press.button, Some(MouseButton::Left));
            assert_eq!(press.click_count, Some(1));
        }
    }

    #[test]
    fn test_profile_dir_is_per_account() {
        let launcher = CdpLauncher {
            data_dir: PathBuf::from("/data"),
            headless: true,
        };
        let a = AccountConfig {
            username: "@Bot_A".into(),
            ..Default::default()
        };
        assert_eq!(
            launcher.profile_dir(&a),
            PathBuf::from("/data/accounts/bot_a/browser-profile")
        );
    }
}
