//! Operator pause / resume.
//!
//! A [`PauseToken`] is shared between whoever requests a pause (a hotkey
//! thread, a signal handler, a test) and the simulator, which checks it at
//! every step boundary. Resumption is either an explicit [`PauseToken::resume`]
//! or an async callback fixed at construction.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

/// Async hook awaited while suspended; its completion resumes the session.
pub type ResumeCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct PauseInner {
    requested: AtomicBool,
    suspended: AtomicBool,
    resume: Notify,
    on_pause: Option<ResumeCallback>,
}

#[derive(Clone)]
pub struct PauseToken {
    inner: Arc<PauseInner>,
}

impl std::fmt::Debug for PauseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseToken")
            .field("requested", &self.is_pause_requested())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

impl Default for PauseToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseToken {
    /// A token that, once paused, waits for [`PauseToken::resume`].
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that, once paused, awaits `callback` and then continues.
    pub fn with_resume_callback(callback: ResumeCallback) -> Self {
        Self::build(Some(callback))
    }

    fn build(on_pause: Option<ResumeCallback>) -> Self {
        Self {
            inner: Arc::new(PauseInner {
                requested: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                resume: Notify::new(),
                on_pause,
            }),
        }
    }

    /// Ask the session to suspend at its next step boundary.
    pub fn request_pause(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            info!("⏸️  pause requested");
        }
    }

    pub fn is_pause_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// True while a session is blocked inside [`PauseToken::check_for_pause`].
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::SeqCst)
    }

    /// Wake a suspended session. No effect when nothing is suspended.
    pub fn resume(&self) {
        self.inner.resume.notify_waiters();
    }

    /// Consume a pending pause request, if any, and block until resumed.
    ///
    /// Returns `true` when the session actually paused.
    pub async fn check_for_pause(&self) -> bool {
        // Register interest before consuming the flag so a resume issued
        // right after the pause log is never lost.
        let notified = self.inner.resume.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.inner.requested.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.inner.suspended.store(true, Ordering::SeqCst);
        match &self.inner.on_pause {
            Some(callback) => {
                info!("⏸️  session paused; awaiting resume callback");
                callback().await;
            }
            None => {
                info!("⏸️  session paused; press 'r' to resume");
                notified.await;
            }
        }
        self.inner.suspended.store(false, Ordering::SeqCst);
        info!("▶️  session resumed");
        true
    }
}

// ── Terminal hotkeys ────────────────────────────────────────────────────────

/// Background listener mapping `p` to pause and `r` to resume.
///
/// Stops when dropped.
#[cfg(feature = "hotkeys")]
pub struct PauseHotkeys {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(feature = "hotkeys")]
impl PauseHotkeys {
    pub fn spawn(token: PauseToken) -> Self {
        use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
        use std::time::Duration;
        use tracing::warn;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("hotkeys: failed to poll terminal input: {}", e);
                        return;
                    }
                }
                let key = match event::read() {
                    Ok(TermEvent::Key(key)) => key,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("hotkeys: failed to read terminal input: {}", e);
                        return;
                    }
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('p') | KeyCode::Char('P') => token.request_pause(),
                    KeyCode::Char('r') | KeyCode::Char('R') => token.resume(),
                    _ => {}
                }
            }
        });
        info!("⌨️  hotkeys active: 'p' pauses, 'r' resumes");
        Self {
            stop,
            thread: Some(thread),
        }
    }
}

#[cfg(feature = "hotkeys")]
impl Drop for PauseHotkeys {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
