//! Human Interaction Simulator.
//!
//! Wraps a [`UiSurface`] and turns every logical action into human-paced
//! input: curved pointer paths, hesitant clicks, typo-prone typing and
//! irregular waits. Each simulator samples one [`SessionVariation`] at
//! construction and keeps it for life; a [`PauseToken`] is consulted at every
//! step boundary.

pub mod pause;
pub mod timing;
pub mod trajectory;
pub mod typing;

pub use pause::{PauseToken, ResumeCallback};
pub use timing::{DelayGenerator, DelaySample, SessionVariation, TimingProfile};
pub use typing::{KeystrokePlan, TypingOptions};

use crate::core::types::ActionDelayWindow;
use crate::surface::{ElementRef, Key, Point, SurfaceResult, UiSurface};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use trajectory::TrajectoryStep;
use typing::KeyAction;

const OVERSHOOT_PROBABILITY: f64 = 0.15;
const OVERSHOOT_PX: (f64, f64) = (50.0, 150.0);
const OVERSHOOT_SETTLE_MS: (u64, u64) = (150, 450);
const HESITATE_MS: (u64, u64) = (300, 1200);
const PRESS_HOLD_MS: (u64, u64) = (80, 220);
const SCROLL_CHUNK_PX: (f64, f64) = (80.0, 160.0);
const SCROLL_GAP_MS: (u64, u64) = (30, 90);

struct SimState {
    rng: StdRng,
    cursor: Option<Point>,
}

pub struct HumanSimulator {
    surface: Arc<dyn UiSurface>,
    pause: PauseToken,
    profile: TimingProfile,
    variation: SessionVariation,
    delays: DelayGenerator,
    state: Mutex<SimState>,
}

impl HumanSimulator {
    pub fn new(surface: Arc<dyn UiSurface>, pause: PauseToken, profile: TimingProfile) -> Self {
        Self::with_seed(surface, pause, profile, rand::rng().random())
    }

    /// Deterministic simulator; the same seed yields the same personality and paths.
    pub fn with_seed(
        surface: Arc<dyn UiSurface>,
        pause: PauseToken,
        profile: TimingProfile,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let variation = SessionVariation::sample(&mut rng);
        debug!(
            "human: session variation typing={:.2} scroll={:.2} pause={:.2} accuracy={:.2} ({:?})",
            variation.typing_speed_multiplier,
            variation.scroll_speed_multiplier,
            variation.pause_frequency,
            variation.mouse_accuracy,
            profile
        );
        Self {
            surface,
            pause,
            profile,
            variation,
            delays: DelayGenerator::new(profile, variation),
            state: Mutex::new(SimState { rng, cursor: None }),
        }
    }

    pub fn surface(&self) -> &Arc<dyn UiSurface> {
        &self.surface
    }

    pub fn pause_token(&self) -> &PauseToken {
        &self.pause
    }

    pub fn profile(&self) -> TimingProfile {
        self.profile
    }

    pub fn variation(&self) -> SessionVariation {
        self.variation
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state.rng)
    }

    fn set_cursor(&self, p: Point) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.cursor = Some(p);
    }

    fn cursor(&self) -> Option<Point> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cursor
    }

    /// Pure delay draw, without sleeping or consulting the pause token.
    pub fn sample_delay(&self, min_ms: u64, max_ms: u64) -> DelaySample {
        self.with_rng(|rng| self.delays.sample(rng, min_ms, max_ms))
    }

    /// Honour a pending pause, then sleep a human-shaped duration.
    pub async fn wait(&self, min_ms: u64, max_ms: u64) -> Duration {
        self.pause.check_for_pause().await;
        let sample = self.sample_delay(min_ms, max_ms);
        if sample.long_pause {
            debug!("human: long pause {:?}", sample.duration);
        }
        tokio::time::sleep(sample.duration).await;
        sample.duration
    }

    /// Pacing between high-level actions, uniform within `window`.
    pub async fn pace(&self, window: ActionDelayWindow) -> Duration {
        self.pause.check_for_pause().await;
        let d = self.with_rng(|rng| timing::uniform_ms(rng, window.min_ms, window.max_ms));
        info!("⏳ next action in {:.1}s", d.as_secs_f64());
        tokio::time::sleep(d).await;
        d
    }

    async fn current_cursor(&self) -> SurfaceResult<Point> {
        if let Some(p) = self.cursor() {
            return Ok(p);
        }
        let viewport = self.surface.viewport().await?;
        let start = self.with_rng(|rng| trajectory::biased_start(rng, viewport));
        self.set_cursor(start);
        Ok(start)
    }

    async fn follow(&self, steps: Vec<TrajectoryStep>) -> SurfaceResult<()> {
        for step in steps {
            self.pause.check_for_pause().await;
            self.surface.mouse_move(step.point).await?;
            self.set_cursor(step.point);
            tokio::time::sleep(step.delay).await;
        }
        Ok(())
    }

    async fn reach(&self, target: Point) -> SurfaceResult<()> {
        let start = self.current_cursor().await?;
        let steps = self.with_rng(|rng| trajectory::plan_reach(rng, start, target));
        self.follow(steps).await
    }

    /// Move the pointer onto `el` along a reach path.
    ///
    /// Returns the landing point, or `None` when the element has no box
    /// (or the profile is fast) and nothing moved.
    pub async fn move_to(&self, el: ElementRef) -> SurfaceResult<Option<Point>> {
        if self.profile.is_fast() {
            return Ok(None);
        }
        let Some(bbox) = self.surface.bounding_box(el).await? else {
            debug!("human: element {:?} has no bounding box; skipping move", el);
            return Ok(None);
        };
        let accuracy = self.variation.mouse_accuracy;
        let target = self.with_rng(|rng| trajectory::reach_target(rng, bbox, accuracy));
        self.reach(target).await?;
        Ok(Some(target))
    }

    /// Idle drift to a random point in the viewport.
    pub async fn wander(&self) -> SurfaceResult<()> {
        if self.profile.is_fast() {
            return Ok(());
        }
        let start = self.current_cursor().await?;
        let viewport = self.surface.viewport().await?;
        let steps = self.with_rng(|rng| {
            let end = trajectory::random_point(rng, viewport);
            trajectory::plan_wander(rng, start, end)
        });
        self.follow(steps).await
    }

    /// Hesitate-and-click: approach (sometimes overshooting), linger, press,
    /// hold, release, then the logical click.
    pub async fn click(&self, el: ElementRef) -> SurfaceResult<()> {
        if self.profile.is_fast() {
            return self.surface.force_click(el).await;
        }
        self.pause.check_for_pause().await;
        let landing = self.move_to(el).await?;

        if let Some(point) = landing {
            let overshoot = self.with_rng(|rng| {
                rng.random_bool(OVERSHOOT_PROBABILITY).then(|| {
                    let distance = rng.random_range(OVERSHOOT_PX.0..=OVERSHOOT_PX.1);
                    trajectory::overshoot_point(rng, point, distance)
                })
            });
            if let Some(past) = overshoot {
                debug!("human: overshoot to ({:.0},{:.0})", past.x, past.y);
                self.reach(past).await?;
                self.wait(OVERSHOOT_SETTLE_MS.0, OVERSHOOT_SETTLE_MS.1).await;
                self.reach(point).await?;
            }
        }

        self.wait(HESITATE_MS.0, HESITATE_MS.1).await;

        if let Some(point) = landing {
            self.surface.mouse_down(point).await?;
            let hold = self.with_rng(|rng| timing::uniform_ms(rng, PRESS_HOLD_MS.0, PRESS_HOLD_MS.1));
            tokio::time::sleep(hold).await;
            self.surface.mouse_up(point).await?;
        }
        self.surface.click(el).await
    }

    /// Focus `el` and type `text` keystroke by keystroke. Returns the number
    /// of typos made (and corrected) along the way.
    pub async fn type_text(
        &self,
        el: ElementRef,
        text: &str,
        options: &TypingOptions,
    ) -> SurfaceResult<usize> {
        if self.profile.is_fast() {
            self.surface.fill(el, text).await?;
            return Ok(0);
        }
        self.click(el).await?;
        let variation = self.variation;
        let plan = self.with_rng(|rng| typing::plan_keystrokes(rng, text, options, &variation));
        debug!(
            "human: typing {} chars, {} strokes, {} typos",
            text.chars().count(),
            plan.strokes.len(),
            plan.typo_count
        );
        for stroke in &plan.strokes {
            self.pause.check_for_pause().await;
            let key = match stroke.action {
                KeyAction::Type(c) => Key::Char(c),
                KeyAction::Backspace => Key::Backspace,
            };
            self.surface.press_key(key).await?;
            tokio::time::sleep(stroke.delay).await;
        }
        Ok(plan.typo_count)
    }

    /// Scroll by `dy` pixels in uneven wheel-sized chunks.
    pub async fn scroll(&self, dy: f64) -> SurfaceResult<()> {
        if self.profile.is_fast() {
            return self.surface.scroll_by(dy).await;
        }
        let direction = dy.signum();
        let mut remaining = dy.abs();
        let speed = self.variation.scroll_speed_multiplier;
        while remaining > 0.5 {
            self.pause.check_for_pause().await;
            let (chunk, gap) = self.with_rng(|rng| {
                let chunk = rng.random_range(SCROLL_CHUNK_PX.0..=SCROLL_CHUNK_PX.1) * speed;
                (chunk.min(remaining), timing::uniform_ms(rng, SCROLL_GAP_MS.0, SCROLL_GAP_MS.1))
            });
            self.surface.scroll_by(chunk * direction).await?;
            remaining -= chunk;
            tokio::time::sleep(gap).await;
        }
        Ok(())
    }
}
