//! Wait-time synthesis and per-session personality.
//!
//! Realistic waits are uniform within a window, scaled by the session's
//! pause frequency, with an occasional long "distraction" stretch. The fast
//! profile collapses every wait to a fixed constant so flows can be exercised
//! without wall-clock realism.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;

/// Fixed wait returned under [`TimingProfile::Fast`].
pub const FAST_WAIT: Duration = Duration::from_millis(100);

/// Probability of stretching a wait into a long human pause.
pub const LONG_PAUSE_PROBABILITY: f64 = 0.05;

/// Timing strategy, chosen once when a simulator is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingProfile {
    /// Human-paced waits, trajectories and keystrokes.
    #[default]
    Realistic,
    /// Fixed short waits, bulk fills and forced clicks.
    Fast,
}

impl TimingProfile {
    pub fn from_fast_flag(fast: bool) -> Self {
        if fast {
            Self::Fast
        } else {
            Self::Realistic
        }
    }

    pub fn is_fast(self) -> bool {
        self == Self::Fast
    }
}

/// Per-session "personality", sampled once and applied to every timing and
/// movement calculation of one simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionVariation {
    pub typing_speed_multiplier: f64,
    pub scroll_speed_multiplier: f64,
    pub pause_frequency: f64,
    pub mouse_accuracy: f64,
}

impl SessionVariation {
    pub const TYPING_RANGE: (f64, f64) = (0.8, 1.3);
    pub const SCROLL_RANGE: (f64, f64) = (0.7, 1.3);
    pub const PAUSE_RANGE: (f64, f64) = (0.8, 1.2);
    pub const ACCURACY_RANGE: (f64, f64) = (0.70, 0.95);

    pub fn sample(rng: &mut StdRng) -> Self {
        Self {
            typing_speed_multiplier: rng.random_range(Self::TYPING_RANGE.0..=Self::TYPING_RANGE.1),
            scroll_speed_multiplier: rng.random_range(Self::SCROLL_RANGE.0..=Self::SCROLL_RANGE.1),
            pause_frequency: rng.random_range(Self::PAUSE_RANGE.0..=Self::PAUSE_RANGE.1),
            mouse_accuracy: rng.random_range(Self::ACCURACY_RANGE.0..=Self::ACCURACY_RANGE.1),
        }
    }

    /// All multipliers at 1.0.
    pub fn neutral() -> Self {
        Self {
            typing_speed_multiplier: 1.0,
            scroll_speed_multiplier: 1.0,
            pause_frequency: 1.0,
            mouse_accuracy: 0.85,
        }
    }
}

/// One drawn wait, with a flag for the long-pause branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySample {
    pub duration: Duration,
    pub long_pause: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DelayGenerator {
    profile: TimingProfile,
    variation: SessionVariation,
}

impl DelayGenerator {
    pub fn new(profile: TimingProfile, variation: SessionVariation) -> Self {
        Self { profile, variation }
    }

    /// Draw a wait for the `[min_ms, max_ms]` window (bounds may arrive reversed).
    pub fn sample(&self, rng: &mut StdRng, min_ms: u64, max_ms: u64) -> DelaySample {
        if self.profile.is_fast() {
            return DelaySample {
                duration: FAST_WAIT,
                long_pause: false,
            };
        }
        let (lo, hi) = ordered(min_ms, max_ms);
        let base = rng.random_range(lo..=hi) as f64;
        let mut ms = base * self.variation.pause_frequency;
        let long_pause = rng.random_bool(LONG_PAUSE_PROBABILITY);
        if long_pause {
            ms *= rng.random_range(2.0..=5.0);
        }
        DelaySample {
            duration: Duration::from_millis(ms.round() as u64),
            long_pause,
        }
    }
}

/// Uniform draw in an ordered window, no shaping.
pub fn uniform_ms(rng: &mut StdRng, min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = ordered(min_ms, max_ms);
    Duration::from_millis(rng.random_range(lo..=hi))
}

pub(crate) fn ordered(a: u64, b: u64) -> (u64, u64) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_variation_within_ranges() {
        let mut rng = rng();
        for _ in 0..500 {
            let v = SessionVariation::sample(&mut rng);
            assert!((0.8..=1.3).contains(&v.typing_speed_multiplier));
            assert!((0.7..=1.3).contains(&v.scroll_speed_multiplier));
            assert!((0.8..=1.2).contains(&v.pause_frequency));
            assert!((0.70..=0.95).contains(&v.mouse_accuracy));
        }
    }

    #[test]
    fn test_realistic_delay_bounds() {
        let mut rng = rng();
        for _ in 0..2000 {
            let variation = SessionVariation::sample(&mut rng);
            let gen = DelayGenerator::new(TimingProfile::Realistic, variation);
            let s = gen.sample(&mut rng, 500, 1500);
            let ms = s.duration.as_millis() as f64;
            assert!(ms >= 500.0 * 0.8 - 1.0, "below floor: {ms}");
            if s.long_pause {
                assert!(ms <= 1500.0 * 1.2 * 5.0 + 1.0, "long pause too long: {ms}");
            } else {
                assert!(ms <= 1500.0 * 1.2 + 1.0, "above ceiling: {ms}");
            }
        }
    }

    #[test]
    fn test_long_pause_branch_is_rare() {
        let mut rng = rng();
        let gen = DelayGenerator::new(TimingProfile::Realistic, SessionVariation::neutral());
        let long = (0..10_000)
            .filter(|_| gen.sample(&mut rng, 100, 200).long_pause)
            .count();
        // 5% nominal; generous band for a fixed seed.
        assert!((300..=700).contains(&long), "long pauses: {long}");
    }

    #[test]
    fn test_fast_profile_is_constant() {
        let mut rng = rng();
        let gen = DelayGenerator::new(TimingProfile::Fast, SessionVariation::neutral());
        for (min, max) in [(0, 0), (10, 20), (5_000, 60_000)] {
            let s = gen.sample(&mut rng, min, max);
            assert_eq!(s.duration, FAST_WAIT);
            assert!(!s.long_pause);
        }
    }

    #[test]
    fn test_reversed_window_is_accepted() {
        let mut rng = rng();
        let d = uniform_ms(&mut rng, 300, 100);
        assert!((100..=300).contains(&(d.as_millis() as u64)));
    }
}
