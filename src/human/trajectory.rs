//! Pointer path synthesis.
//!
//! Reach paths are cubic Bezier curves bent away from the straight line, with
//! a small hand tremor on every intermediate sample; wander paths are gentler
//! quadratic curves. Per-step delays follow `1 - sin(πt)`, so the pointer
//! starts and ends slowly and is fastest mid-path.

use crate::surface::{BoundingBox, Point, Viewport};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::f64::consts::PI;
use std::time::Duration;

const REACH_MIN_STEPS: usize = 15;
const REACH_PX_PER_STEP: f64 = 30.0;
const REACH_CURVE_FRACTION: f64 = 0.25;
const REACH_TREMOR_PX: f64 = 2.0;

const WANDER_MIN_STEPS: usize = 10;
const WANDER_PX_PER_STEP: f64 = 40.0;
const WANDER_CURVE_FRACTION: f64 = 0.2;
const WANDER_JITTER_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryStep {
    pub point: Point,
    /// Wait after moving to `point`.
    pub delay: Duration,
}

/// A plausible resting position for a pointer that has not moved yet.
pub fn biased_start(rng: &mut StdRng, viewport: Viewport) -> Point {
    let dx = rng.random_range(-0.25..=0.25) * viewport.width;
    let dy = rng.random_range(-0.25..=0.25) * viewport.height;
    Point::new(viewport.width / 2.0 + dx, viewport.height / 2.0 + dy)
}

/// Landing point inside `bbox`; lower `accuracy` strays further from the centre.
pub fn reach_target(rng: &mut StdRng, bbox: BoundingBox, accuracy: f64) -> Point {
    let spread = (1.0 - accuracy.clamp(0.0, 1.0)) * 0.3;
    let center = bbox.center();
    let x = center.x + spread * bbox.width * rng.random_range(-1.0..=1.0);
    let y = center.y + spread * bbox.height * rng.random_range(-1.0..=1.0);
    Point::new(
        x.clamp(bbox.x, bbox.x + bbox.width),
        y.clamp(bbox.y, bbox.y + bbox.height),
    )
}

/// Cubic Bezier path from `start` to `target`, ending exactly on `target`.
pub fn plan_reach(rng: &mut StdRng, start: Point, target: Point) -> Vec<TrajectoryStep> {
    let distance = start.distance(&target);
    let steps = step_count(distance, REACH_MIN_STEPS, REACH_PX_PER_STEP);
    let (nx, ny) = unit_normal(start, target);

    let max_bend = distance * REACH_CURVE_FRACTION;
    let bend1 = rng.random_range(-1.0..=1.0) * max_bend;
    let bend2 = rng.random_range(-1.0..=1.0) * max_bend;
    let c1 = Point::new(
        lerp(start.x, target.x, 1.0 / 3.0) + nx * bend1,
        lerp(start.y, target.y, 1.0 / 3.0) + ny * bend1,
    );
    let c2 = Point::new(
        lerp(start.x, target.x, 2.0 / 3.0) + nx * bend2,
        lerp(start.y, target.y, 2.0 / 3.0) + ny * bend2,
    );

    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let point = if i == steps {
                target
            } else {
                let p = cubic(start, c1, c2, target, t);
                Point::new(
                    p.x + rng.random_range(-REACH_TREMOR_PX..=REACH_TREMOR_PX),
                    p.y + rng.random_range(-REACH_TREMOR_PX..=REACH_TREMOR_PX),
                )
            };
            TrajectoryStep {
                point,
                delay: eased_delay(t, 15.0, 30.0),
            }
        })
        .collect()
}

/// Idle quadratic drift from `start` towards `end`.
pub fn plan_wander(rng: &mut StdRng, start: Point, end: Point) -> Vec<TrajectoryStep> {
    let distance = start.distance(&end);
    let steps = step_count(distance, WANDER_MIN_STEPS, WANDER_PX_PER_STEP);
    let (nx, ny) = unit_normal(start, end);
    let bend = rng.random_range(-1.0..=1.0) * distance * WANDER_CURVE_FRACTION;
    let control = Point::new(
        lerp(start.x, end.x, 0.5) + nx * bend,
        lerp(start.y, end.y, 0.5) + ny * bend,
    );

    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let p = quadratic(start, control, end, t);
            TrajectoryStep {
                point: Point::new(
                    p.x + rng.random_range(-WANDER_JITTER_PX..=WANDER_JITTER_PX),
                    p.y + rng.random_range(-WANDER_JITTER_PX..=WANDER_JITTER_PX),
                ),
                delay: eased_delay(t, 10.0, 20.0),
            }
        })
        .collect()
}

/// Point `distance` px away from `from` along a random heading.
pub fn overshoot_point(rng: &mut StdRng, from: Point, distance: f64) -> Point {
    let heading = rng.random_range(0.0..(2.0 * PI));
    Point::new(from.x + distance * heading.cos(), from.y + distance * heading.sin())
}

/// A random point within the viewport, kept off the outer 5%.
pub fn random_point(rng: &mut StdRng, viewport: Viewport) -> Point {
    Point::new(
        rng.random_range(0.05..=0.95) * viewport.width,
        rng.random_range(0.05..=0.95) * viewport.height,
    )
}

fn step_count(distance: f64, min_steps: usize, px_per_step: f64) -> usize {
    min_steps.max((distance / px_per_step) as usize)
}

fn eased_delay(t: f64, floor_ms: f64, swing_ms: f64) -> Duration {
    let ms = floor_ms + (1.0 - (PI * t).sin()) * swing_ms;
    Duration::from_micros((ms * 1000.0).round() as u64)
}

fn unit_normal(a: Point, b: Point) -> (f64, f64) {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        (0.0, 0.0)
    } else {
        (-dy / len, dx / len)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn cubic(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

fn quadratic(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let (a, b, c) = (u * u, 2.0 * u * t, t * t);
    Point::new(
        a * p0.x + b * p1.x + c * p2.x,
        a * p0.y + b * p1.y + c * p2.y,
    )
}
