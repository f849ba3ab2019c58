//! Lag ("lazy brush") smoothing.
//!
//! The brush trails the pointer on an invisible leash of length `radius`: it only
//! moves once the pointer pulls the leash taut, and never closer to the pointer
//! than the leash allows. Updates are pure, `(state, input) -> state`.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_4;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Fraction of the remaining distance covered per catch-up frame.
pub const CATCH_UP_FRACTION: f64 = 0.2;
/// Upper bound on a single catch-up frame's movement.
pub const CATCH_UP_MAX_STEP: f64 = 10.0;
/// Within this distance the brush snaps onto the pointer.
pub const CATCH_UP_SNAP_DISTANCE: f64 = 1.0;
/// Motion samples kept for direction smoothing.
const HISTORY_LEN: usize = 5;

/// Lag smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LazyBrushConfig {
    /// Leash length in canvas units. Zero makes the brush follow the pointer exactly.
    pub radius: f64,
    /// Fraction of the excess distance withheld per update, in [0, 1).
    pub friction: f64,
    /// Animate the brush onto the pointer when the stroke ends.
    pub catch_up: bool,
    /// Snap the movement direction to the nearest multiple of 45 degrees when
    /// within this many degrees of it.
    pub angle_threshold: Option<f64>,
    /// Blend weight of the recent motion direction, in [0, 1].
    pub smoothing: f64,
    /// Delay before the end-of-stroke catch-up starts.
    pub finish_stroke_delay_ms: Option<u64>,
}

impl Default for LazyBrushConfig {
    fn default() -> Self {
        Self {
            radius: 0.0,
            friction: 0.0,
            catch_up: true,
            angle_threshold: None,
            smoothing: 0.0,
            finish_stroke_delay_ms: None,
        }
    }
}

impl LazyBrushConfig {
    pub fn with_radius(radius: f64) -> Self {
        Self { radius, ..Self::default() }
    }

    pub fn finish_stroke_delay(&self) -> Duration {
        Duration::from_millis(self.finish_stroke_delay_ms.unwrap_or(0))
    }
}

/// Last raw pointer input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub position: Point,
    pub timestamp: Instant,
    /// Canvas units per second.
    pub velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MotionSample {
    direction: Vec2,
    velocity: f64,
}

/// Pointer and brush positions plus recent motion history.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyBrushState {
    pub pointer: PointerState,
    pub brush: Point,
    /// Whether the last update moved the brush.
    pub has_moved: bool,
    history: VecDeque<MotionSample>,
}

impl LazyBrushState {
    /// Pointer and brush both at `position`.
    pub fn new(position: Point, timestamp: Instant) -> Self {
        Self {
            pointer: PointerState { position, timestamp, velocity: 0.0 },
            brush: position,
            has_moved: false,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Distance between brush and pointer.
    pub fn distance(&self) -> f64 {
        self.brush.distance(self.pointer.position)
    }

    pub fn is_caught_up(&self) -> bool {
        self.brush == self.pointer.position
    }

    /// Feed a new pointer position.
    pub fn update(&self, config: &LazyBrushConfig, position: Point, timestamp: Instant) -> Self {
        let mut next = self.clone();

        let moved = position - self.pointer.position;
        let elapsed = timestamp
            .checked_duration_since(self.pointer.timestamp)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let velocity = if elapsed > 0.0 { moved.hypot() / elapsed } else { self.pointer.velocity };
        next.pointer = PointerState { position, timestamp, velocity };

        if moved.hypot2() > 0.0 {
            if next.history.len() == HISTORY_LEN {
                next.history.pop_front();
            }
            next.history.push_back(MotionSample { direction: moved.normalize(), velocity });
        }

        let to_pointer = position - self.brush;
        let distance = to_pointer.hypot();
        let radius = config.radius.max(0.0);
        if distance <= radius {
            next.has_moved = false;
            return next;
        }

        let mut angle = to_pointer.atan2();
        if let Some(threshold) = config.angle_threshold {
            angle = snap_angle(angle, threshold.to_radians());
        }

        let excess = distance - radius;
        let step = excess * (1.0 - config.friction.clamp(0.0, 1.0));
        let mut movement = Vec2::from_angle(angle) * step;

        let smoothing = config.smoothing.clamp(0.0, 1.0);
        if smoothing > 0.0 {
            if let Some(direction) = next.weighted_direction() {
                movement = movement * (1.0 - smoothing) + direction * step * smoothing;
            }
        }

        // The brush never closes in past the leash.
        let length = movement.hypot();
        if length > excess {
            movement = movement * (excess / length);
        }

        next.brush = self.brush + movement;
        if next.brush.distance(position) < 1e-9 {
            next.brush = position;
        }
        next.has_moved = movement.hypot2() > 0.0;
        next
    }

    /// Advance the end-of-stroke animation by one frame.
    pub fn catch_up_step(&self) -> Self {
        let mut next = self.clone();
        let remaining = self.pointer.position - self.brush;
        let distance = remaining.hypot();
        if distance <= CATCH_UP_SNAP_DISTANCE {
            next.brush = self.pointer.position;
        } else {
            let mut step = remaining * CATCH_UP_FRACTION;
            if step.hypot() > CATCH_UP_MAX_STEP {
                step = step.normalize() * CATCH_UP_MAX_STEP;
            }
            next.brush = self.brush + step;
        }
        next.has_moved = next.brush != self.brush;
        next
    }

    /// Velocity-weighted mean of the recent motion directions, as a unit vector.
    fn weighted_direction(&self) -> Option<Vec2> {
        if self.history.is_empty() {
            return None;
        }
        let total: f64 = self.history.iter().map(|s| s.velocity).sum();
        let sum = if total > 0.0 {
            self.history.iter().fold(Vec2::ZERO, |acc, s| acc + s.direction * s.velocity) / total
        } else {
            self.history.iter().fold(Vec2::ZERO, |acc, s| acc + s.direction) / self.history.len() as f64
        };
        (sum.hypot2() > f64::EPSILON).then(|| sum.normalize())
    }
}

/// Snap to the nearest multiple of 45 degrees when within `threshold` radians of it.
fn snap_angle(angle: f64, threshold: f64) -> f64 {
    let nearest = (angle / FRAC_PI_4).round() * FRAC_PI_4;
    if (angle - nearest).abs() <= threshold { nearest } else { angle }
}
