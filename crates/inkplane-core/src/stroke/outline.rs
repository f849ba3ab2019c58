//! Variable-width outline synthesis for freehand strokes.
//!
//! Input samples are streamlined into [`OutlineStrokePoint`]s carrying running
//! length and direction, then offset left and right by a pressure-dependent
//! radius. Caps and sharp corners are closed with arcs. The result is a single
//! closed polygon: left side, end cap, right side reversed, start cap.

use super::StrokePoint;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::input::DEFAULT_PRESSURE;

const RATE_OF_PRESSURE_CHANGE: f64 = 0.275;
/// Slightly more than pi so half-circle arcs overlap their neighbours.
const FIXED_PI: f64 = PI + 0.0001;
/// Tail of the stroke shorter than this is collapsed onto the last point.
const END_NOISE_LENGTH: f64 = 3.0;
const CORNER_STEPS: usize = 13;
const END_CAP_STEPS: usize = 29;
/// Points looked at when seeding the simulated pressure.
const PRESSURE_SEED_POINTS: usize = 10;

/// Easing curve applied to pressure or to a taper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInSine,
    EaseOutSine,
    EaseInOutSine,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => (t - 1.0).powi(3) + 1.0,
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
                }
            }
            Easing::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
            Easing::EaseOutSine => (t * PI / 2.0).sin(),
            Easing::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

/// How much of a stroke end narrows to a point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taper {
    #[default]
    None,
    /// Taper across the whole stroke.
    Full,
    /// Taper across this many canvas units.
    Length(f64),
}

impl Taper {
    fn length(self, size: f64, total_length: f64) -> f64 {
        match self {
            Taper::None => 0.0,
            Taper::Full => size.max(total_length),
            Taper::Length(length) => length.max(0.0),
        }
    }
}

/// Shape of one stroke end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaperOptions {
    #[serde(default)]
    pub taper: Taper,
    pub easing: Easing,
    /// Round cap when not tapered; flat otherwise.
    #[serde(default = "default_cap")]
    pub cap: bool,
}

fn default_cap() -> bool {
    true
}

impl TaperOptions {
    pub fn start_default() -> Self {
        Self { taper: Taper::None, easing: Easing::EaseOutQuad, cap: true }
    }

    pub fn end_default() -> Self {
        Self { taper: Taper::None, easing: Easing::EaseOutCubic, cap: true }
    }

    pub fn tapered(mut self, taper: Taper) -> Self {
        self.taper = taper;
        self
    }

    pub fn flat(mut self) -> Self {
        self.cap = false;
        self
    }
}

/// Outline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrokeOptions {
    /// Base diameter.
    pub size: f64,
    /// How strongly pressure narrows the stroke, in [-1, 1].
    pub thinning: f64,
    /// Minimum spacing between outline points, as a fraction of `size`.
    pub smoothing: f64,
    /// How far samples are pulled toward the previous point, in [0, 1].
    pub streamline: f64,
    /// Easing applied to pressure.
    pub easing: Easing,
    /// Derive pressure from speed instead of the device.
    pub simulate_pressure: bool,
    #[serde(default = "TaperOptions::start_default")]
    pub start: TaperOptions,
    #[serde(default = "TaperOptions::end_default")]
    pub end: TaperOptions,
    /// The stroke is complete; the last sample is used as-is.
    pub last: bool,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            size: 16.0,
            thinning: 0.5,
            smoothing: 0.5,
            streamline: 0.5,
            easing: Easing::Linear,
            simulate_pressure: true,
            start: TaperOptions::start_default(),
            end: TaperOptions::end_default(),
            last: false,
        }
    }
}

/// A streamlined sample ready for outlining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStrokePoint {
    pub point: Point,
    pub pressure: f64,
    /// Unit vector from this point back to the previous one.
    pub vector: Vec2,
    /// Distance to the previous point.
    pub distance: f64,
    pub running_length: f64,
}

/// Outline polygon for the given samples.
pub fn get_stroke(points: &[StrokePoint], options: &StrokeOptions) -> Vec<Point> {
    stroke_outline(&stroke_points(points, options), options)
}

/// Streamline raw samples and annotate them with direction and running length.
pub fn stroke_points(input: &[StrokePoint], options: &StrokeOptions) -> Vec<OutlineStrokePoint> {
    let Some(&first) = input.first() else {
        return Vec::new();
    };
    let t = 0.15 + (1.0 - options.streamline.clamp(0.0, 1.0)) * 0.85;

    let mut pts: Vec<StrokePoint> = match input {
        // Two samples alone give the streamline nothing to work with.
        [a, b] => (0..5).map(|i| a.lerp(*b, i as f64 / 4.0)).collect(),
        [only] => vec![*only, StrokePoint::new(only.x + 1.0, only.y + 1.0, only.pressure)],
        _ => input.to_vec(),
    };
    for p in &mut pts {
        if p.pressure.is_nan() || p.pressure < 0.0 {
            p.pressure = DEFAULT_PRESSURE;
        }
    }

    let mut out = vec![OutlineStrokePoint {
        point: first.point(),
        pressure: pts[0].pressure,
        vector: Vec2::new(1.0, 1.0),
        distance: 0.0,
        running_length: 0.0,
    }];
    let mut has_reached_minimum_length = false;
    let mut running_length = 0.0;
    let mut prev = out[0];
    let max = pts.len() - 1;

    for (i, sample) in pts.iter().enumerate().skip(1) {
        let target = sample.point();
        let point = if options.last && i == max { target } else { prev.point.lerp(target, t) };
        if point == prev.point {
            continue;
        }
        let distance = point.distance(prev.point);
        running_length += distance;
        if i < max && !has_reached_minimum_length {
            if running_length < options.size {
                continue;
            }
            has_reached_minimum_length = true;
        }
        prev = OutlineStrokePoint {
            point,
            pressure: sample.pressure,
            vector: unit(prev.point - point),
            distance,
            running_length,
        };
        out.push(prev);
    }

    if out.len() > 1 {
        out[0].vector = out[1].vector;
    }
    out
}

/// Closed outline polygon around streamlined points.
pub fn stroke_outline(points: &[OutlineStrokePoint], options: &StrokeOptions) -> Vec<Point> {
    let size = options.size;
    if points.is_empty() || !(size > 0.0) || !size.is_finite() {
        return Vec::new();
    }
    let thinning = options.thinning;
    let simulate = options.simulate_pressure;
    let last_index = points.len() - 1;
    let total_length = points[last_index].running_length;

    let taper_start = options.start.taper.length(size, total_length);
    let taper_end = options.end.taper.length(size, total_length);
    let min_distance = (size * options.smoothing).powi(2);

    let simulated = |prev_pressure: f64, distance: f64| {
        let speed = (distance / size).min(1.0);
        let rest = (1.0 - speed).min(1.0);
        (prev_pressure + (rest - prev_pressure) * (speed * RATE_OF_PRESSURE_CHANGE)).min(1.0)
    };

    let mut prev_pressure = points
        .iter()
        .take(PRESSURE_SEED_POINTS)
        .fold(points[0].pressure, |acc, curr| {
            let pressure = if simulate { simulated(acc, curr.distance) } else { curr.pressure };
            (acc + pressure) / 2.0
        });

    let mut radius = stroke_radius(size, thinning, points[last_index].pressure, options.easing);
    let mut first_radius: Option<f64> = None;
    let mut prev_vector = points[0].vector;
    let mut pl = points[0].point;
    let mut pr = pl;
    let mut is_prev_point_sharp_corner = false;
    let mut left: Vec<Point> = Vec::new();
    let mut right: Vec<Point> = Vec::new();

    for (i, current) in points.iter().enumerate() {
        let OutlineStrokePoint { point, vector, distance, running_length, .. } = *current;
        let mut pressure = current.pressure;

        if i < last_index && total_length - running_length < END_NOISE_LENGTH {
            continue;
        }

        if thinning != 0.0 {
            if simulate {
                pressure = simulated(prev_pressure, distance);
            }
            radius = stroke_radius(size, thinning, pressure, options.easing);
        } else {
            radius = size / 2.0;
        }
        if first_radius.is_none() {
            first_radius = Some(radius);
        }

        let ts = if running_length < taper_start {
            options.start.easing.apply(running_length / taper_start)
        } else {
            1.0
        };
        let te = if total_length - running_length < taper_end {
            options.end.easing.apply((total_length - running_length) / taper_end)
        } else {
            1.0
        };
        radius = (radius * ts.min(te)).max(0.01);

        let next_vector = if i < last_index { points[i + 1].vector } else { vector };
        let next_dpr = if i < last_index { vector.dot(next_vector) } else { 1.0 };
        let prev_dpr = vector.dot(prev_vector);
        let is_point_sharp_corner = prev_dpr < 0.0 && !is_prev_point_sharp_corner;
        let is_next_point_sharp_corner = next_dpr < 0.0;

        if is_point_sharp_corner || is_next_point_sharp_corner {
            // Round the corner with a half circle on each side.
            let offset = perpendicular(prev_vector) * radius;
            for step in 0..=CORNER_STEPS {
                let t = step as f64 / CORNER_STEPS as f64;
                pl = rotate_around(point - offset, point, FIXED_PI * t);
                left.push(pl);
                pr = rotate_around(point + offset, point, FIXED_PI * -t);
                right.push(pr);
            }
            if is_next_point_sharp_corner {
                is_prev_point_sharp_corner = true;
            }
            continue;
        }
        is_prev_point_sharp_corner = false;

        if i == last_index {
            let offset = perpendicular(vector) * radius;
            left.push(point - offset);
            right.push(point + offset);
            continue;
        }

        let offset = perpendicular(next_vector.lerp(vector, next_dpr)) * radius;
        let tl = point - offset;
        if i <= 1 || (pl - tl).hypot2() > min_distance {
            left.push(tl);
            pl = tl;
        }
        let tr = point + offset;
        if i <= 1 || (pr - tr).hypot2() > min_distance {
            right.push(tr);
            pr = tr;
        }

        prev_pressure = pressure;
        prev_vector = vector;
    }

    let first_point = points[0].point;
    let last_point = if points.len() > 1 {
        points[last_index].point
    } else {
        points[0].point + Vec2::new(1.0, 1.0)
    };
    let tapered = taper_start > 0.0 || taper_end > 0.0;

    let mut start_cap: Vec<Point> = Vec::new();
    if points.len() == 1 {
        if !tapered || options.last {
            // A dot.
            let start = first_point + unit(perpendicular(first_point - last_point)) * -first_radius.unwrap_or(radius);
            return (1..=CORNER_STEPS)
                .map(|step| rotate_around(start, first_point, FIXED_PI * 2.0 * step as f64 / CORNER_STEPS as f64))
                .collect();
        }
    } else if taper_start > 0.0 {
        // The taper already closes the start.
    } else if options.start.cap {
        if let Some(&r0) = right.first() {
            start_cap.extend(
                (1..=CORNER_STEPS)
                    .map(|step| rotate_around(r0, first_point, FIXED_PI * step as f64 / CORNER_STEPS as f64)),
            );
        }
    } else if let (Some(&l0), Some(&r0)) = (left.first(), right.first()) {
        let corners = l0 - r0;
        let a = corners * 0.5;
        let b = corners * 0.51;
        start_cap.extend([first_point - a, first_point - b, first_point + b, first_point + a]);
    }

    let mut end_cap: Vec<Point> = Vec::new();
    let direction = perpendicular(-points[last_index].vector);
    if taper_end > 0.0 || (taper_start > 0.0 && points.len() == 1) {
        end_cap.push(last_point);
    } else if options.end.cap {
        let start = last_point + direction * radius;
        end_cap.extend(
            (1..END_CAP_STEPS)
                .map(|step| rotate_around(start, last_point, FIXED_PI * 3.0 * step as f64 / END_CAP_STEPS as f64)),
        );
    } else {
        end_cap.extend([
            last_point + direction * radius,
            last_point + direction * radius * 0.99,
            last_point - direction * radius * 0.99,
            last_point - direction * radius,
        ]);
    }

    let mut outline = left;
    outline.extend(end_cap);
    outline.extend(right.into_iter().rev());
    outline.extend(start_cap);
    outline
}

fn stroke_radius(size: f64, thinning: f64, pressure: f64, easing: Easing) -> f64 {
    size * easing.apply(0.5 - thinning * (0.5 - pressure))
}

fn perpendicular(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

fn unit(v: Vec2) -> Vec2 {
    let len = v.hypot();
    if len > 0.0 { v / len } else { Vec2::ZERO }
}

fn rotate_around(point: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let d = point - center;
    Point::new(center.x + d.x * cos - d.y * sin, center.y + d.x * sin + d.y * cos)
}
