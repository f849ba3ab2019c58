//! Snap functionality for aligning dragged objects to the grid and to each other.

use crate::color::SerializableColor;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Default grid size in canvas units.
pub const GRID_SIZE: f64 = 20.0;
/// Default object snap distance.
pub const SNAP_THRESHOLD: f64 = 10.0;
/// Grid lines closer than this on screen are not drawn.
pub const MIN_GRID_SPACING_PX: f64 = 10.0;
/// Upper bound on lines returned per axis by [`SnappingEngine::grid_lines`].
pub const MAX_GRID_LINES: usize = 4096;
/// Boxes smaller than this (either dimension) are rejected by [`constrain_resize`].
pub const MIN_BOX_SIZE: f64 = 5.0;

/// Color of edge/center alignment guides.
pub const ALIGNMENT_GUIDE_COLOR: SerializableColor = SerializableColor::new(0, 200, 83, 255);
/// Color of equal-spacing guides.
pub const SPACING_GUIDE_COLOR: SerializableColor = SerializableColor::new(255, 145, 0, 255);

/// Axis-aligned bounds of a draggable object.
///
/// `rotation` is carried for the renderer but ignored by every box computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Id of the object these bounds belong to.
    pub id: String,
    /// Left edge in canvas units.
    pub x: f64,
    /// Top edge in canvas units.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in radians, if the object is rotated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl BoundingBox {
    /// Unrotated box with its top-left corner at `(x, y)`.
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
            rotation: None,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// The box as a `kurbo::Rect`.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Whether `snap_threshold` is measured on the canvas or on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSpace {
    /// Canvas units: the on-screen snap distance follows the zoom level.
    #[default]
    Canvas,
    /// Screen pixels, converted with the view scale on each call.
    Screen,
}

/// Snapping settings, owned by the caller and read on every snap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapConfig {
    /// Snap box centers to the grid.
    pub grid_enabled: bool,
    /// Grid cell size in canvas units.
    pub grid_size: f64,
    /// Snap edges and centers to other objects, and match their spacing.
    pub object_snap_enabled: bool,
    /// Maximum distance an object snap may move the box.
    pub snap_threshold: f64,
    /// Emit guide lines for object snaps.
    pub show_snap_guides: bool,
    /// Units of `snap_threshold`.
    pub threshold_space: ThresholdSpace,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            grid_enabled: false,
            grid_size: GRID_SIZE,
            object_snap_enabled: true,
            snap_threshold: SNAP_THRESHOLD,
            show_snap_guides: true,
            threshold_space: ThresholdSpace::Canvas,
        }
    }
}

impl SnapConfig {
    /// All snapping off.
    pub fn disabled() -> Self {
        Self {
            grid_enabled: false,
            object_snap_enabled: false,
            ..Self::default()
        }
    }

    pub fn with_grid(mut self, grid_size: f64) -> Self {
        self.grid_enabled = true;
        self.grid_size = grid_size;
        self
    }

    pub fn with_object_snap(mut self, enabled: bool) -> Self {
        self.object_snap_enabled = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.snap_threshold = threshold;
        self
    }

    pub fn with_guides(mut self, show: bool) -> Self {
        self.show_snap_guides = show;
        self
    }

    pub fn with_threshold_space(mut self, space: ThresholdSpace) -> Self {
        self.threshold_space = space;
        self
    }
}

/// Orientation of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideKind {
    Vertical,
    Horizontal,
}

/// A transient line drawn while dragging.
///
/// A vertical guide sits at `x = position` and spans `start..end` in y;
/// a horizontal one the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapGuide {
    pub kind: GuideKind,
    /// x of a vertical guide, y of a horizontal one.
    pub position: f64,
    pub start: f64,
    pub end: f64,
    /// Green for alignment, orange for equal spacing.
    pub color: SerializableColor,
}

/// Result of a snap operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// Snapped top-left corner.
    pub x: f64,
    pub y: f64,
    /// Whether any grid or object snap applied.
    pub snapped: bool,
    /// Guides to draw, empty when guides are hidden.
    pub guides: Vec<SnapGuide>,
}

impl SnapResult {
    /// Unsnapped result.
    pub fn none(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            snapped: false,
            guides: Vec::new(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Grid line coordinates visible in a viewport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLines {
    /// x coordinates of vertical lines.
    pub vertical: Vec<f64>,
    /// y coordinates of horizontal lines.
    pub horizontal: Vec<f64>,
}

impl GridLines {
    pub fn is_empty(&self) -> bool {
        self.vertical.is_empty() && self.horizontal.is_empty()
    }
}

/// A point that can be snapped to on a box.
#[derive(Debug, Clone, Copy)]
pub struct SnapTarget {
    pub point: Point,
    pub kind: SnapTargetKind,
}

/// Type of snap target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapTargetKind {
    Corner,
    Midpoint,
    Center,
}

/// The 9 canonical points of a box: corners, edge midpoints, center.
pub fn get_snap_targets_from_bounds(bounds: Rect) -> [SnapTarget; 9] {
    let cx = (bounds.x0 + bounds.x1) / 2.0;
    let cy = (bounds.y0 + bounds.y1) / 2.0;
    let t = |x, y, kind| SnapTarget { point: Point::new(x, y), kind };
    [
        t(bounds.x0, bounds.y0, SnapTargetKind::Corner),
        t(bounds.x1, bounds.y0, SnapTargetKind::Corner),
        t(bounds.x1, bounds.y1, SnapTargetKind::Corner),
        t(bounds.x0, bounds.y1, SnapTargetKind::Corner),
        t(cx, bounds.y0, SnapTargetKind::Midpoint),
        t(bounds.x1, cy, SnapTargetKind::Midpoint),
        t(cx, bounds.y1, SnapTargetKind::Midpoint),
        t(bounds.x0, cy, SnapTargetKind::Midpoint),
        t(cx, cy, SnapTargetKind::Center),
    ]
}

/// Snap a value to the nearest multiple of `grid_size`.
pub fn snap_to_grid(value: f64, grid_size: f64) -> f64 {
    (value / grid_size).round() * grid_size
}

/// Accept a resized box only if both dimensions stay above [`MIN_BOX_SIZE`].
pub fn constrain_resize(previous: &BoundingBox, proposed: BoundingBox) -> BoundingBox {
    let valid = proposed.width.is_finite()
        && proposed.height.is_finite()
        && proposed.width >= MIN_BOX_SIZE
        && proposed.height >= MIN_BOX_SIZE;
    if valid {
        proposed
    } else {
        log::debug!("Rejected resize of {} to {}x{}", previous.id, proposed.width, proposed.height);
        previous.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn range(self, r: Rect) -> (f64, f64) {
        match self {
            Axis::X => (r.x0, r.x1),
            Axis::Y => (r.y0, r.y1),
        }
    }

    fn cross_range(self, r: Rect) -> (f64, f64) {
        match self {
            Axis::X => (r.y0, r.y1),
            Axis::Y => (r.x0, r.x1),
        }
    }

    fn coord(self, p: Point) -> f64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }
}

/// How an axis got snapped; guides are derived from it once both axes settle.
#[derive(Debug, Clone, Copy)]
enum AxisSnap {
    /// Aligned to coordinate `target` of `other`.
    Align { target: f64, other: Rect },
    /// Continues an existing gap; segments are (from, to) along the axis,
    /// the second one ending or starting at the moved box.
    Spacing { gaps: [(f64, f64); 2] },
}

#[derive(Debug, Clone, Copy)]
struct AxisMatch {
    delta: f64,
    snap: AxisSnap,
}

impl AxisMatch {
    fn distance(&self) -> f64 {
        self.delta.abs()
    }
}

/// Keep `candidate` if it is within `threshold` and strictly closer than `best`.
fn consider(best: &mut Option<AxisMatch>, candidate: AxisMatch, threshold: f64) {
    let d = candidate.distance();
    if d >= threshold {
        return;
    }
    if best.is_none_or(|b| d < b.distance()) {
        *best = Some(candidate);
    }
}

fn ranges_overlap(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Snapping engine for a single drag interaction.
///
/// Holds a snapshot of candidate boxes which the caller refreshes with
/// [`SnappingEngine::set_objects`] whenever the scene changes.
#[derive(Debug, Clone, Default)]
pub struct SnappingEngine {
    pub config: SnapConfig,
    objects: Vec<BoundingBox>,
    dragging: Option<String>,
    view_scale: f64,
}

impl SnappingEngine {
    pub fn new(config: SnapConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            dragging: None,
            view_scale: 1.0,
        }
    }

    /// Replace the candidate snapshot.
    pub fn set_objects(&mut self, objects: Vec<BoundingBox>) {
        self.objects = objects;
    }

    /// Set the object in motion; it is never a candidate.
    pub fn set_dragging(&mut self, id: Option<String>) {
        self.dragging = id;
    }

    /// Current view scale, used when the threshold is in screen space.
    pub fn set_view_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.view_scale = scale;
        }
    }

    /// Candidate boxes (everything except the dragged object).
    pub fn candidates(&self) -> impl Iterator<Item = &BoundingBox> {
        self.objects
            .iter()
            .filter(move |b| self.dragging.as_deref() != Some(b.id.as_str()))
    }

    fn threshold(&self) -> f64 {
        let scale = if self.view_scale > 0.0 { self.view_scale } else { 1.0 };
        match self.config.threshold_space {
            ThresholdSpace::Canvas => self.config.snap_threshold,
            ThresholdSpace::Screen => self.config.snap_threshold / scale,
        }
    }

    /// Snap a box whose top-left corner is at `(x, y)`.
    pub fn snap(&self, x: f64, y: f64, width: f64, height: f64) -> SnapResult {
        let mut result = SnapResult::none(x, y);
        let config = &self.config;

        if config.grid_enabled && config.grid_size.is_finite() && config.grid_size > 0.0 {
            let gs = config.grid_size;
            let cx = x + width / 2.0;
            let cy = y + height / 2.0;
            let dx = snap_to_grid(cx, gs) - cx;
            let dy = snap_to_grid(cy, gs) - cy;
            result.x += dx;
            result.y += dy;
            result.snapped = dx.abs() < gs / 2.0 || dy.abs() < gs / 2.0;
        }

        if !config.object_snap_enabled {
            return result;
        }
        let candidates: Vec<Rect> = self.candidates().map(BoundingBox::rect).collect();
        if candidates.is_empty() {
            return result;
        }

        let threshold = self.threshold();
        let moving = Rect::new(result.x, result.y, result.x + width, result.y + height);
        let best_x = self.best_axis_match(Axis::X, moving, &candidates, threshold);
        let best_y = self.best_axis_match(Axis::Y, moving, &candidates, threshold);

        if let Some(m) = best_x {
            result.x += m.delta;
            result.snapped = true;
        }
        if let Some(m) = best_y {
            result.y += m.delta;
            result.snapped = true;
        }

        if config.show_snap_guides {
            let settled = Rect::new(result.x, result.y, result.x + width, result.y + height);
            if let Some(m) = best_x {
                result.guides.extend(guides_for(Axis::X, m.snap, settled));
            }
            if let Some(m) = best_y {
                result.guides.extend(guides_for(Axis::Y, m.snap, settled));
            }
        }

        result
    }

    /// Snap a single point (e.g. a resize handle).
    pub fn snap_point(&self, point: Point) -> SnapResult {
        self.snap(point.x, point.y, 0.0, 0.0)
    }

    fn best_axis_match(&self, axis: Axis, moving: Rect, candidates: &[Rect], threshold: f64) -> Option<AxisMatch> {
        let mut best = None;
        let own = get_snap_targets_from_bounds(moving);

        for &other in candidates {
            for target in get_snap_targets_from_bounds(other) {
                let t = axis.coord(target.point);
                for source in &own {
                    let delta = t - axis.coord(source.point);
                    consider(&mut best, AxisMatch { delta, snap: AxisSnap::Align { target: t, other } }, threshold);
                }
            }
        }

        let (lo, hi) = axis.range(moving);
        let size = hi - lo;
        let cross = axis.cross_range(moving);
        for (i, &a) in candidates.iter().enumerate() {
            for (j, &b) in candidates.iter().enumerate() {
                if i == j {
                    continue;
                }
                let (a_lo, a_hi) = axis.range(a);
                let (b_lo, b_hi) = axis.range(b);
                if a_hi > b_lo {
                    continue;
                }
                if !ranges_overlap(cross, axis.cross_range(a)) || !ranges_overlap(cross, axis.cross_range(b)) {
                    continue;
                }
                let gap = b_lo - a_hi;

                // Continue the gap past `b`.
                let after = b_hi + gap;
                consider(
                    &mut best,
                    AxisMatch {
                        delta: after - lo,
                        snap: AxisSnap::Spacing { gaps: [(a_hi, b_lo), (b_hi, after)] },
                    },
                    threshold,
                );

                // Continue the gap before `a`.
                let before_hi = a_lo - gap;
                consider(
                    &mut best,
                    AxisMatch {
                        delta: before_hi - size - lo,
                        snap: AxisSnap::Spacing { gaps: [(before_hi, a_lo), (a_hi, b_lo)] },
                    },
                    threshold,
                );
            }
        }

        best
    }

    /// Grid line coordinates inside `viewport` (canvas space) at the given scale.
    ///
    /// Empty when lines would be closer than [`MIN_GRID_SPACING_PX`] on screen.
    pub fn grid_lines(&self, viewport: Rect, scale: f64) -> GridLines {
        let gs = self.config.grid_size;
        if !gs.is_finite() || gs <= 0.0 || !scale.is_finite() || gs * scale < MIN_GRID_SPACING_PX {
            return GridLines::default();
        }
        let viewport = viewport.abs();
        GridLines {
            vertical: lines_in_range(viewport.x0, viewport.x1, gs),
            horizontal: lines_in_range(viewport.y0, viewport.y1, gs),
        }
    }
}

fn lines_in_range(from: f64, to: f64, grid_size: f64) -> Vec<f64> {
    if !from.is_finite() || !to.is_finite() {
        return Vec::new();
    }
    let first = (from / grid_size).ceil() as i64;
    let last = (to / grid_size).floor() as i64;
    if last < first {
        return Vec::new();
    }
    (first..=last)
        .take(MAX_GRID_LINES)
        .map(|i| i as f64 * grid_size)
        .collect()
}

fn guides_for(axis: Axis, snap: AxisSnap, settled: Rect) -> Vec<SnapGuide> {
    // Alignment on X draws a vertical line; spacing on X draws horizontal gap markers.
    let (align_kind, spacing_kind) = match axis {
        Axis::X => (GuideKind::Vertical, GuideKind::Horizontal),
        Axis::Y => (GuideKind::Horizontal, GuideKind::Vertical),
    };
    let (c_lo, c_hi) = axis.cross_range(settled);

    match snap {
        AxisSnap::Align { target, other } => {
            let (o_lo, o_hi) = axis.cross_range(other);
            vec![SnapGuide {
                kind: align_kind,
                position: target,
                start: c_lo.min(o_lo),
                end: c_hi.max(o_hi),
                color: ALIGNMENT_GUIDE_COLOR,
            }]
        }
        AxisSnap::Spacing { gaps } => {
            let position = (c_lo + c_hi) / 2.0;
            gaps.iter()
                .map(|&(start, end)| SnapGuide {
                    kind: spacing_kind,
                    position,
                    start,
                    end,
                    color: SPACING_GUIDE_COLOR,
                })
                .collect()
        }
    }
}
