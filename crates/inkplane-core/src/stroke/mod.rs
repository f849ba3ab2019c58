//! Freehand strokes: lag smoothing, outline synthesis and the per-stroke engine.

mod engine;
mod lazy;
mod outline;
mod preset;

pub use engine::{MAX_STROKE_POINTS, StrokeEnd, StrokeEngine};
pub use lazy::{CATCH_UP_FRACTION, CATCH_UP_MAX_STEP, CATCH_UP_SNAP_DISTANCE, LazyBrushConfig, LazyBrushState, PointerState};
pub use outline::{Easing, OutlineStrokePoint, StrokeOptions, Taper, TaperOptions, get_stroke, stroke_outline, stroke_points};
pub use preset::{BrushPreset, BrushSettings, MAX_LAZY_RADIUS};

use crate::color::SerializableColor;
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for strokes.
pub type StrokeId = Uuid;

/// A recorded stroke sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// Pressure in [0, 1].
    pub pressure: f64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }

    pub fn from_point(point: Point, pressure: f64) -> Self {
        Self::new(point.x, point.y, pressure)
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn lerp(&self, other: StrokePoint, t: f64) -> StrokePoint {
        StrokePoint {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            pressure: self.pressure + (other.pressure - self.pressure) * t,
        }
    }
}

/// Which tool produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeTool {
    #[default]
    Brush,
    Eraser,
}

/// How the stroke outline is blended onto the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMode {
    /// Paint over.
    #[default]
    SourceOver,
    /// Clear whatever the outline covers.
    DestinationOut,
}

impl CompositeMode {
    pub fn for_tool(tool: StrokeTool) -> Self {
        match tool {
            StrokeTool::Brush => CompositeMode::SourceOver,
            StrokeTool::Eraser => CompositeMode::DestinationOut,
        }
    }
}

/// A freehand stroke and its synthesized outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: StrokeId,
    pub tool: StrokeTool,
    pub points: Vec<StrokePoint>,
    /// Closed outline polygon, regenerated from `points`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Vec<Point>>,
    pub color: SerializableColor,
    pub opacity: f64,
    pub stroke_width: f64,
    pub composite_mode: CompositeMode,
}

impl Stroke {
    pub fn new(tool: StrokeTool, settings: &BrushSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool,
            points: Vec::new(),
            outline: None,
            color: settings.color,
            opacity: settings.opacity,
            stroke_width: settings.size,
            composite_mode: CompositeMode::for_tool(tool),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounds of the outline, or of the raw points when no outline exists yet.
    pub fn bounds(&self) -> Rect {
        let pts: Vec<Point> = match &self.outline {
            Some(outline) if !outline.is_empty() => outline.clone(),
            _ => self.points.iter().map(StrokePoint::point).collect(),
        };
        let Some(first) = pts.first() else {
            return Rect::ZERO;
        };
        pts.iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    /// The outline as a closed path for renderers.
    pub fn outline_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(outline) = self.outline.as_deref() else {
            return path;
        };
        let mut iter = outline.iter();
        if let Some(first) = iter.next() {
            path.move_to(*first);
            for point in iter {
                path.line_to(*point);
            }
            path.close_path();
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_for_tool() {
        assert_eq!(CompositeMode::for_tool(StrokeTool::Brush), CompositeMode::SourceOver);
        assert_eq!(CompositeMode::for_tool(StrokeTool::Eraser), CompositeMode::DestinationOut);
    }

    #[test]
    fn test_bounds_from_points() {
        let mut stroke = Stroke::new(StrokeTool::Brush, &BrushSettings::default());
        assert_eq!(stroke.bounds(), Rect::ZERO);
        stroke.points = vec![
            StrokePoint::new(0.0, 0.0, 0.5),
            StrokePoint::new(100.0, 50.0, 0.5),
            StrokePoint::new(50.0, 100.0, 0.5),
        ];
        assert_eq!(stroke.bounds(), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn test_outline_path_is_closed() {
        let mut stroke = Stroke::new(StrokeTool::Brush, &BrushSettings::default());
        assert!(stroke.outline_path().elements().is_empty());
        stroke.outline = Some(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)]);
        let path = stroke.outline_path();
        assert_eq!(path.elements().len(), 4);
        assert_eq!(path.elements().last(), Some(&kurbo::PathEl::ClosePath));
    }

    #[test]
    fn test_stroke_point_lerp() {
        let a = StrokePoint::new(0.0, 0.0, 0.0);
        let b = StrokePoint::new(10.0, 20.0, 1.0);
        let mid = a.lerp(b, 0.5);
        assert_eq!(mid, StrokePoint::new(5.0, 10.0, 0.5));
    }
}
