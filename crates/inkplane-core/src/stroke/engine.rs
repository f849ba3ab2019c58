//! Per-stroke state machine: lag-smoothed sampling, live outline and end-of-stroke catch-up.

use super::lazy::{LazyBrushConfig, LazyBrushState};
use super::outline::get_stroke;
use super::preset::BrushSettings;
use super::{Stroke, StrokePoint, StrokeTool};
use crate::input::PointerSample;
use kurbo::Point;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Samples recorded per stroke; further samples are dropped.
pub const MAX_STROKE_POINTS: usize = 10_000;

/// Outcome of ending a stroke or advancing its catch-up.
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeEnd {
    /// The stroke is complete and its outline frozen.
    Finished(Stroke),
    /// Too few samples to draw anything.
    Discarded,
    /// The brush is still animating onto the pointer; call [`StrokeEngine::tick`].
    CatchingUp,
}

#[derive(Debug, Clone)]
struct ActiveStroke {
    stroke: Stroke,
    lazy: LazyBrushState,
    last_pressure: f64,
    capped: bool,
}

impl ActiveStroke {
    /// Record the current brush position. Returns false once the cap is hit.
    fn record(&mut self) -> bool {
        if self.stroke.points.len() >= MAX_STROKE_POINTS {
            if !self.capped {
                log::warn!("Stroke {} reached {} points, ignoring further samples", self.stroke.id, MAX_STROKE_POINTS);
                self.capped = true;
            }
            return false;
        }
        self.stroke.points.push(StrokePoint::from_point(self.lazy.brush, self.last_pressure));
        true
    }

    fn regenerate(&mut self, settings: &BrushSettings, complete: bool) {
        if self.stroke.points.len() < 2 {
            return;
        }
        let mut options = settings.stroke_options();
        options.last = complete;
        if !options.simulate_pressure {
            options.size *= 0.5 + 0.5 * self.last_pressure;
        }
        self.stroke.outline = Some(get_stroke(&self.stroke.points, &options));
    }
}

#[derive(Debug, Clone, Default)]
enum StrokeState {
    #[default]
    Idle,
    Drawing(ActiveStroke),
    CatchingUp { active: ActiveStroke, due: Instant },
}

/// Turns pointer samples into strokes.
///
/// The engine owns at most one stroke. The only deferred work is the
/// end-of-stroke catch-up, advanced by [`StrokeEngine::tick`] once per frame;
/// starting or cancelling a stroke drops it, as does dropping the engine.
#[derive(Debug, Clone, Default)]
pub struct StrokeEngine {
    pub settings: BrushSettings,
    pub lazy: LazyBrushConfig,
    tool: StrokeTool,
    state: StrokeState,
}

impl StrokeEngine {
    pub fn new(settings: BrushSettings, lazy: LazyBrushConfig) -> Self {
        Self { settings, lazy, tool: StrokeTool::Brush, state: StrokeState::Idle }
    }

    /// Engine whose lag radius follows `settings.smoothing`.
    pub fn from_settings(settings: BrushSettings) -> Self {
        Self::new(settings, settings.lazy_config(LazyBrushConfig::default()))
    }

    pub fn tool(&self) -> StrokeTool {
        self.tool
    }

    /// Switch tools. Any stroke in progress is discarded.
    pub fn set_tool(&mut self, tool: StrokeTool) {
        self.cancel_stroke();
        self.tool = tool;
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, StrokeState::Drawing(_))
    }

    pub fn is_catching_up(&self) -> bool {
        matches!(self.state, StrokeState::CatchingUp { .. })
    }

    fn active(&self) -> Option<&ActiveStroke> {
        match &self.state {
            StrokeState::Idle => None,
            StrokeState::Drawing(active) | StrokeState::CatchingUp { active, .. } => Some(active),
        }
    }

    /// The stroke being drawn or caught up.
    pub fn active_stroke(&self) -> Option<&Stroke> {
        self.active().map(|a| &a.stroke)
    }

    /// Live outline of the active stroke.
    pub fn outline(&self) -> Option<&[Point]> {
        self.active_stroke().and_then(|s| s.outline.as_deref())
    }

    /// Lagged brush position, for drawing the brush cursor.
    pub fn brush_position(&self) -> Option<Point> {
        self.active().map(|a| a.lazy.brush)
    }

    /// Begin a stroke at `sample`. A stroke still in progress is discarded.
    pub fn start_stroke(&mut self, sample: PointerSample) {
        if !matches!(self.state, StrokeState::Idle) {
            log::debug!("Starting a new stroke discards the previous one");
        }
        let pressure = sample.pressure_or_default();
        let mut stroke = Stroke::new(self.tool, &self.settings);
        stroke.points.push(StrokePoint::from_point(sample.position, pressure));
        log::debug!("Started {:?} stroke {}", self.tool, stroke.id);
        self.state = StrokeState::Drawing(ActiveStroke {
            stroke,
            lazy: LazyBrushState::new(sample.position, sample.timestamp),
            last_pressure: pressure,
            capped: false,
        });
    }

    /// Feed a pointer sample. Returns true if a point was recorded.
    pub fn add_point(&mut self, sample: PointerSample) -> bool {
        let StrokeState::Drawing(active) = &mut self.state else {
            return false;
        };
        active.last_pressure = sample.pressure_or_default();
        active.lazy = active.lazy.update(&self.lazy, sample.position, sample.timestamp);
        if !active.lazy.has_moved || !active.record() {
            return false;
        }
        active.regenerate(&self.settings, false);
        true
    }

    /// End the stroke now.
    pub fn end_stroke(&mut self) -> StrokeEnd {
        self.end_stroke_at(Instant::now())
    }

    /// End the stroke at an explicit time.
    ///
    /// When catch-up is enabled and the brush lags the pointer, the stroke stays
    /// active until [`StrokeEngine::tick_at`] has brought the brush home.
    pub fn end_stroke_at(&mut self, now: Instant) -> StrokeEnd {
        match std::mem::take(&mut self.state) {
            StrokeState::Idle => StrokeEnd::Discarded,
            StrokeState::CatchingUp { active, due } => {
                self.state = StrokeState::CatchingUp { active, due };
                StrokeEnd::CatchingUp
            }
            StrokeState::Drawing(active) => {
                // A tap never leaves a mark, even when the brush still lags.
                if active.stroke.points.len() < 2 {
                    return finish(&self.settings, active);
                }
                if self.lazy.catch_up && !active.lazy.is_caught_up() {
                    let due = now + self.lazy.finish_stroke_delay();
                    log::debug!("Stroke {} catching up from distance {:.1}", active.stroke.id, active.lazy.distance());
                    self.state = StrokeState::CatchingUp { active, due };
                    StrokeEnd::CatchingUp
                } else {
                    finish(&self.settings, active)
                }
            }
        }
    }

    /// Advance the catch-up by one frame.
    pub fn tick(&mut self) -> Option<StrokeEnd> {
        self.tick_at(Instant::now())
    }

    /// Advance the catch-up by one frame at an explicit time.
    /// Returns the stroke end once the brush reached the pointer.
    pub fn tick_at(&mut self, now: Instant) -> Option<StrokeEnd> {
        let StrokeState::CatchingUp { active, due } = &mut self.state else {
            return None;
        };
        if now < *due {
            return None;
        }
        active.lazy = active.lazy.catch_up_step();
        if active.lazy.has_moved && active.record() {
            active.regenerate(&self.settings, false);
        }
        if !active.lazy.is_caught_up() {
            return None;
        }
        match std::mem::take(&mut self.state) {
            StrokeState::CatchingUp { active, .. } => Some(finish(&self.settings, active)),
            _ => None,
        }
    }

    /// Discard the current stroke and any pending catch-up.
    pub fn cancel_stroke(&mut self) {
        if let Some(active) = self.active() {
            log::debug!("Cancelled stroke {}", active.stroke.id);
        }
        self.state = StrokeState::Idle;
    }
}

fn finish(settings: &BrushSettings, mut active: ActiveStroke) -> StrokeEnd {
    if active.stroke.points.len() < 2 {
        log::debug!("Discarding stroke {} with {} point(s)", active.stroke.id, active.stroke.points.len());
        return StrokeEnd::Discarded;
    }
    active.regenerate(settings, true);
    log::debug!("Finished stroke {} with {} points", active.stroke.id, active.stroke.points.len());
    StrokeEnd::Finished(active.stroke)
}
