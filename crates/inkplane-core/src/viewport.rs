//! Viewport module for pan/zoom transforms.

use crate::input::{PointerSample, WheelInput};
use crate::persist::ViewportSink;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom factor applied per wheel notch.
pub const WHEEL_ZOOM_FACTOR: f64 = 1.1;
/// Zoom factor applied by the zoom in/out buttons.
pub const BUTTON_ZOOM_FACTOR: f64 = 1.2;
/// Screen units panned per shift/ctrl wheel notch.
pub const WHEEL_PAN_STEP: f64 = 50.0;
/// Padding kept around content by `fit_to_content`.
pub const FIT_PADDING: f64 = 50.0;

/// Persisted viewport shape: `{scale, position: {x, y}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Screen units per canvas unit.
    pub scale: f64,
    /// Screen-space position of the canvas origin.
    pub position: Point,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            position: Point::ZERO,
        }
    }
}

/// Zoom limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportLimits {
    /// Smallest allowed scale (most zoomed out).
    pub min_scale: f64,
    /// Largest allowed scale (most zoomed in).
    pub max_scale: f64,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: 0.05,
            max_scale: 10.0,
        }
    }
}

impl ViewportLimits {
    /// Limits spanning `min_scale..=max_scale`.
    pub fn with_range(min_scale: f64, max_scale: f64) -> Self {
        Self { min_scale, max_scale }
    }

    /// Clamp a scale into the limits.
    pub fn clamp(&self, scale: f64) -> f64 {
        // Inverted limits pin to the minimum instead of panicking.
        scale.max(self.min_scale).min(self.max_scale.max(self.min_scale))
    }
}

/// Owns the screen↔canvas transform and pushes every change to a sink.
///
/// `position` is the screen-space translation of the canvas origin and `scale`
/// the number of screen units per canvas unit.
#[derive(Debug, Clone)]
pub struct ViewportController<S: ViewportSink = ()> {
    state: ViewportState,
    limits: ViewportLimits,
    sink: S,
}

impl Default for ViewportController<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportController<()> {
    /// Controller without persistence.
    pub fn new() -> Self {
        Self::with_sink(())
    }
}

impl<S: ViewportSink> ViewportController<S> {
    /// Controller at 100% that pushes every change to `sink`.
    pub fn with_sink(sink: S) -> Self {
        Self {
            state: ViewportState::default(),
            limits: ViewportLimits::default(),
            sink,
        }
    }

    /// Replace the zoom limits, clamping the current scale into them.
    pub fn with_limits(mut self, limits: ViewportLimits) -> Self {
        self.limits = limits;
        self.state.scale = limits.clamp(self.state.scale);
        self
    }

    /// Current scale and position, as persisted.
    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Current zoom level.
    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    /// Screen-space position of the canvas origin.
    pub fn position(&self) -> Point {
        self.state.position
    }

    /// Zoom limits in effect.
    pub fn limits(&self) -> ViewportLimits {
        self.limits
    }

    /// The sink receiving state changes.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink, e.g. to flush or poll it.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the controller and hand back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Canvas → screen transform for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.state.position.to_vec2()) * Affine::scale(self.state.scale)
    }

    /// Screen → canvas transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.state.scale) * Affine::translate(-self.state.position.to_vec2())
    }

    /// Convert screen coordinates to canvas coordinates.
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        let p = self.state.position;
        Point::new((screen.x - p.x) / self.state.scale, (screen.y - p.y) / self.state.scale)
    }

    /// Convert canvas coordinates to screen coordinates.
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        let p = self.state.position;
        Point::new(canvas.x * self.state.scale + p.x, canvas.y * self.state.scale + p.y)
    }

    /// Map a screen-space pointer sample into canvas space for the stroke engine.
    pub fn sample_to_canvas(&self, sample: PointerSample) -> PointerSample {
        PointerSample { position: self.screen_to_canvas(sample.position), ..sample }
    }

    /// Convert a screen-space distance to canvas units.
    pub fn screen_distance_to_canvas(&self, distance: f64) -> f64 {
        distance / self.state.scale
    }

    /// Canvas-space rectangle covered by a viewport of the given screen size.
    pub fn visible_rect(&self, viewport: Size) -> Rect {
        let top_left = self.screen_to_canvas(Point::ZERO);
        let bottom_right = self.screen_to_canvas(Point::new(viewport.width, viewport.height));
        Rect::from_points(top_left, bottom_right)
    }

    /// Pan by a delta in screen units.
    pub fn pan(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        self.state.position += delta;
        self.commit();
    }

    /// Zoom by `factor`, keeping the canvas point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let old_scale = self.state.scale;
        let new_scale = self.limits.clamp(old_scale * factor);
        if (new_scale - old_scale).abs() < f64::EPSILON {
            return;
        }

        let pos = self.state.position;
        let anchor = Vec2::new((screen_point.x - pos.x) / old_scale, (screen_point.y - pos.y) / old_scale);
        self.state.scale = new_scale;
        self.state.position = Point::new(screen_point.x - anchor.x * new_scale, screen_point.y - anchor.y * new_scale);
        self.commit();
    }

    /// Handle a wheel event: shift pans horizontally, ctrl pans vertically,
    /// otherwise zoom anchored at the pointer.
    ///
    /// Does nothing when the host surface has no pointer position.
    pub fn handle_wheel(&mut self, wheel: &WheelInput) {
        let Some(pointer) = wheel.pointer else {
            return;
        };
        if wheel.delta.y == 0.0 || !wheel.delta.y.is_finite() {
            return;
        }
        let direction = wheel.delta.y.signum();

        if wheel.modifiers.shift {
            self.pan(Vec2::new(-direction * WHEEL_PAN_STEP, 0.0));
        } else if wheel.modifiers.ctrl {
            self.pan(Vec2::new(0.0, -direction * WHEEL_PAN_STEP));
        } else {
            // Scrolling forward (negative delta) zooms in.
            let factor = if direction < 0.0 { WHEEL_ZOOM_FACTOR } else { 1.0 / WHEEL_ZOOM_FACTOR };
            self.zoom_at(pointer, factor);
        }
    }

    /// Zoom in one button step, keeping the position.
    pub fn zoom_in(&mut self) {
        self.set_scale(self.state.scale * BUTTON_ZOOM_FACTOR);
    }

    /// Zoom out one button step, keeping the position.
    pub fn zoom_out(&mut self) {
        self.set_scale(self.state.scale / BUTTON_ZOOM_FACTOR);
    }

    /// Set the scale (clamped), leaving the translation unchanged.
    pub fn set_scale(&mut self, scale: f64) {
        if !scale.is_finite() {
            return;
        }
        let scale = self.limits.clamp(scale);
        if (scale - self.state.scale).abs() < f64::EPSILON {
            return;
        }
        self.state.scale = scale;
        self.commit();
    }

    /// Back to 100% with the canvas origin at the top-left corner.
    pub fn reset_viewport(&mut self) {
        let reset = ViewportState::default();
        if self.state == reset {
            return;
        }
        self.state = reset;
        self.commit();
    }

    /// Fit `bounds` into a viewport of `viewport` screen size.
    ///
    /// Never zooms in past 100%. Degenerate bounds reset the view.
    pub fn fit_to_content(&mut self, bounds: Rect, viewport: Size) {
        let bounds = bounds.abs();
        if bounds.is_zero_area() || !bounds.is_finite() {
            self.reset_viewport();
            return;
        }

        let available = Size::new(
            (viewport.width - FIT_PADDING * 2.0).max(1.0),
            (viewport.height - FIT_PADDING * 2.0).max(1.0),
        );
        let fit_x = available.width / bounds.width();
        let fit_y = available.height / bounds.height();
        let scale = self.limits.clamp(fit_x.min(fit_y).min(1.0));

        let center = bounds.center();
        self.state = ViewportState {
            scale,
            position: Point::new(viewport.width / 2.0 - center.x * scale, viewport.height / 2.0 - center.y * scale),
        };
        self.commit();
    }

    /// Apply a previously persisted state (scale clamped).
    ///
    /// Restoring does not echo the state back to the sink.
    pub fn restore(&mut self, state: ViewportState) {
        if !state.scale.is_finite() || !state.position.is_finite() {
            log::warn!("Ignoring non-finite persisted viewport {:?}", state);
            return;
        }
        self.state = ViewportState {
            scale: self.limits.clamp(state.scale),
            position: state.position,
        };
    }

    fn commit(&mut self) {
        self.sink.push(&self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputState, Modifiers, PointerEvent};

    const EPSILON: f64 = 1e-9;

    #[derive(Default)]
    struct Recorder(Vec<ViewportState>);

    impl ViewportSink for Recorder {
        fn push(&mut self, state: &ViewportState) {
            self.0.push(*state);
        }
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
    }

    #[test]
    fn test_default_viewport() {
        let vp = ViewportController::new();
        assert_eq!(vp.position(), Point::ZERO);
        assert!((vp.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_canvas_with_offset_and_scale() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 2.0, position: Point::new(50.0, 100.0) });
        let canvas = vp.screen_to_canvas(Point::new(150.0, 300.0));
        assert!(close(canvas, Point::new(50.0, 100.0)));
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut vp = ViewportController::new();
        for (scale, pos) in [(1.5, Point::new(30.0, -20.0)), (0.05, Point::new(-1e4, 3.3)), (9.7, Point::new(0.1, 0.2))] {
            vp.restore(ViewportState { scale, position: pos });
            let original = Point::new(123.0, -456.0);
            let back = vp.canvas_to_screen(vp.screen_to_canvas(original));
            assert!((back.x - original.x).abs() < 1e-9);
            assert!((back.y - original.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_affine_matches_point_conversion() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 3.0, position: Point::new(7.0, -2.0) });
        let p = Point::new(11.0, 13.0);
        assert!(close(vp.transform() * p, vp.canvas_to_screen(p)));
        assert!(close(vp.inverse_transform() * p, vp.screen_to_canvas(p)));
    }

    #[test]
    fn test_wheel_zoom_keeps_pointer_fixed() {
        let mut vp = ViewportController::new();
        let pointer = Point::new(400.0, 300.0);
        let before = vp.screen_to_canvas(pointer);

        vp.handle_wheel(&WheelInput::new(Some(pointer), -120.0));
        assert!((vp.scale() - 1.1).abs() < EPSILON);
        assert!(close(vp.screen_to_canvas(pointer), before));

        vp.handle_wheel(&WheelInput::new(Some(pointer), 120.0));
        assert!((vp.scale() - 1.0).abs() < EPSILON);
        assert!(close(vp.screen_to_canvas(pointer), before));
    }

    #[test]
    fn test_wheel_after_move_anchors_on_screen_pointer() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 2.0, position: Point::new(100.0, 100.0) });
        let mut input = InputState::new();

        let screen = Point::new(500.0, 300.0);
        let sample = PointerSample::new(screen);
        input.handle_pointer_event(&PointerEvent::Move(sample));
        assert_eq!(input.pointer_position(), Some(screen));
        assert!(close(vp.sample_to_canvas(sample).position, Point::new(200.0, 100.0)));

        vp.handle_wheel(&WheelInput::new(input.pointer_position(), -120.0));
        assert!((vp.scale() - 2.2).abs() < EPSILON);
        assert!(close(vp.screen_to_canvas(screen), Point::new(200.0, 100.0)));
    }

    #[test]
    fn test_wheel_shift_and_ctrl_pan() {
        let mut vp = ViewportController::new();
        vp.handle_wheel(&WheelInput::new(Some(Point::ZERO), 10.0).with_modifiers(Modifiers::shift()));
        assert!(close(vp.position(), Point::new(-50.0, 0.0)));
        assert!((vp.scale() - 1.0).abs() < f64::EPSILON);

        vp.handle_wheel(&WheelInput::new(Some(Point::ZERO), -10.0).with_modifiers(Modifiers::ctrl()));
        assert!(close(vp.position(), Point::new(-50.0, 50.0)));
    }

    #[test]
    fn test_wheel_without_pointer_is_noop() {
        let mut vp = ViewportController::with_sink(Recorder::default());
        vp.handle_wheel(&WheelInput::new(None, -120.0));
        vp.handle_wheel(&WheelInput::new(None, 10.0).with_modifiers(Modifiers::shift()));
        assert_eq!(vp.state(), ViewportState::default());
        assert!(vp.sink().0.is_empty());
    }

    #[test]
    fn test_zoom_clamp() {
        let mut vp = ViewportController::new();
        for _ in 0..100 {
            vp.zoom_out();
        }
        assert!((vp.scale() - 0.05).abs() < f64::EPSILON);
        for _ in 0..100 {
            vp.zoom_in();
        }
        assert!((vp.scale() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_in_out_restores_scale() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 0.8, position: Point::new(12.0, 34.0) });
        vp.zoom_in();
        vp.zoom_in();
        vp.zoom_out();
        vp.zoom_out();
        assert!((vp.scale() - 0.8).abs() < EPSILON);
        // Button zoom anchors at the current translation.
        assert!(close(vp.position(), Point::new(12.0, 34.0)));
    }

    #[test]
    fn test_fit_to_content_never_exceeds_100_percent() {
        let mut vp = ViewportController::new();
        vp.fit_to_content(Rect::new(0.0, 0.0, 100.0, 100.0), Size::new(1000.0, 800.0));
        assert!((vp.scale() - 1.0).abs() < f64::EPSILON);
        // Content centered.
        assert!(close(vp.canvas_to_screen(Point::new(50.0, 50.0)), Point::new(500.0, 400.0)));
    }

    #[test]
    fn test_fit_to_content_zooms_out_for_large_content() {
        let mut vp = ViewportController::new();
        vp.fit_to_content(Rect::new(-1000.0, 0.0, 3000.0, 1000.0), Size::new(1100.0, 700.0));
        // (1100 - 100) / 4000 = 0.25, (700 - 100) / 1000 = 0.6
        assert!((vp.scale() - 0.25).abs() < EPSILON);
        assert!(close(vp.canvas_to_screen(Point::new(1000.0, 500.0)), Point::new(550.0, 350.0)));
    }

    #[test]
    fn test_fit_to_content_normalizes_inverted_bounds() {
        let mut vp = ViewportController::new();
        vp.fit_to_content(Rect::new(1000.0, 1000.0, 0.0, 0.0), Size::new(1100.0, 1100.0));
        assert!((vp.scale() - 1.0).abs() < EPSILON);
        assert!(close(vp.canvas_to_screen(Point::new(500.0, 500.0)), Point::new(550.0, 550.0)));
    }

    #[test]
    fn test_fit_to_empty_bounds_resets() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 3.0, position: Point::new(1.0, 1.0) });
        vp.fit_to_content(Rect::ZERO, Size::new(100.0, 100.0));
        assert_eq!(vp.state(), ViewportState::default());
    }

    #[test]
    fn test_visible_rect() {
        let mut vp = ViewportController::new();
        vp.restore(ViewportState { scale: 2.0, position: Point::new(-100.0, 0.0) });
        let rect = vp.visible_rect(Size::new(800.0, 600.0));
        assert!((rect.x0 - 50.0).abs() < EPSILON);
        assert!((rect.x1 - 450.0).abs() < EPSILON);
        assert!((rect.y1 - 300.0).abs() < EPSILON);
    }

    #[test]
    fn test_every_change_reaches_sink() {
        let mut vp = ViewportController::with_sink(Recorder::default());
        vp.pan(Vec2::new(5.0, 0.0));
        vp.zoom_in();
        vp.reset_viewport();
        vp.reset_viewport(); // unchanged, not pushed
        let pushed = &vp.sink().0;
        assert_eq!(pushed.len(), 3);
        assert_eq!(pushed[2], ViewportState::default());
    }

    #[test]
    fn test_inverted_limits_pin_to_minimum() {
        let limits = ViewportLimits::with_range(2.0, 1.0);
        assert!((limits.clamp(0.5) - 2.0).abs() < f64::EPSILON);
        assert!((limits.clamp(5.0) - 2.0).abs() < f64::EPSILON);
        let normal = ViewportLimits::default();
        assert!((normal.clamp(0.01) - 0.05).abs() < f64::EPSILON);
        assert!((normal.clamp(20.0) - 10.0).abs() < f64::EPSILON);
    }
}
