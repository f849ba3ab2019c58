//! Normalized pointer and wheel input.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Pressure reported for devices that have no pressure sensor.
pub const DEFAULT_PRESSURE: f64 = 0.5;

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false, alt: false, meta: false };

    pub fn shift() -> Self {
        Self { shift: true, ..Self::NONE }
    }

    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::NONE }
    }
}

/// Kind of device that produced a pointer sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

/// A single pointer sample.
///
/// Host events carry screen positions. [`crate::ViewportController::sample_to_canvas`]
/// maps a sample into canvas space before it is fed to the stroke engine.
#[derive(Debug, Clone, Copy)]
pub struct PointerSample {
    pub position: Point,
    /// Raw device pressure, `None` when the device reports none.
    pub pressure: Option<f64>,
    pub kind: PointerKind,
    pub timestamp: Instant,
}

impl PointerSample {
    /// Sample stamped with the current time.
    pub fn new(position: Point) -> Self {
        Self::at(position, Instant::now())
    }

    pub fn at(position: Point, timestamp: Instant) -> Self {
        Self {
            position,
            pressure: None,
            kind: PointerKind::Mouse,
            timestamp,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn with_kind(mut self, kind: PointerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Device pressure clamped to [0, 1], or [`DEFAULT_PRESSURE`].
    ///
    /// Mice report a constant 0 or 0.5 on some platforms, so mouse pressure is ignored.
    pub fn pressure_or_default(&self) -> f64 {
        match (self.kind, self.pressure) {
            (PointerKind::Mouse, _) | (_, None) => DEFAULT_PRESSURE,
            (_, Some(p)) if p.is_finite() => p.clamp(0.0, 1.0),
            _ => DEFAULT_PRESSURE,
        }
    }
}

/// A wheel (scroll) event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    /// Pointer position in screen space; `None` if the host surface has none.
    pub pointer: Option<Point>,
    /// Scroll delta. Positive `y` scrolls backward (towards the user).
    pub delta: Vec2,
    pub modifiers: Modifiers,
}

impl WheelInput {
    pub fn new(pointer: Option<Point>, delta_y: f64) -> Self {
        Self {
            pointer,
            delta: Vec2::new(0.0, delta_y),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Pointer event type for unified mouse/pen/touch handling.
#[derive(Debug, Clone, Copy)]
pub enum PointerEvent {
    Down(PointerSample),
    Move(PointerSample),
    Up(PointerSample),
    Wheel(WheelInput),
    /// The pointer left the drawing surface.
    Leave,
}

/// Tracks pointer state across events for the host surface, in screen space.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Last known pointer position, cleared when the pointer leaves.
    pointer_position: Option<Point>,
    /// Whether the primary button / contact is down.
    pressed: bool,
    /// Start position of the current drag.
    drag_start: Option<Point>,
    /// Current modifier keys state.
    pub modifiers: Modifiers,
    /// Kind of the last device seen.
    pub last_kind: PointerKind,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a pointer event.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) {
        match event {
            PointerEvent::Down(sample) => {
                self.pointer_position = Some(sample.position);
                self.last_kind = sample.kind;
                self.pressed = true;
                self.drag_start = Some(sample.position);
            }
            PointerEvent::Move(sample) => {
                self.pointer_position = Some(sample.position);
                self.last_kind = sample.kind;
            }
            PointerEvent::Up(sample) => {
                self.pointer_position = Some(sample.position);
                self.pressed = false;
                self.drag_start = None;
            }
            PointerEvent::Wheel(wheel) => {
                if let Some(p) = wheel.pointer {
                    self.pointer_position = Some(p);
                }
                self.modifiers = wheel.modifiers;
            }
            PointerEvent::Leave => {
                self.pointer_position = None;
            }
        }
    }

    /// Update modifier keys state.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Last screen-space pointer position, the anchor for wheel zoom.
    pub fn pointer_position(&self) -> Option<Point> {
        self.pointer_position
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Drag delta from the press position, if dragging.
    pub fn drag_delta(&self) -> Option<Vec2> {
        match (self.drag_start, self.pointer_position) {
            (Some(start), Some(current)) if self.pressed => Some(current - start),
            _ => None,
        }
    }
}
