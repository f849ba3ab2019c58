//! Inkplane Core Library
//!
//! Platform-agnostic interaction engine for the infinite image canvas: viewport
//! transforms, snapping, freehand strokes and the layer/subcanvas hierarchy.

pub mod color;
pub mod config;
pub mod hierarchy;
pub mod input;
pub mod persist;
pub mod snap;
pub mod stroke;
pub mod viewport;

pub use color::SerializableColor;
pub use config::{ConfigError, EditorConfig};
pub use hierarchy::{HierarchyNode, LayerRecord, NodeKind, SceneHierarchy, SceneSource, SubcanvasRecord, Transform};
pub use input::{InputState, Modifiers, PointerEvent, PointerKind, PointerSample, WheelInput};
pub use persist::{DebouncedSink, JsonFileStore, MemoryStore, PersistConfig, PersistError, ViewportSink, ViewportStore};
pub use snap::{BoundingBox, GridLines, GuideKind, SnapConfig, SnapGuide, SnapResult, SnappingEngine, ThresholdSpace};
pub use stroke::{
    BrushPreset, BrushSettings, CompositeMode, Easing, LazyBrushConfig, LazyBrushState, Stroke, StrokeEnd, StrokeEngine, StrokeOptions, StrokePoint,
    StrokeTool, Taper,
};
pub use viewport::{ViewportController, ViewportLimits, ViewportState};

/// Route `log` output to the test harness. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
