//! A pointer session across the viewport, stroke, snapping and hierarchy engines.

use inkplane_core::{
    BoundingBox, DebouncedSink, EditorConfig, InputState, LayerRecord, MemoryStore, PointerEvent, PointerKind,
    PointerSample, SceneHierarchy, SceneSource, SnappingEngine, StrokeEnd, StrokeEngine, SubcanvasRecord, Transform,
    ViewportController, ViewportStore, WheelInput,
};
use kurbo::{Point, Size, Vec2};
use std::time::{Duration, Instant};

const CONFIG: &str = r#"{
    "snap": { "grid_enabled": false, "snap_threshold": 8.0 },
    "brush": { "size": 6.0, "preset": "hard", "smoothing": 0.25 },
    "persist": { "debounce_ms": 100 }
}"#;

#[test]
fn test_draw_snap_and_persist_session() {
    let config = EditorConfig::from_json(CONFIG).unwrap();
    let t0 = Instant::now();

    // Zoom in around a pointer, then pan a little.
    let sink = DebouncedSink::with_config(MemoryStore::new(), config.persist);
    let mut viewport = ViewportController::with_sink(sink).with_limits(config.viewport);
    let mut input = InputState::new();
    let pointer = Point::new(400.0, 300.0);
    input.handle_pointer_event(&PointerEvent::Wheel(WheelInput::new(Some(pointer), -120.0)));
    viewport.handle_wheel(&WheelInput::new(input.pointer_position(), -120.0));
    viewport.pan(Vec2::new(-20.0, 10.0));
    assert!(viewport.scale() > 1.0);
    assert!(viewport.sink().is_pending());

    // Draw with a pen: input tracks screen space, the engine works in canvas space.
    let mut strokes = StrokeEngine::from_settings(config.brush);
    assert!((strokes.lazy.radius - 10.0).abs() < 1e-9);
    let screen_path: Vec<Point> = (0..=30).map(|i| Point::new(200.0 + i as f64 * 8.0, 200.0)).collect();
    let mut samples = screen_path.iter().enumerate().map(|(i, p)| {
        PointerSample::at(*p, t0 + Duration::from_millis(i as u64 * 8))
            .with_kind(PointerKind::Pen)
            .with_pressure(0.8)
    });
    let first = samples.next().unwrap();
    input.handle_pointer_event(&PointerEvent::Down(first));
    strokes.start_stroke(viewport.sample_to_canvas(first));
    for sample in samples {
        input.handle_pointer_event(&PointerEvent::Move(sample));
        strokes.add_point(viewport.sample_to_canvas(sample));
    }
    assert!(input.is_pressed());
    assert_eq!(input.pointer_position(), screen_path.last().copied());

    let lift = t0 + Duration::from_millis(300);
    let mut end = strokes.end_stroke_at(lift);
    let mut frame = 0u64;
    while end == StrokeEnd::CatchingUp {
        frame += 1;
        assert!(frame < 200, "catch-up did not finish");
        if let Some(done) = strokes.tick_at(lift + Duration::from_millis(frame * 16)) {
            end = done;
        }
    }
    let StrokeEnd::Finished(stroke) = end else {
        panic!("stroke was discarded");
    };
    let last_canvas = viewport.screen_to_canvas(*screen_path.last().unwrap());
    assert!(stroke.points.last().unwrap().point().distance(last_canvas) < 1e-9);
    assert!(!stroke.outline_path().elements().is_empty());

    // Drag the finished stroke next to a layer; its left edge snaps onto the layer's.
    let bounds = stroke.bounds();
    let mut snapper = SnappingEngine::new(config.snap);
    snapper.set_objects(vec![
        BoundingBox::new("photo", bounds.x0 + 5.0, bounds.y1 + 200.0, 100.0, 100.0),
        BoundingBox::new(stroke.id.to_string(), bounds.x0, bounds.y0, bounds.width(), bounds.height()),
    ]);
    snapper.set_dragging(Some(stroke.id.to_string()));
    let snapped = snapper.snap(bounds.x0 + 2.0, bounds.y0 + 400.0, bounds.width(), bounds.height());
    assert!(snapped.snapped);
    assert!((snapped.x - (bounds.x0 + 5.0)).abs() < 1e-9);
    assert!(!snapped.guides.is_empty());

    // The hierarchy reports what the viewport currently shows.
    let visible = viewport.visible_rect(Size::new(800.0, 600.0));
    let mut scene = SceneSource::new();
    scene.add_subcanvas(
        SubcanvasRecord::new("board", Transform::at(visible.x0, visible.y0), Size::new(50.0, 50.0))
            .with_layers(&["inside"]),
    );
    let center = visible.center();
    scene.add_layer(
        LayerRecord::new("inside", Transform::at(center.x, center.y), Size::new(10.0, 10.0)).with_parent("board"),
    );
    scene.add_layer(LayerRecord::new("far", Transform::at(visible.x1 + 1000.0, 0.0), Size::new(10.0, 10.0)));
    let hierarchy = SceneHierarchy::build(&scene);
    let shown: Vec<&str> = hierarchy.nodes_in_bounds(visible).iter().map(|n| n.id.as_str()).collect();
    assert_eq!(shown, vec!["board", "inside"]);

    // Persist, then restore into a fresh controller.
    let state = viewport.state();
    viewport.sink_mut().flush();
    let sink = viewport.into_sink();
    assert_eq!(sink.store().writes(), 1);
    let saved = sink.store().load().unwrap();
    assert_eq!(saved, state);

    let mut restored: ViewportController = ViewportController::new();
    restored.restore(saved);
    assert_eq!(restored.state(), state);
}
