use image::{Rgba, RgbaImage};
use markfe::geometry::Point;
use markfe::gesture::{GestureMode, GestureOutcome, Pointer};
use markfe::hit::{self, HitZone};
use markfe::layer::{LayerProperty, LayerStack};
use markfe::workspace::Workspace;

/// 400×400 canvas with one "HELLO" mark at size 100 (40 px font) in the centre.
fn workspace() -> Workspace {
    let mut ws = Workspace::default();
    ws.add_image("canvas.png", RgbaImage::from_pixel(400, 400, Rgba([30, 30, 30, 255])));
    let id = ws.add_text_layer("HELLO");
    ws.set_layer(id, LayerProperty::Size(100.0)).unwrap();
    ws.set_layer(id, LayerProperty::Position { x: 50.0, y: 50.0 }).unwrap();
    let placeholder = ws.layers().bottom().id;
    ws.remove_layer(placeholder).unwrap();
    ws
}

fn pick(ws: &Workspace, x: f32, y: f32) -> Option<markfe::layer::LayerId> {
    hit::pick(ws.compositor(), ws.layers().as_slice(), ws.assets(), 400, 400, Point::new(x, y))
}

#[test]
fn hit_testing_follows_rotation() {
    let mut ws = workspace();
    let id = ws.active_layer_id();

    // The box is much wider than tall while upright.
    assert_eq!(pick(&ws, 270.0, 200.0), Some(id));
    assert_eq!(pick(&ws, 200.0, 130.0), None);

    ws.set_layer(id, LayerProperty::Rotation(90.0)).unwrap();
    assert_eq!(pick(&ws, 270.0, 200.0), None);
    assert_eq!(pick(&ws, 200.0, 130.0), Some(id));
}

#[test]
fn handles_rotate_with_the_layer() {
    let mut ws = workspace();
    let id = ws.active_layer_id();
    ws.set_layer(id, LayerProperty::Rotation(90.0)).unwrap();
    let bounds = hit::layer_bounds(ws.compositor(), ws.active_layer(), ws.assets(), 400, 400).unwrap();

    // Local "up" now points to canvas +x.
    let handle = bounds.rotate_handle();
    assert!(handle.x > 200.0 + bounds.half_h);
    assert!((handle.y - 200.0).abs() < 1e-3);
    assert_eq!(bounds.hit(handle), Some(HitZone::RotateHandle));
    assert_eq!(bounds.hit(bounds.resize_handle()), Some(HitZone::ResizeHandle));
}

#[test]
fn two_finger_gesture_scales_and_rotates() {
    let mut ws = workspace();
    let start_size = ws.active_layer().size;
    let start_rotation = ws.active_layer().rotation;

    assert_eq!(ws.handle_pointer(Pointer::down(1, 150.0, 200.0)), GestureOutcome::Began(GestureMode::Moving));
    assert_eq!(ws.handle_pointer(Pointer::down(2, 250.0, 200.0)), GestureOutcome::Began(GestureMode::Gesture));

    // Double the span and turn it by 30 degrees around the first finger.
    let (s, c) = 30f32.to_radians().sin_cos();
    ws.handle_pointer(Pointer::moved(2, 150.0 + 200.0 * c, 200.0 + 200.0 * s));

    let layer = ws.active_layer();
    assert!((layer.size - start_size * 2.0).abs() < 1e-2, "size {}", layer.size);
    assert!((layer.rotation - (start_rotation + 30.0)).abs() < 1e-2, "rotation {}", layer.rotation);

    ws.handle_pointer(Pointer::up(2, 0.0, 0.0));
    ws.handle_pointer(Pointer::up(1, 0.0, 0.0));
    assert_eq!(ws.gestures().mode(), GestureMode::Idle);
}

#[test]
fn gesture_rotation_accumulates_past_half_turn() {
    let mut ws = workspace();
    ws.handle_pointer(Pointer::down(1, 200.0, 200.0));
    ws.handle_pointer(Pointer::down(2, 300.0, 200.0));
    // Walk the second finger around the first in 30 degree steps, 270 degrees total.
    for step in 1..=9 {
        let a = (step as f32 * 30.0).to_radians();
        ws.handle_pointer(Pointer::moved(2, 200.0 + 100.0 * a.cos(), 200.0 + 100.0 * a.sin()));
    }
    assert!((ws.active_layer().rotation - 270.0).abs() < 1e-2, "rotation {}", ws.active_layer().rotation);
}

#[test]
fn tapping_another_layer_selects_it() {
    let mut ws = workspace();
    let first = ws.active_layer_id();
    let second = ws.add_text_layer("LOW");
    ws.set_layer(second, LayerProperty::Position { x: 50.0, y: 85.0 }).unwrap();
    ws.set_active_layer(first).unwrap();

    assert_eq!(ws.handle_pointer(Pointer::down(1, 200.0, 340.0)), GestureOutcome::Picked(second));
    assert_eq!(ws.active_layer_id(), second);
}

#[test]
fn cancel_rolls_the_whole_gesture_back() {
    let mut ws = workspace();
    let before = ws.active_layer().clone();
    ws.handle_pointer(Pointer::down(1, 150.0, 200.0));
    ws.handle_pointer(Pointer::moved(1, 170.0, 220.0));
    ws.handle_pointer(Pointer::down(2, 270.0, 220.0));
    ws.handle_pointer(Pointer::moved(2, 370.0, 320.0));
    assert_eq!(ws.handle_pointer(Pointer::cancel(1)), GestureOutcome::Cancelled);
    let after = ws.active_layer();
    assert_eq!((after.pos_x, after.pos_y), (before.pos_x, before.pos_y));
    assert_eq!(after.size, before.size);
    assert_eq!(after.rotation, before.rotation);
}

#[test]
fn tiled_layers_are_not_picked_by_a_single_pointer() {
    let mut ws = workspace();
    let id = ws.active_layer_id();
    ws.set_layer(id, LayerProperty::Tiled(true)).unwrap();
    assert_eq!(pick(&ws, 200.0, 200.0), None);
    assert!(hit::layer_bounds(ws.compositor(), ws.active_layer(), ws.assets(), 400, 400).is_none());
}

#[test]
fn stack_never_empties() {
    let mut stack = LayerStack::default();
    let only = stack.top().id;
    assert!(matches!(stack.remove(only), Err(markfe::MarkError::LastLayer)));
    assert_eq!(stack.len(), 1);
}
