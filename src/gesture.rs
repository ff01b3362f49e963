// ============================================================================
// GESTURE CONTROLLER: pointer input to move / rotate / resize / pinch edits
// ============================================================================

use crate::assets::AssetLibrary;
use crate::geometry::{angle, distance, midpoint, Point};
use crate::hit::{self, HitZone};
use crate::layer::{clamp_size, Layer, LayerId, LayerProperty, LayerStack};
use crate::render::Compositor;

/// Distances below this are treated as a degenerate gesture start.
const MIN_GESTURE_DISTANCE: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer sample, from mouse, pen or touch alike.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub id: u64,
    /// Canvas pixel coordinates.
    pub pos: Point,
    pub phase: PointerPhase,
}

impl Pointer {
    pub fn down(id: u64, x: f32, y: f32) -> Self {
        Self { id, pos: Point::new(x, y), phase: PointerPhase::Down }
    }

    pub fn moved(id: u64, x: f32, y: f32) -> Self {
        Self { id, pos: Point::new(x, y), phase: PointerPhase::Move }
    }

    pub fn up(id: u64, x: f32, y: f32) -> Self {
        Self { id, pos: Point::new(x, y), phase: PointerPhase::Up }
    }

    pub fn cancel(id: u64) -> Self {
        Self { id, pos: Point::ZERO, phase: PointerPhase::Cancel }
    }
}

/// Public view of the controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureMode {
    Idle,
    Moving,
    Rotating,
    Resizing,
    Gesture,
}

/// What a pointer event did. Anything but `Ignored` and `Suppressed` means
/// the preview needs a re-render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureOutcome {
    Ignored,
    /// The pointer missed the active layer and selected another one.
    Picked(LayerId),
    Began(GestureMode),
    Updated,
    /// Degenerate frame (zero start distance); no change applied.
    Suppressed,
    Committed,
    Cancelled,
}

/// Everything the controller reads or mutates for one event.
pub struct GestureTarget<'a> {
    pub layers: &'a mut LayerStack,
    pub active: &'a mut LayerId,
    pub assets: &'a AssetLibrary,
    pub compositor: &'a Compositor,
    pub canvas_w: u32,
    pub canvas_h: u32,
}

impl GestureTarget<'_> {
    fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(*self.active)
    }

    fn to_percent(&self, delta: Point) -> Point {
        Point::new(
            delta.x / self.canvas_w.max(1) as f32 * 100.0,
            delta.y / self.canvas_h.max(1) as f32 * 100.0,
        )
    }
}

/// Transform values captured when a drag begins, restored on cancel.
#[derive(Clone, Copy, Debug, PartialEq)]
struct StartValues {
    layer: LayerId,
    pos: Point,
    size: f32,
    rotation: f32,
}

impl StartValues {
    fn of(layer: &Layer) -> Self {
        Self {
            layer: layer.id,
            pos: Point::new(layer.pos_x, layer.pos_y),
            size: layer.size,
            rotation: layer.rotation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Drag {
    Idle,
    Moving {
        pointer: u64,
        origin: Point,
    },
    Rotating {
        pointer: u64,
    },
    Resizing {
        pointer: u64,
        center: Point,
        start_dist: f32,
        start_size: f32,
    },
    Gesture {
        a: u64,
        b: u64,
        /// Layer values when the second pointer landed.
        base: StartValues,
        start_dist: f32,
        start_size: f32,
        start_mid: Point,
        last_angle: f32,
        /// Unwrapped angle change since the start, radians.
        turned: f32,
    },
}

/// Pointer-driven transform state machine. Holds no layer data between
/// events beyond the values needed to finish or roll back the current drag.
#[derive(Clone, Debug)]
pub struct GestureController {
    drag: Drag,
    start: Option<StartValues>,
    pointers: Vec<(u64, Point)>,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureController {
    pub fn new() -> Self {
        Self { drag: Drag::Idle, start: None, pointers: Vec::new() }
    }

    pub fn mode(&self) -> GestureMode {
        match self.drag {
            Drag::Idle => GestureMode::Idle,
            Drag::Moving { .. } => GestureMode::Moving,
            Drag::Rotating { .. } => GestureMode::Rotating,
            Drag::Resizing { .. } => GestureMode::Resizing,
            Drag::Gesture { .. } => GestureMode::Gesture,
        }
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn handle(&mut self, event: Pointer, target: &mut GestureTarget<'_>) -> GestureOutcome {
        match event.phase {
            PointerPhase::Down => self.on_down(event, target),
            PointerPhase::Move => self.on_move(event, target),
            PointerPhase::Up => self.on_up(event),
            PointerPhase::Cancel => self.on_cancel(event, target),
        }
    }

    fn track(&mut self, id: u64, pos: Point) {
        match self.pointers.iter_mut().find(|(pid, _)| *pid == id) {
            Some(slot) => slot.1 = pos,
            None => self.pointers.push((id, pos)),
        }
    }

    fn position(&self, id: u64) -> Option<Point> {
        self.pointers.iter().find(|(pid, _)| *pid == id).map(|(_, p)| *p)
    }

    fn on_down(&mut self, event: Pointer, target: &mut GestureTarget<'_>) -> GestureOutcome {
        self.track(event.id, event.pos);
        match self.pointers.len() {
            1 => self.begin_single(event.id, event.pos, target),
            2 => self.begin_gesture(target),
            _ => GestureOutcome::Ignored,
        }
    }

    fn begin_single(&mut self, pointer: u64, p: Point, target: &mut GestureTarget<'_>) -> GestureOutcome {
        let zone = target.active_layer().filter(|l| l.visible).and_then(|layer| {
            let bounds = hit::layer_bounds(target.compositor, layer, target.assets, target.canvas_w, target.canvas_h)?;
            Some((bounds, bounds.hit(p)?))
        });

        let Some((bounds, zone)) = zone else {
            return self.repick(p, target);
        };
        let Some(layer) = target.active_layer() else {
            return GestureOutcome::Ignored;
        };
        self.start = Some(StartValues::of(layer));
        self.drag = match zone {
            HitZone::Body => Drag::Moving { pointer, origin: p },
            HitZone::RotateHandle => Drag::Rotating { pointer },
            HitZone::ResizeHandle => Drag::Resizing {
                pointer,
                center: bounds.center,
                start_dist: distance(bounds.center, p),
                start_size: layer.size,
            },
        };
        GestureOutcome::Began(self.mode())
    }

    fn repick(&mut self, p: Point, target: &mut GestureTarget<'_>) -> GestureOutcome {
        let picked = hit::pick(
            target.compositor,
            target.layers.as_slice(),
            target.assets,
            target.canvas_w,
            target.canvas_h,
            p,
        );
        match picked {
            Some(id) if id != *target.active => {
                *target.active = id;
                GestureOutcome::Picked(id)
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn begin_gesture(&mut self, target: &mut GestureTarget<'_>) -> GestureOutcome {
        let (a, pa) = self.pointers[0];
        let (b, pb) = self.pointers[1];
        // A second finger replaces any single-pointer drag; its edits so far stand.
        let Some(layer) = target.active_layer() else {
            self.drag = Drag::Idle;
            return GestureOutcome::Ignored;
        };
        if matches!(self.drag, Drag::Idle) || self.start.is_none() {
            self.start = Some(StartValues::of(layer));
        }
        self.drag = Drag::Gesture {
            a,
            b,
            base: StartValues::of(layer),
            start_dist: distance(pa, pb),
            start_size: layer.size,
            start_mid: midpoint(pa, pb),
            last_angle: angle(pa, pb),
            turned: 0.0,
        };
        GestureOutcome::Began(GestureMode::Gesture)
    }

    fn on_move(&mut self, event: Pointer, target: &mut GestureTarget<'_>) -> GestureOutcome {
        if self.position(event.id).is_none() {
            return GestureOutcome::Ignored;
        }
        self.track(event.id, event.pos);
        let Some(start) = self.start else {
            return GestureOutcome::Ignored;
        };
        let id = start.layer;
        let p = event.pos;

        let edit = match &mut self.drag {
            Drag::Idle => return GestureOutcome::Ignored,
            Drag::Moving { pointer, origin } => {
                if *pointer != event.id {
                    return GestureOutcome::Ignored;
                }
                let d = target.to_percent(p - *origin);
                vec![LayerProperty::Position { x: start.pos.x + d.x, y: start.pos.y + d.y }]
            }
            Drag::Rotating { pointer } => {
                if *pointer != event.id {
                    return GestureOutcome::Ignored;
                }
                let Some(layer) = target.layers.get(id) else {
                    return self.abandon();
                };
                let center = hit::layer_center(layer, target.canvas_w, target.canvas_h);
                if distance(center, p) < MIN_GESTURE_DISTANCE {
                    return GestureOutcome::Suppressed;
                }
                vec![LayerProperty::Rotation(angle(center, p).to_degrees() + 90.0)]
            }
            Drag::Resizing { pointer, center, start_dist, start_size } => {
                if *pointer != event.id {
                    return GestureOutcome::Ignored;
                }
                let d = distance(*center, p);
                if *start_dist < MIN_GESTURE_DISTANCE {
                    // Re-baseline once the pointer leaves the centre.
                    *start_dist = d;
                    if let Some(layer) = target.layers.get(id) {
                        *start_size = layer.size;
                    }
                    return GestureOutcome::Suppressed;
                }
                vec![LayerProperty::Size(clamp_size(*start_size * d / *start_dist))]
            }
            Drag::Gesture { a, b, base, start_dist, start_size, start_mid, last_angle, turned } => {
                let (Some(pa), Some(pb)) = (
                    self.pointers.iter().find(|(pid, _)| *pid == *a).map(|(_, q)| *q),
                    self.pointers.iter().find(|(pid, _)| *pid == *b).map(|(_, q)| *q),
                ) else {
                    return GestureOutcome::Ignored;
                };
                let d = distance(pa, pb);
                let mid = midpoint(pa, pb);
                if *start_dist < MIN_GESTURE_DISTANCE {
                    *start_dist = d;
                    *start_mid = mid;
                    *last_angle = angle(pa, pb);
                    if let Some(layer) = target.layers.get(id) {
                        *start_size = layer.size;
                        *base = StartValues::of(layer);
                    }
                    return GestureOutcome::Suppressed;
                }
                let a_now = angle(pa, pb);
                *turned += wrap_angle(a_now - *last_angle);
                *last_angle = a_now;
                let shift = target.to_percent(mid - *start_mid);
                vec![
                    LayerProperty::Size(clamp_size(*start_size * d / *start_dist)),
                    LayerProperty::Rotation(base.rotation + turned.to_degrees()),
                    LayerProperty::Position { x: base.pos.x + shift.x, y: base.pos.y + shift.y },
                ]
            }
        };

        for prop in edit {
            if target.layers.set(id, prop).is_err() {
                return self.abandon();
            }
        }
        GestureOutcome::Updated
    }

    fn on_up(&mut self, event: Pointer) -> GestureOutcome {
        self.pointers.retain(|(pid, _)| *pid != event.id);
        if !self.involves(event.id) {
            return GestureOutcome::Ignored;
        }
        self.drag = Drag::Idle;
        self.start = None;
        GestureOutcome::Committed
    }

    fn on_cancel(&mut self, event: Pointer, target: &mut GestureTarget<'_>) -> GestureOutcome {
        self.pointers.retain(|(pid, _)| *pid != event.id);
        if !self.involves(event.id) {
            return GestureOutcome::Ignored;
        }
        if let Some(start) = self.start.take() {
            // The layer may have been removed mid-drag; nothing to roll back then.
            let _ = target.layers.set(start.layer, LayerProperty::Position { x: start.pos.x, y: start.pos.y });
            let _ = target.layers.set(start.layer, LayerProperty::Size(start.size));
            let _ = target.layers.set(start.layer, LayerProperty::Rotation(start.rotation));
        }
        self.drag = Drag::Idle;
        GestureOutcome::Cancelled
    }

    fn involves(&self, id: u64) -> bool {
        match self.drag {
            Drag::Idle => false,
            Drag::Moving { pointer, .. } | Drag::Rotating { pointer } | Drag::Resizing { pointer, .. } => pointer == id,
            Drag::Gesture { a, b, .. } => a == id || b == id,
        }
    }

    fn abandon(&mut self) -> GestureOutcome {
        self.drag = Drag::Idle;
        self.start = None;
        GestureOutcome::Ignored
    }
}

/// Wrap an angle difference into `(-π, π]`.
fn wrap_angle(mut a: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    while a > PI {
        a -= TAU;
    }
    while a <= -PI {
        a += TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Layer, LayerKind, TextMark};

    struct Scene {
        layers: LayerStack,
        active: LayerId,
        assets: AssetLibrary,
        compositor: Compositor,
    }

    impl Scene {
        fn new() -> Self {
            let mut layer = Layer::new_text("HELLO");
            layer.size = 100.0;
            let layers = LayerStack::new(layer);
            let active = layers.bottom().id;
            Self { layers, active, assets: AssetLibrary::new(), compositor: Compositor::builtin() }
        }

        fn send(&mut self, ctl: &mut GestureController, ev: Pointer) -> GestureOutcome {
            let mut target = GestureTarget {
                layers: &mut self.layers,
                active: &mut self.active,
                assets: &self.assets,
                compositor: &self.compositor,
                canvas_w: 400,
                canvas_h: 400,
            };
            ctl.handle(ev, &mut target)
        }

        fn layer(&self) -> &Layer {
            self.layers.get(self.active).unwrap()
        }
    }

    #[test]
    fn drag_moves_by_percent() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        assert_eq!(scene.send(&mut ctl, Pointer::down(1, 200.0, 200.0)), GestureOutcome::Began(GestureMode::Moving));
        scene.send(&mut ctl, Pointer::moved(1, 240.0, 180.0));
        assert!((scene.layer().pos_x - 60.0).abs() < 1e-4);
        assert!((scene.layer().pos_y - 45.0).abs() < 1e-4);
        assert_eq!(scene.send(&mut ctl, Pointer::up(1, 240.0, 180.0)), GestureOutcome::Committed);
        assert_eq!(ctl.mode(), GestureMode::Idle);
    }

    #[test]
    fn cancel_restores_start_values() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        scene.send(&mut ctl, Pointer::down(1, 200.0, 200.0));
        scene.send(&mut ctl, Pointer::moved(1, 300.0, 300.0));
        assert_eq!(scene.send(&mut ctl, Pointer::cancel(1)), GestureOutcome::Cancelled);
        assert_eq!((scene.layer().pos_x, scene.layer().pos_y), (50.0, 50.0));
        assert_eq!(ctl.mode(), GestureMode::Idle);
    }

    #[test]
    fn rotate_handle_points_up_at_zero() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        let bounds = hit::layer_bounds(&scene.compositor, scene.layer(), &scene.assets, 400, 400).unwrap();
        let h = bounds.rotate_handle();
        assert_eq!(scene.send(&mut ctl, Pointer::down(1, h.x, h.y)), GestureOutcome::Began(GestureMode::Rotating));
        // Straight right of the centre is a quarter turn clockwise.
        scene.send(&mut ctl, Pointer::moved(1, 350.0, 200.0));
        assert!((scene.layer().rotation - 90.0).abs() < 1e-3);
    }

    #[test]
    fn resize_handle_scales_by_distance_ratio() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        let bounds = hit::layer_bounds(&scene.compositor, scene.layer(), &scene.assets, 400, 400).unwrap();
        let h = bounds.resize_handle();
        assert_eq!(scene.send(&mut ctl, Pointer::down(1, h.x, h.y)), GestureOutcome::Began(GestureMode::Resizing));
        let far = Point::new(200.0 + (h.x - 200.0) * 2.0, 200.0 + (h.y - 200.0) * 2.0);
        scene.send(&mut ctl, Pointer::moved(1, far.x, far.y));
        assert!((scene.layer().size - 200.0).abs() < 1e-2);
    }

    #[test]
    fn size_never_drops_below_floor() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        scene.send(&mut ctl, Pointer::down(1, 100.0, 200.0));
        scene.send(&mut ctl, Pointer::down(2, 300.0, 200.0));
        scene.send(&mut ctl, Pointer::moved(2, 100.5, 200.0));
        assert_eq!(scene.layer().size, crate::layer::MIN_LAYER_SIZE);
    }

    #[test]
    fn degenerate_pinch_start_is_suppressed() {
        let mut scene = Scene::new();
        let mut ctl = GestureController::new();
        scene.send(&mut ctl, Pointer::down(1, 200.0, 200.0));
        scene.send(&mut ctl, Pointer::down(2, 200.0, 200.0));
        assert_eq!(scene.send(&mut ctl, Pointer::moved(2, 250.0, 200.0)), GestureOutcome::Suppressed);
        assert_eq!(scene.layer().size, 100.0);
        assert!(scene.layer().size.is_finite());
    }

    #[test]
    fn resize_grabbed_at_the_centre_is_suppressed_then_rebaselined() {
        let mut scene = Scene::new();
        let id = scene.active;
        // An empty, minimum-size mark has its resize handle within reach of its centre.
        scene.layers.set(id, LayerProperty::Text(String::new())).unwrap();
        scene.layers.set(id, LayerProperty::Size(10.0)).unwrap();
        let mut ctl = GestureController::new();
        assert_eq!(
            scene.send(&mut ctl, Pointer::down(1, 200.0, 200.0)),
            GestureOutcome::Began(GestureMode::Resizing)
        );
        assert_eq!(scene.send(&mut ctl, Pointer::moved(1, 260.0, 200.0)), GestureOutcome::Suppressed);
        assert_eq!(scene.layer().size, 10.0);
        scene.send(&mut ctl, Pointer::moved(1, 320.0, 200.0));
        assert!(scene.layer().size.is_finite());
        assert!((scene.layer().size - 20.0).abs() < 1e-3);
    }

    #[test]
    fn miss_repicks_topmost_layer() {
        let mut scene = Scene::new();
        let first = scene.active;
        let mut mark = TextMark::default();
        mark.content = "TOP".into();
        let top = scene.layers.add(LayerKind::Text(mark));
        scene.layers.set(top, LayerProperty::Position { x: 20.0, y: 20.0 }).unwrap();
        let mut ctl = GestureController::new();
        assert_eq!(scene.send(&mut ctl, Pointer::down(1, 80.0, 80.0)), GestureOutcome::Picked(top));
        assert_eq!(ctl.mode(), GestureMode::Idle);
        scene.send(&mut ctl, Pointer::up(1, 80.0, 80.0));
        assert_ne!(scene.active, first);
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        use std::f32::consts::PI;
        assert!((wrap_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-5);
    }
}
