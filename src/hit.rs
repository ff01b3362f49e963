// ============================================================================
// HIT TESTING: rotated layer boxes, handle hotspots and top-down re-pick
// ============================================================================

use crate::assets::AssetLibrary;
use crate::geometry::{distance, rotate, Point};
use crate::layer::{Layer, LayerId};
use crate::render::Compositor;

/// Fixed inflation of the content box on every side, in canvas pixels.
pub const HIT_PADDING: f32 = 10.0;

/// Radius of the rotate/resize handles. Scales with the canvas so the
/// handles stay grabbable on large images.
pub fn handle_radius(canvas_w: u32) -> f32 {
    (canvas_w as f32 * 0.04).max(20.0)
}

/// Which part of a layer a pointer landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitZone {
    Body,
    RotateHandle,
    ResizeHandle,
}

/// A layer's padded content box in canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerBounds {
    pub center: Point,
    /// Half extents including [`HIT_PADDING`].
    pub half_w: f32,
    pub half_h: f32,
    pub rotation_deg: f32,
    pub handle_radius: f32,
}

impl LayerBounds {
    pub fn new(center: Point, content_w: f32, content_h: f32, rotation_deg: f32, canvas_w: u32) -> Self {
        Self {
            center,
            half_w: content_w.max(0.0) * 0.5 + HIT_PADDING,
            half_h: content_h.max(0.0) * 0.5 + HIT_PADDING,
            rotation_deg,
            handle_radius: handle_radius(canvas_w),
        }
    }

    /// Canvas point into the layer's unrotated frame (origin at the centre).
    pub fn to_local(&self, p: Point) -> Point {
        rotate(p - self.center, -self.rotation_deg.to_radians())
    }

    pub fn to_canvas(&self, local: Point) -> Point {
        rotate(local, self.rotation_deg.to_radians()) + self.center
    }

    pub fn contains(&self, p: Point) -> bool {
        let l = self.to_local(p);
        l.x.abs() <= self.half_w && l.y.abs() <= self.half_h
    }

    /// Top-left, top-right, bottom-right, bottom-left in canvas space.
    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = (self.half_w, self.half_h);
        [
            self.to_canvas(Point::new(-w, -h)),
            self.to_canvas(Point::new(w, -h)),
            self.to_canvas(Point::new(w, h)),
            self.to_canvas(Point::new(-w, h)),
        ]
    }

    /// Hotspot `handle_radius` above the middle of the top edge.
    pub fn rotate_handle(&self) -> Point {
        self.to_canvas(Point::new(0.0, -self.half_h - self.handle_radius))
    }

    /// Hotspot on the bottom-right corner.
    pub fn resize_handle(&self) -> Point {
        self.to_canvas(Point::new(self.half_w, self.half_h))
    }

    /// Classify a pointer. Handles win over the body.
    pub fn hit(&self, p: Point) -> Option<HitZone> {
        if distance(p, self.rotate_handle()) <= self.handle_radius {
            return Some(HitZone::RotateHandle);
        }
        if distance(p, self.resize_handle()) <= self.handle_radius {
            return Some(HitZone::ResizeHandle);
        }
        self.contains(p).then_some(HitZone::Body)
    }
}

/// Anchor of a non-tiled layer in canvas pixels.
pub fn layer_center(layer: &Layer, canvas_w: u32, canvas_h: u32) -> Point {
    Point::new(
        layer.pos_x / 100.0 * canvas_w as f32,
        layer.pos_y / 100.0 * canvas_h as f32,
    )
}

/// Screen-space box of a single-placement layer. `None` for tiled layers and
/// for logo layers whose asset is missing.
pub fn layer_bounds(
    compositor: &Compositor,
    layer: &Layer,
    assets: &AssetLibrary,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<LayerBounds> {
    if layer.tiled {
        return None;
    }
    let (w, h) = compositor.content_size(layer, assets, canvas_w)?;
    Some(LayerBounds::new(layer_center(layer, canvas_w, canvas_h), w, h, layer.rotation, canvas_w))
}

/// Topmost visible, non-tiled layer whose box contains `p`.
pub fn pick(
    compositor: &Compositor,
    layers: &[Layer],
    assets: &AssetLibrary,
    canvas_w: u32,
    canvas_h: u32,
    p: Point,
) -> Option<LayerId> {
    layers
        .iter()
        .rev()
        .filter(|l| l.visible)
        .find(|l| {
            layer_bounds(compositor, l, assets, canvas_w, canvas_h).is_some_and(|b| b.contains(p))
        })
        .map(|l| l.id)
}
