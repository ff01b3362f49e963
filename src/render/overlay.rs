// ============================================================================
// SELECTION OVERLAY: dashed box and handles for the highlighted layer
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::blend::{blend_pixel, BlendMode};
use crate::geometry::{distance, Point};
use crate::hit::LayerBounds;

const ACCENT: Rgba<u8> = Rgba([59, 130, 246, 255]);
const HANDLE_FILL: Rgba<u8> = Rgba([255, 255, 255, 230]);

/// Draw the selection chrome for `bounds`. Preview only; exports never call this.
pub fn draw_highlight(dst: &mut RgbaImage, bounds: &LayerBounds) {
    let canvas_w = dst.width();
    let line = (canvas_w as f32 * 0.004).max(2.0);
    let dash = line * 4.0;
    let r = bounds.handle_radius;
    let rotate_handle = bounds.rotate_handle();
    let resize_handle = bounds.resize_handle();

    let (lo, hi) = extent(bounds, line);
    let x0 = lo.x.floor().max(0.0) as u32;
    let y0 = lo.y.floor().max(0.0) as u32;
    let x1 = (hi.x.ceil().max(0.0) as u32).min(dst.width());
    let y1 = (hi.y.ceil().max(0.0) as u32).min(dst.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            let Some(color) = shade(bounds, p, line, dash, r, rotate_handle, resize_handle) else {
                continue;
            };
            let px = dst.get_pixel_mut(x, y);
            *px = blend_pixel(*px, color, BlendMode::Normal, 1.0);
        }
    }
}

fn shade(
    bounds: &LayerBounds,
    p: Point,
    line: f32,
    dash: f32,
    r: f32,
    rotate_handle: Point,
    resize_handle: Point,
) -> Option<Rgba<u8>> {
    // Handles sit on top of the box outline.
    for handle in [rotate_handle, resize_handle] {
        let d = distance(p, handle);
        if d <= r {
            return Some(if d >= r - line { ACCENT } else { HANDLE_FILL });
        }
    }

    let l = bounds.to_local(p);
    let (hw, hh) = (bounds.half_w, bounds.half_h);
    let half = line * 0.5;
    let on_vertical = (l.x.abs() - hw).abs() <= half && l.y.abs() <= hh + half;
    let on_horizontal = (l.y.abs() - hh).abs() <= half && l.x.abs() <= hw + half;
    let along = if on_horizontal {
        l.x + hw
    } else if on_vertical {
        l.y + hh
    } else {
        return None;
    };
    (((along / dash).floor() as i64).rem_euclid(2) == 0).then_some(ACCENT)
}

/// Canvas-space bounding box of the box outline and both handles.
fn extent(bounds: &LayerBounds, line: f32) -> (Point, Point) {
    let mut lo = Point::new(f32::INFINITY, f32::INFINITY);
    let mut hi = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    let grow = |lo: &mut Point, hi: &mut Point, p: Point, pad: f32| {
        lo.x = lo.x.min(p.x - pad);
        lo.y = lo.y.min(p.y - pad);
        hi.x = hi.x.max(p.x + pad);
        hi.y = hi.y.max(p.y + pad);
    };
    for c in bounds.corners() {
        grow(&mut lo, &mut hi, c, line);
    }
    grow(&mut lo, &mut hi, bounds.rotate_handle(), bounds.handle_radius + 1.0);
    grow(&mut lo, &mut hi, bounds.resize_handle(), bounds.handle_radius + 1.0);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_marks_handles_and_leaves_interior() {
        let mut img = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let bounds = LayerBounds::new(Point::new(100.0, 110.0), 60.0, 30.0, 0.0, 200);
        draw_highlight(&mut img, &bounds);
        let handle = bounds.rotate_handle();
        assert_ne!(*img.get_pixel(handle.x as u32, handle.y as u32), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(100, 110), Rgba([0, 0, 0, 255]));
    }
}
