// ============================================================================
// AFFINE BLIT: inverse-map a sprite onto the canvas and blend it in place
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::blend::{blend_pixel, BlendMode};
use crate::geometry::{Affine, Point};

use super::sprite::Sprite;

/// Composite `sprite` onto `dst`. `to_canvas` maps the sprite's local frame to
/// canvas pixels. Only the destination bounding box of the transformed sprite
/// is visited; rows are processed in parallel.
pub fn blit(dst: &mut RgbaImage, sprite: &Sprite, to_canvas: Affine, mode: BlendMode, opacity: f32) {
    if opacity <= 0.0 || sprite.pixels.width() == 0 || sprite.pixels.height() == 0 {
        return;
    }
    let canvas_w = dst.width() as usize;
    let canvas_h = dst.height() as usize;
    let Some((x0, y0, x1, y1)) = dest_rect(sprite, to_canvas, canvas_w, canvas_h) else {
        return;
    };

    let inv = to_canvas.invert();
    let row_bytes = canvas_w * 4;
    let raw: &mut [u8] = &mut *dst;
    raw[y0 * row_bytes..y1 * row_bytes]
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(i, row)| {
            let y = (y0 + i) as f32 + 0.5;
            for x in x0..x1 {
                let local = inv.apply(Point::new(x as f32 + 0.5, y));
                let sx = local.x + sprite.origin_x - 0.5;
                let sy = local.y + sprite.origin_y - 0.5;
                let Some(top) = sample_bilinear(&sprite.pixels, sx, sy) else {
                    continue;
                };
                let px = &mut row[x * 4..x * 4 + 4];
                let base = Rgba([px[0], px[1], px[2], px[3]]);
                let out = blend_pixel(base, top, mode, opacity);
                px.copy_from_slice(&out.0);
            }
        });
}

/// Destination pixel rect `[x0, x1) × [y0, y1)` clipped to the canvas.
fn dest_rect(sprite: &Sprite, to_canvas: Affine, canvas_w: usize, canvas_h: usize) -> Option<(usize, usize, usize, usize)> {
    let (min, max) = sprite.local_bounds();
    let corners = [
        to_canvas.apply(min),
        to_canvas.apply(Point::new(max.x, min.y)),
        to_canvas.apply(max),
        to_canvas.apply(Point::new(min.x, max.y)),
    ];
    let (mut lo_x, mut lo_y) = (f32::INFINITY, f32::INFINITY);
    let (mut hi_x, mut hi_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for c in corners {
        lo_x = lo_x.min(c.x);
        lo_y = lo_y.min(c.y);
        hi_x = hi_x.max(c.x);
        hi_y = hi_y.max(c.y);
    }
    if !(lo_x.is_finite() && lo_y.is_finite() && hi_x.is_finite() && hi_y.is_finite()) {
        return None;
    }
    let x0 = lo_x.floor().max(0.0) as usize;
    let y0 = lo_y.floor().max(0.0) as usize;
    let x1 = (hi_x.ceil().max(0.0) as usize).min(canvas_w);
    let y1 = (hi_y.ceil().max(0.0) as usize).min(canvas_h);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

/// Bilinear sample with alpha-weighted colour so transparent texels do not
/// darken edges. Returns `None` when the sample is fully transparent.
pub(crate) fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Option<Rgba<u8>> {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return None;
    }
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut acc = [0.0f32; 4];
    for (sx, sy, wgt) in [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ] {
        if wgt <= 0.0 || sx < 0 || sy < 0 || sx >= w || sy >= h {
            continue;
        }
        let p = img.get_pixel(sx as u32, sy as u32);
        let a = p[3] as f32 * wgt;
        acc[0] += p[0] as f32 * a;
        acc[1] += p[1] as f32 * a;
        acc[2] += p[2] as f32 * a;
        acc[3] += a;
    }
    if acc[3] < 0.5 {
        return None;
    }
    Some(Rgba([
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_sprite() -> Sprite {
        Sprite {
            pixels: RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])),
            origin_x: 2.0,
            origin_y: 2.0,
        }
    }

    #[test]
    fn integer_translation_copies_exactly() {
        let mut dst = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        blit(&mut dst, &square_sprite(), Affine::translate(5.0, 5.0), BlendMode::Normal, 1.0);
        assert_eq!(*dst.get_pixel(5, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(7, 7), Rgba([0, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(2, 5), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn fully_offscreen_sprite_is_skipped() {
        let mut dst = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let before = dst.clone();
        blit(&mut dst, &square_sprite(), Affine::translate(-50.0, 3.0), BlendMode::Normal, 1.0);
        assert_eq!(dst, before);
    }

    #[test]
    fn zero_opacity_is_a_no_op() {
        let mut dst = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let before = dst.clone();
        blit(&mut dst, &square_sprite(), Affine::translate(5.0, 5.0), BlendMode::Normal, 0.0);
        assert_eq!(dst, before);
    }
}
