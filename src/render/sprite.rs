// ============================================================================
// SPRITES: one layer's drawn content (background, shadow, stroke, fill or
// logo) rasterized in the layer's local frame, optionally limited to the
// window of that frame that reaches the canvas
// ============================================================================

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::assets::LogoAsset;
use crate::blend::{blend_pixel, BlendMode};
use crate::geometry::{Point, RasterFrame, Rect};
use crate::layer::{Color, Layer, TextMark};
use crate::text::{self, CoverageMask, FontBook};

use super::blit::sample_bilinear;

/// Shadow colour alpha (black at 30 %).
const SHADOW_ALPHA: f32 = 0.3;

/// Shadows blurred wider than this are drawn from a reduced-resolution raster.
const MAX_DIRECT_SIGMA: f32 = 8.0;

/// Pixels plus the position of the local origin inside them.
///
/// Pixel `(i, j)` covers local `[i - origin_x, i + 1 - origin_x)` horizontally
/// and likewise vertically.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub pixels: RgbaImage,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl Sprite {
    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    /// Local-space bounding box `(min, max)`.
    pub fn local_bounds(&self) -> (Point, Point) {
        (
            Point::new(-self.origin_x, -self.origin_y),
            Point::new(
                self.pixels.width() as f32 - self.origin_x,
                self.pixels.height() as f32 - self.origin_y,
            ),
        )
    }
}

/// Blur radius and offset of a drop shadow, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Shadow {
    sigma: f32,
    offset: f32,
}

impl Shadow {
    /// Text shadows grow with the mark: blur `max(2, size/100)`, offset `max(1, size/200)`.
    fn for_text(size: f32) -> Self {
        Self { sigma: (size / 100.0).max(2.0) * 0.5, offset: (size / 200.0).max(1.0) }
    }

    const LOGO: Shadow = Shadow { sigma: 2.0, offset: 2.0 };

    fn reach(&self) -> f32 {
        self.offset + self.sigma * 3.0
    }
}

/// Stroke line width in canvas pixels; zero when the stroke is disabled.
pub fn stroke_line_width(stroke_width: f32, canvas_w: f32) -> f32 {
    if stroke_width <= 0.0 {
        0.0
    } else {
        (canvas_w * stroke_width / 2000.0).max(1.0)
    }
}

/// Background padding in canvas pixels.
pub fn background_padding_px(layer: &Layer, canvas_w: f32) -> f32 {
    layer.background_padding / 1000.0 * canvas_w
}

/// Margin every effect of `layer` can add around its content, in pixels.
fn effects_reach(layer: &Layer, stroke_px: f32, shadow: Option<Shadow>, canvas_w: f32) -> f32 {
    let bg_pad = if layer.has_background { background_padding_px(layer, canvas_w) } else { 0.0 };
    (stroke_px * 0.5).max(shadow.map_or(0.0, |s| s.reach())).max(bg_pad) + 2.0
}

/// Full local pixel grid a text layer's sprite would occupy if drawn whole.
pub fn text_frame(fonts: &FontBook, layer: &Layer, mark: &TextMark, canvas_w: u32) -> RasterFrame {
    let cw = canvas_w as f32;
    let styled = fonts.face(mark.bold, mark.italic);
    let stroke_px = stroke_line_width(mark.stroke_width, cw);
    let shadow = layer.shadow_active().then(|| Shadow::for_text(layer.size));
    text::frame(styled, &mark.content, layer.size / 1000.0 * cw, effects_reach(layer, stroke_px, shadow, cw))
}

/// Text layer content in its local frame. With a `window` only the pixels
/// overlapping that local rectangle are drawn, so the cost follows the window
/// rather than the mark's size.
pub fn text_sprite(fonts: &FontBook, layer: &Layer, mark: &TextMark, canvas_w: u32, window: Option<&Rect>) -> Sprite {
    let cw = canvas_w as f32;
    let font_size = layer.size / 1000.0 * cw;
    let styled = fonts.face(mark.bold, mark.italic);
    let stroke_px = stroke_line_width(mark.stroke_width, cw);
    let shadow = layer.shadow_active().then(|| Shadow::for_text(layer.size));
    let bg_pad = layer.has_background.then(|| background_padding_px(layer, cw));
    let reach = effects_reach(layer, stroke_px, shadow, cw);
    let bold_px = if styled.synthetic_bold { text::bold_offset(font_size) } else { 0.0 };
    let sharp_shadow = shadow.filter(|s| s.sigma <= MAX_DIRECT_SIGMA);

    // Stroke, bold and a sharp shadow read coverage from outside the window.
    // Bold only smears rightwards, so it only widens the left edge.
    let reads = (stroke_px * 0.5).max(sharp_shadow.map_or(0.0, |s| s.reach())) + 2.0;
    let grown = window.map(|w| {
        Rect::new(
            Point::new(w.min.x - reads - bold_px, w.min.y - reads),
            Point::new(w.max.x + reads, w.max.y + reads),
        )
    });
    let fill = text::rasterize_window(styled, &mark.content, font_size, reach, grown.as_ref());
    let mut pixels = RgbaImage::new(fill.width, fill.height);
    if fill.width == 0 || fill.height == 0 {
        return Sprite { pixels, origin_x: 0.0, origin_y: 0.0 };
    }

    if let Some(pad) = bg_pad {
        let width = text::measure(styled.face, &mark.content, font_size).width;
        paint_rect(
            &mut pixels,
            fill.origin_x,
            fill.origin_y,
            width * 0.5 + pad,
            font_size * 0.5 + pad,
            layer.background_color,
        );
    }
    if let Some(shadow) = shadow {
        let map = if shadow.sigma <= MAX_DIRECT_SIGMA {
            ShadowMap::blurred(&fill, shadow.sigma, 1.0)
        } else {
            // Wide shadows are rasterized and blurred at reduced resolution.
            let factor = (shadow.sigma / MAX_DIRECT_SIGMA).ceil();
            let low_window = window.map(|w| w.expand(shadow.reach() + bold_px + 2.0).scale(1.0 / factor));
            let low = text::rasterize_window(styled, &mark.content, font_size / factor, reach / factor, low_window.as_ref());
            ShadowMap::blurred(&low, shadow.sigma / factor, factor)
        };
        paint_shadow(&mut pixels, fill.origin_x, fill.origin_y, &map, shadow.offset);
    }
    if stroke_px > 0.0 {
        paint_coverage(&mut pixels, &fill.dilate(stroke_px * 0.5), mark.stroke_color);
    }
    paint_coverage(&mut pixels, &fill, mark.color);

    Sprite { pixels, origin_x: fill.origin_x, origin_y: fill.origin_y }
}

/// Full local pixel grid of a logo layer: the scaled logo centred on the
/// origin plus room for shadow and background.
pub fn logo_frame(layer: &Layer, content_w: f32, content_h: f32, canvas_w: u32) -> RasterFrame {
    let target_w = content_w.round().max(1.0) as u32;
    let target_h = content_h.round().max(1.0) as u32;
    let shadow = layer.shadow_active().then_some(Shadow::LOGO);
    let margin = effects_reach(layer, 0.0, shadow, canvas_w as f32).ceil() as u32;
    RasterFrame {
        width: target_w + margin * 2,
        height: target_h + margin * 2,
        origin_x: margin as f32 + target_w as f32 * 0.5,
        origin_y: margin as f32 + target_h as f32 * 0.5,
    }
}

/// Logo scaled to `content_w × content_h`, centred on the local origin.
/// Small logos are resized whole; once the scaled logo outgrows its window
/// the source bitmap is sampled directly for the window's pixels only.
pub fn logo_sprite(
    layer: &Layer,
    logo: &LogoAsset,
    content_w: f32,
    content_h: f32,
    canvas_w: u32,
    window: Option<&Rect>,
) -> Sprite {
    let target_w = content_w.round().max(1.0) as u32;
    let target_h = content_h.round().max(1.0) as u32;
    let full = logo_frame(layer, content_w, content_h, canvas_w);
    let margin = ((full.width - target_w) / 2) as i64;
    let shadow = layer.shadow_active().then_some(Shadow::LOGO);
    let grid = match window {
        Some(w) => match full.clip(&w.expand(shadow.map_or(0.0, |s| s.reach()) + 2.0)) {
            Some(g) => g,
            None => return Sprite { pixels: RgbaImage::new(0, 0), origin_x: 0.0, origin_y: 0.0 },
        },
        None => full,
    };
    let (off_x, off_y) = full.offset_of(&grid);
    // Top-left of the scaled logo inside this grid.
    let logo_x = margin - off_x as i64;
    let logo_y = margin - off_y as i64;

    let mut scaled = RgbaImage::new(grid.width, grid.height);
    if (target_w as f32) * (target_h as f32) <= (grid.width as f32) * (grid.height as f32) {
        let whole = imageops::resize(logo.pixels(), target_w, target_h, FilterType::Triangle);
        imageops::replace(&mut scaled, &whole, logo_x, logo_y);
    } else {
        let sx = logo.width() as f32 / target_w as f32;
        let sy = logo.height() as f32 / target_h as f32;
        for (x, y, p) in scaled.enumerate_pixels_mut() {
            let tx = x as i64 - logo_x;
            let ty = y as i64 - logo_y;
            if tx < 0 || ty < 0 || tx >= target_w as i64 || ty >= target_h as i64 {
                continue;
            }
            let u = (tx as f32 + 0.5) * sx - 0.5;
            let v = (ty as f32 + 0.5) * sy - 0.5;
            let u = u.clamp(0.0, logo.width().saturating_sub(1) as f32);
            let v = v.clamp(0.0, logo.height().saturating_sub(1) as f32);
            if let Some(texel) = sample_bilinear(logo.pixels(), u, v) {
                *p = texel;
            }
        }
    }

    let mut pixels = RgbaImage::new(grid.width, grid.height);
    if layer.has_background {
        let pad = background_padding_px(layer, canvas_w as f32);
        paint_rect(
            &mut pixels,
            grid.origin_x,
            grid.origin_y,
            target_w as f32 * 0.5 + pad,
            target_h as f32 * 0.5 + pad,
            layer.background_color,
        );
    }
    if let Some(shadow) = shadow {
        let mut silhouette = CoverageMask::new(grid.width, grid.height, grid.origin_x, grid.origin_y);
        for (c, p) in silhouette.data.iter_mut().zip(scaled.pixels()) {
            *c = p[3] as f32 / 255.0;
        }
        let map = ShadowMap::blurred(&silhouette, shadow.sigma, 1.0);
        paint_shadow(&mut pixels, grid.origin_x, grid.origin_y, &map, shadow.offset);
    }
    for (dst, src) in pixels.pixels_mut().zip(scaled.pixels()) {
        if src[3] > 0 {
            *dst = blend_pixel(*dst, *src, BlendMode::Normal, 1.0);
        }
    }

    Sprite { pixels, origin_x: grid.origin_x, origin_y: grid.origin_y }
}

// ---------------------------------------------------------------------------
//  Paint helpers (all composite with Normal inside the sprite)
// ---------------------------------------------------------------------------

/// Fill the axis-aligned local box `[-hw, hw] × [-hh, hh]`.
fn paint_rect(pixels: &mut RgbaImage, origin_x: f32, origin_y: f32, hw: f32, hh: f32, color: Color) {
    let top = color.to_rgba();
    for (x, y, p) in pixels.enumerate_pixels_mut() {
        let lx = x as f32 + 0.5 - origin_x;
        let ly = y as f32 + 0.5 - origin_y;
        if lx.abs() <= hw && ly.abs() <= hh {
            *p = blend_pixel(*p, top, BlendMode::Normal, 1.0);
        }
    }
}

fn paint_coverage(pixels: &mut RgbaImage, cov: &CoverageMask, color: Color) {
    let [r, g, b, a] = color.0;
    for (x, y, p) in pixels.enumerate_pixels_mut() {
        let c = cov.get(x as i32, y as i32);
        if c <= 0.0 {
            continue;
        }
        let alpha = (a as f32 * c).round().clamp(0.0, 255.0) as u8;
        *p = blend_pixel(*p, Rgba([r, g, b, alpha]), BlendMode::Normal, 1.0);
    }
}

fn coverage_to_gray(cov: &CoverageMask) -> GrayImage {
    GrayImage::from_fn(cov.width, cov.height, |x, y| {
        Luma([(cov.get(x as i32, y as i32) * 255.0).round().clamp(0.0, 255.0) as u8])
    })
}

/// A blurred silhouette on its own pixel grid in a layer's local frame. Each
/// grid pixel spans `scale` local pixels.
struct ShadowMap {
    blurred: GrayImage,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl ShadowMap {
    fn blurred(cov: &CoverageMask, sigma: f32, scale: f32) -> Self {
        let gray = coverage_to_gray(cov);
        let blurred = if gray.width() == 0 || gray.height() == 0 { gray } else { imageops::blur(&gray, sigma) };
        Self { blurred, origin_x: cov.origin_x, origin_y: cov.origin_y, scale }
    }

    /// Bilinear sample at a local point; zero outside the grid.
    fn at(&self, lx: f32, ly: f32) -> f32 {
        let gx = lx / self.scale + self.origin_x - 0.5;
        let gy = ly / self.scale + self.origin_y - 0.5;
        let (x0, y0) = (gx.floor(), gy.floor());
        let (fx, fy) = (gx - x0, gy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        let (w, h) = (self.blurred.width() as i64, self.blurred.height() as i64);
        let texel = |x: i64, y: i64| {
            if x < 0 || y < 0 || x >= w || y >= h {
                0.0
            } else {
                self.blurred.get_pixel(x as u32, y as u32)[0] as f32
            }
        };
        texel(x0, y0) * (1.0 - fx) * (1.0 - fy)
            + texel(x0 + 1, y0) * fx * (1.0 - fy)
            + texel(x0, y0 + 1) * (1.0 - fx) * fy
            + texel(x0 + 1, y0 + 1) * fx * fy
    }
}

/// Shift a blurred silhouette down-right and lay it under what follows.
fn paint_shadow(pixels: &mut RgbaImage, origin_x: f32, origin_y: f32, map: &ShadowMap, offset: f32) {
    // Full-resolution maps shift by whole pixels.
    let off = if map.scale == 1.0 { offset.round() } else { offset };
    for (x, y, p) in pixels.enumerate_pixels_mut() {
        let v = map.at(x as f32 + 0.5 - origin_x - off, y as f32 + 0.5 - origin_y - off);
        if v < 0.5 {
            continue;
        }
        let alpha = (v * SHADOW_ALPHA).round().clamp(0.0, 255.0) as u8;
        *p = blend_pixel(*p, Rgba([0, 0, 0, alpha]), BlendMode::Normal, 1.0);
    }
}
