// ============================================================================
// RENDER MODULE: software compositor for the watermark layer stack
// ============================================================================
//
// Architecture:
//   sprite.rs  rasterizes one layer's content (background, shadow, stroke,
//              fill or scaled logo) in its local frame
//   blit.rs    inverse-mapped affine blit of a sprite with blend + opacity
//   overlay.rs dashed selection box and rotate/resize handles (preview only)
//
// Every call to `Compositor::render` redraws from the base image; nothing is
// cached between calls, so identical inputs give byte-identical output.
// Sprites only cover the part of a layer that reaches the canvas, so a mark
// many times larger than the image costs about as much as one that fits.
// ============================================================================

pub mod blit;
pub mod overlay;
pub mod sprite;

use image::RgbaImage;

use crate::assets::AssetLibrary;
use crate::geometry::{Affine, Point, RasterFrame, Rect, TransformStack};
use crate::hit::{self, LayerBounds};
use crate::layer::{Layer, LayerId, LayerKind};
use crate::text::{self, FontBook};

use sprite::Sprite;

/// Tile spacing never drops below this many canvas pixels.
pub const MIN_TILE_GAP: f32 = 2.0;

/// A layer drawn as one shared sprite may cover at most this many canvases'
/// worth of pixels.
const SHARED_SPRITE_CANVASES: f32 = 4.0;

/// Brick-offset tiling lattice for one layer on one canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGrid {
    pub gap_x: f32,
    pub gap_y: f32,
    /// Overscan past every canvas edge so rotated tiles reach the corners.
    pub buffer: f32,
}

impl TileGrid {
    /// `gap = content × 1.2 + canvas_w × density / 300` on each axis.
    pub fn new(content_w: f32, content_h: f32, tile_density: f32, canvas_w: u32, canvas_h: u32) -> Self {
        let extra = canvas_w as f32 * tile_density.max(0.0) / 300.0;
        Self {
            gap_x: (content_w * 1.2 + extra).max(MIN_TILE_GAP),
            gap_y: (content_h * 1.2 + extra).max(MIN_TILE_GAP),
            buffer: canvas_w.max(canvas_h) as f32,
        }
    }

    /// Whether the row at `y` is shifted right by half a gap.
    pub fn row_is_offset(&self, y: f32) -> bool {
        (y / self.gap_y).floor() as i64 % 2 != 0
    }

    /// Tile centres covering `[-buffer, canvas + buffer]` on both axes,
    /// including the half-gap brick shift.
    pub fn centers(&self, canvas_w: u32, canvas_h: u32) -> Vec<Point> {
        let end_x = canvas_w as f32 + self.buffer + self.gap_x;
        let end_y = canvas_h as f32 + self.buffer + self.gap_y;
        let mut out = Vec::new();
        let mut col = 0u32;
        loop {
            let x = -self.buffer + col as f32 * self.gap_x;
            if x >= end_x {
                break;
            }
            let mut row = 0u32;
            loop {
                let y = -self.buffer + row as f32 * self.gap_y;
                if y >= end_y {
                    break;
                }
                let shift = if self.row_is_offset(y) { self.gap_x * 0.5 } else { 0.0 };
                out.push(Point::new(x + shift, y));
                row += 1;
            }
            col += 1;
        }
        out
    }
}

/// Renders layer stacks onto base images.
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    fonts: FontBook,
}

impl Compositor {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    /// Built-in block font only; used by tests and when no system font exists.
    pub fn builtin() -> Self {
        Self::new(FontBook::builtin())
    }

    /// System sans-serif family with block-font fallback.
    pub fn with_system_fonts() -> Self {
        Self::new(FontBook::system())
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Unpadded content box of a layer on a canvas `canvas_w` wide.
    /// `None` when a logo layer's asset is missing or degenerate.
    pub fn content_size(&self, layer: &Layer, assets: &AssetLibrary, canvas_w: u32) -> Option<(f32, f32)> {
        let target = layer.size / 1000.0 * canvas_w as f32;
        match &layer.kind {
            LayerKind::Text(mark) => {
                let styled = self.fonts.face(mark.bold, mark.italic);
                Some((text::measure(styled.face, &mark.content, target).width, target))
            }
            LayerKind::Image { asset } => {
                let aspect = assets.get(*asset)?.aspect()?;
                Some((target, target * aspect))
            }
        }
    }

    /// Composite every visible layer, bottom to top, over a copy of `base`.
    /// When `highlight` names a visible, non-tiled layer its selection box and
    /// handles are drawn last.
    pub fn render(
        &self,
        base: &RgbaImage,
        layers: &[Layer],
        assets: &AssetLibrary,
        highlight: Option<LayerId>,
    ) -> RgbaImage {
        let mut out = base.clone();
        if out.width() == 0 || out.height() == 0 {
            return out;
        }
        for layer in layers.iter().filter(|l| l.visible) {
            self.draw_layer(&mut out, layer, assets);
        }
        if let Some(id) = highlight
            && let Some(layer) = layers.iter().find(|l| l.id == id && l.visible)
            && let Some(bounds) = self.bounds(layer, assets, out.width(), out.height())
        {
            overlay::draw_highlight(&mut out, &bounds);
        }
        out
    }

    fn bounds(&self, layer: &Layer, assets: &AssetLibrary, w: u32, h: u32) -> Option<LayerBounds> {
        hit::layer_bounds(self, layer, assets, w, h)
    }

    /// Full local pixel grid of a layer's sprite. `None` when a logo layer's
    /// asset is missing or degenerate.
    fn frame(&self, layer: &Layer, assets: &AssetLibrary, canvas_w: u32) -> Option<RasterFrame> {
        match &layer.kind {
            LayerKind::Text(mark) => Some(sprite::text_frame(&self.fonts, layer, mark, canvas_w)),
            LayerKind::Image { .. } => {
                let (content_w, content_h) = self.content_size(layer, assets, canvas_w)?;
                Some(sprite::logo_frame(layer, content_w, content_h, canvas_w))
            }
        }
    }

    fn draw_layer(&self, dst: &mut RgbaImage, layer: &Layer, assets: &AssetLibrary) {
        let (canvas_w, canvas_h) = dst.dimensions();
        let Some(extent) = self.frame(layer, assets, canvas_w).map(|f| f.local_rect()) else {
            return;
        };

        // Every placement of the layer, paired with the part of its local
        // frame that lands on the canvas.
        let mut ts = TransformStack::new();
        let mut placements: Vec<(Affine, Rect)> = Vec::new();
        let mut place = |ts: &mut TransformStack, center: Point| {
            ts.save();
            ts.translate(center.x, center.y);
            ts.rotate_degrees(layer.rotation);
            let to_canvas = ts.current();
            if let Some(window) = visible_window(to_canvas, canvas_w, canvas_h).intersect(&extent) {
                placements.push((to_canvas, window));
            }
            ts.restore();
        };
        if layer.tiled {
            let Some((content_w, content_h)) = self.content_size(layer, assets, canvas_w) else {
                return;
            };
            let grid = TileGrid::new(content_w, content_h, layer.tile_density, canvas_w, canvas_h);
            for center in grid.centers(canvas_w, canvas_h) {
                place(&mut ts, center);
            }
        } else {
            place(&mut ts, hit::layer_center(layer, canvas_w, canvas_h));
        }
        let Some(shared) = placements.iter().map(|(_, w)| *w).reduce(|a, b| a.union(&b)) else {
            return;
        };

        // Small marks are drawn once and stamped at every placement; marks
        // larger than the canvas are drawn per placement, window by window.
        let budget = SHARED_SPRITE_CANVASES * canvas_w as f32 * canvas_h as f32;
        if shared.area() <= budget {
            let Some(sprite) = self.sprite(layer, assets, canvas_w, &shared) else {
                return;
            };
            if sprite.is_empty() {
                return;
            }
            for (to_canvas, _) in &placements {
                blit::blit(dst, &sprite, *to_canvas, layer.blend_mode, layer.opacity);
            }
        } else {
            for (to_canvas, window) in &placements {
                if let Some(sprite) = self.sprite(layer, assets, canvas_w, window)
                    && !sprite.is_empty()
                {
                    blit::blit(dst, &sprite, *to_canvas, layer.blend_mode, layer.opacity);
                }
            }
        }
    }

    fn sprite(&self, layer: &Layer, assets: &AssetLibrary, canvas_w: u32, window: &Rect) -> Option<Sprite> {
        match &layer.kind {
            LayerKind::Text(mark) => Some(sprite::text_sprite(&self.fonts, layer, mark, canvas_w, Some(window))),
            LayerKind::Image { asset } => {
                let logo = assets.get(*asset)?;
                let (content_w, content_h) = self.content_size(layer, assets, canvas_w)?;
                Some(sprite::logo_sprite(layer, logo, content_w, content_h, canvas_w, Some(window)))
            }
        }
    }
}

/// Local-frame bounding box of the canvas seen through `to_canvas`.
fn visible_window(to_canvas: Affine, canvas_w: u32, canvas_h: u32) -> Rect {
    let inv = to_canvas.invert();
    let (w, h) = (canvas_w as f32, canvas_h as f32);
    Rect::bounding(&[
        inv.apply(Point::new(0.0, 0.0)),
        inv.apply(Point::new(w, 0.0)),
        inv.apply(Point::new(w, h)),
        inv.apply(Point::new(0.0, h)),
    ])
}
