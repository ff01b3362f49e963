// ============================================================================
// TEXT: font lookup, measurement and coverage rasterization for text marks
// ============================================================================

use ab_glyph::{point, Font, FontArc, GlyphId, OutlineCurve, ScaleFont};

use crate::geometry::{distance, Point, RasterFrame, Rect};

/// Horizontal shear applied to synthetic italics (x shift per unit of height).
const ITALIC_SHEAR: f32 = 0.2;

/// Single-channel coverage in [0, 1], positioned in a mark's local frame.
///
/// Pixel `(i, j)` covers local `x ∈ [i - origin_x, i + 1 - origin_x)` and the
/// same for `y`. Local `(0, 0)` is the centre of the text run.
#[derive(Clone, Debug, Default)]
pub struct CoverageMask {
    pub width: u32,
    pub height: u32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub data: Vec<f32>,
}

impl CoverageMask {
    pub fn new(width: u32, height: u32, origin_x: f32, origin_y: f32) -> Self {
        Self {
            width,
            height,
            origin_x,
            origin_y,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&c| c <= 0.0)
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0.0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    fn max_at(&mut self, x: i32, y: i32, v: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = self.data[idx].max(v);
    }

    /// Grow coverage outward by `radius` pixels (disc max-filter). Used for
    /// text strokes, which straddle the glyph outline.
    pub fn dilate(&self, radius: f32) -> CoverageMask {
        if radius <= 0.0 {
            return self.clone();
        }
        let r = radius.ceil() as i32;
        let mut out = CoverageMask::new(self.width, self.height, self.origin_x, self.origin_y);
        let offsets: Vec<(i32, i32, f32)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter_map(|(dx, dy)| {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                // Soft edge on the outermost ring.
                let w = (radius + 0.5 - d).clamp(0.0, 1.0);
                (w > 0.0).then_some((dx, dy, w))
            })
            .collect();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let mut best = 0.0f32;
                for &(dx, dy, w) in &offsets {
                    let c = self.get(x + dx, y + dy) * w;
                    if c > best {
                        best = c;
                        if best >= 1.0 {
                            break;
                        }
                    }
                }
                out.data[y as usize * self.width as usize + x as usize] = best;
            }
        }
        out
    }
}

/// Width and vertical extents of a laid-out text run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextMetrics {
    /// Advance width of the whole run.
    pub width: f32,
    /// Distance from baseline to the top of the em box (positive).
    pub ascent: f32,
    /// Distance from baseline to the bottom of the em box (negative).
    pub descent: f32,
}

impl TextMetrics {
    /// Baseline offset that puts the middle of the em box at local y = 0.
    pub fn middle_baseline(&self) -> f32 {
        (self.ascent + self.descent) * 0.5
    }
}

// ---------------------------------------------------------------------------
//  Font faces
// ---------------------------------------------------------------------------

/// A font the text rasterizer can draw with.
#[derive(Clone, Debug)]
pub enum FontFace {
    /// A scalable outline font (TrueType / OpenType).
    Outline(FontArc),
    /// The built-in 5×7 block font; always available.
    Block,
}

/// A resolved face plus the styles that still need to be synthesized.
#[derive(Clone, Copy, Debug)]
pub struct StyledFace<'a> {
    pub face: &'a FontFace,
    pub synthetic_bold: bool,
    pub synthetic_italic: bool,
}

/// The four style slots of the sans-serif family used for text marks.
#[derive(Clone, Debug)]
pub struct FontBook {
    regular: FontFace,
    bold: Option<FontFace>,
    italic: Option<FontFace>,
    bold_italic: Option<FontFace>,
}

impl Default for FontBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontBook {
    /// Block font only. Deterministic across machines.
    pub fn builtin() -> Self {
        Self { regular: FontFace::Block, bold: None, italic: None, bold_italic: None }
    }

    /// Use one outline font for every style (bold/italic synthesized).
    pub fn from_font(font: FontArc) -> Self {
        Self { regular: FontFace::Outline(font), bold: None, italic: None, bold_italic: None }
    }

    /// Parse raw TrueType/OpenType bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        FontArc::try_from_vec(bytes).ok().map(Self::from_font)
    }

    /// Look up a sans-serif family on the system, falling back to the block
    /// font when nothing can be loaded.
    pub fn system() -> Self {
        const FAMILIES: &[&str] = &["Arial", "Helvetica", "DejaVu Sans", "Liberation Sans", "Noto Sans"];
        for family in FAMILIES {
            if let Some(regular) = load_system_font(family, 400, false) {
                return Self {
                    regular: FontFace::Outline(regular),
                    bold: load_system_font(family, 700, false).map(FontFace::Outline),
                    italic: load_system_font(family, 400, true).map(FontFace::Outline),
                    bold_italic: load_system_font(family, 700, true).map(FontFace::Outline),
                };
            }
        }
        if let Some(font) = load_generic_sans() {
            return Self::from_font(font);
        }
        log_warn!("No system sans-serif font found; using the built-in block font");
        Self::builtin()
    }

    pub fn face(&self, bold: bool, italic: bool) -> StyledFace<'_> {
        let slot = match (bold, italic) {
            (false, false) => None,
            (true, false) => self.bold.as_ref(),
            (false, true) => self.italic.as_ref(),
            (true, true) => self.bold_italic.as_ref(),
        };
        match slot {
            Some(face) => StyledFace { face, synthetic_bold: false, synthetic_italic: false },
            None => StyledFace { face: &self.regular, synthetic_bold: bold, synthetic_italic: italic },
        }
    }
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (400 = Regular, 700 = Bold).
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }
    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::Title(family.to_string())], &props)
        .ok()?;
    let font = handle.load().ok()?;
    // Best-match may silently substitute the style; only accept an exact one.
    let loaded = font.properties();
    if italic && loaded.style == Style::Normal {
        return None;
    }
    if weight >= 600 && loaded.weight.0 < 600.0 {
        return None;
    }
    let bytes: Vec<u8> = (*font.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

fn load_generic_sans() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(&[FamilyName::SansSerif], &Properties::new())
        .ok()?;
    let bytes: Vec<u8> = (*handle.load().ok()?.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

// ---------------------------------------------------------------------------
//  Measurement
// ---------------------------------------------------------------------------

/// Measure a single-line run at `font_size` pixels.
pub fn measure(face: &FontFace, text: &str, font_size: f32) -> TextMetrics {
    match face {
        FontFace::Outline(font) => {
            let scaled = font.as_scaled(font_size);
            TextMetrics {
                width: outline_layout(font, text, font_size).1,
                ascent: scaled.ascent(),
                descent: scaled.descent(),
            }
        }
        FontFace::Block => {
            let cell = font_size / block::EM_CELLS;
            TextMetrics {
                width: block::run_cells(text) * cell,
                ascent: block::ASCENT_CELLS * cell,
                descent: -block::DESCENT_CELLS * cell,
            }
        }
    }
}

/// Lay out glyphs left-aligned at x = 0 on baseline y = 0.
/// Returns `(glyphs, total_advance)`.
fn outline_layout(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;
    for ch in text.chars().filter(|c| !c.is_control()) {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

// ---------------------------------------------------------------------------
//  Rasterization
// ---------------------------------------------------------------------------

/// Glyphs with more pixels than this are filled by scanline sampling over the
/// visible window instead of being rasterized whole.
const MAX_DIRECT_GLYPH_PIXELS: f32 = 4_000_000.0;

/// Full pixel grid of a run centred on the local origin, with `pad` extra
/// pixels of empty border on every side.
pub fn frame(styled: StyledFace<'_>, text: &str, font_size: f32, pad: f32) -> RasterFrame {
    let metrics = measure(styled.face, text, font_size);
    let baseline = metrics.middle_baseline();
    let start_x = -metrics.width * 0.5;

    // Ink bounds are conservatively the em box; the shear of a synthetic
    // italic can push ink past it horizontally.
    let shear_extra = if styled.synthetic_italic { italic_extent(&metrics) } else { 0.0 };
    let bold_extra = if styled.synthetic_bold { bold_offset(font_size) } else { 0.0 };
    let overhang = font_size * 0.25;
    let min_x = start_x - overhang - shear_extra - pad;
    let max_x = start_x + metrics.width + overhang + shear_extra + bold_extra + pad;
    let min_y = baseline - metrics.ascent - overhang - pad;
    let max_y = baseline - metrics.descent + overhang + pad;

    let origin_x = (-min_x).ceil();
    let origin_y = (-min_y).ceil();
    RasterFrame {
        width: (origin_x + max_x).ceil().max(1.0) as u32,
        height: (origin_y + max_y).ceil().max(1.0) as u32,
        origin_x,
        origin_y,
    }
}

fn italic_extent(metrics: &TextMetrics) -> f32 {
    (metrics.ascent - metrics.descent) * ITALIC_SHEAR
}

/// Rasterize a run centred on the local origin (centre alignment, middle
/// baseline). `pad` extra pixels of empty border are reserved on every side.
pub fn rasterize(styled: StyledFace<'_>, text: &str, font_size: f32, pad: f32) -> CoverageMask {
    rasterize_window(styled, text, font_size, pad, None)
}

/// Like [`rasterize`], but only the pixels of the full grid that overlap
/// `window` (local coordinates) are produced. Pixels inside the window come
/// out exactly as the full raster has them, except near the window edge when
/// synthetic bold is on, so callers widen the window by [`bold_offset`].
pub fn rasterize_window(
    styled: StyledFace<'_>,
    text: &str,
    font_size: f32,
    pad: f32,
    window: Option<&Rect>,
) -> CoverageMask {
    if font_size <= 0.0 || !font_size.is_finite() {
        return CoverageMask::default();
    }
    // An empty run still yields a (blank) mask so backgrounds have a frame.
    let full = frame(styled, text, font_size, pad);
    let grid = match window {
        Some(w) => match full.clip(w) {
            Some(g) => g,
            None => return CoverageMask::default(),
        },
        None => full,
    };
    let mut mask = CoverageMask::new(grid.width, grid.height, grid.origin_x, grid.origin_y);
    let metrics = measure(styled.face, text, font_size);
    let baseline = metrics.middle_baseline();
    let start_x = -metrics.width * 0.5;
    let shear = styled.synthetic_italic.then_some(baseline);

    match styled.face {
        FontFace::Outline(font) => {
            let visible = grid.local_rect();
            let slack = italic_extent(&metrics);
            let (glyphs, _) = outline_layout(font, text, font_size);
            for (glyph_id, gx) in glyphs {
                let position = point(start_x + gx, baseline);
                let glyph = glyph_id.with_scale_and_position(font_size, position);
                let Some(outlined) = font.outline_glyph(glyph) else {
                    continue;
                };
                let b = outlined.px_bounds();
                let ink = Rect::new(Point::new(b.min.x - slack, b.min.y), Point::new(b.max.x + slack, b.max.y));
                if ink.intersect(&visible).is_none() {
                    continue;
                }
                if b.width() * b.height() > MAX_DIRECT_GLYPH_PIXELS {
                    fill_outline_sampled(&mut mask, font, glyph_id, font_size, Point::new(position.x, position.y), shear);
                    continue;
                }
                let (origin_x, origin_y) = (mask.origin_x, mask.origin_y);
                outlined.draw(|px, py, cov| {
                    let mut lx = b.min.x + px as f32;
                    let ly = b.min.y + py as f32;
                    if styled.synthetic_italic {
                        lx += (baseline - (ly + 0.5)) * ITALIC_SHEAR;
                    }
                    let ix = (lx + origin_x).round() as i32;
                    let iy = (ly + origin_y).round() as i32;
                    mask.max_at(ix, iy, cov);
                });
            }
        }
        FontFace::Block => {
            let cell = font_size / block::EM_CELLS;
            const SS: usize = 4;
            let (width, height) = (mask.width, mask.height);
            for iy in 0..height {
                for ix in 0..width {
                    let mut hits = 0usize;
                    for sy in 0..SS {
                        for sx in 0..SS {
                            let mut lx = ix as f32 + (sx as f32 + 0.5) / SS as f32 - mask.origin_x;
                            let ly = iy as f32 + (sy as f32 + 0.5) / SS as f32 - mask.origin_y;
                            if styled.synthetic_italic {
                                lx -= (baseline - ly) * ITALIC_SHEAR;
                            }
                            // Cell coordinates relative to the top-left of the run.
                            let cx = (lx - start_x) / cell;
                            let cy = (ly - (baseline - metrics.ascent)) / cell;
                            if block::ink_at(text, cx, cy) {
                                hits += 1;
                            }
                        }
                    }
                    if hits > 0 {
                        mask.data[(iy * width + ix) as usize] = hits as f32 / (SS * SS) as f32;
                    }
                }
            }
        }
    }

    if styled.synthetic_bold {
        embolden(&mut mask, bold_offset(font_size));
    }
    mask
}

/// Nonzero-winding fill of one glyph outline over the mask's own pixels,
/// 4×4 samples per pixel. `shear` carries the baseline of a synthetic italic.
fn fill_outline_sampled(
    mask: &mut CoverageMask,
    font: &FontArc,
    glyph_id: GlyphId,
    font_size: f32,
    position: Point,
    shear: Option<f32>,
) {
    const SS: usize = 4;
    let Some(outline) = font.outline(glyph_id) else {
        return;
    };
    let scaled = font.as_scaled(font_size);
    let (hs, vs) = (scaled.h_scale_factor(), scaled.v_scale_factor());
    let to_local = |p: ab_glyph::Point| Point::new(position.x + p.x * hs, position.y - p.y * vs);

    let mut edges: Vec<(Point, Point)> = Vec::new();
    for curve in &outline.curves {
        match *curve {
            OutlineCurve::Line(a, b) => edges.push((to_local(a), to_local(b))),
            OutlineCurve::Quad(a, c, b) => {
                let (a, c, b) = (to_local(a), to_local(c), to_local(b));
                flatten(&mut edges, a, b, distance(a, c) + distance(c, b), |t| {
                    let u = 1.0 - t;
                    Point::new(
                        u * u * a.x + 2.0 * u * t * c.x + t * t * b.x,
                        u * u * a.y + 2.0 * u * t * c.y + t * t * b.y,
                    )
                });
            }
            OutlineCurve::Cubic(a, c1, c2, b) => {
                let (a, c1, c2, b) = (to_local(a), to_local(c1), to_local(c2), to_local(b));
                let hull = distance(a, c1) + distance(c1, c2) + distance(c2, b);
                flatten(&mut edges, a, b, hull, |t| {
                    let u = 1.0 - t;
                    let (w0, w1, w2, w3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
                    Point::new(
                        w0 * a.x + w1 * c1.x + w2 * c2.x + w3 * b.x,
                        w0 * a.y + w1 * c1.y + w2 * c2.y + w3 * b.y,
                    )
                });
            }
        }
    }

    let (width, height) = (mask.width as usize, mask.height as usize);
    let samples_per_row = (width * SS) as f32;
    let mut hits = vec![0u16; width * height];
    let mut crossings: Vec<(f32, i32)> = Vec::new();
    for iy in 0..height {
        for sy in 0..SS {
            let ly = iy as f32 + (sy as f32 + 0.5) / SS as f32 - mask.origin_y;
            crossings.clear();
            for (a, b) in &edges {
                if (a.y <= ly) == (b.y <= ly) {
                    continue;
                }
                let t = (ly - a.y) / (b.y - a.y);
                crossings.push((a.x + t * (b.x - a.x), if b.y > a.y { 1 } else { -1 }));
            }
            crossings.sort_by(|p, q| p.0.total_cmp(&q.0));
            let shift = shear.map_or(0.0, |baseline| (baseline - ly) * ITALIC_SHEAR);

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                // Sample k sits at local x = (k + 0.5) / SS - origin_x.
                let first = ((pair[0].0 + shift + mask.origin_x) * SS as f32 - 0.5).ceil().clamp(0.0, samples_per_row);
                let last = ((pair[1].0 + shift + mask.origin_x) * SS as f32 - 0.5).ceil().clamp(0.0, samples_per_row);
                for k in first as usize..last as usize {
                    hits[iy * width + k / SS] += 1;
                }
            }
        }
    }

    let full = (SS * SS) as f32;
    for (i, &n) in hits.iter().enumerate() {
        if n > 0 {
            mask.data[i] = mask.data[i].max(n as f32 / full);
        }
    }
}

/// Append the polyline approximation of a curve from `a` to `b`.
fn flatten(edges: &mut Vec<(Point, Point)>, a: Point, b: Point, hull: f32, at: impl Fn(f32) -> Point) {
    let steps = (hull / 8.0).ceil().clamp(2.0, 256.0) as usize;
    let mut prev = a;
    for i in 1..steps {
        let next = at(i as f32 / steps as f32);
        edges.push((prev, next));
        prev = next;
    }
    edges.push((prev, b));
}

/// Horizontal smear applied by synthetic bold, in pixels.
pub fn bold_offset(font_size: f32) -> f32 {
    (font_size * 0.04).max(1.0)
}

/// Smear coverage rightwards by `offset` pixels: each pixel takes the maximum
/// of itself and the `offset` pixels to its left. Runs in `O(n log offset)`
/// by doubling the window.
fn embolden(mask: &mut CoverageMask, offset: f32) {
    let w = mask.width as usize;
    if w == 0 {
        return;
    }
    let span = offset.round().max(1.0) as usize + 1;
    let mut cur = vec![0.0f32; w];
    let mut prev = vec![0.0f32; w];
    for row in mask.data.chunks_mut(w) {
        cur.copy_from_slice(row);
        let mut len = 1;
        while len * 2 <= span {
            prev.copy_from_slice(&cur);
            for x in len..w {
                cur[x] = prev[x].max(prev[x - len]);
            }
            len *= 2;
        }
        let rest = span - len;
        for x in 0..w {
            row[x] = if rest > 0 && x >= rest { cur[x].max(cur[x - rest]) } else { cur[x] };
        }
    }
}

// ---------------------------------------------------------------------------
//  Built-in block font
// ---------------------------------------------------------------------------

mod block {
    /// Em box height in cells: 7 glyph rows above the baseline, 1 below.
    pub const EM_CELLS: f32 = 8.0;
    pub const ASCENT_CELLS: f32 = 7.0;
    pub const DESCENT_CELLS: f32 = 1.0;
    const ADVANCE: f32 = 6.0;
    const COLS: usize = 5;
    const ROWS: usize = 7;

    /// Width of a run in cells. The final glyph carries no trailing gap.
    pub fn run_cells(text: &str) -> f32 {
        let n = text.chars().filter(|c| !c.is_control()).count();
        if n == 0 { 0.0 } else { n as f32 * ADVANCE - 1.0 }
    }

    /// Whether cell-space point `(cx, cy)` (origin at the top-left of the
    /// run, rows grow down) is inked.
    pub fn ink_at(text: &str, cx: f32, cy: f32) -> bool {
        if cx < 0.0 || cy < 0.0 || cy >= ROWS as f32 {
            return false;
        }
        let slot = (cx / ADVANCE).floor() as usize;
        let col = (cx - slot as f32 * ADVANCE).floor() as usize;
        if col >= COLS {
            return false;
        }
        let Some(ch) = text.chars().filter(|c| !c.is_control()).nth(slot) else {
            return false;
        };
        let row = cy.floor() as usize;
        glyph(ch)[row] & (1 << (COLS - 1 - col)) != 0
    }

    fn glyph(ch: char) -> [u8; 7] {
        match ch.to_ascii_uppercase() {
            ' ' => [0; 7],
            'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
            'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
            'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
            'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
            'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
            'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
            'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
            'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
            'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
            'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
            'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
            'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
            'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
            'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
            'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
            'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
            'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
            'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
            'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
            'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
            'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
            'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
            'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
            'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
            'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
            'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
            '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
            '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
            '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
            '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
            '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
            '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
            '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
            '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
            '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
            '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
            '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
            '"' => [0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
            '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
            '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
            '&' => [0x0C, 0x12, 0x14, 0x08, 0x15, 0x12, 0x0D],
            '\'' => [0x04, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00],
            '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
            ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
            '*' => [0x00, 0x04, 0x15, 0x0E, 0x15, 0x04, 0x00],
            '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
            ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
            '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
            '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
            '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
            ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
            ';' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x04, 0x08],
            '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
            '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
            '@' => [0x0E, 0x11, 0x01, 0x0D, 0x15, 0x15, 0x0E],
            '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
            '©' => [0x0E, 0x11, 0x17, 0x14, 0x17, 0x11, 0x0E],
            // Unknown characters draw as a hollow box.
            _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(book: &FontBook) -> StyledFace<'_> {
        book.face(false, false)
    }

    #[test]
    fn empty_text_has_zero_width() {
        let book = FontBook::builtin();
        assert_eq!(measure(plain(&book).face, "", 40.0).width, 0.0);
        let blank = rasterize(plain(&book), "", 40.0, 0.0);
        assert!(blank.width > 0 && blank.is_empty());
    }

    #[test]
    fn block_width_scales_with_font_size() {
        let book = FontBook::builtin();
        let w10 = measure(plain(&book).face, "AB", 10.0).width;
        let w20 = measure(plain(&book).face, "AB", 20.0).width;
        assert!((w20 - 2.0 * w10).abs() < 1e-4);
        assert!((w10 - 11.0 * 10.0 / 8.0).abs() < 1e-4);
    }

    #[test]
    fn em_box_is_centred_on_origin() {
        let book = FontBook::builtin();
        let m = measure(plain(&book).face, "A", 16.0);
        let top = m.middle_baseline() - m.ascent;
        let bottom = m.middle_baseline() - m.descent;
        assert!((top + bottom).abs() < 1e-4);
    }

    #[test]
    fn block_glyph_ink_is_centred() {
        let book = FontBook::builtin();
        let mask = rasterize(plain(&book), "H", 40.0, 0.0);
        let (mut sx, mut n) = (0.0f32, 0.0f32);
        for y in 0..mask.height {
            for x in 0..mask.width {
                let c = mask.data[(y * mask.width + x) as usize];
                sx += (x as f32 + 0.5 - mask.origin_x) * c;
                n += c;
            }
        }
        assert!(n > 0.0);
        assert!((sx / n).abs() < 1.0, "horizontal ink centroid {}", sx / n);
    }

    #[test]
    fn synthetic_bold_adds_ink() {
        let book = FontBook::builtin();
        let ink = |m: &CoverageMask| m.data.iter().sum::<f32>();
        let regular = rasterize(book.face(false, false), "I", 40.0, 0.0);
        let bold = rasterize(book.face(true, false), "I", 40.0, 0.0);
        assert!(ink(&bold) > ink(&regular));
    }

    #[test]
    fn dilate_grows_coverage() {
        let mut m = CoverageMask::new(9, 9, 4.0, 4.0);
        m.data[4 * 9 + 4] = 1.0;
        let d = m.dilate(2.0);
        assert_eq!(d.get(5, 4), 1.0);
        assert!(d.get(6, 4) > 0.0);
        assert_eq!(d.get(8, 4), 0.0);
    }

    #[test]
    fn window_matches_the_same_pixels_of_the_full_raster() {
        let book = FontBook::builtin();
        let styled = book.face(false, true);
        let full = rasterize(styled, "Wm", 30.0, 3.0);
        let window = Rect::new(Point::new(-7.3, -4.0), Point::new(9.0, 6.5));
        let part = rasterize_window(styled, "Wm", 30.0, 3.0, Some(&window));
        assert!(part.width < full.width && part.height < full.height);
        let dx = (full.origin_x - part.origin_x) as i32;
        let dy = (full.origin_y - part.origin_y) as i32;
        for y in 0..part.height as i32 {
            for x in 0..part.width as i32 {
                assert!((part.get(x, y) - full.get(x + dx, y + dy)).abs() < 1e-6, "({}, {})", x, y);
            }
        }
        let outside = Rect::new(Point::new(1000.0, 0.0), Point::new(1010.0, 5.0));
        assert_eq!(rasterize_window(styled, "Wm", 30.0, 3.0, Some(&outside)).width, 0);
    }

    #[test]
    fn embolden_takes_the_max_over_the_offset_to_the_left() {
        let mut m = CoverageMask::new(12, 1, 0.0, 0.0);
        m.data[2] = 0.5;
        m.data[3] = 1.0;
        embolden(&mut m, 5.0);
        assert_eq!(m.data, vec![0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }
}
