// ============================================================================
// INPAINTING: mask painting and neighbour-diffusion region fill
// ============================================================================

use image::{GrayImage, Luma, RgbaImage};

use crate::error::{MarkError, Result};
use crate::geometry::Point;

/// Diffusion passes used by [`fill`].
pub const DEFAULT_ITERATIONS: usize = 30;

/// Pixel updates per [`InpaintJob::step`] call in [`InpaintJob::run`].
pub const DEFAULT_STEP_BUDGET: usize = 64 * 1024;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1, 0),           (1, 0),
    (-1, 1),  (0, 1),  (1, 1),
];

// -- Regions ---------------------------------------------------------------

/// Axis-aligned rectangle in image pixels, as returned by a detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// How a detected rectangle is rasterized into the mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskShape {
    #[default]
    Rectangle,
    /// Ellipse inscribed in the rectangle.
    Ellipse,
}

impl MaskShape {
    /// Whether pixel centre `(x, y)` lies inside `rect` under this shape.
    pub fn contains(&self, rect: &RegionRect, x: u32, y: u32) -> bool {
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        match self {
            MaskShape::Rectangle => {
                px >= rect.x && px < rect.x + rect.width && py >= rect.y && py < rect.y + rect.height
            }
            MaskShape::Ellipse => {
                let rx = rect.width * 0.5;
                let ry = rect.height * 0.5;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let dx = (px - (rect.x + rx)) / rx;
                let dy = (py - (rect.y + ry)) / ry;
                dx * dx + dy * dy <= 1.0
            }
        }
    }
}

/// External oracle that finds regions to remove (faces, stamped logos, ...).
pub trait RegionDetector {
    fn detect(&self, image: &RgbaImage) -> Vec<RegionRect>;
}

impl<F: Fn(&RgbaImage) -> Vec<RegionRect>> RegionDetector for F {
    fn detect(&self, image: &RgbaImage) -> Vec<RegionRect> {
        self(image)
    }
}

// -- Mask buffer -------------------------------------------------------------

/// Single-channel mask the size of the base image. Non-zero = fill target.
#[derive(Clone, Debug, PartialEq)]
pub struct MaskBuffer {
    mask: GrayImage,
}

impl MaskBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { mask: GrayImage::new(width, height) }
    }

    pub fn from_gray(mask: GrayImage) -> Self {
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.mask
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.mask.get_pixel(x, y)[0] > 0
    }

    pub fn is_empty(&self) -> bool {
        self.mask.pixels().all(|p| p[0] == 0)
    }

    pub fn count(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] > 0).count()
    }

    pub fn clear(&mut self) {
        self.mask.pixels_mut().for_each(|p| *p = Luma([0]));
    }

    /// Flat indices (`y * width + x`) of every masked pixel, row-major.
    pub fn indices(&self) -> Vec<usize> {
        self.mask
            .pixels()
            .enumerate()
            .filter(|(_, p)| p[0] > 0)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width() && y < self.height() {
            self.mask.put_pixel(x, y, Luma([255]));
        }
    }

    /// Paint a round brush dab.
    pub fn dab(&mut self, center: Point, radius: f32) {
        let r = radius.max(0.5);
        let x0 = (center.x - r).floor().max(0.0) as u32;
        let y0 = (center.y - r).floor().max(0.0) as u32;
        let x1 = ((center.x + r).ceil().max(0.0) as u32).min(self.width());
        let y1 = ((center.y + r).ceil().max(0.0) as u32).min(self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= r * r {
                    self.mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }

    /// Paint a stroke segment between two consecutive pointer samples.
    pub fn stroke(&mut self, from: Point, to: Point, radius: f32) {
        let len = (to - from).length();
        let spacing = (radius * 0.5).max(0.5);
        let steps = (len / spacing).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let p = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
            self.dab(p, radius);
        }
    }

    pub fn add_region(&mut self, rect: &RegionRect, shape: MaskShape) {
        let x0 = rect.x.floor().max(0.0) as u32;
        let y0 = rect.y.floor().max(0.0) as u32;
        let x1 = ((rect.x + rect.width).ceil().max(0.0) as u32).min(self.width());
        let y1 = ((rect.y + rect.height).ceil().max(0.0) as u32).min(self.height());
        for y in y0..y1 {
            for x in x0..x1 {
                if shape.contains(rect, x, y) {
                    self.mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }

    /// Run a detector over `image` and rasterize everything it reports.
    /// Returns the number of regions added.
    pub fn add_detected(&mut self, detector: &dyn RegionDetector, image: &RgbaImage, shape: MaskShape) -> usize {
        let regions = detector.detect(image);
        for rect in &regions {
            self.add_region(rect, shape);
        }
        log_info!("Detector marked {} region(s) for fill", regions.len());
        regions.len()
    }
}

// -- Diffusion fill ---------------------------------------------------------

/// Resumable diffusion fill over the masked pixels of one image.
///
/// Each pass replaces every masked pixel's RGB with the mean of its in-bounds
/// 8-neighbours, reading the working buffer as it is being updated, so colour
/// creeps inward from the mask border pass by pass. Alpha is never touched.
/// Call [`step`](Self::step) with a budget to interleave with other work; the
/// base image is only replaced when [`finish`](Self::finish) returns.
pub struct InpaintJob {
    base: RgbaImage,
    work: Vec<[f32; 3]>,
    indices: Vec<usize>,
    iterations: usize,
    pass: usize,
    cursor: usize,
}

impl InpaintJob {
    pub fn new(base: &RgbaImage, mask: &MaskBuffer) -> Result<Self> {
        Self::with_iterations(base, mask, DEFAULT_ITERATIONS)
    }

    pub fn with_iterations(base: &RgbaImage, mask: &MaskBuffer, iterations: usize) -> Result<Self> {
        if mask.width() != base.width() || mask.height() != base.height() {
            return Err(MarkError::MaskSizeMismatch {
                mask_w: mask.width(),
                mask_h: mask.height(),
                image_w: base.width(),
                image_h: base.height(),
            });
        }
        let indices = mask.indices();
        if indices.is_empty() {
            log_warn!("Fill requested with an empty mask; nothing to do");
            return Err(MarkError::EmptyMask);
        }
        let work = base.pixels().map(|p| [p[0] as f32, p[1] as f32, p[2] as f32]).collect();
        Ok(Self { base: base.clone(), work, indices, iterations, pass: 0, cursor: 0 })
    }

    pub fn masked_pixels(&self) -> usize {
        self.indices.len()
    }

    pub fn is_done(&self) -> bool {
        self.pass >= self.iterations
    }

    /// Completed fraction in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.iterations == 0 {
            return 1.0;
        }
        let total = self.iterations * self.indices.len();
        let done = self.pass * self.indices.len() + self.cursor;
        (done as f32 / total as f32).min(1.0)
    }

    /// Perform up to `budget` pixel updates. Returns `true` once all passes
    /// have completed.
    pub fn step(&mut self, budget: usize) -> bool {
        let w = self.base.width() as i32;
        let h = self.base.height() as i32;
        let mut remaining = budget.max(1);
        while !self.is_done() && remaining > 0 {
            let idx = self.indices[self.cursor];
            let x = (idx % w as usize) as i32;
            let y = (idx / w as usize) as i32;

            let mut sum = [0.0f32; 3];
            let mut n = 0u32;
            for (dx, dy) in NEIGHBOURS {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let c = self.work[(ny * w + nx) as usize];
                sum[0] += c[0];
                sum[1] += c[1];
                sum[2] += c[2];
                n += 1;
            }
            if n > 0 {
                let inv = 1.0 / n as f32;
                self.work[idx] = [sum[0] * inv, sum[1] * inv, sum[2] * inv];
            }

            remaining -= 1;
            self.cursor += 1;
            if self.cursor == self.indices.len() {
                self.cursor = 0;
                self.pass += 1;
            }
        }
        self.is_done()
    }

    /// Write the diffused colours back and return the new base image.
    /// Finishes any remaining passes first.
    pub fn finish(mut self) -> RgbaImage {
        while !self.step(DEFAULT_STEP_BUDGET) {}
        let mut out = self.base;
        let w = out.width() as usize;
        for &idx in &self.indices {
            let c = self.work[idx];
            let p = out.get_pixel_mut((idx % w) as u32, (idx / w) as u32);
            p[0] = c[0].round().clamp(0.0, 255.0) as u8;
            p[1] = c[1].round().clamp(0.0, 255.0) as u8;
            p[2] = c[2].round().clamp(0.0, 255.0) as u8;
        }
        log_info!("Filled {} pixel(s) over {} passes", self.indices.len(), self.iterations);
        out
    }

    /// Run to completion in budgeted chunks, calling `yield_now` between
    /// chunks with the current progress.
    pub fn run(mut self, budget: usize, mut yield_now: impl FnMut(f32)) -> RgbaImage {
        while !self.step(budget) {
            yield_now(self.progress());
        }
        self.finish()
    }
}

/// Fill the masked region of `base` by neighbour diffusion. Reads `base`
/// only; never pass a composited preview here.
pub fn fill(base: &RgbaImage, mask: &MaskBuffer) -> Result<RgbaImage> {
    Ok(InpaintJob::new(base, mask)?.finish())
}
