// ============================================================================
// GEOMETRY: points, pointer math, affine matrices and the transform stack
// ============================================================================

use serde::{Deserialize, Serialize};

/// A 2D point (or vector) in canvas pixel space. +y points down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f32 {
    (b - a).length()
}

/// Angle of the vector `a → b` in radians (atan2 convention, +y down).
pub fn angle(a: Point, b: Point) -> f32 {
    (b.y - a.y).atan2(b.x - a.x)
}

pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
}

/// Rotate `p` about the origin by `radians`.
pub fn rotate(p: Point, radians: f32) -> Point {
    let (s, c) = radians.sin_cos();
    Point::new(p.x * c - p.y * s, p.x * s + p.y * c)
}

// ---------------------------------------------------------------------------
//  Rectangles and pixel frames
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// `[-half_w, half_w] × [-half_h, half_h]`.
    pub fn centered(half_w: f32, half_h: f32) -> Self {
        Self::new(Point::new(-half_w, -half_h), Point::new(half_w, half_h))
    }

    /// Smallest rectangle holding every point.
    pub fn bounding(points: &[Point]) -> Self {
        let mut r = Rect::new(Point::new(f32::INFINITY, f32::INFINITY), Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY));
        for p in points {
            r.min.x = r.min.x.min(p.x);
            r.min.y = r.min.y.min(p.y);
            r.max.x = r.max.x.max(p.x);
            r.max.y = r.max.y.max(p.y);
        }
        r
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn expand(&self, by: f32) -> Rect {
        Rect::new(Point::new(self.min.x - by, self.min.y - by), Point::new(self.max.x + by, self.max.y + by))
    }

    pub fn scale(&self, by: f32) -> Rect {
        Rect::new(Point::new(self.min.x * by, self.min.y * by), Point::new(self.max.x * by, self.max.y * by))
    }

    /// Overlap of two rectangles; `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        );
        (r.min.x < r.max.x && r.min.y < r.max.y).then_some(r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }
}

/// A `width × height` pixel grid placed in some local frame. Pixel `(i, j)`
/// covers local `[i - origin_x, i + 1 - origin_x)` horizontally and likewise
/// vertically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl RasterFrame {
    pub fn local_rect(&self) -> Rect {
        Rect::new(
            Point::new(-self.origin_x, -self.origin_y),
            Point::new(self.width as f32 - self.origin_x, self.height as f32 - self.origin_y),
        )
    }

    /// The part of this grid that overlaps `window`, keeping pixel alignment.
    /// `None` when nothing overlaps.
    pub fn clip(&self, window: &Rect) -> Option<RasterFrame> {
        if !(window.min.x.is_finite() && window.min.y.is_finite() && window.max.x.is_finite() && window.max.y.is_finite()) {
            return None;
        }
        let x0 = (window.min.x + self.origin_x).floor().max(0.0);
        let y0 = (window.min.y + self.origin_y).floor().max(0.0);
        let x1 = (window.max.x + self.origin_x).ceil().min(self.width as f32);
        let y1 = (window.max.y + self.origin_y).ceil().min(self.height as f32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(RasterFrame {
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
            origin_x: self.origin_x - x0,
            origin_y: self.origin_y - y0,
        })
    }

    /// Pixel offset of `sub` inside this frame, for frames produced by `clip`.
    pub fn offset_of(&self, sub: &RasterFrame) -> (u32, u32) {
        ((self.origin_x - sub.origin_x).round() as u32, (self.origin_y - sub.origin_y).round() as u32)
    }
}

// ---------------------------------------------------------------------------
//  Affine matrices
// ---------------------------------------------------------------------------

/// Row-major 3×3 affine matrix. The last row is always `[0, 0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub m: [[f32; 3]; 3],
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn translate(dx: f32, dy: f32) -> Self {
        Affine { m: [[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]] }
    }

    pub fn rotate(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Affine { m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]] }
    }

    /// `self * rhs`: applies `rhs` first, then `self`.
    pub fn then(self, rhs: Affine) -> Affine {
        let a = self.m;
        let b = rhs.m;
        let mut out = [[0.0f32; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = a[r][0] * b[0][c] + a[r][1] * b[1][c] + a[r][2] * b[2][c];
            }
        }
        Affine { m: out }
    }

    pub fn apply(&self, p: Point) -> Point {
        let m = &self.m;
        Point::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2],
        )
    }

    /// Invert the matrix. Returns identity on singular input.
    pub fn invert(&self) -> Affine {
        let (a, b, c) = (self.m[0][0], self.m[0][1], self.m[0][2]);
        let (d, e, f) = (self.m[1][0], self.m[1][1], self.m[1][2]);
        let (g, h, i) = (self.m[2][0], self.m[2][1], self.m[2][2]);

        let det = a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g);
        if det.abs() < 1e-12 {
            return Affine::IDENTITY;
        }
        let inv = 1.0 / det;
        Affine {
            m: [
                [(e * i - f * h) * inv, (c * h - b * i) * inv, (b * f - c * e) * inv],
                [(f * g - d * i) * inv, (a * i - c * g) * inv, (c * d - a * f) * inv],
                [(d * h - e * g) * inv, (b * g - a * h) * inv, (a * e - b * d) * inv],
            ],
        }
    }
}

// ---------------------------------------------------------------------------
//  Transform stack
// ---------------------------------------------------------------------------

/// Explicit save/restore stack of affine transforms threaded through a render
/// pass. `translate`/`rotate` post-multiply the current matrix, so the most
/// recently applied operation acts first on local coordinates.
#[derive(Clone, Debug)]
pub struct TransformStack {
    current: Affine,
    saved: Vec<Affine>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStack {
    pub fn new() -> Self {
        Self { current: Affine::IDENTITY, saved: Vec::new() }
    }

    pub fn save(&mut self) {
        self.saved.push(self.current);
    }

    /// Pop the last saved matrix. Unbalanced restores leave the stack unchanged.
    pub fn restore(&mut self) {
        if let Some(m) = self.saved.pop() {
            self.current = m;
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.current = self.current.then(Affine::translate(dx, dy));
    }

    pub fn rotate_degrees(&mut self, degrees: f32) {
        self.current = self.current.then(Affine::rotate(degrees.to_radians()));
    }

    pub fn current(&self) -> Affine {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}
