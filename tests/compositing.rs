use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use markfe::assets::AssetLibrary;
use markfe::geometry::Point;
use markfe::layer::{Color, Layer, LayerKind, LayerStack, TextMark};
use markfe::render::{Compositor, TileGrid};

fn black(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
}

/// Plain white "A": no shadow, no stroke, not bold, fully opaque.
fn plain_a(size: f32) -> Layer {
    let mut layer = Layer::new_text("A");
    layer.size = size;
    layer.opacity = 1.0;
    layer.has_shadow = false;
    if let LayerKind::Text(mark) = &mut layer.kind {
        mark.stroke_width = 0.0;
        mark.bold = false;
        mark.color = Color::WHITE;
    }
    layer
}

/// Bounding box (min_x, min_y, max_x, max_y) of pixels brighter than 128.
fn ink_bounds(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in img.enumerate_pixels() {
        if p[0] > 128 {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
            });
        }
    }
    bounds
}

#[test]
fn rendering_is_idempotent_and_leaves_the_base_untouched() {
    let base = RgbaImage::from_fn(120, 80, |x, y| Rgba([(x * 2) as u8, (y * 3) as u8, 90, 255]));
    let snapshot = base.clone();
    let mut stack = LayerStack::new(Layer::new_text("Sample"));
    let top = stack.add(LayerKind::Text(TextMark { content: "tiled".into(), ..TextMark::default() }));
    stack.set(top, markfe::layer::LayerProperty::Tiled(true)).unwrap();
    stack.set(top, markfe::layer::LayerProperty::Rotation(-30.0)).unwrap();

    let compositor = Compositor::builtin();
    let assets = AssetLibrary::new();
    let first = compositor.render(&base, stack.as_slice(), &assets, None);
    let second = compositor.render(&base, stack.as_slice(), &assets, None);
    assert_eq!(first, second);
    assert_eq!(base, snapshot);
    assert_ne!(first, base);
}

#[test]
fn layer_order_decides_what_ends_up_on_top() {
    let boxed = |color: Color| {
        let mut layer = plain_a(100.0);
        layer.has_background = true;
        layer.background_color = color;
        if let LayerKind::Text(mark) = &mut layer.kind {
            mark.color = color;
        }
        layer
    };
    let red = Color([255, 0, 0, 255]);
    let blue = Color([0, 0, 255, 255]);
    let compositor = Compositor::builtin();
    let assets = AssetLibrary::new();
    let base = black(100, 100);

    let red_on_top = compositor.render(&base, &[boxed(blue), boxed(red)], &assets, None);
    let blue_on_top = compositor.render(&base, &[boxed(red), boxed(blue)], &assets, None);
    assert_eq!(red_on_top.get_pixel(50, 50), &Rgba([255, 0, 0, 255]));
    assert_eq!(blue_on_top.get_pixel(50, 50), &Rgba([0, 0, 255, 255]));

    // Marks that do not overlap can be swapped freely.
    let mut left = boxed(red);
    left.pos_x = 20.0;
    let mut right = boxed(blue);
    right.pos_x = 80.0;
    let a = compositor.render(&base, &[left.clone(), right.clone()], &assets, None);
    let b = compositor.render(&base, &[right, left], &assets, None);
    assert_eq!(a, b);
}

#[test]
fn single_letter_lands_centred_and_rotates() {
    let compositor = Compositor::builtin();
    let assets = AssetLibrary::new();
    let base = black(100, 100);

    // size 100 on a 100 px canvas is a 10 px font.
    let upright = compositor.render(&base, &[plain_a(100.0)], &assets, None);
    let (x0, y0, x1, y1) = ink_bounds(&upright).expect("letter should be visible");
    assert!(y0 >= 43 && y1 <= 57, "ink rows {}..{}", y0, y1);
    let cx = (x0 + x1) as f32 * 0.5;
    let cy = (y0 + y1) as f32 * 0.5;
    assert!((cx - 50.0).abs() <= 2.0, "centre x {}", cx);
    assert!((cy - 50.0).abs() <= 2.5, "centre y {}", cy);
    assert!(y1 - y0 > x1 - x0, "upright A is taller than wide");

    let mut turned = plain_a(100.0);
    turned.rotation = 90.0;
    let rotated = compositor.render(&base, &[turned], &assets, None);
    let (rx0, ry0, rx1, ry1) = ink_bounds(&rotated).expect("letter should be visible");
    assert!(rx1 - rx0 > ry1 - ry0, "quarter-turned A is wider than tall");
}

#[test]
fn half_opacity_blends_halfway() {
    let compositor = Compositor::builtin();
    let mut layer = plain_a(100.0);
    layer.has_background = true;
    layer.background_color = Color::WHITE;
    layer.opacity = 0.5;
    let out = compositor.render(&black(100, 100), &[layer], &AssetLibrary::new(), None);
    let v = out.get_pixel(50, 50)[0] as i32;
    assert!((v - 128).abs() <= 2, "got {}", v);
}

#[test]
fn tiles_cover_every_canvas_point() {
    for &(cw, ch, content_w, content_h, density) in &[
        (300u32, 200u32, 40.0f32, 12.0f32, 50.0f32),
        (120, 400, 5.0, 5.0, 0.0),
        (640, 480, 200.0, 60.0, 100.0),
    ] {
        let grid = TileGrid::new(content_w, content_h, density, cw, ch);
        let centers = grid.centers(cw, ch);
        for y in (0..ch).step_by(7) {
            for x in (0..cw).step_by(7) {
                let p = Point::new(x as f32, y as f32);
                let covered = centers
                    .iter()
                    .any(|c| (c.x - p.x).abs() <= grid.gap_x * 0.5 + 1e-3 && (c.y - p.y).abs() <= grid.gap_y * 0.5 + 1e-3);
                assert!(covered, "({}, {}) uncovered on {}x{}", x, y, cw, ch);
            }
        }
    }
}

#[test]
fn tiled_mark_reaches_all_four_corners() {
    let mut layer = plain_a(60.0);
    layer.tiled = true;
    layer.tile_density = 0.0;
    layer.rotation = 45.0;
    layer.has_background = true;
    layer.background_color = Color::WHITE;
    let out = Compositor::builtin().render(&black(200, 200), &[layer], &AssetLibrary::new(), None);
    let quadrant_has_ink = |qx: u32, qy: u32| {
        (qy * 100..qy * 100 + 100).any(|y| (qx * 100..qx * 100 + 100).any(|x| out.get_pixel(x, y)[0] > 128))
    };
    for (qx, qy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        assert!(quadrant_has_ink(qx, qy), "quadrant ({}, {}) empty", qx, qy);
    }
}

#[test]
fn highlight_only_appears_in_preview() {
    let mut ws = markfe::workspace::Workspace::default();
    ws.add_image("shot.png", black(200, 200));
    let preview = ws.render_preview().unwrap();
    let export = ws.render_export(&ws.images()[0]);
    assert_ne!(preview, export);
}

#[test]
fn marks_far_larger_than_the_canvas_render_quickly() {
    let compositor = Compositor::builtin();
    let assets = AssetLibrary::new();
    let base = black(400, 300);
    let mut layer = Layer::new_text("@watermark");
    layer.size = 3000.0;

    let started = Instant::now();
    let single = compositor.render(&base, std::slice::from_ref(&layer), &assets, None);
    layer.tiled = true;
    layer.rotation = -30.0;
    let tiled = compositor.render(&base, std::slice::from_ref(&layer), &assets, None);
    layer.tiled = false;
    layer.size = 100_000.0;
    compositor.render(&base, std::slice::from_ref(&layer), &assets, None);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(30), "took {:?}", elapsed);
    assert_ne!(single, base);
    assert_ne!(tiled, base);
}
