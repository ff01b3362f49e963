use image::{Rgba, RgbaImage};
use markfe::geometry::Point;
use markfe::inpaint::{self, InpaintJob, MaskBuffer, MaskShape, RegionRect};
use markfe::workspace::Workspace;
use markfe::MarkError;

/// Horizontal ramp, 5 grey levels per column, with a white bar painted over
/// columns 20..30.
fn defaced_ramp() -> (RgbaImage, MaskBuffer) {
    let mut img = RgbaImage::from_fn(50, 20, |x, _| {
        let v = (x * 5) as u8;
        Rgba([v, v, v, 200])
    });
    let mut mask = MaskBuffer::new(50, 20);
    mask.add_region(&RegionRect::new(20.0, 0.0, 10.0, 20.0), MaskShape::Rectangle);
    for y in 0..20 {
        for x in 20..30 {
            if mask.is_set(x, y) {
                img.put_pixel(x, y, Rgba([255, 255, 255, 200]));
            }
        }
    }
    (img, mask)
}

fn worst_error(img: &RgbaImage, mask: &MaskBuffer) -> i32 {
    let mut worst = 0;
    for (x, y, p) in img.enumerate_pixels() {
        if mask.is_set(x, y) {
            worst = worst.max((p[0] as i32 - (x * 5) as i32).abs());
        }
    }
    worst
}

#[test]
fn more_iterations_converge_to_the_surrounding_ramp() {
    let (img, mask) = defaced_ramp();
    assert!(mask.count() > 0);

    let short = InpaintJob::with_iterations(&img, &mask, 5).unwrap().finish();
    let long = InpaintJob::with_iterations(&img, &mask, 200).unwrap().finish();
    let short_err = worst_error(&short, &mask);
    let long_err = worst_error(&long, &mask);
    assert!(long_err < short_err, "{} vs {}", long_err, short_err);
    assert!(long_err <= 4, "residual {}", long_err);
}

#[test]
fn flat_hole_converges_to_its_border_colour() {
    let mut img = RgbaImage::from_pixel(30, 30, Rgba([40, 160, 220, 255]));
    let mut mask = MaskBuffer::new(30, 30);
    mask.add_region(&RegionRect::new(8.0, 8.0, 14.0, 14.0), MaskShape::Rectangle);
    for y in 8..22 {
        for x in 8..22 {
            img.put_pixel(x, y, Rgba([250, 0, 10, 255]));
        }
    }
    let out = InpaintJob::with_iterations(&img, &mask, 300).unwrap().finish();
    for y in 8..22 {
        for x in 8..22 {
            let p = out.get_pixel(x, y);
            assert!((p[0] as i32 - 40).abs() <= 2, "({}, {}) = {:?}", x, y, p);
            assert!((p[1] as i32 - 160).abs() <= 2);
            assert!((p[2] as i32 - 220).abs() <= 2);
        }
    }
}

#[test]
fn unmasked_pixels_and_alpha_are_preserved() {
    let (img, mask) = defaced_ramp();
    let out = inpaint::fill(&img, &mask).unwrap();
    for (x, y, p) in out.enumerate_pixels() {
        assert_eq!(p[3], 200);
        if !mask.is_set(x, y) {
            assert_eq!(p, img.get_pixel(x, y));
        }
    }
}

#[test]
fn chunked_run_matches_one_shot() {
    let (img, mask) = defaced_ramp();
    let one_shot = InpaintJob::new(&img, &mask).unwrap().finish();
    let mut progress = Vec::new();
    let chunked = InpaintJob::new(&img, &mask).unwrap().run(37, |p| progress.push(p));
    assert_eq!(one_shot, chunked);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn empty_and_mismatched_masks_are_rejected() {
    let img = RgbaImage::new(10, 10);
    assert!(matches!(inpaint::fill(&img, &MaskBuffer::new(10, 10)), Err(MarkError::EmptyMask)));
    let mut wrong = MaskBuffer::new(5, 5);
    wrong.set(1, 1);
    assert!(matches!(inpaint::fill(&img, &wrong), Err(MarkError::MaskSizeMismatch { .. })));
}

#[test]
fn workspace_fill_erases_a_painted_blemish() {
    let mut ws = Workspace::default();
    let mut img = RgbaImage::from_pixel(60, 60, Rgba([90, 140, 60, 255]));
    for y in 28..32 {
        for x in 28..32 {
            img.put_pixel(x, y, Rgba([255, 0, 255, 255]));
        }
    }
    ws.add_image("spot.png", img);
    ws.paint_mask_stroke(Point::new(27.0, 30.0), Point::new(33.0, 30.0), 4.0);
    ws.fill_selected().unwrap();

    let p = ws.images()[0].pixels.get_pixel(30, 30);
    let off = |c: usize, want: i32| (p[c] as i32 - want).abs();
    assert!(off(0, 90) <= 15 && off(1, 140) <= 15 && off(2, 60) <= 15, "{:?}", p);
    assert!(ws.mask().is_empty());
    assert!(matches!(ws.fill_selected(), Err(MarkError::EmptyMask)));
}

#[test]
fn detected_regions_feed_the_mask() {
    let mut ws = Workspace::default();
    ws.add_image("shot.png", RgbaImage::new(40, 40));
    let detector = |_: &RgbaImage| vec![RegionRect::new(5.0, 5.0, 10.0, 4.0), RegionRect::new(30.0, 30.0, 6.0, 6.0)];
    assert_eq!(ws.detect_regions(&detector, MaskShape::Rectangle).unwrap(), 2);
    assert!(ws.mask().is_set(10, 6));
    assert!(ws.mask().is_set(32, 32));
    assert!(!ws.mask().is_set(20, 20));
}
