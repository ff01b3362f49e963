// ============================================================================
// BLEND MODES: separable compositing of a mark pixel over the canvas
// ============================================================================

use image::Rgba;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    #[serde(alias = "source-over")]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    /// Canvas `lighter`: clamped channel sum.
    #[serde(alias = "lighter")]
    Additive,
}

impl BlendMode {
    /// Returns all blend modes in menu order.
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Additive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::Darken => "Darken",
            BlendMode::Lighten => "Lighten",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::HardLight => "Hard Light",
            BlendMode::SoftLight => "Soft Light",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::Additive => "Additive",
        }
    }

    /// Parse a CLI/preset name. Accepts display names and canvas operation
    /// names (`source-over`, `color-dodge`, ...), case-insensitively.
    pub fn parse(s: &str) -> Option<BlendMode> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if key == "sourceover" {
            return Some(BlendMode::Normal);
        }
        if key == "lighter" {
            return Some(BlendMode::Additive);
        }
        BlendMode::all().iter().copied().find(|m| {
            let name: String = m.name().chars().filter(|c| !c.is_whitespace()).collect();
            name.to_ascii_lowercase() == key
        })
    }
}

/// Composite `top` over `base` with the given mode. `opacity` scales the top
/// pixel's alpha. Straight (non-premultiplied) alpha in and out.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    // Fast path: fully transparent top pixel, nothing to blend
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }

    // Fast path: Normal blend, full opacity, fully opaque top pixel, just overwrite
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = base[0] as f32 / 255.0;
    let base_g = base[1] as f32 / 255.0;
    let base_b = base[2] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;

    let top_r = top[0] as f32 / 255.0;
    let top_g = top[1] as f32 / 255.0;
    let top_b = top[2] as f32 / 255.0;
    let top_a = (top[3] as f32 / 255.0) * opacity;

    let (r, g, b) = (
        blend_channel(mode, base_r, top_r),
        blend_channel(mode, base_g, top_g),
        blend_channel(mode, base_b, top_b),
    );

    // Where the backdrop is transparent the source colour shows unmixed.
    let r = top_r + (r - top_r) * base_a;
    let g = top_g + (g - top_g) * base_a;
    let b = top_b + (b - top_b) * base_a;

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba([
        (out_r * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_g * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_b * 255.0).round().clamp(0.0, 255.0) as u8,
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

fn blend_channel(mode: BlendMode, base: f32, top: f32) -> f32 {
    match mode {
        BlendMode::Normal => top,
        BlendMode::Multiply => base * top,
        BlendMode::Screen => 1.0 - (1.0 - base) * (1.0 - top),
        BlendMode::Overlay => overlay_channel(base, top),
        BlendMode::Darken => base.min(top),
        BlendMode::Lighten => base.max(top),
        BlendMode::ColorDodge => color_dodge_channel(base, top),
        BlendMode::ColorBurn => color_burn_channel(base, top),
        BlendMode::HardLight => overlay_channel(top, base),
        BlendMode::SoftLight => soft_light_channel(base, top),
        BlendMode::Difference => (base - top).abs(),
        BlendMode::Exclusion => base + top - 2.0 * base * top,
        BlendMode::Additive => (base + top).min(1.0),
    }
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if base >= 1.0 {
        1.0
    } else if top <= 0.0 {
        0.0
    } else {
        (1.0 - (1.0 - base) / top).max(0.0)
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if base <= 0.0 {
        0.0
    } else if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

/// W3C Soft Light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);

    #[test]
    fn normal_opaque_overwrites() {
        let top = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_pixel(GREY, top, BlendMode::Normal, 1.0), top);
    }

    #[test]
    fn transparent_top_is_identity_for_every_mode() {
        for &mode in BlendMode::all() {
            assert_eq!(blend_pixel(GREY, Rgba([255, 0, 0, 0]), mode, 1.0), GREY);
        }
    }

    #[test]
    fn multiply_by_white_keeps_base() {
        let out = blend_pixel(GREY, Rgba([255, 255, 255, 255]), BlendMode::Multiply, 1.0);
        assert_eq!(out, GREY);
    }

    #[test]
    fn screen_with_black_keeps_base() {
        let out = blend_pixel(GREY, Rgba([0, 0, 0, 255]), BlendMode::Screen, 1.0);
        assert_eq!(out, GREY);
    }

    #[test]
    fn difference_of_equal_colours_is_black() {
        let out = blend_pixel(GREY, GREY, BlendMode::Difference, 1.0);
        assert_eq!(out, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn half_opacity_normal_mixes() {
        let out = blend_pixel(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), BlendMode::Normal, 0.5);
        assert!((126..=129).contains(&out[0]));
        assert_eq!(out[3], 255);
    }

    #[test]
    fn contrast_modes_match_reference_values() {
        let base = Rgba([64, 192, 128, 255]);
        let top = Rgba([128, 64, 32, 255]);
        let cases = [
            (BlendMode::Overlay, [64, 161, 33]),
            (BlendMode::HardLight, [65, 96, 32]),
            (BlendMode::SoftLight, [64, 168, 80]),
            (BlendMode::ColorDodge, [129, 255, 146]),
            (BlendMode::Exclusion, [128, 160, 128]),
        ];
        for (mode, want) in cases {
            let out = blend_pixel(base, top, mode, 1.0);
            for c in 0..3 {
                assert!((out[c] as i32 - want[c]).abs() <= 1, "{:?} channel {}: {:?}", mode, c, out);
            }
            assert_eq!(out[3], 255);
        }
    }

    #[test]
    fn parses_canvas_operation_names() {
        assert_eq!(BlendMode::parse("source-over"), Some(BlendMode::Normal));
        assert_eq!(BlendMode::parse("color-dodge"), Some(BlendMode::ColorDodge));
        assert_eq!(BlendMode::parse("Soft Light"), Some(BlendMode::SoftLight));
        assert_eq!(BlendMode::parse("lighter"), Some(BlendMode::Additive));
        assert_eq!(BlendMode::parse("nope"), None);
    }
}
