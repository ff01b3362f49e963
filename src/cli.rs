// ============================================================================
// MarkFE CLI: headless batch watermarking via command-line arguments
// ============================================================================
//
// Usage examples:
//   markfe -i photo.jpg --text "© Studio"                   (writes watermarked_photo.jpg next to it)
//   markfe -i "shoot/*.jpg" --preset brand.json --output-dir out/
//   markfe -i a.png b.png --logo logo.png --size 120 --pos 85,90 --opacity 0.6
//   markfe -i scan.png --text DRAFT --tiled --rotation -30 --blend multiply
//   markfe -i old.jpg --project design.mfe --fill 12,8,140,40 --fill 300,400,60,60
//
// The design (preset, project, ad-hoc marks) is built once, then every input
// is loaded, optionally region-filled, composited and written on the current
// thread. Rendering itself still uses rayon for rows.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::blend::BlendMode;
use crate::config::Preset;
use crate::error::{MarkError, Result};
use crate::export::{self, SaveFormat};
use crate::inpaint::{MaskShape, RegionRect};
use crate::layer::{Color, LayerId, LayerProperty};
use crate::project;
use crate::render::Compositor;
use crate::workspace::Workspace;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MarkFE headless watermarking.
///
/// Stamp text and logo watermarks onto image files without opening an editor.
#[derive(Parser, Debug)]
#[command(
    name = "markfe",
    about = "MarkFE headless batch watermarker",
    long_about = "Composite text and logo watermark layers onto image files.\n\
                  Designs come from a JSON preset, a .mfe project, or ad-hoc\n\
                  --text / --logo marks. Output files are named watermarked_<name>.\n\n\
                  Example:\n  \
                  markfe -i photo.png --text \"(c) Studio\" --tiled --rotation -30\n  \
                  markfe -i \"*.jpg\" --preset brand.json --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// JSON preset describing the layer stack.
    #[arg(short, long, value_name = "PRESET.json")]
    pub preset: Option<PathBuf>,

    /// .mfe project providing layers and logos. Applied before --preset.
    #[arg(long, value_name = "DESIGN.mfe")]
    pub project: Option<PathBuf>,

    /// Add a text mark on top of the stack.
    #[arg(short, long)]
    pub text: Option<String>,

    /// Add a logo mark (any decodable image) on top of the stack.
    #[arg(short, long, value_name = "IMAGE")]
    pub logo: Option<PathBuf>,

    /// Mark size in per-mille of image width (font size or logo width).
    #[arg(long)]
    pub size: Option<f32>,

    /// Mark opacity, 0–1.
    #[arg(long)]
    pub opacity: Option<f32>,

    /// Mark centre as "x,y" in percent of image width / height.
    #[arg(long, value_name = "X,Y", value_parser = parse_pos)]
    pub pos: Option<(f32, f32)>,

    /// Rotation in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub rotation: Option<f32>,

    /// Repeat the mark over the whole image.
    #[arg(long)]
    pub tiled: bool,

    /// Extra tile spacing, 0–100.
    #[arg(long)]
    pub density: Option<f32>,

    /// Blend mode (normal, multiply, screen, overlay, soft-light, ...).
    #[arg(long, value_parser = parse_blend)]
    pub blend: Option<BlendMode>,

    /// Text colour as #rrggbb or #rrggbbaa.
    #[arg(long, value_parser = parse_color)]
    pub color: Option<Color>,

    /// Render text in italics.
    #[arg(long)]
    pub italic: bool,

    /// Render text without bold.
    #[arg(long)]
    pub no_bold: bool,

    /// Outline width for text; 0 disables it.
    #[arg(long)]
    pub stroke: Option<f32>,

    /// Draw a backing rectangle in this colour.
    #[arg(long, value_name = "COLOR", value_parser = parse_color)]
    pub background: Option<Color>,

    /// Disable the drop shadow.
    #[arg(long)]
    pub no_shadow: bool,

    /// Region to erase by inpainting before compositing, as "x,y,w,h" in
    /// pixels. Repeatable.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_region)]
    pub fill: Vec<RegionRect>,

    /// Output directory. Defaults to each input's own directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Save the assembled design as a .mfe project.
    #[arg(long, value_name = "DESIGN.mfe")]
    pub save_project: Option<PathBuf>,

    /// Save the assembled design as a JSON preset.
    #[arg(long, value_name = "PRESET.json")]
    pub save_preset: Option<PathBuf>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print per-file timing and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Property edits applied to every ad-hoc mark.
    pub fn layer_properties(&self) -> Vec<LayerProperty> {
        let mut props = Vec::new();
        if let Some(v) = self.size {
            props.push(LayerProperty::Size(v));
        }
        if let Some(v) = self.opacity {
            props.push(LayerProperty::Opacity(v));
        }
        if let Some((x, y)) = self.pos {
            props.push(LayerProperty::Position { x, y });
        }
        if let Some(v) = self.rotation {
            props.push(LayerProperty::Rotation(v));
        }
        if self.tiled {
            props.push(LayerProperty::Tiled(true));
        }
        if let Some(v) = self.density {
            props.push(LayerProperty::TileDensity(v));
        }
        if let Some(mode) = self.blend {
            props.push(LayerProperty::BlendMode(mode));
        }
        if let Some(c) = self.color {
            props.push(LayerProperty::TextColor(c));
        }
        if self.italic {
            props.push(LayerProperty::Italic(true));
        }
        if self.no_bold {
            props.push(LayerProperty::Bold(false));
        }
        if let Some(v) = self.stroke {
            props.push(LayerProperty::StrokeWidth(v));
        }
        if let Some(c) = self.background {
            props.push(LayerProperty::HasBackground(true));
            props.push(LayerProperty::BackgroundColor(c));
        }
        if self.no_shadow {
            props.push(LayerProperty::HasShadow(false));
        }
        props
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = the design failed or any file failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let mut ws = match build_design(&args) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("error: {}", e);
            log_err!("CLI design setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let out_dir = args
            .output_dir
            .clone()
            .or_else(|| input_path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        match run_one(&mut ws, input_path, &out_dir, &args.fill, args.quality) {
            Ok(written) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        written.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("CLI failed on {}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Design assembly
// ============================================================================

/// Build the layer stack once: project, then preset, then ad-hoc marks.
/// Ad-hoc marks replace the placeholder layer when no design file was given.
pub fn build_design(args: &CliArgs) -> Result<Workspace> {
    build_design_with(Workspace::new(Compositor::with_system_fonts()), args)
}

fn build_design_with(mut ws: Workspace, args: &CliArgs) -> Result<Workspace> {
    let placeholder = ws.layers().bottom().id;

    if let Some(path) = &args.project {
        project::load_project(&mut ws, path)?;
    }
    if let Some(path) = &args.preset {
        let base_dir = path.parent().unwrap_or(Path::new("."));
        Preset::load(path)?.apply(&mut ws, base_dir)?;
    }

    let mut marks: Vec<LayerId> = Vec::new();
    if let Some(text) = &args.text {
        marks.push(ws.add_text_layer(text.clone()));
    }
    if let Some(path) = &args.logo {
        let pixels = image::open(path)?.to_rgba8();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "logo".to_string());
        let (_, layer) = ws.add_logo(name, pixels);
        marks.push(layer);
    }

    if !marks.is_empty() && ws.layers().contains(placeholder) {
        ws.remove_layer(placeholder)?;
    }
    let props = args.layer_properties();
    for id in &marks {
        for prop in &props {
            ws.set_layer(*id, prop.clone())?;
        }
    }

    if let Some(path) = &args.save_project {
        project::save_project(&ws, path)?;
    }
    if let Some(path) = &args.save_preset {
        Preset::from_stack(ws.layers(), ws.assets()).save(path)?;
    }
    log_info!("CLI design ready: {} layer(s), {} logo(s)", ws.layers().len(), ws.assets().len());
    Ok(ws)
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(ws: &mut Workspace, input: &Path, out_dir: &Path, fills: &[RegionRect], quality: u8) -> Result<PathBuf> {
    // -- Step 1: Load ----------------------------------------------------
    let pixels = image::open(input)?.to_rgba8();
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.png".to_string());
    let id = ws.add_image(name, pixels);
    ws.select_image(ws.images().len() - 1);

    let result = process_selected(ws, out_dir, fills, quality);
    ws.remove_image(id);
    result
}

fn process_selected(ws: &mut Workspace, out_dir: &Path, fills: &[RegionRect], quality: u8) -> Result<PathBuf> {
    // -- Step 2: Region fill (optional) ----------------------------------
    if !fills.is_empty() {
        let regions = fills.to_vec();
        let detector = move |_: &image::RgbaImage| regions.clone();
        ws.detect_regions(&detector, MaskShape::Rectangle)?;
        match ws.fill_selected() {
            Err(MarkError::EmptyMask) => {
                log_warn!("No --fill region overlaps this image; leaving it unfilled");
            }
            other => other?,
        }
    }

    // -- Step 3: Composite + save ----------------------------------------
    let rendered = export::export_current(ws).ok_or(MarkError::NoImage)?;
    std::fs::create_dir_all(out_dir)?;
    let path = export::output_path(out_dir, &rendered.file_name);
    let format = SaveFormat::from_path(&path).unwrap_or_default();
    export::encode_and_write(&rendered.pixels, &path, format, quality)?;
    Ok(path)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

fn split_numbers(s: &str, count: usize) -> std::result::Result<Vec<f32>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != count {
        return Err(format!("expected {} comma-separated numbers, got '{}'", count, s));
    }
    parts
        .iter()
        .map(|p| {
            p.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{}' is not a number", p))
        })
        .collect()
}

fn parse_pos(s: &str) -> std::result::Result<(f32, f32), String> {
    let v = split_numbers(s, 2)?;
    Ok((v[0], v[1]))
}

fn parse_region(s: &str) -> std::result::Result<RegionRect, String> {
    let v = split_numbers(s, 4)?;
    if v[2] <= 0.0 || v[3] <= 0.0 {
        return Err(format!("region '{}' needs a positive width and height", s));
    }
    Ok(RegionRect::new(v[0], v[1], v[2], v[3]))
}

fn parse_blend(s: &str) -> std::result::Result<BlendMode, String> {
    BlendMode::parse(s).ok_or_else(|| {
        let names: Vec<&str> = BlendMode::all().iter().map(|m| m.name()).collect();
        format!("unknown blend mode '{}' (one of: {})", s, names.join(", "))
    })
}

fn parse_color(s: &str) -> std::result::Result<Color, String> {
    Color::parse_hex(s).ok_or_else(|| format!("'{}' is not a #rrggbb colour", s))
}
