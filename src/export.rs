// ============================================================================
// EXPORT: overlay-free re-render of each target image, plus encoding
// ============================================================================

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};

use crate::error::Result;
use crate::workspace::{TargetImage, Workspace};

/// Prefix added to every exported file name.
pub const EXPORT_PREFIX: &str = "watermarked_";

/// Encoded output format, chosen from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
}

impl SaveFormat {
    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
        }
    }
}

/// `watermarked_<name>`.
pub fn export_name(name: &str) -> String {
    format!("{}{}", EXPORT_PREFIX, name)
}

/// One rendered output ready for encoding.
#[derive(Clone, Debug)]
pub struct Rendered {
    pub file_name: String,
    pub pixels: RgbaImage,
}

fn render_one(ws: &Workspace, image: &TargetImage) -> Rendered {
    Rendered { file_name: export_name(&image.name), pixels: ws.render_export(image) }
}

/// Render the currently selected image for export.
pub fn export_current(ws: &Workspace) -> Option<Rendered> {
    ws.selected_image().map(|image| render_one(ws, image))
}

/// Render every export target one after another, handing each result to
/// `sink` before the next render starts. Returns the number exported.
pub fn export_batch<F>(ws: &Workspace, mut sink: F) -> Result<usize>
where
    F: FnMut(usize, usize, Rendered) -> Result<()>,
{
    let targets = ws.export_targets();
    let total = targets.len();
    for (i, image) in targets.into_iter().enumerate() {
        sink(i, total, render_one(ws, image))?;
        log_info!("Exported {}/{}: {}", i + 1, total, image.name);
    }
    Ok(total)
}

/// Export every target into `dir`, creating it if needed. Names whose
/// extension is not an encodable format get `.png` appended.
pub fn write_batch(ws: &Workspace, dir: &Path, jpeg_quality: u8) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    export_batch(ws, |_, _, rendered| {
        let path = output_path(dir, &rendered.file_name);
        let format = SaveFormat::from_path(&path).unwrap_or_default();
        encode_and_write(&rendered.pixels, &path, format, jpeg_quality)?;
        written.push(path);
        Ok(())
    })?;
    Ok(written)
}

/// `dir/<file_name>`, with `.png` appended for unknown extensions.
pub fn output_path(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    if SaveFormat::from_path(&path).is_some() {
        path
    } else {
        dir.join(format!("{}.{}", file_name, SaveFormat::Png.extension()))
    }
}

pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            BmpEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}
