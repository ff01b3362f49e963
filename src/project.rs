// ============================================================================
// PROJECT FILES: binary .mfe snapshot of a layer stack and its logo library
// ============================================================================
//
// Layout (bincode 1, little-endian, fixed-width ints):
//   magic "MFE1" | layer stack | logos [ id, name, width, height, rgba ]
//
// Target images are not stored; a project is the reusable watermark design.
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetId, AssetLibrary};
use crate::error::{MarkError, Result};
use crate::layer::LayerStack;
use crate::workspace::Workspace;

/// File extension for project files.
pub const PROJECT_EXTENSION: &str = "mfe";

const MAGIC: &str = "MFE1";

/// Largest logo edge accepted from a project file.
const MAX_LOGO_DIM: u32 = 16_384;
const MAX_LAYERS: usize = 256;

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    layers: LayerStack,
    logos: Vec<LogoData>,
}

#[derive(Serialize, Deserialize)]
struct LogoData {
    id: AssetId,
    name: String,
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

/// Decoded project contents.
#[derive(Clone, Debug)]
pub struct Project {
    pub layers: LayerStack,
    pub assets: AssetLibrary,
}

impl Project {
    pub fn from_workspace(ws: &Workspace) -> Self {
        Self { layers: ws.layers().clone(), assets: ws.assets().clone() }
    }

    fn to_file(&self) -> ProjectFile {
        let logos = self
            .assets
            .iter()
            .map(|logo| LogoData {
                id: logo.id,
                name: logo.name.clone(),
                width: logo.width(),
                height: logo.height(),
                rgba: logo.pixels().as_raw().clone(),
            })
            .collect();
        ProjectFile { magic: MAGIC.to_string(), layers: self.layers.clone(), logos }
    }

    fn from_file(file: ProjectFile) -> Result<Self> {
        if file.magic != MAGIC {
            return Err(MarkError::Project(format!("unknown magic '{}'", file.magic)));
        }
        if file.layers.len() > MAX_LAYERS {
            return Err(MarkError::Project(format!(
                "project contains {} layers, which exceeds the maximum of {}",
                file.layers.len(),
                MAX_LAYERS
            )));
        }

        let mut assets = AssetLibrary::new();
        for logo in file.logos {
            if logo.width > MAX_LOGO_DIM || logo.height > MAX_LOGO_DIM {
                return Err(MarkError::Project(format!(
                    "logo '{}' is {}x{}, larger than {}x{}",
                    logo.name, logo.width, logo.height, MAX_LOGO_DIM, MAX_LOGO_DIM
                )));
            }
            let pixels = RgbaImage::from_raw(logo.width, logo.height, logo.rgba).ok_or_else(|| {
                MarkError::Project(format!("logo '{}' pixel data does not match {}x{}", logo.name, logo.width, logo.height))
            })?;
            assets.insert_with_id(logo.id, logo.name, pixels);
        }
        Ok(Self { layers: file.layers, assets })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.to_file())?)
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        Self::from_file(bincode::deserialize(raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &self.to_file())?;
        log_info!("Project saved: {} ({} layer(s), {} logo(s))", path.display(), self.layers.len(), self.assets.len());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let project = Self::from_file(bincode::deserialize_from(reader)?)?;
        log_info!("Project loaded: {}", path.display());
        Ok(project)
    }

    /// Replace the workspace's layers and logos with this project's.
    pub fn apply(self, ws: &mut Workspace) {
        ws.replace_document(self.layers, self.assets);
    }
}

pub fn save_project(ws: &Workspace, path: &Path) -> Result<()> {
    Project::from_workspace(ws).save(path)
}

pub fn load_project(ws: &mut Workspace, path: &Path) -> Result<()> {
    Project::load(path)?.apply(ws);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerKind, LayerProperty};
    use image::Rgba;

    fn sample_workspace() -> Workspace {
        let mut ws = Workspace::default();
        let (_, logo_layer) = ws.add_logo("mark.png", RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])));
        ws.set_layer(logo_layer, LayerProperty::Rotation(33.0)).unwrap();
        ws.add_text_layer("top");
        ws
    }

    #[test]
    fn project_survives_encode_decode() {
        let ws = sample_workspace();
        let bytes = Project::from_workspace(&ws).encode().unwrap();
        let back = Project::decode(&bytes).unwrap();
        assert_eq!(&back.layers, ws.layers());
        assert_eq!(back.assets.len(), 1);
        let logo = back.assets.iter().next().unwrap();
        assert_eq!(logo.name, "mark.png");
        assert_eq!(logo.pixels().get_pixel(2, 1), &Rgba([1, 2, 3, 4]));
        let layer = &back.layers.as_slice()[1];
        assert!(matches!(layer.kind, LayerKind::Image { asset } if asset == logo.id));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Project::decode(b"not a project").is_err());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let ws = sample_workspace();
        let mut bytes = Project::from_workspace(&ws).encode().unwrap();
        // String length prefix is 8 bytes; the magic follows.
        bytes[8] = b'X';
        assert!(matches!(Project::decode(&bytes), Err(MarkError::Project(_))));
    }

    #[test]
    fn load_replaces_workspace_document() {
        let path = std::env::temp_dir().join(format!("markfe-{}.{}", uuid::Uuid::new_v4(), PROJECT_EXTENSION));
        let ws = sample_workspace();
        save_project(&ws, &path).unwrap();

        let mut other = Workspace::default();
        load_project(&mut other, &path).unwrap();
        assert_eq!(other.layers(), ws.layers());
        assert_eq!(other.assets().len(), 1);
        assert_eq!(other.active_layer_id(), other.layers().top().id);
        std::fs::remove_file(&path).ok();
    }
}
