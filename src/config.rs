// ============================================================================
// PRESETS: human-editable JSON description of a watermark layer stack
// ============================================================================
//
// A preset lists layers bottom to top. Every field is optional and falls back
// to the same default a freshly added layer gets. Logo layers name an image
// file; relative paths resolve against the preset's own directory.
//
//   {
//     "layers": [
//       { "kind": "image", "logo": "logo.png", "size": 120, "posX": 85, "posY": 90 },
//       { "text": "© Studio", "tiled": true, "rotation": -30, "opacity": 0.4 }
//     ]
//   }
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::{AssetId, AssetLibrary};
use crate::blend::BlendMode;
use crate::error::{MarkError, Result};
use crate::layer::{Color, Layer, LayerKind, LayerStack, TextMark};
use crate::workspace::Workspace;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    #[default]
    Text,
    Image,
}

/// One layer description. Field names follow the camelCase keys of the
/// settings panel (`posX`, `blendMode`, `tileDensity`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerPreset {
    pub kind: PresetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<PathBuf>,
    pub visible: bool,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    pub size: f32,
    pub pos_x: f32,
    pub pos_y: f32,
    pub rotation: f32,
    pub tiled: bool,
    pub tile_density: f32,
    pub text_color: Color,
    pub bold: bool,
    pub italic: bool,
    pub stroke_width: f32,
    pub stroke_color: Color,
    pub has_background: bool,
    pub background_color: Color,
    pub background_padding: f32,
    pub has_shadow: bool,
}

impl Default for LayerPreset {
    fn default() -> Self {
        Self::from_layer(&Layer::new_text(TextMark::default().content), None)
    }
}

impl LayerPreset {
    /// Describe an existing layer. `logo` is the path written for image layers.
    pub fn from_layer(layer: &Layer, logo: Option<PathBuf>) -> Self {
        let mark = layer.text().cloned().unwrap_or_default();
        Self {
            kind: if layer.kind.is_text() { PresetKind::Text } else { PresetKind::Image },
            name: Some(layer.name.clone()),
            text: mark.content,
            logo,
            visible: layer.visible,
            blend_mode: layer.blend_mode,
            opacity: layer.opacity,
            size: layer.size,
            pos_x: layer.pos_x,
            pos_y: layer.pos_y,
            rotation: layer.rotation,
            tiled: layer.tiled,
            tile_density: layer.tile_density,
            text_color: mark.color,
            bold: mark.bold,
            italic: mark.italic,
            stroke_width: mark.stroke_width,
            stroke_color: mark.stroke_color,
            has_background: layer.has_background,
            background_color: layer.background_color,
            background_padding: layer.background_padding,
            has_shadow: layer.has_shadow,
        }
    }

    /// Build a layer. Image presets need the id of their registered logo.
    pub fn to_layer(&self, asset: Option<AssetId>) -> Result<Layer> {
        let mut layer = match self.kind {
            PresetKind::Text => Layer::new_text(self.text.clone()),
            PresetKind::Image => {
                let asset = asset.ok_or_else(|| MarkError::InvalidPreset("image layer without a logo".into()))?;
                Layer::new_image(asset)
            }
        };
        if let LayerKind::Text(mark) = &mut layer.kind {
            mark.color = self.text_color;
            mark.bold = self.bold;
            mark.italic = self.italic;
            mark.stroke_width = self.stroke_width;
            mark.stroke_color = self.stroke_color;
        }
        if let Some(name) = &self.name {
            layer.name = name.clone();
        }
        layer.visible = self.visible;
        layer.blend_mode = self.blend_mode;
        layer.opacity = self.opacity;
        layer.size = self.size;
        layer.pos_x = self.pos_x;
        layer.pos_y = self.pos_y;
        layer.rotation = self.rotation;
        layer.tiled = self.tiled;
        layer.tile_density = self.tile_density;
        layer.has_background = self.has_background;
        layer.background_color = self.background_color;
        layer.background_padding = self.background_padding;
        layer.has_shadow = self.has_shadow;
        layer.sanitize();
        Ok(layer)
    }
}

/// A saved layer stack, bottom layer first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub layers: Vec<LayerPreset>,
}

impl Preset {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let preset = Self::from_json(&text)?;
        log_info!("Preset loaded: {} ({} layer(s))", path.display(), preset.layers.len());
        Ok(preset)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        log_info!("Preset saved: {}", path.display());
        Ok(())
    }

    /// Describe a workspace's stack. Image layers record their logo's name as
    /// the file path, since decoded logos do not remember where they came from.
    pub fn from_stack(stack: &LayerStack, assets: &AssetLibrary) -> Self {
        let layers = stack
            .iter()
            .map(|layer| {
                let logo = layer
                    .asset()
                    .map(|id| assets.get(id).map(|a| PathBuf::from(&a.name)).unwrap_or_default());
                LayerPreset::from_layer(layer, logo)
            })
            .collect();
        Self { layers }
    }

    /// Decode referenced logos into `assets` and build the layer stack.
    /// A logo file named by several layers is decoded once.
    pub fn build(&self, assets: &mut AssetLibrary, base_dir: &Path) -> Result<LayerStack> {
        let mut loaded: HashMap<PathBuf, AssetId> = HashMap::new();
        let mut layers = Vec::with_capacity(self.layers.len());
        for entry in &self.layers {
            let asset = match (entry.kind, &entry.logo) {
                (PresetKind::Text, _) => None,
                (PresetKind::Image, None) => {
                    return Err(MarkError::InvalidPreset("image layer is missing its \"logo\" path".into()));
                }
                (PresetKind::Image, Some(logo)) => {
                    let path = if logo.is_absolute() { logo.clone() } else { base_dir.join(logo) };
                    let id = match loaded.get(&path) {
                        Some(id) => *id,
                        None => {
                            let pixels = image::open(&path)?.to_rgba8();
                            let name = path
                                .file_name()
                                .map(|s| s.to_string_lossy().to_string())
                                .unwrap_or_else(|| "logo".to_string());
                            let id = assets.add(name, pixels);
                            loaded.insert(path, id);
                            id
                        }
                    };
                    Some(id)
                }
            };
            layers.push(entry.to_layer(asset)?);
        }
        LayerStack::from_layers(layers).ok_or_else(|| MarkError::InvalidPreset("preset has no layers".into()))
    }

    /// Replace the workspace's layers with this preset's. Returns the layer count.
    pub fn apply(&self, ws: &mut Workspace, base_dir: &Path) -> Result<usize> {
        let stack = self.build(ws.assets_mut(), base_dir)?;
        let count = stack.len();
        ws.replace_layers(stack);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn omitted_fields_take_layer_defaults() {
        let preset = Preset::from_json(r#"{ "layers": [ { "text": "hello" } ] }"#).unwrap();
        let layer = preset.layers[0].to_layer(None).unwrap();
        let fresh = Layer::new_text("hello");
        assert_eq!(layer.text(), fresh.text());
        assert_eq!(layer.opacity, fresh.opacity);
        assert_eq!(layer.size, fresh.size);
        assert_eq!(layer.tile_density, fresh.tile_density);
        assert!(layer.has_shadow);
    }

    #[test]
    fn camel_case_keys_and_kebab_blend_names() {
        let json = r##"{ "layers": [ {
            "text": "x", "posX": 10, "posY": 90, "blendMode": "soft-light",
            "textColor": "#ff0000", "tileDensity": 75, "opacity": 3.0, "size": 1
        } ] }"##;
        let layer = Preset::from_json(json).unwrap().layers[0].to_layer(None).unwrap();
        assert_eq!((layer.pos_x, layer.pos_y), (10.0, 90.0));
        assert_eq!(layer.blend_mode, BlendMode::SoftLight);
        assert_eq!(layer.text().unwrap().color, Color([255, 0, 0, 255]));
        assert_eq!(layer.tile_density, 75.0);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.size, crate::layer::MIN_LAYER_SIZE);
    }

    #[test]
    fn empty_preset_is_rejected() {
        let err = Preset::default().build(&mut AssetLibrary::new(), Path::new(".")).unwrap_err();
        assert!(matches!(err, MarkError::InvalidPreset(_)));
    }

    #[test]
    fn image_layer_without_logo_is_rejected() {
        let preset = Preset::from_json(r#"{ "layers": [ { "kind": "image" } ] }"#).unwrap();
        let err = preset.build(&mut AssetLibrary::new(), Path::new(".")).unwrap_err();
        assert!(matches!(err, MarkError::InvalidPreset(_)));
    }

    #[test]
    fn logos_resolve_relative_to_preset_and_are_shared() {
        let dir = std::env::temp_dir().join(format!("markfe-preset-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255])).save(dir.join("logo.png")).unwrap();
        let json = r#"{ "layers": [
            { "kind": "image", "logo": "logo.png" },
            { "kind": "image", "logo": "logo.png", "tiled": true },
            { "text": "top" }
        ] }"#;
        let preset = Preset::from_json(json).unwrap();
        let path = dir.join("preset.json");
        preset.save(&path).unwrap();

        let mut ws = Workspace::default();
        let n = Preset::load(&path).unwrap().apply(&mut ws, &dir).unwrap();
        assert_eq!(n, 3);
        assert_eq!(ws.assets().len(), 1);
        let stack = ws.layers().as_slice();
        assert_eq!(stack[0].asset(), stack[1].asset());
        assert_eq!(ws.active_layer_id(), stack[2].id);
        assert_eq!(ws.assets().get(stack[0].asset().unwrap()).unwrap().width(), 8);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stack_round_trips_through_json() {
        let mut stack = LayerStack::new(Layer::new_text("bottom"));
        let top = stack.add(LayerKind::Text(TextMark { content: "top".into(), italic: true, ..TextMark::default() }));
        let preset = Preset::from_stack(&stack, &AssetLibrary::new());
        let back = Preset::from_json(&preset.to_json().unwrap()).unwrap();
        assert_eq!(back, preset);
        let rebuilt = back.build(&mut AssetLibrary::new(), Path::new(".")).unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert!(rebuilt.top().text().unwrap().italic);
        assert_eq!(rebuilt.top().pos_x, stack.get(top).unwrap().pos_x);
    }
}
