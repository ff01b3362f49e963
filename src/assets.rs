// ============================================================================
// LOGO LIBRARY: decoded logo bitmaps shared by image layers
// ============================================================================

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarkError, Result};
use crate::layer::ConfirmGate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        AssetId(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable decoded logo. Pixels are shared, never copied per layer.
#[derive(Clone, Debug)]
pub struct LogoAsset {
    pub id: AssetId,
    pub name: String,
    pixels: Arc<RgbaImage>,
}

impl LogoAsset {
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Height / width. `None` for a degenerate (zero-sized) bitmap.
    pub fn aspect(&self) -> Option<f32> {
        if self.width() == 0 || self.height() == 0 {
            None
        } else {
            Some(self.height() as f32 / self.width() as f32)
        }
    }
}

/// Logo assets keyed by id, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct AssetLibrary {
    assets: Vec<LogoAsset>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, pixels: RgbaImage) -> AssetId {
        self.insert_with_id(AssetId::new(), name, pixels)
    }

    /// Insert under a known id (project load). Replaces any asset with that id.
    pub fn insert_with_id(&mut self, id: AssetId, name: impl Into<String>, pixels: RgbaImage) -> AssetId {
        let name = name.into();
        log_info!("Logo '{}' added ({}x{})", name, pixels.width(), pixels.height());
        let asset = LogoAsset { id, name, pixels: Arc::new(pixels) };
        match self.assets.iter_mut().find(|a| a.id == id) {
            Some(slot) => *slot = asset,
            None => self.assets.push(asset),
        }
        id
    }

    pub fn get(&self, id: AssetId) -> Option<&LogoAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogoAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Delete a logo once `gate` confirms. Layers still referencing it stay in
    /// their stack and are skipped at render time.
    pub fn remove(&mut self, id: AssetId, gate: &mut dyn ConfirmGate) -> Result<LogoAsset> {
        let idx = self
            .assets
            .iter()
            .position(|a| a.id == id)
            .ok_or(MarkError::UnknownAsset(id))?;
        let prompt = format!("Delete logo '{}'?", self.assets[idx].name);
        if !gate.confirm(&prompt) {
            log_warn!("Logo deletion declined: {}", self.assets[idx].name);
            return Err(MarkError::NotConfirmed(prompt));
        }
        let removed = self.assets.remove(idx);
        log_info!("Logo '{}' deleted", removed.name);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_needs_confirmation() {
        let mut lib = AssetLibrary::new();
        let id = lib.add("logo", RgbaImage::new(4, 2));
        assert!(lib.remove(id, &mut |_: &str| false).is_err());
        assert!(lib.contains(id));
        let removed = lib.remove(id, &mut |_: &str| true).unwrap();
        assert_eq!(removed.name, "logo");
        assert!(lib.is_empty());
    }

    #[test]
    fn aspect_is_height_over_width() {
        let mut lib = AssetLibrary::new();
        let id = lib.add("wide", RgbaImage::new(200, 50));
        assert_eq!(lib.get(id).unwrap().aspect(), Some(0.25));
    }

    #[test]
    fn unknown_asset_is_an_error() {
        let mut lib = AssetLibrary::new();
        assert!(matches!(lib.remove(AssetId::new(), &mut |_: &str| true), Err(MarkError::UnknownAsset(_))));
    }
}
