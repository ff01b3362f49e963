// ============================================================================
// LAYER MODEL: watermark marks and the ordered, never-empty layer stack
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::AssetId;
use crate::blend::BlendMode;
use crate::error::{MarkError, Result};

/// Smallest size a mark may shrink to (per-mille of canvas width).
pub const MIN_LAYER_SIZE: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        LayerId(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Straight-alpha RGBA colour, serialized as `#rrggbb` / `#rrggbbaa`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }

    pub fn parse_hex(s: &str) -> Option<Color> {
        let hex = s.trim().trim_start_matches('#');
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Color([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Color([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            3 => {
                let nib = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|v| v * 17);
                Some(Color([nib(0)?, nib(1)?, nib(2)?, 255]))
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid colour '{}'", s)))
    }
}

/// Text mark contents and styling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextMark {
    pub content: String,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    /// Stroke width in per-mille of canvas width ×0.5; 0 disables the stroke.
    pub stroke_width: f32,
    pub stroke_color: Color,
}

impl Default for TextMark {
    fn default() -> Self {
        Self {
            content: "@watermark".to_string(),
            color: Color::WHITE,
            bold: true,
            italic: false,
            stroke_width: 2.0,
            stroke_color: Color::BLACK,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Text(TextMark),
    Image { asset: AssetId },
}

impl LayerKind {
    pub fn is_text(&self) -> bool {
        matches!(self, LayerKind::Text(_))
    }
}

/// One watermark element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    /// Resolution-independent scale: `size / 1000 × canvas width` is the font
    /// size (text) or logo width (image).
    pub size: f32,
    /// Anchor in percent of canvas width / height. Ignored when tiled.
    pub pos_x: f32,
    pub pos_y: f32,
    /// Degrees, accumulated (not wrapped).
    pub rotation: f32,
    pub tiled: bool,
    pub tile_density: f32,
    pub has_background: bool,
    pub background_color: Color,
    /// Padding around the content box, per-mille of canvas width.
    pub background_padding: f32,
    /// Drop shadow behind the fill. Has no effect while `has_background` is set.
    pub has_shadow: bool,
}

impl Layer {
    pub fn new_text(content: impl Into<String>) -> Self {
        let text = TextMark { content: content.into(), ..TextMark::default() };
        Self::with_kind("Text Mark", LayerKind::Text(text))
    }

    pub fn new_image(asset: AssetId) -> Self {
        Self::with_kind("Logo Mark", LayerKind::Image { asset })
    }

    fn with_kind(name: &str, kind: LayerKind) -> Self {
        Self {
            id: LayerId::new(),
            name: name.to_string(),
            kind,
            visible: true,
            blend_mode: BlendMode::Normal,
            opacity: 0.8,
            size: 150.0,
            pos_x: 50.0,
            pos_y: 50.0,
            rotation: 0.0,
            tiled: false,
            tile_density: 50.0,
            has_background: false,
            background_color: Color::BLACK,
            background_padding: 10.0,
            has_shadow: true,
        }
    }

    pub fn text(&self) -> Option<&TextMark> {
        match &self.kind {
            LayerKind::Text(t) => Some(t),
            LayerKind::Image { .. } => None,
        }
    }

    pub fn asset(&self) -> Option<AssetId> {
        match &self.kind {
            LayerKind::Image { asset } => Some(*asset),
            LayerKind::Text(_) => None,
        }
    }

    /// Whether the drop shadow is actually drawn (background dominates).
    pub fn shadow_active(&self) -> bool {
        self.has_shadow && !self.has_background
    }

    /// Clamp every numeric field into its valid range.
    pub fn sanitize(&mut self) {
        self.size = clamp_size(self.size);
        self.opacity = clamp_opacity(self.opacity);
        self.tile_density = finite_or(self.tile_density, 0.0).max(0.0);
        self.background_padding = finite_or(self.background_padding, 0.0).max(0.0);
        self.pos_x = finite_or(self.pos_x, 50.0);
        self.pos_y = finite_or(self.pos_y, 50.0);
        self.rotation = finite_or(self.rotation, 0.0);
        if let LayerKind::Text(t) = &mut self.kind {
            t.stroke_width = finite_or(t.stroke_width, 0.0).max(0.0);
        }
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

pub fn clamp_size(size: f32) -> f32 {
    if size.is_nan() {
        return MIN_LAYER_SIZE;
    }
    size.max(MIN_LAYER_SIZE)
}

pub fn clamp_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        return 1.0;
    }
    opacity.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
//  Property edits
// ---------------------------------------------------------------------------

/// A single settable layer property. Used for individual edits and as the
/// payload of [`LayerStack::sync_to_all`].
#[derive(Clone, Debug, PartialEq)]
pub enum LayerProperty {
    Name(String),
    Visible(bool),
    BlendMode(BlendMode),
    Opacity(f32),
    Size(f32),
    Position { x: f32, y: f32 },
    PosX(f32),
    PosY(f32),
    Rotation(f32),
    Tiled(bool),
    TileDensity(f32),
    HasBackground(bool),
    BackgroundColor(Color),
    BackgroundPadding(f32),
    HasShadow(bool),
    // Text-only; ignored on image layers.
    Text(String),
    TextColor(Color),
    Bold(bool),
    Italic(bool),
    StrokeWidth(f32),
    StrokeColor(Color),
}

impl LayerProperty {
    pub fn apply(&self, layer: &mut Layer) {
        match self {
            LayerProperty::Name(v) => layer.name = v.clone(),
            LayerProperty::Visible(v) => layer.visible = *v,
            LayerProperty::BlendMode(v) => layer.blend_mode = *v,
            LayerProperty::Opacity(v) => layer.opacity = *v,
            LayerProperty::Size(v) => layer.size = *v,
            LayerProperty::Position { x, y } => {
                layer.pos_x = *x;
                layer.pos_y = *y;
            }
            LayerProperty::PosX(v) => layer.pos_x = *v,
            LayerProperty::PosY(v) => layer.pos_y = *v,
            LayerProperty::Rotation(v) => layer.rotation = *v,
            LayerProperty::Tiled(v) => layer.tiled = *v,
            LayerProperty::TileDensity(v) => layer.tile_density = *v,
            LayerProperty::HasBackground(v) => layer.has_background = *v,
            LayerProperty::BackgroundColor(v) => layer.background_color = *v,
            LayerProperty::BackgroundPadding(v) => layer.background_padding = *v,
            LayerProperty::HasShadow(v) => layer.has_shadow = *v,
            LayerProperty::Text(_)
            | LayerProperty::TextColor(_)
            | LayerProperty::Bold(_)
            | LayerProperty::Italic(_)
            | LayerProperty::StrokeWidth(_)
            | LayerProperty::StrokeColor(_) => {
                if let LayerKind::Text(t) = &mut layer.kind {
                    match self {
                        LayerProperty::Text(v) => t.content = v.clone(),
                        LayerProperty::TextColor(v) => t.color = *v,
                        LayerProperty::Bold(v) => t.bold = *v,
                        LayerProperty::Italic(v) => t.italic = *v,
                        LayerProperty::StrokeWidth(v) => t.stroke_width = *v,
                        LayerProperty::StrokeColor(v) => t.stroke_color = *v,
                        _ => {}
                    }
                }
            }
        }
        layer.sanitize();
    }

    pub fn label(&self) -> &'static str {
        match self {
            LayerProperty::Name(_) => "name",
            LayerProperty::Visible(_) => "visibility",
            LayerProperty::BlendMode(_) => "blend mode",
            LayerProperty::Opacity(_) => "opacity",
            LayerProperty::Size(_) => "size",
            LayerProperty::Position { .. } => "position",
            LayerProperty::PosX(_) => "horizontal position",
            LayerProperty::PosY(_) => "vertical position",
            LayerProperty::Rotation(_) => "rotation",
            LayerProperty::Tiled(_) => "tiling",
            LayerProperty::TileDensity(_) => "tile density",
            LayerProperty::HasBackground(_) => "background",
            LayerProperty::BackgroundColor(_) => "background colour",
            LayerProperty::BackgroundPadding(_) => "background padding",
            LayerProperty::HasShadow(_) => "shadow",
            LayerProperty::Text(_) => "text",
            LayerProperty::TextColor(_) => "text colour",
            LayerProperty::Bold(_) => "bold",
            LayerProperty::Italic(_) => "italic",
            LayerProperty::StrokeWidth(_) => "stroke width",
            LayerProperty::StrokeColor(_) => "stroke colour",
        }
    }
}

/// External yes/no gate for bulk or destructive operations.
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> ConfirmGate for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

// ---------------------------------------------------------------------------
//  Layer stack
// ---------------------------------------------------------------------------

/// Ordered layer stack. Index 0 is painted first (bottom). Never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl TryFrom<Vec<Layer>> for LayerStack {
    type Error = String;

    fn try_from(layers: Vec<Layer>) -> std::result::Result<Self, Self::Error> {
        LayerStack::from_layers(layers)
            .ok_or_else(|| "a layer stack needs at least one layer and unique ids".to_string())
    }
}

impl From<LayerStack> for Vec<Layer> {
    fn from(stack: LayerStack) -> Self {
        stack.layers
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new(Layer::new_text("@watermark"))
    }
}

impl LayerStack {
    pub fn new(mut first: Layer) -> Self {
        first.sanitize();
        Self { layers: vec![first] }
    }

    /// Build a stack from existing layers. Returns `None` for an empty list
    /// or duplicate ids.
    pub fn from_layers(layers: Vec<Layer>) -> Option<Self> {
        if layers.is_empty() {
            return None;
        }
        let mut stack = Self { layers: Vec::with_capacity(layers.len()) };
        for mut layer in layers {
            if stack.contains(layer.id) {
                return None;
            }
            layer.sanitize();
            stack.layers.push(layer);
        }
        Some(stack)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Bottom-to-top (paint order).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn as_slice(&self) -> &[Layer] {
        &self.layers
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn top(&self) -> &Layer {
        // Non-empty by construction.
        &self.layers[self.layers.len() - 1]
    }

    pub fn bottom(&self) -> &Layer {
        &self.layers[0]
    }

    /// Append a layer on top. A layer whose id is already present gets a fresh one.
    pub fn push(&mut self, mut layer: Layer) -> LayerId {
        if self.contains(layer.id) {
            layer.id = LayerId::new();
        }
        layer.sanitize();
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    /// Add a default layer of the given kind on top, nudged away from the
    /// centre by two percent per existing layer.
    pub fn add(&mut self, kind: LayerKind) -> LayerId {
        let mut layer = match kind {
            LayerKind::Text(t) => {
                let mut l = Layer::new_text(String::new());
                l.kind = LayerKind::Text(t);
                l
            }
            LayerKind::Image { asset } => Layer::new_image(asset),
        };
        let offset = self.layers.len() as f32 * 2.0;
        layer.pos_x = 50.0 + offset;
        layer.pos_y = 50.0 + offset;
        self.push(layer)
    }

    /// Remove a layer. The last remaining layer can never be removed.
    pub fn remove(&mut self, id: LayerId) -> Result<Layer> {
        let idx = self.index_of(id).ok_or(MarkError::UnknownLayer(id))?;
        if self.layers.len() <= 1 {
            log_warn!("Refused to remove layer {}: at least one layer must remain", id);
            return Err(MarkError::LastLayer);
        }
        let removed = self.layers.remove(idx);
        log_info!("Removed layer '{}' ({})", removed.name, id);
        Ok(removed)
    }

    /// Copy a layer onto the top of the stack, offset by 5 % on both axes.
    pub fn duplicate(&mut self, id: LayerId) -> Result<LayerId> {
        let src = self.get(id).ok_or(MarkError::UnknownLayer(id))?;
        let mut copy = src.clone();
        copy.id = LayerId::new();
        copy.name = format!("{} Copy", src.name);
        copy.pos_x += 5.0;
        copy.pos_y += 5.0;
        Ok(self.push(copy))
    }

    /// Move a layer to `new_index` (clamped to the stack).
    pub fn move_to(&mut self, id: LayerId, new_index: usize) -> Result<()> {
        let idx = self.index_of(id).ok_or(MarkError::UnknownLayer(id))?;
        let layer = self.layers.remove(idx);
        let new_index = new_index.min(self.layers.len());
        self.layers.insert(new_index, layer);
        Ok(())
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.layers.len() && b < self.layers.len() {
            self.layers.swap(a, b);
        }
    }

    /// Set one property on one layer, clamping invalid values.
    pub fn set(&mut self, id: LayerId, prop: LayerProperty) -> Result<()> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(MarkError::UnknownLayer(id))?;
        prop.apply(layer);
        Ok(())
    }

    /// Broadcast one property value to every layer once `gate` confirms.
    pub fn sync_to_all(&mut self, prop: LayerProperty, gate: &mut dyn ConfirmGate) -> Result<()> {
        let prompt = format!("Apply {} to all {} layers?", prop.label(), self.layers.len());
        if !gate.confirm(&prompt) {
            return Err(MarkError::NotConfirmed(prompt));
        }
        for layer in &mut self.layers {
            prop.apply(layer);
        }
        log_info!("Synced {} across {} layers", prop.label(), self.layers.len());
        Ok(())
    }

    /// Layers referencing a given logo asset.
    pub fn referencing(&self, asset: AssetId) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(move |l| l.asset() == Some(asset))
    }
}
