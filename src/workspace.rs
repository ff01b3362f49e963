// ============================================================================
// WORKSPACE: the single owner of images, layers, logos and the fill mask
// ============================================================================

use std::collections::HashSet;
use std::fmt;

use image::RgbaImage;
use uuid::Uuid;

use crate::assets::{AssetId, AssetLibrary};
use crate::error::{MarkError, Result};
use crate::geometry::Point;
use crate::gesture::{GestureController, GestureOutcome, GestureTarget, Pointer};
use crate::inpaint::{self, InpaintJob, MaskBuffer, MaskShape, RegionDetector};
use crate::layer::{ConfirmGate, Layer, LayerId, LayerKind, LayerProperty, LayerStack, TextMark};
use crate::render::Compositor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        ImageId(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One base image the marks are applied to.
#[derive(Clone, Debug)]
pub struct TargetImage {
    pub id: ImageId,
    pub name: String,
    pub pixels: RgbaImage,
}

/// Explicit store for one editing session. Every mutation goes through here
/// and bumps [`generation`](Self::generation); previews are re-rendered from
/// scratch whenever it changes.
pub struct Workspace {
    images: Vec<TargetImage>,
    selected: usize,
    export_selection: HashSet<ImageId>,
    layers: LayerStack,
    active_layer: LayerId,
    assets: AssetLibrary,
    mask: MaskBuffer,
    compositor: Compositor,
    gestures: GestureController,
    generation: u64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(Compositor::builtin())
    }
}

impl Workspace {
    pub fn new(compositor: Compositor) -> Self {
        let layers = LayerStack::default();
        let active_layer = layers.top().id;
        Self {
            images: Vec::new(),
            selected: 0,
            export_selection: HashSet::new(),
            layers,
            active_layer,
            assets: AssetLibrary::new(),
            mask: MaskBuffer::new(0, 0),
            compositor,
            gestures: GestureController::new(),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    // -- Images ------------------------------------------------------------

    pub fn images(&self) -> &[TargetImage] {
        &self.images
    }

    pub fn selected_index(&self) -> Option<usize> {
        (!self.images.is_empty()).then_some(self.selected)
    }

    pub fn selected_image(&self) -> Option<&TargetImage> {
        self.images.get(self.selected)
    }

    pub fn add_image(&mut self, name: impl Into<String>, pixels: RgbaImage) -> ImageId {
        let image = TargetImage { id: ImageId::new(), name: name.into(), pixels };
        let id = image.id;
        log_info!("Image '{}' added ({}x{})", image.name, image.pixels.width(), image.pixels.height());
        self.images.push(image);
        if self.images.len() == 1 {
            self.select_image(0);
        }
        self.touch();
        id
    }

    /// Remove an image. Removing the selected one selects its predecessor.
    pub fn remove_image(&mut self, id: ImageId) -> Option<TargetImage> {
        let idx = self.images.iter().position(|i| i.id == id)?;
        let removed = self.images.remove(idx);
        self.export_selection.remove(&id);
        let was_selected = idx == self.selected;
        if idx < self.selected || (was_selected && self.selected > 0) {
            self.selected -= 1;
        }
        if was_selected {
            self.reset_mask();
        }
        self.touch();
        Some(removed)
    }

    pub fn select_image(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.selected = index;
        self.reset_mask();
        self.touch();
        true
    }

    fn reset_mask(&mut self) {
        let (w, h) = self.selected_image().map_or((0, 0), |i| i.pixels.dimensions());
        self.mask = MaskBuffer::new(w, h);
    }

    pub fn toggle_export_selection(&mut self, id: ImageId) {
        if !self.export_selection.remove(&id) && self.images.iter().any(|i| i.id == id) {
            self.export_selection.insert(id);
        }
        self.touch();
    }

    /// Select every image for export, or clear the selection if all are
    /// already selected.
    pub fn select_all_for_export(&mut self) {
        if self.export_selection.len() == self.images.len() {
            self.export_selection.clear();
        } else {
            self.export_selection = self.images.iter().map(|i| i.id).collect();
        }
        self.touch();
    }

    pub fn is_selected_for_export(&self, id: ImageId) -> bool {
        self.export_selection.contains(&id)
    }

    /// Images a batch export covers, in list order: the export selection, or
    /// every image when nothing is selected.
    pub fn export_targets(&self) -> Vec<&TargetImage> {
        if self.export_selection.is_empty() {
            self.images.iter().collect()
        } else {
            self.images.iter().filter(|i| self.export_selection.contains(&i.id)).collect()
        }
    }

    // -- Layers ------------------------------------------------------------

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn active_layer_id(&self) -> LayerId {
        self.active_layer
    }

    pub fn active_layer(&self) -> &Layer {
        self.layers.get(self.active_layer).unwrap_or_else(|| self.layers.top())
    }

    pub fn set_active_layer(&mut self, id: LayerId) -> Result<()> {
        if !self.layers.contains(id) {
            return Err(MarkError::UnknownLayer(id));
        }
        self.active_layer = id;
        self.touch();
        Ok(())
    }

    pub fn add_layer(&mut self, kind: LayerKind) -> LayerId {
        let id = self.layers.add(kind);
        self.active_layer = id;
        self.touch();
        id
    }

    pub fn add_text_layer(&mut self, content: impl Into<String>) -> LayerId {
        self.add_layer(LayerKind::Text(TextMark { content: content.into(), ..TextMark::default() }))
    }

    /// Replace the whole stack (preset or project load).
    pub fn replace_layers(&mut self, layers: LayerStack) {
        self.active_layer = layers.top().id;
        self.layers = layers;
        self.touch();
    }

    /// Swap in a whole document (project load): layers and logo library together.
    pub fn replace_document(&mut self, layers: LayerStack, assets: AssetLibrary) {
        self.assets = assets;
        self.replace_layers(layers);
    }

    pub fn duplicate_layer(&mut self, id: LayerId) -> Result<LayerId> {
        let copy = self.layers.duplicate(id)?;
        self.active_layer = copy;
        self.touch();
        Ok(copy)
    }

    /// Remove a layer. If it was active, the topmost remaining layer takes over.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Layer> {
        let removed = self.layers.remove(id)?;
        if self.active_layer == id {
            self.active_layer = self.layers.top().id;
        }
        self.touch();
        Ok(removed)
    }

    pub fn move_layer(&mut self, id: LayerId, new_index: usize) -> Result<()> {
        self.layers.move_to(id, new_index)?;
        self.touch();
        Ok(())
    }

    pub fn set_layer(&mut self, id: LayerId, prop: LayerProperty) -> Result<()> {
        self.layers.set(id, prop)?;
        self.touch();
        Ok(())
    }

    pub fn sync_to_all(&mut self, prop: LayerProperty, gate: &mut dyn ConfirmGate) -> Result<()> {
        self.layers.sync_to_all(prop, gate)?;
        self.touch();
        Ok(())
    }

    // -- Logos -------------------------------------------------------------

    pub fn assets(&self) -> &AssetLibrary {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetLibrary {
        self.touch();
        &mut self.assets
    }

    /// Register a logo and put an image layer referencing it on top.
    pub fn add_logo(&mut self, name: impl Into<String>, pixels: RgbaImage) -> (AssetId, LayerId) {
        let asset = self.assets.add(name, pixels);
        let layer = self.add_layer(LayerKind::Image { asset });
        (asset, layer)
    }

    /// Delete a logo behind `gate`. Layers that used it stay and render nothing.
    pub fn remove_logo(&mut self, id: AssetId, gate: &mut dyn ConfirmGate) -> Result<()> {
        self.assets.remove(id, gate)?;
        let orphans = self.layers.referencing(id).count();
        if orphans > 0 {
            log_warn!("{} layer(s) now reference a deleted logo and will be skipped", orphans);
        }
        self.touch();
        Ok(())
    }

    // -- Gestures ----------------------------------------------------------

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    /// Feed one pointer event (canvas pixel coordinates of the selected image).
    pub fn handle_pointer(&mut self, event: Pointer) -> GestureOutcome {
        let Some(image) = self.images.get(self.selected) else {
            return GestureOutcome::Ignored;
        };
        let (canvas_w, canvas_h) = image.pixels.dimensions();
        let mut target = GestureTarget {
            layers: &mut self.layers,
            active: &mut self.active_layer,
            assets: &self.assets,
            compositor: &self.compositor,
            canvas_w,
            canvas_h,
        };
        let outcome = self.gestures.handle(event, &mut target);
        if !matches!(outcome, GestureOutcome::Ignored | GestureOutcome::Suppressed) {
            self.touch();
        }
        outcome
    }

    // -- Mask and fill -----------------------------------------------------

    pub fn mask(&self) -> &MaskBuffer {
        &self.mask
    }

    pub fn paint_mask(&mut self, center: Point, radius: f32) {
        self.mask.dab(center, radius);
        self.touch();
    }

    pub fn paint_mask_stroke(&mut self, from: Point, to: Point, radius: f32) {
        self.mask.stroke(from, to, radius);
        self.touch();
    }

    /// Ask `detector` for regions on the selected base image and add them to
    /// the mask.
    pub fn detect_regions(&mut self, detector: &dyn RegionDetector, shape: MaskShape) -> Result<usize> {
        let image = self.images.get(self.selected).ok_or(MarkError::NoImage)?;
        let added = self.mask.add_detected(detector, &image.pixels, shape);
        self.touch();
        Ok(added)
    }

    pub fn clear_mask(&mut self) {
        self.mask.clear();
        self.touch();
    }

    /// Fill the masked region of the selected base image, replace it, and
    /// clear the mask.
    pub fn fill_selected(&mut self) -> Result<()> {
        let image = self.images.get_mut(self.selected).ok_or(MarkError::NoImage)?;
        image.pixels = inpaint::fill(&image.pixels, &self.mask)?;
        self.mask.clear();
        self.touch();
        Ok(())
    }

    /// Like [`fill_selected`](Self::fill_selected) but in chunks of `budget`
    /// pixel updates, calling `yield_now` with the progress between chunks.
    pub fn fill_selected_chunked(&mut self, budget: usize, yield_now: impl FnMut(f32)) -> Result<()> {
        let image = self.images.get_mut(self.selected).ok_or(MarkError::NoImage)?;
        let job = InpaintJob::new(&image.pixels, &self.mask)?;
        image.pixels = job.run(budget, yield_now);
        self.mask.clear();
        self.touch();
        Ok(())
    }

    // -- Rendering ---------------------------------------------------------

    /// Preview of the selected image, with the active layer highlighted.
    pub fn render_preview(&self) -> Option<RgbaImage> {
        let image = self.selected_image()?;
        Some(self.compositor.render(&image.pixels, self.layers.as_slice(), &self.assets, Some(self.active_layer)))
    }

    /// Export rendering of one image: no selection overlay.
    pub fn render_export(&self, image: &TargetImage) -> RgbaImage {
        self.compositor.render(&image.pixels, self.layers.as_slice(), &self.assets, None)
    }
}
