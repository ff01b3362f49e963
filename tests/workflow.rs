use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use markfe::config::Preset;
use markfe::export;
use markfe::layer::{LayerKind, LayerProperty};
use markfe::project::{self, Project};
use markfe::workspace::Workspace;
use markfe::MarkError;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("markfe-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn photo(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]))
}

#[test]
fn batch_export_writes_every_selected_image() {
    let dir = scratch_dir("batch");
    let mut ws = Workspace::default();
    let a = ws.add_image("a.png", photo(64, 48));
    ws.add_image("b.jpg", photo(32, 32));
    ws.add_image("c.png", photo(16, 16));
    ws.select_all_for_export();
    ws.toggle_export_selection(a);

    let written = export::write_batch(&ws, &dir, 85).unwrap();
    assert_eq!(written, vec![dir.join("watermarked_b.jpg"), dir.join("watermarked_c.png")]);
    let b = image::open(&written[0]).unwrap();
    assert_eq!((b.width(), b.height()), (32, 32));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn removing_the_selected_image_selects_its_predecessor() {
    let mut ws = Workspace::default();
    ws.add_image("a.png", photo(8, 8));
    ws.add_image("b.png", photo(8, 8));
    let c = ws.add_image("c.png", photo(8, 8));
    assert!(ws.select_image(2));
    ws.remove_image(c).unwrap();
    assert_eq!(ws.selected_index(), Some(1));
    assert_eq!(ws.selected_image().unwrap().name, "b.png");
}

#[test]
fn sync_to_all_requires_confirmation() {
    let mut ws = Workspace::default();
    ws.add_text_layer("second");
    let mut refuse = |_: &str| false;
    assert!(matches!(
        ws.sync_to_all(LayerProperty::Opacity(0.3), &mut refuse),
        Err(MarkError::NotConfirmed(_))
    ));
    assert!(ws.layers().iter().all(|l| l.opacity != 0.3));

    let mut accept = |_: &str| true;
    ws.sync_to_all(LayerProperty::Opacity(0.3), &mut accept).unwrap();
    assert!(ws.layers().iter().all(|l| l.opacity == 0.3));
}

#[test]
fn deleting_a_logo_leaves_its_layers_as_harmless_orphans() {
    let mut ws = Workspace::default();
    ws.add_image("shot.png", photo(50, 50));
    let (asset, layer) = ws.add_logo("logo.png", RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
    let with_logo = ws.render_export(&ws.images()[0]);

    let mut accept = |_: &str| true;
    ws.remove_logo(asset, &mut accept).unwrap();
    assert!(ws.layers().contains(layer));
    let without_logo = ws.render_export(&ws.images()[0]);
    assert_ne!(with_logo, without_logo);

    ws.remove_layer(layer).unwrap();
    assert_eq!(ws.render_export(&ws.images()[0]), without_logo);
}

#[test]
fn preset_and_project_rebuild_the_same_render() {
    let dir = scratch_dir("design");
    let logo = RgbaImage::from_pixel(12, 6, Rgba([0, 200, 255, 255]));
    logo.save(dir.join("logo.png")).unwrap();

    let mut ws = Workspace::default();
    ws.add_image("shot.png", photo(120, 90));
    let json = r#"{ "layers": [
        { "text": "PROOF", "tiled": true, "rotation": -30, "opacity": 0.4, "blendMode": "screen" },
        { "kind": "image", "logo": "logo.png", "size": 200, "posX": 80, "posY": 80 }
    ] }"#;
    Preset::from_json(json).unwrap().apply(&mut ws, &dir).unwrap();
    assert_eq!(ws.layers().len(), 2);
    assert!(matches!(ws.layers().top().kind, LayerKind::Image { .. }));
    let from_preset = ws.render_export(&ws.images()[0]);

    let path = dir.join("design.mfe");
    project::save_project(&ws, &path).unwrap();
    let mut fresh = Workspace::default();
    fresh.add_image("shot.png", photo(120, 90));
    project::load_project(&mut fresh, &path).unwrap();
    assert_eq!(fresh.render_export(&fresh.images()[0]), from_preset);

    let bytes = Project::from_workspace(&fresh).encode().unwrap();
    assert_eq!(Project::decode(&bytes).unwrap().layers, *ws.layers());
    std::fs::remove_dir_all(&dir).ok();
}
