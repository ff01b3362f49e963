//! Crate error type.

use thiserror::Error;

use crate::assets::AssetId;
use crate::layer::LayerId;

/// Errors surfaced by layer-stack, asset, inpainting and I/O operations.
///
/// Conditions the renderer treats as soft (a layer referencing a deleted logo)
/// never appear here.
#[derive(Debug, Error)]
pub enum MarkError {
    /// The stack must always keep one layer.
    #[error("cannot remove the last remaining layer")]
    LastLayer,

    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),

    #[error("unknown logo asset {0}")]
    UnknownAsset(AssetId),

    /// A confirmation gate declined a bulk or destructive operation.
    #[error("operation not confirmed: {0}")]
    NotConfirmed(String),

    /// Region fill requested with nothing painted into the mask.
    #[error("the fill mask is empty")]
    EmptyMask,

    #[error("mask is {mask_w}x{mask_h} but the image is {image_w}x{image_h}")]
    MaskSizeMismatch { mask_w: u32, mask_h: u32, image_w: u32, image_h: u32 },

    #[error("no image is loaded")]
    NoImage,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("preset error: {0}")]
    Preset(#[from] serde_json::Error),

    /// A preset parsed but describes nothing usable (no layers, missing logo path).
    #[error("invalid preset: {0}")]
    InvalidPreset(String),

    #[error("project file error: {0}")]
    Project(String),
}

impl From<Box<bincode::ErrorKind>> for MarkError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        MarkError::Project(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarkError>;
