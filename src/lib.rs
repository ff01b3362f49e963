//! MarkFE: layered watermark compositing for raster images.
//!
//! A [`workspace::Workspace`] holds target images, an ordered stack of text and
//! logo layers, a shared logo library and an inpainting mask. The
//! [`render::Compositor`] redraws the stack over any base image on demand;
//! [`gesture::GestureController`] turns pointer streams into layer transforms;
//! [`inpaint`] fills painted regions by neighbour diffusion.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod assets;
pub mod blend;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod gesture;
pub mod hit;
pub mod inpaint;
pub mod layer;
pub mod project;
pub mod render;
pub mod text;
pub mod workspace;

pub use error::{MarkError, Result};
