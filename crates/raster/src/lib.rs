#![deny(unsafe_code)]
//! CPU rendering backend for brushgrid.
//!
//! [`PixelSurface`] implements the core's `Surface` trait on an
//! anti-aliased `vello_cpu` render context. [`brushes`] prepares brush
//! images, either generated from noise or (with the `png` feature) loaded
//! from a directory, and [`snapshot`] writes a surface out as PNG.
//!
//! The `png` feature (default on) gates everything that needs the `image`
//! crate, so the pixel path builds without it.

pub mod brushes;
pub mod pixel;

#[cfg(feature = "png")]
pub mod snapshot;

pub use pixel::PixelSurface;
