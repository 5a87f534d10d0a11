//! PNG output of a [`PixelSurface`].
//!
//! Feature-gated behind `png` (default on) so the pixel surface can be used
//! without the `image` crate.

use std::path::Path;

use brushgrid_core::error::GridError;
use brushgrid_core::surface::Surface;

use crate::pixel::PixelSurface;

/// Writes the surface as an RGBA PNG.
///
/// Returns `GridError::Io` on write failure or while a clip is still open.
pub fn write_png(surface: &mut PixelSurface, path: &Path) -> Result<(), GridError> {
    let rgba = surface.to_rgba()?;
    let img = image::RgbaImage::from_raw(surface.width(), surface.height(), rgba)
        .ok_or_else(|| GridError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path).map_err(|e| GridError::Io(e.to_string()))
}
