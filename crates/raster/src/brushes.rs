//! Brush assets.
//!
//! Scanned brushes are dark marks on a light ground. [`preprocess`] turns
//! them into white marks whose alpha follows their brightness, so a tint
//! multiplies straight through. [`procedural`] builds a comparable set from
//! Perlin noise when no scans are available.

use brushgrid_core::error::GridError;
use brushgrid_core::surface::{BrushImage, BrushSet};
use brushgrid_core::Xorshift64;
use noise::{NoiseFn, Perlin};

/// Brightness at or below which a preprocessed texel is fully transparent.
const ALPHA_FLOOR: f64 = 100.0;

/// Inverts RGB in place and derives alpha from the inverted brightness,
/// mapping [100, 255] linearly onto [0, 255].
pub fn preprocess(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = 255 - *c;
        }
        let brightness = (px[0] as f64 + px[1] as f64 + px[2] as f64) / 3.0;
        let alpha = (brightness - ALPHA_FLOOR) / (255.0 - ALPHA_FLOOR) * 255.0;
        px[3] = alpha.clamp(0.0, 255.0).round() as u8;
    }
}

/// Bristle frequency across the stroke and along it.
const BRISTLE_FREQ: (f64, f64) = (0.04, 0.45);
const EDGE_FREQ: f64 = 0.08;

/// `count` white, soft-edged horizontal strokes of `width × height` texels.
///
/// Each brush gets its own noise seed from `rng`, so the set is reproducible
/// for a given generator state.
pub fn procedural(
    count: usize,
    width: u32,
    height: u32,
    rng: &mut Xorshift64,
) -> Result<BrushSet, GridError> {
    if width == 0 || height == 0 {
        return Err(GridError::InvalidDimensions);
    }
    let brushes = (0..count)
        .map(|_| stroke(width, height, Perlin::new(rng.next_u32())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BrushSet::new(brushes))
}

fn stroke(width: u32, height: u32, noise: Perlin) -> Result<BrushImage, GridError> {
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    let (hw, hh) = (width as f64 / 2.0, height as f64 / 2.0);
    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f64 + 0.5, y as f64 + 0.5);
            let u = (fx - hw) / hw;
            let v = (fy - hh) / hh;
            // Ragged ellipse, streaked along x.
            let edge = noise.get([fx * EDGE_FREQ, fy * EDGE_FREQ, 7.3]) * 0.35;
            let body = 1.0 - (u.powi(4) + v * v) + edge;
            let bristle = noise.get([fx * BRISTLE_FREQ.0, fy * BRISTLE_FREQ.1, 0.5]);
            let coverage = (body * 2.5).clamp(0.0, 1.0) * (0.85 + 0.3 * bristle).clamp(0.0, 1.0);
            rgba.extend_from_slice(&[255, 255, 255, (coverage * 255.0).round() as u8]);
        }
    }
    BrushImage::new(width, height, rgba)
}

#[cfg(feature = "png")]
pub use dir::{load_dir, load_file};

#[cfg(feature = "png")]
mod dir {
    use std::path::Path;

    use tracing::{debug, warn};

    use super::*;

    /// Loads and preprocesses one brush image.
    pub fn load_file(path: &Path) -> Result<BrushImage, GridError> {
        let img = image::open(path)
            .map_err(|e| GridError::AssetUnavailable(format!("{}: {e}", path.display())))?
            .to_rgba8();
        let (w, h) = img.dimensions();
        let mut rgba = img.into_raw();
        preprocess(&mut rgba);
        BrushImage::new(w, h, rgba)
    }

    /// Loads every `.png` in `dir`, sorted by file name.
    ///
    /// Unreadable files are skipped with a warning. A missing directory or
    /// one with no loadable brushes is [`GridError::AssetUnavailable`].
    pub fn load_dir(dir: &Path) -> Result<BrushSet, GridError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| GridError::AssetUnavailable(format!("{}: {e}", dir.display())))?;
        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        paths.sort();

        let mut brushes = Vec::with_capacity(paths.len());
        for path in &paths {
            match load_file(path) {
                Ok(brush) => brushes.push(brush),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping brush"),
            }
        }
        if brushes.is_empty() {
            return Err(GridError::AssetUnavailable(format!(
                "no brushes in {}",
                dir.display()
            )));
        }
        debug!(count = brushes.len(), dir = %dir.display(), "loaded brushes");
        Ok(BrushSet::new(brushes))
    }
}
