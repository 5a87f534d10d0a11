//! The drawing capability set the compositor and lattice renderer paint
//! through, plus the brush images they paint with.
//!
//! Implementations live outside the core (`brushgrid-raster` provides a CPU
//! one). Clip regions are only opened through [`ClipScope`], which pops the
//! clip when dropped; tint is an argument of each brush draw and is never
//! stored on the surface.

use std::ops::{Deref, DerefMut};

use glam::{DAffine2, DVec2};

use crate::color::Srgb;
use crate::error::GridError;
use crate::prng::Xorshift64;

/// Stroke parameters for lattice curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Srgb,
    /// Opacity in [0, 1].
    pub alpha: f64,
    /// Line width in canvas pixels. Surfaces may floor this to their
    /// smallest visible width.
    pub weight: f64,
}

/// A 2D drawing target.
///
/// All coordinates are canvas pixels. Brush transforms map brush-centered
/// coordinates (origin at the image center, units of brush pixels) into
/// canvas space.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Fills the whole surface with `color`, ignoring any clip.
    fn clear(&mut self, color: Srgb);

    /// Fills a closed polygon (even-odd rule) inside the current clip.
    fn fill_polygon(&mut self, polygon: &[DVec2], color: Srgb);

    /// Intersects the current clip with `polygon`. Prefer [`ClipScope`].
    fn push_clip(&mut self, polygon: &[DVec2]);

    /// Restores the clip active before the matching `push_clip`.
    fn pop_clip(&mut self);

    /// Draws `brush` through `transform`, multiplying its colors by `tint`.
    fn draw_brush(&mut self, brush: &BrushImage, transform: DAffine2, tint: Srgb);

    /// Strokes a Catmull-Rom curve through `points`. The first and last
    /// points only shape the ends; the curve runs from the second point to
    /// the second-to-last.
    fn stroke_curve(&mut self, points: &[DVec2], style: &StrokeStyle);
}

/// A polygon clip that is popped when the scope drops.
///
/// Derefs to the surface, so drawing inside the scope goes through it.
pub struct ClipScope<'a, S: Surface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: Surface + ?Sized> ClipScope<'a, S> {
    pub fn new(surface: &'a mut S, polygon: &[DVec2]) -> Self {
        surface.push_clip(polygon);
        Self { surface }
    }
}

impl<S: Surface + ?Sized> Deref for ClipScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: Surface + ?Sized> DerefMut for ClipScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: Surface + ?Sized> Drop for ClipScope<'_, S> {
    fn drop(&mut self) {
        self.surface.pop_clip();
    }
}

/// An RGBA8 brush image, already alpha-preprocessed.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl BrushImage {
    /// Wraps a row-major RGBA8 buffer of `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::InvalidDimensions);
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(GridError::InvalidDimensions)?;
        if rgba.len() != expected {
            return Err(GridError::AssetUnavailable(format!(
                "brush buffer has {} bytes, expected {expected}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width as f64, self.height as f64)
    }

    /// The RGBA texel at `(x, y)`, or `None` outside the image.
    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }
}

/// The brushes available to the compositor.
#[derive(Debug, Clone, Default)]
pub struct BrushSet {
    brushes: Vec<BrushImage>,
}

impl BrushSet {
    pub fn new(brushes: Vec<BrushImage>) -> Self {
        Self { brushes }
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&BrushImage, GridError> {
        self.brushes.get(index).ok_or_else(|| {
            GridError::AssetUnavailable(format!(
                "brush {index} requested from a set of {}",
                self.brushes.len()
            ))
        })
    }

    /// A uniformly random brush.
    pub fn pick(&self, rng: &mut Xorshift64) -> Result<&BrushImage, GridError> {
        rng.pick(&self.brushes)
            .ok_or_else(|| GridError::AssetUnavailable("brush set is empty".to_string()))
    }
}
