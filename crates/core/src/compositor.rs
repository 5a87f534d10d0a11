//! Clipped multi-layer brush painting of single cells and blocks.
//!
//! Each paint step fills the footprint polygon with the background color,
//! clips to it, and stamps one to three tinted brush layers centred on the
//! polygon. Later layers jitter the tint in HSB, the position and the
//! rotation so stacked layers read as one textured stroke.

use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::color::{Hsb, Srgb};
use crate::composition::Block;
use crate::config::GridConfig;
use crate::error::GridError;
use crate::geometry::{centroid, quad_extents, PointMatrix};
use crate::prng::Xorshift64;
use crate::surface::{BrushImage, BrushSet, ClipScope, Surface};

/// Which lattice points bound a block's polygon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outline {
    /// The four corner points only.
    #[default]
    Corners,
    /// Every lattice point along the block's edges.
    Perimeter,
}

/// Ranges for one kind of paint step. Every `(lo, hi)` pair is sampled
/// uniformly; jitters are symmetric around zero.
struct LayerStyle {
    /// Layer count range, upper bound exclusive.
    layers: (usize, usize),
    scale_border: (f64, f64),
    scale_interior: (f64, f64),
    hsb_jitter: (f64, f64, f64),
    offset: f64,
    rotation: f64,
    /// Whether every layer re-picks its brush.
    repick: bool,
    /// Whether the x and y fits get their own scale multiplier.
    split_axes: bool,
}

const CELL: LayerStyle = LayerStyle {
    layers: (1, 3),
    scale_border: (1.3, 1.8),
    scale_interior: (1.1, 1.3),
    hsb_jitter: (8.0, 3.0, 5.0),
    offset: 2.0,
    rotation: 0.05,
    repick: false,
    split_axes: false,
};

const BLOCK: LayerStyle = LayerStyle {
    layers: (2, 4),
    scale_border: (1.3, 1.8),
    scale_interior: (1.0, 1.2),
    hsb_jitter: (5.0, 2.0, 3.0),
    offset: 5.0,
    rotation: 0.02,
    repick: true,
    split_axes: true,
};

impl LayerStyle {
    /// Per-axis scale multiplier for one paint step, drawn once and shared
    /// by all its layers.
    fn multiplier(&self, border: bool, rng: &mut Xorshift64) -> DVec2 {
        let (lo, hi) = if border {
            self.scale_border
        } else {
            self.scale_interior
        };
        let x = rng.next_range(lo, hi);
        if self.split_axes {
            DVec2::new(x, rng.next_range(lo, hi))
        } else {
            DVec2::splat(x)
        }
    }
}

/// Fixed scale applied on top of every layer's base scale.
const LAYER_SCALE: f64 = 1.2;

/// Paints cells and blocks of a composition onto a [`Surface`].
#[derive(Debug, Clone)]
pub struct BrushCompositor {
    cols: usize,
    rows: usize,
    area_size: f64,
    bleed: f64,
    background: Srgb,
}

impl BrushCompositor {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            cols: config.cols,
            rows: config.rows,
            area_size: config.area_size,
            bleed: config.bleed,
            background: config.background,
        }
    }

    pub fn background(&self) -> Srgb {
        self.background
    }

    /// The cell's quad. Border cells are pushed at least `bleed` pixels past
    /// the canvas edge so no seam shows; `points` is not modified.
    pub fn cell_polygon(
        &self,
        points: &PointMatrix,
        col: usize,
        row: usize,
    ) -> Result<[DVec2; 4], GridError> {
        let [mut tl, mut tr, mut br, mut bl] = points.footprint_corners(col, row, 1, 1)?;
        let (lo, hi) = (-self.bleed, self.area_size + self.bleed);
        if col == 0 {
            tl.x = tl.x.min(lo);
            bl.x = bl.x.min(lo);
        }
        if col + 1 == self.cols {
            tr.x = tr.x.max(hi);
            br.x = br.x.max(hi);
        }
        if row == 0 {
            tl.y = tl.y.min(lo);
            tr.y = tr.y.min(lo);
        }
        if row + 1 == self.rows {
            br.y = br.y.max(hi);
            bl.y = bl.y.max(hi);
        }
        Ok([tl, tr, br, bl])
    }

    fn on_border(&self, col: usize, row: usize) -> bool {
        col == 0 || row == 0 || col + 1 == self.cols || row + 1 == self.rows
    }

    /// Paints one cell with 1–2 layers of a single brush.
    #[allow(clippy::too_many_arguments)]
    pub fn paint_cell<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        points: &PointMatrix,
        brushes: &BrushSet,
        col: usize,
        row: usize,
        color: Srgb,
        rng: &mut Xorshift64,
    ) -> Result<(), GridError> {
        let quad = self.cell_polygon(points, col, row)?;
        let brush = brushes.pick(rng);
        self.paint_layers(
            surface,
            &quad,
            quad_extents(&quad),
            &CELL,
            self.on_border(col, row),
            brushes,
            brush.ok(),
            color,
            rng,
        );
        Ok(())
    }

    /// Paints a block with 2–3 layers, each with a freshly picked brush.
    #[allow(clippy::too_many_arguments)]
    pub fn paint_block<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        points: &PointMatrix,
        brushes: &BrushSet,
        block: &Block,
        color: Srgb,
        outline: Outline,
        rng: &mut Xorshift64,
    ) -> Result<(), GridError> {
        let corners = points.footprint_corners(block.col, block.row, block.width, block.height)?;
        let polygon = match outline {
            Outline::Corners => corners.to_vec(),
            Outline::Perimeter => {
                points.footprint_perimeter(block.col, block.row, block.width, block.height)?
            }
        };
        self.paint_layers(
            surface,
            &polygon,
            quad_extents(&corners),
            &BLOCK,
            block.touches_border(self.cols, self.rows),
            brushes,
            None,
            color,
            rng,
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn paint_layers<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        polygon: &[DVec2],
        extents: DVec2,
        style: &LayerStyle,
        border: bool,
        brushes: &BrushSet,
        fixed: Option<&BrushImage>,
        color: Srgb,
        rng: &mut Xorshift64,
    ) {
        surface.fill_polygon(polygon, self.background);
        let mut clip = ClipScope::new(surface, polygon);

        let center = centroid(polygon);
        let multiplier = style.multiplier(border, rng);
        let base_hsb = color.to_hsb();
        let layers = rng.next_usize_in(style.layers.0, style.layers.1);

        for layer in 0..layers {
            let brush = match fixed.filter(|_| !style.repick) {
                Some(brush) => brush,
                None => match brushes.pick(rng) {
                    Ok(brush) => brush,
                    Err(e) => {
                        warn!(error = %e, layer, "skipping brush layer");
                        continue;
                    }
                },
            };

            let tint = if layer == 0 {
                color
            } else {
                let (dh, ds, db) = style.hsb_jitter;
                jittered(base_hsb, dh, ds, db, rng)
            };
            let offset = DVec2::new(
                rng.next_range(-style.offset, style.offset),
                rng.next_range(-style.offset, style.offset),
            );
            let angle = rng.next_range(-style.rotation, style.rotation);
            let scale = (extents / brush.size() * multiplier).max_element() * LAYER_SCALE;

            let transform = DAffine2::from_scale_angle_translation(
                DVec2::splat(scale),
                angle,
                center + offset,
            );
            clip.draw_brush(brush, transform, tint);
        }
    }
}

fn jittered(base: Hsb, dh: f64, ds: f64, db: f64, rng: &mut Xorshift64) -> Srgb {
    base.shifted(
        rng.next_range(-dh, dh),
        rng.next_range(-ds, ds),
        rng.next_range(-db, db),
    )
    .to_srgb()
}
