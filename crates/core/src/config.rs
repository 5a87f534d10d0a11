//! Grid and scene configuration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::color::Srgb;
use crate::error::GridError;
use crate::params::{param_f64, param_string, param_usize};

pub const DEFAULT_COLS: usize = 16;
pub const DEFAULT_ROWS: usize = 12;
pub const DEFAULT_AREA_SIZE: f64 = 720.0;
/// How far lattice points may wander past the canvas edge.
pub const DEFAULT_MARGIN: f64 = 150.0;
/// How far border cells are pushed past the canvas edge when painted.
pub const DEFAULT_BLEED: f64 = 1.0;
/// HSB(60, 50, 35).
pub const DEFAULT_BACKGROUND: &str = "#59592d";

/// Dimensions of the lattice and the square canvas it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub cols: usize,
    pub rows: usize,
    pub area_size: f64,
    pub margin: f64,
    pub bleed: f64,
    pub background: Srgb,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            area_size: DEFAULT_AREA_SIZE,
            margin: DEFAULT_MARGIN,
            bleed: DEFAULT_BLEED,
            background: Srgb::from_hex(DEFAULT_BACKGROUND)
                .expect("default background hex is valid"),
        }
    }
}

impl GridConfig {
    /// Builds a config from a JSON params object, falling back to defaults
    /// for missing keys, then validates it.
    pub fn from_json(params: &Value) -> Result<Self, GridError> {
        let config = Self {
            cols: param_usize(params, "cols", DEFAULT_COLS),
            rows: param_usize(params, "rows", DEFAULT_ROWS),
            area_size: param_f64(params, "area_size", DEFAULT_AREA_SIZE),
            margin: param_f64(params, "margin", DEFAULT_MARGIN),
            bleed: param_f64(params, "bleed", DEFAULT_BLEED),
            background: Srgb::from_hex(&param_string(params, "background", DEFAULT_BACKGROUND))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Current values as a JSON object (the shape `from_json` reads).
    pub fn to_json(&self) -> Value {
        json!({
            "cols": self.cols,
            "rows": self.rows,
            "area_size": self.area_size,
            "margin": self.margin,
            "bleed": self.bleed,
            "background": self.background.to_hex(),
        })
    }

    /// Rejects empty grids, non-positive areas, negative margins and
    /// cell counts that overflow `usize`.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(GridError::InvalidDimensions);
        }
        self.cols
            .checked_mul(self.rows)
            .ok_or(GridError::InvalidDimensions)?;
        if !(self.area_size.is_finite() && self.area_size > 0.0) {
            return Err(GridError::InvalidDimensions);
        }
        if !(self.margin.is_finite() && self.margin >= 0.0)
            || !(self.bleed.is_finite() && self.bleed >= 0.0)
        {
            return Err(GridError::InvalidDimensions);
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn cell_width(&self) -> f64 {
        self.area_size / self.cols as f64
    }

    pub fn cell_height(&self) -> f64 {
        self.area_size / self.rows as f64
    }
}
