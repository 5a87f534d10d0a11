//! Error types for the brushgrid core.

use thiserror::Error;

use crate::composition::Mode;

/// Errors produced while building or painting a composition.
#[derive(Debug, Error)]
pub enum GridError {
    /// Column/row count or area size was zero (or overflowed).
    #[error("invalid dimensions: grid columns, rows and area size must be non-zero")]
    InvalidDimensions,

    /// A color draw was requested from a palette list that has no colors.
    #[error("palette '{palette}' has no {mode} colors")]
    EmptyPalette { palette: String, mode: Mode },

    /// A cell or block footprint falls outside the lattice.
    #[error(
        "footprint at ({col}, {row}) sized {width}x{height} is out of bounds for a {cols}x{rows} grid"
    )]
    OutOfBounds {
        col: usize,
        row: usize,
        width: usize,
        height: usize,
        cols: usize,
        rows: usize,
    },

    /// A brush image (or other drawing asset) could not be provided.
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    /// A color string could not be parsed.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A palette or palette catalog was malformed.
    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    /// No palette exists at the requested catalog index.
    #[error("unknown palette index {index} (catalog has {len} palettes)")]
    UnknownPalette { index: usize, len: usize },

    /// File or encoder failure in an outer layer (snapshots, asset loading).
    #[error("i/o error: {0}")]
    Io(String),
}

impl GridError {
    /// Whether the error only invalidates the current paint step.
    ///
    /// Configuration, bounds and asset errors are local: the generation cycle
    /// skips the affected cell or block and continues with the next one.
    pub fn is_step_local(&self) -> bool {
        matches!(
            self,
            GridError::EmptyPalette { .. }
                | GridError::OutOfBounds { .. }
                | GridError::AssetUnavailable(_)
        )
    }
}
