//! The live composition: lattice points, per-cell colors and flags,
//! block occupancy and the block list.
//!
//! One [`CompositionState`] is live at a time. A regeneration builds a fresh
//! state off to the side and the owner swaps it in as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Srgb;
use crate::error::GridError;
use crate::geometry::PointMatrix;

/// Light or dark, the two halves of every palette.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Light,
    #[default]
    Dark,
}

impl Mode {
    pub fn from_light(light: bool) -> Self {
        if light {
            Mode::Light
        } else {
            Mode::Dark
        }
    }

    pub fn is_light(self) -> bool {
        self == Mode::Light
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Light => "light",
            Mode::Dark => "dark",
        })
    }
}

/// A rectangle of cells painted as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
    pub mode: Mode,
}

impl Block {
    pub fn new(col: usize, row: usize, width: usize, height: usize, mode: Mode) -> Self {
        Self {
            col,
            row,
            width,
            height,
            mode,
        }
    }

    /// Whether the two cell rectangles share at least one cell.
    pub fn overlaps(&self, other: &Block) -> bool {
        self.col < other.col + other.width
            && other.col < self.col + self.width
            && self.row < other.row + other.height
            && other.row < self.row + self.height
    }

    pub fn contains_cell(&self, col: usize, row: usize) -> bool {
        (self.col..self.col + self.width).contains(&col)
            && (self.row..self.row + self.height).contains(&row)
    }

    /// Whether any side lies on the outer edge of a `cols × rows` grid.
    pub fn touches_border(&self, cols: usize, rows: usize) -> bool {
        self.col == 0
            || self.row == 0
            || self.col + self.width >= cols
            || self.row + self.height >= rows
    }

    /// Cells covered by the block, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row..self.row + self.height)
            .flat_map(move |r| (self.col..self.col + self.width).map(move |c| (c, r)))
    }

    /// Whether horizontal lattice line `j` passes through the block's
    /// interior at lattice column `i`.
    pub fn hides_row_vertex(&self, i: usize, j: usize) -> bool {
        j > self.row && j < self.row + self.height && i >= self.col && i <= self.col + self.width
    }

    /// Whether vertical lattice line `i` passes through the block's
    /// interior at lattice row `j`.
    pub fn hides_column_vertex(&self, i: usize, j: usize) -> bool {
        i > self.col && i < self.col + self.width && j >= self.row && j <= self.row + self.height
    }
}

/// Points, colors, light flags, occupancy and blocks of one composition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionState {
    points: PointMatrix,
    occupied: Vec<bool>,
    colors: Vec<Option<Srgb>>,
    light: Vec<bool>,
    blocks: Vec<Block>,
}

impl CompositionState {
    /// An empty composition over `points`: nothing colored, nothing occupied.
    pub fn new(points: PointMatrix) -> Self {
        let n = points.cols() * points.rows();
        Self {
            points,
            occupied: vec![false; n],
            colors: vec![None; n],
            light: vec![false; n],
            blocks: Vec::new(),
        }
    }

    pub fn cols(&self) -> usize {
        self.points.cols()
    }

    pub fn rows(&self) -> usize {
        self.points.rows()
    }

    pub fn points(&self) -> &PointMatrix {
        &self.points
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn index(&self, col: usize, row: usize) -> Result<usize, GridError> {
        self.points.check_footprint(col, row, 1, 1)?;
        Ok(row * self.cols() + col)
    }

    /// Whether a block covers the cell. Out-of-range cells read as free.
    pub fn is_occupied(&self, col: usize, row: usize) -> bool {
        self.index(col, row).is_ok_and(|i| self.occupied[i])
    }

    pub fn color(&self, col: usize, row: usize) -> Option<Srgb> {
        self.index(col, row).ok().and_then(|i| self.colors[i])
    }

    /// The cell's light/dark flag, once it has been colored.
    pub fn mode(&self, col: usize, row: usize) -> Option<Mode> {
        let i = self.index(col, row).ok()?;
        self.colors[i].map(|_| Mode::from_light(self.light[i]))
    }

    /// Row-major light flags, `true` for light cells.
    pub fn light_flags(&self) -> &[bool] {
        &self.light
    }

    /// Whether every cell has been assigned a color.
    pub fn is_complete(&self) -> bool {
        self.colors.iter().all(Option::is_some)
    }

    /// Assigns one cell's color and flag. Occupancy is left untouched.
    pub fn assign(&mut self, col: usize, row: usize, color: Srgb, mode: Mode) -> Result<(), GridError> {
        let i = self.index(col, row)?;
        self.colors[i] = Some(color);
        self.light[i] = mode.is_light();
        Ok(())
    }

    /// Whether the footprint lies inside the grid and no cell of it is
    /// occupied.
    pub fn is_free(&self, col: usize, row: usize, width: usize, height: usize) -> Result<bool, GridError> {
        self.points.check_footprint(col, row, width, height)?;
        Ok((row..row + height)
            .all(|r| (col..col + width).all(|c| !self.occupied[r * self.cols() + c])))
    }

    /// Places `block` if its footprint is free: marks occupancy, colors and
    /// flags of its cells and appends it to the block list.
    ///
    /// Returns `Ok(false)` without changing anything when any cell is
    /// already occupied.
    pub fn place_block(&mut self, block: Block, color: Srgb) -> Result<bool, GridError> {
        if !self.is_free(block.col, block.row, block.width, block.height)? {
            return Ok(false);
        }
        let cols = self.cols();
        for (c, r) in block.cells() {
            let i = r * cols + c;
            self.occupied[i] = true;
            self.colors[i] = Some(color);
            self.light[i] = block.mode.is_light();
        }
        self.blocks.push(block);
        Ok(true)
    }
}
