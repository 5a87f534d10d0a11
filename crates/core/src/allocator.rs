//! Cell and block allocation.
//!
//! The allocator decides, for one palette, which cells are merged into
//! blocks and which color every cell gets. It never draws: every decision is
//! returned as an ordered [`PaintOp`] plan that the caller replays through
//! the compositor.

use tracing::{debug, warn};

use crate::color::Srgb;
use crate::compositor::Outline;
use crate::composition::{Block, CompositionState, Mode};
use crate::error::GridError;
use crate::geometry::PointMatrix;
use crate::palette::{BlockRule, Palette, PaletteEntry, PaletteRules};
use crate::prng::Xorshift64;

/// One paint step of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintOp {
    Cell {
        col: usize,
        row: usize,
        color: Srgb,
    },
    Block {
        block: Block,
        color: Srgb,
        outline: Outline,
    },
}

/// A freshly allocated composition and the steps that paint it.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub state: CompositionState,
    pub plan: Vec<PaintOp>,
}

/// Outcome of one incremental block attempt.
///
/// `placed` blocks are already recorded in the state and still need
/// painting even when `failure` is set.
#[derive(Debug, Default)]
pub struct DynamicAttempt {
    pub placed: Vec<PaintOp>,
    /// The first error hit by either size's attempt.
    pub failure: Option<GridError>,
}

/// Allocates cells and blocks for one palette under its rules.
#[derive(Debug, Clone, Copy)]
pub struct CellOccupancyAllocator<'a> {
    palette: &'a Palette,
    rules: &'a PaletteRules,
}

impl<'a> CellOccupancyAllocator<'a> {
    pub fn new(entry: &'a PaletteEntry) -> Self {
        Self {
            palette: &entry.palette,
            rules: &entry.rules,
        }
    }

    pub fn palette(&self) -> &'a Palette {
        self.palette
    }

    /// All palette colors repeated until there are `count`, truncated, then
    /// shuffled. Any two colors appear a number of times differing by at
    /// most one.
    pub fn balanced_sequence(
        &self,
        count: usize,
        rng: &mut Xorshift64,
    ) -> Result<Vec<Srgb>, GridError> {
        let all = self.palette.all_colors();
        if all.is_empty() {
            return Err(GridError::EmptyPalette {
                palette: self.palette.name().to_string(),
                mode: Mode::Light,
            });
        }
        let mut sequence: Vec<Srgb> = all.iter().copied().cycle().take(count).collect();
        rng.shuffle(&mut sequence);
        Ok(sequence)
    }

    /// Full regeneration over a fresh lattice.
    ///
    /// The plan paints every cell with its balanced color, then each placed
    /// block, then every cell again with its final color.
    pub fn allocate(&self, points: PointMatrix, rng: &mut Xorshift64) -> Result<Allocation, GridError> {
        let mut state = CompositionState::new(points);
        let (cols, rows) = (state.cols(), state.rows());
        let mut plan = Vec::with_capacity(2 * cols * rows);

        let sequence = self.balanced_sequence(cols * rows, rng)?;
        for (idx, &color) in sequence.iter().enumerate() {
            let (col, row) = (idx % cols, idx / cols);
            let mode = Mode::from_light(self.palette.is_light(color));
            state.assign(col, row, color, mode)?;
            plan.push(PaintOp::Cell { col, row, color });
        }

        if let Some(rule) = self.rules.block3 {
            self.block_pass(&mut state, &mut plan, 3, 1, rule, rng)?;
        }
        if let Some(rule) = self.rules.block2 {
            self.block_pass(&mut state, &mut plan, 2, 2, rule, rng)?;
        }

        for row in 0..rows {
            for col in 0..cols {
                if !state.is_occupied(col, row) {
                    if let Err(e) = self.fill_cell(&mut state, col, row, rng) {
                        if !e.is_step_local() {
                            return Err(e);
                        }
                        warn!(error = %e, col, row, "keeping balanced color");
                    }
                }
                if let Some(color) = state.color(col, row) {
                    plan.push(PaintOp::Cell { col, row, color });
                }
            }
        }

        debug!(
            palette = self.palette.name(),
            blocks = state.blocks().len(),
            steps = plan.len(),
            "allocated composition"
        );
        Ok(Allocation { state, plan })
    }

    /// Scans origins row-major in steps of `stride` and places `size × size`
    /// blocks on free footprints.
    fn block_pass(
        &self,
        state: &mut CompositionState,
        plan: &mut Vec<PaintOp>,
        size: usize,
        stride: usize,
        rule: BlockRule,
        rng: &mut Xorshift64,
    ) -> Result<(), GridError> {
        if state.cols() < size || state.rows() < size {
            return Ok(());
        }
        for row in (0..=state.rows() - size).step_by(stride) {
            for col in (0..=state.cols() - size).step_by(stride) {
                if !state.is_free(col, row, size, size)? || !rng.chance(rule.probability) {
                    continue;
                }
                let mode = Mode::from_light(rng.chance(rule.light_probability));
                let block = Block::new(col, row, size, size, mode);
                match self.place(state, block, rng) {
                    Ok(Some(color)) => plan.push(PaintOp::Block {
                        block,
                        color,
                        outline: Outline::Perimeter,
                    }),
                    Ok(None) => {}
                    Err(e) if e.is_step_local() => {
                        warn!(error = %e, col, row, size, "skipping block");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Draws a color for `block` and commits it. `Ok(None)` when the
    /// footprint is taken.
    fn place(
        &self,
        state: &mut CompositionState,
        block: Block,
        rng: &mut Xorshift64,
    ) -> Result<Option<Srgb>, GridError> {
        let color = self.palette.draw_color(Some(block.mode), rng)?;
        if state.place_block(block, color)? {
            debug!(
                col = block.col,
                row = block.row,
                size = block.width,
                mode = %block.mode,
                "placed block"
            );
            Ok(Some(color))
        } else {
            Ok(None)
        }
    }

    /// Individual fill of one free cell. Light cells prefer an up or left
    /// neighbor's color.
    fn fill_cell(
        &self,
        state: &mut CompositionState,
        col: usize,
        row: usize,
        rng: &mut Xorshift64,
    ) -> Result<(), GridError> {
        let mode = Mode::from_light(rng.chance(self.rules.cell_light_probability));
        let color = match mode {
            Mode::Light => {
                let neighbors: Vec<Srgb> = [
                    row.checked_sub(1).and_then(|r| state.color(col, r)),
                    col.checked_sub(1).and_then(|c| state.color(c, row)),
                ]
                .into_iter()
                .flatten()
                .collect();
                let reused = if !neighbors.is_empty()
                    && rng.chance(self.rules.neighbor_reuse_probability)
                {
                    rng.pick(&neighbors).copied()
                } else {
                    None
                };
                match reused {
                    Some(color) => color,
                    None => self.palette.draw_color(Some(Mode::Light), rng)?,
                }
            }
            Mode::Dark => self.palette.draw_color(Some(Mode::Dark), rng)?,
        };
        state.assign(col, row, color, mode)
    }

    /// One incremental 3×3 attempt, then independently one 2×2 attempt, each
    /// at a uniformly random origin and only if the palette allows the size.
    /// An attempt whose footprint overlaps an occupied cell fails quietly; an
    /// attempt that errors leaves the state untouched and does not stop the
    /// other size.
    pub fn attempt_dynamic_block(
        &self,
        state: &mut CompositionState,
        rng: &mut Xorshift64,
    ) -> DynamicAttempt {
        let mut attempt = DynamicAttempt::default();
        for (size, probability) in [(3, self.rules.dynamic3), (2, self.rules.dynamic2)] {
            let Some(p) = probability else { continue };
            match self.attempt_sized(state, size, p, rng) {
                Ok(Some(op)) => attempt.placed.push(op),
                Ok(None) => {}
                Err(e) => {
                    attempt.failure.get_or_insert(e);
                }
            }
        }
        attempt
    }

    fn attempt_sized(
        &self,
        state: &mut CompositionState,
        size: usize,
        probability: f64,
        rng: &mut Xorshift64,
    ) -> Result<Option<PaintOp>, GridError> {
        if state.cols() < size || state.rows() < size || !rng.chance(probability) {
            return Ok(None);
        }
        let col = rng.next_usize(state.cols() - size + 1);
        let row = rng.next_usize(state.rows() - size + 1);
        if !state.is_free(col, row, size, size)? {
            debug!(col, row, size, "dynamic block footprint occupied");
            return Ok(None);
        }
        let mode = Mode::from_light(rng.chance(self.rules.dynamic_light_probability));
        let block = Block::new(col, row, size, size, mode);
        Ok(self.place(state, block, rng)?.map(|color| PaintOp::Block {
            block,
            color,
            outline: Outline::Corners,
        }))
    }

    /// Recolors one uniformly random cell with a color for `mode`.
    /// Occupancy and the block list are left as they are.
    pub fn paint_random_cell(
        &self,
        state: &mut CompositionState,
        mode: Mode,
        rng: &mut Xorshift64,
    ) -> Result<PaintOp, GridError> {
        let col = rng.next_usize(state.cols());
        let row = rng.next_usize(state.rows());
        let color = self.palette.draw_color(Some(mode), rng)?;
        state.assign(col, row, color, mode)?;
        Ok(PaintOp::Cell { col, row, color })
    }
}
