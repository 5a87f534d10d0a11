//! The orchestrator that owns the live composition and reacts to triggers.
//!
//! A [`Studio`] owns the palette catalog, the grid config, the deformer, the
//! compositor, the brush set, the PRNG and the live [`CompositionState`].
//! Triggers run synchronously; a trigger submitted while a cycle is running
//! waits in a queue until the studio is idle again, and queued
//! regenerations collapse into the most recent one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::allocator::{CellOccupancyAllocator, PaintOp};
use crate::compositor::BrushCompositor;
use crate::composition::{CompositionState, Mode};
use crate::config::GridConfig;
use crate::deform::NoiseGridDeformer;
use crate::error::GridError;
use crate::lattice::draw_lattice;
use crate::palette::PaletteCatalog;
use crate::prng::Xorshift64;
use crate::surface::{BrushSet, Surface};

/// A discrete external event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// Rebuild the lattice and the whole composition with a palette.
    Regenerate { palette: usize },
    /// Recolor one random cell; `None` uses the studio's current mode.
    PaintRandomCell { mode: Option<Mode> },
    /// Try to grow new blocks on free cells.
    AttemptDynamicBlock,
    /// Switch the current mode used by mode-less cell strokes.
    SetMode { mode: Mode },
}

/// Whether a cycle is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Generating,
}

/// Owns every piece of generation state. See the module docs.
pub struct Studio {
    catalog: PaletteCatalog,
    config: GridConfig,
    brushes: BrushSet,
    deformer: NoiseGridDeformer,
    compositor: BrushCompositor,
    rng: Xorshift64,
    palette: usize,
    mode: Mode,
    state: Option<CompositionState>,
    phase: Phase,
    pending: VecDeque<Trigger>,
}

impl Studio {
    /// Creates an idle studio with no composition yet. The deformer is
    /// seeded from `rng`, which the studio then keeps for every cycle.
    pub fn new(
        catalog: PaletteCatalog,
        config: GridConfig,
        brushes: BrushSet,
        mut rng: Xorshift64,
    ) -> Result<Self, GridError> {
        config.validate()?;
        if brushes.is_empty() {
            warn!("studio created without brushes; cells will only show the background");
        }
        let deformer = NoiseGridDeformer::new(&mut rng);
        let compositor = BrushCompositor::new(&config);
        Ok(Self {
            catalog,
            config,
            brushes,
            deformer,
            compositor,
            rng,
            palette: 0,
            mode: Mode::Dark,
            state: None,
            phase: Phase::Idle,
            pending: VecDeque::new(),
        })
    }

    /// Same as [`Studio::new`] with a PRNG seeded from `seed`.
    pub fn seeded(
        catalog: PaletteCatalog,
        config: GridConfig,
        brushes: BrushSet,
        seed: u64,
    ) -> Result<Self, GridError> {
        Self::new(catalog, config, brushes, Xorshift64::new(seed))
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PaletteCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Index of the palette of the live composition.
    pub fn palette_index(&self) -> usize {
        self.palette
    }

    /// The live composition, once one has been generated.
    pub fn state(&self) -> Option<&CompositionState> {
        self.state.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queues a trigger without running it. A queued regeneration replaces
    /// any earlier queued one.
    pub fn submit(&mut self, trigger: Trigger) {
        if matches!(trigger, Trigger::Regenerate { .. }) {
            self.pending
                .retain(|t| !matches!(t, Trigger::Regenerate { .. }));
        }
        self.pending.push_back(trigger);
    }

    /// Submits `trigger` and, if idle, runs the queue to completion.
    pub fn dispatch<S: Surface + ?Sized>(
        &mut self,
        trigger: Trigger,
        surface: &mut S,
    ) -> Result<(), GridError> {
        self.submit(trigger);
        self.drain(surface)
    }

    /// Runs queued triggers in order until the queue is empty. Does nothing
    /// while a cycle is already running.
    ///
    /// A step-local error from a trigger (an empty color list for the
    /// requested mode, an out-of-bounds footprint) leaves the state as it
    /// was. The rest of the queue still runs and the first such error is
    /// returned at the end. Any other error stops the drain at once and leaves the
    /// remaining triggers queued. Paint steps inside a regeneration are
    /// skipped without failing the trigger.
    pub fn drain<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<(), GridError> {
        if self.phase == Phase::Generating {
            return Ok(());
        }
        let mut first_failure = None;
        while let Some(trigger) = self.pending.pop_front() {
            self.phase = Phase::Generating;
            let result = self.run(trigger, surface);
            self.phase = Phase::Idle;
            match result {
                Ok(()) => {}
                Err(e) if e.is_step_local() => {
                    warn!(error = %e, ?trigger, "trigger failed");
                    first_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    fn run<S: Surface + ?Sized>(&mut self, trigger: Trigger, surface: &mut S) -> Result<(), GridError> {
        debug!(?trigger, "running trigger");
        match trigger {
            Trigger::Regenerate { palette } => self.regenerate(palette, surface),
            Trigger::PaintRandomCell { mode } => {
                let mode = mode.unwrap_or(self.mode);
                self.paint_random_cell(mode, surface)
            }
            Trigger::AttemptDynamicBlock => self.attempt_dynamic_block(surface),
            Trigger::SetMode { mode } => {
                self.mode = mode;
                Ok(())
            }
        }
    }

    /// Builds a new lattice and composition, paints it over a cleared
    /// surface, draws the lattice lines, and swaps the new state in.
    fn regenerate<S: Surface + ?Sized>(
        &mut self,
        palette: usize,
        surface: &mut S,
    ) -> Result<(), GridError> {
        let entry = self.catalog.get(palette)?;
        let name = entry.palette.name().to_string();
        let points = self.deformer.generate(&self.config, &mut self.rng)?;
        let allocation = CellOccupancyAllocator::new(entry).allocate(points, &mut self.rng)?;

        surface.clear(self.compositor.background());
        let mut skipped = 0;
        for op in &allocation.plan {
            if let Err(e) = self.paint(surface, &allocation.state, op) {
                if !e.is_step_local() {
                    return Err(e);
                }
                warn!(error = %e, ?op, "paint step skipped");
                skipped += 1;
            }
        }
        draw_lattice(
            surface,
            allocation.state.points(),
            allocation.state.blocks(),
            &mut self.rng,
        );

        info!(
            palette = %name,
            blocks = allocation.state.blocks().len(),
            steps = allocation.plan.len(),
            skipped,
            "regenerated composition"
        );
        self.palette = palette;
        self.state = Some(allocation.state);
        Ok(())
    }

    fn paint_random_cell<S: Surface + ?Sized>(
        &mut self,
        mode: Mode,
        surface: &mut S,
    ) -> Result<(), GridError> {
        let entry = self.catalog.get(self.palette)?;
        let Some(mut state) = self.state.take() else {
            warn!("no composition yet; cell stroke ignored");
            return Ok(());
        };
        let placed =
            CellOccupancyAllocator::new(entry).paint_random_cell(&mut state, mode, &mut self.rng);
        let result = match placed {
            Ok(op) => self.paint(surface, &state, &op),
            Err(e) => Err(e),
        };
        self.state = Some(state);
        result
    }

    fn attempt_dynamic_block<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Result<(), GridError> {
        let entry = self.catalog.get(self.palette)?;
        let Some(mut state) = self.state.take() else {
            warn!("no composition yet; dynamic block attempt ignored");
            return Ok(());
        };
        let attempt = CellOccupancyAllocator::new(entry).attempt_dynamic_block(&mut state, &mut self.rng);
        let painted = attempt
            .placed
            .iter()
            .try_for_each(|op| self.paint(surface, &state, op));
        self.state = Some(state);
        painted?;
        attempt.failure.map_or(Ok(()), Err)
    }

    fn paint<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        state: &CompositionState,
        op: &PaintOp,
    ) -> Result<(), GridError> {
        match *op {
            PaintOp::Cell { col, row, color } => self.compositor.paint_cell(
                surface,
                state.points(),
                &self.brushes,
                col,
                row,
                color,
                &mut self.rng,
            ),
            PaintOp::Block {
                block,
                color,
                outline,
            } => self.compositor.paint_block(
                surface,
                state.points(),
                &self.brushes,
                &block,
                color,
                outline,
                &mut self.rng,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::testing::{brushes, Op, RecordingSurface};

    fn studio(seed: u64) -> Studio {
        Studio::seeded(
            PaletteCatalog::builtin(),
            GridConfig::default(),
            brushes(3),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn regenerate_swaps_in_a_complete_state() {
        let mut studio = studio(1);
        let mut surface = RecordingSurface::default();
        assert!(studio.state().is_none());
        studio
            .dispatch(Trigger::Regenerate { palette: 3 }, &mut surface)
            .unwrap();
        let state = studio.state().unwrap();
        assert!(state.is_complete());
        assert_eq!(studio.palette_index(), 3);
        assert_eq!(studio.phase(), Phase::Idle);
        assert_eq!(surface.clip_depth(), 0);
        assert!(matches!(surface.ops[0], Op::Clear(_)));
        assert!(matches!(surface.ops.last(), Some(Op::Stroke(..))));
    }

    #[test]
    fn unknown_palette_keeps_the_previous_state() {
        let mut studio = studio(2);
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::Regenerate { palette: 1 }, &mut surface)
            .unwrap();
        let before = studio.state().cloned();
        let err = studio
            .dispatch(Trigger::Regenerate { palette: 9 }, &mut surface)
            .unwrap_err();
        assert!(matches!(err, GridError::UnknownPalette { index: 9, .. }));
        assert_eq!(studio.state().cloned(), before);
        assert_eq!(studio.palette_index(), 1);
    }

    #[test]
    fn queued_regenerations_coalesce_to_the_latest() {
        let mut studio = studio(3);
        studio.submit(Trigger::Regenerate { palette: 1 });
        studio.submit(Trigger::AttemptDynamicBlock);
        studio.submit(Trigger::Regenerate { palette: 4 });
        assert_eq!(studio.pending(), 2);
        let mut surface = RecordingSurface::default();
        studio.drain(&mut surface).unwrap();
        assert_eq!(studio.pending(), 0);
        assert_eq!(studio.palette_index(), 4);
    }

    #[test]
    fn incremental_triggers_before_any_composition_are_ignored() {
        let mut studio = studio(4);
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::AttemptDynamicBlock, &mut surface)
            .unwrap();
        studio
            .dispatch(Trigger::PaintRandomCell { mode: None }, &mut surface)
            .unwrap();
        assert!(surface.ops.is_empty());
        assert!(studio.state().is_none());
    }

    #[test]
    fn set_mode_drives_mode_less_strokes() {
        let mut studio = studio(5);
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::Regenerate { palette: 2 }, &mut surface)
            .unwrap();
        studio
            .dispatch(Trigger::SetMode { mode: Mode::Light }, &mut surface)
            .unwrap();
        assert_eq!(studio.mode(), Mode::Light);
        let lights_before = studio.state().unwrap().light_flags().iter().filter(|&&l| l).count();
        for _ in 0..50 {
            studio
                .dispatch(Trigger::PaintRandomCell { mode: None }, &mut surface)
                .unwrap();
        }
        let lights_after = studio.state().unwrap().light_flags().iter().filter(|&&l| l).count();
        assert!(lights_after >= lights_before);
    }

    #[test]
    fn empty_light_list_fails_the_stroke_and_keeps_the_state() {
        use crate::palette::{Palette, PaletteEntry, PaletteKind, PaletteRules};
        let catalog = PaletteCatalog::new(vec![PaletteEntry {
            palette: Palette::from_hex("dark", PaletteKind::SingleWork, &[], &["#202020", "#303030"])
                .unwrap(),
            rules: PaletteRules::default(),
        }])
        .unwrap();
        let mut studio = Studio::seeded(catalog, GridConfig::default(), brushes(1), 6).unwrap();
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::Regenerate { palette: 0 }, &mut surface)
            .unwrap();
        let before = studio.state().cloned();
        let result =
            studio.dispatch(Trigger::PaintRandomCell { mode: Some(Mode::Light) }, &mut surface);
        assert!(matches!(
            result,
            Err(GridError::EmptyPalette { mode: Mode::Light, .. })
        ));
        assert_eq!(studio.state().cloned(), before);
        assert_eq!(studio.phase(), Phase::Idle);

        // Dark strokes still work afterwards.
        studio
            .dispatch(Trigger::PaintRandomCell { mode: Some(Mode::Dark) }, &mut surface)
            .unwrap();
    }

    #[test]
    fn failed_stroke_lets_the_rest_of_the_queue_run() {
        use crate::palette::{Palette, PaletteEntry, PaletteKind, PaletteRules};
        let catalog = PaletteCatalog::new(vec![PaletteEntry {
            palette: Palette::from_hex("dark", PaletteKind::SingleWork, &[], &["#202020"])
                .unwrap(),
            rules: PaletteRules::default(),
        }])
        .unwrap();
        let mut studio = Studio::seeded(catalog, GridConfig::default(), brushes(1), 8).unwrap();
        let mut surface = RecordingSurface::default();
        studio.submit(Trigger::Regenerate { palette: 0 });
        studio.submit(Trigger::PaintRandomCell { mode: Some(Mode::Light) });
        studio.submit(Trigger::SetMode { mode: Mode::Light });
        let result = studio.drain(&mut surface);
        assert!(matches!(result, Err(GridError::EmptyPalette { .. })));
        assert_eq!(studio.pending(), 0);
        assert_eq!(studio.mode(), Mode::Light);
        assert!(studio.state().is_some());
    }

    #[test]
    fn failed_dynamic_block_is_reported_and_keeps_the_state() {
        use crate::palette::{Palette, PaletteEntry, PaletteKind, PaletteRules};
        let catalog = PaletteCatalog::new(vec![PaletteEntry {
            palette: Palette::from_hex("dark", PaletteKind::SingleWork, &[], &["#202020"])
                .unwrap(),
            rules: PaletteRules {
                dynamic3: Some(1.0),
                dynamic_light_probability: 1.0,
                ..PaletteRules::default()
            },
        }])
        .unwrap();
        let mut studio = Studio::seeded(catalog, GridConfig::default(), brushes(1), 3).unwrap();
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::Regenerate { palette: 0 }, &mut surface)
            .unwrap();
        let before = studio.state().cloned();
        let result = studio.dispatch(Trigger::AttemptDynamicBlock, &mut surface);
        assert!(matches!(
            result,
            Err(GridError::EmptyPalette { mode: Mode::Light, .. })
        ));
        assert_eq!(studio.state().cloned(), before);
    }

    #[test]
    fn dynamic_blocks_accumulate_without_overlap() {
        let mut studio = studio(7);
        let mut surface = RecordingSurface::default();
        studio
            .dispatch(Trigger::Regenerate { palette: 0 }, &mut surface)
            .unwrap();
        for _ in 0..100 {
            studio
                .dispatch(Trigger::AttemptDynamicBlock, &mut surface)
                .unwrap();
        }
        let blocks = studio.state().unwrap().blocks();
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
        assert_eq!(surface.clip_depth(), 0);
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = |seed| {
            let mut studio = studio(seed);
            let mut surface = RecordingSurface::default();
            for trigger in [
                Trigger::Regenerate { palette: 0 },
                Trigger::AttemptDynamicBlock,
                Trigger::PaintRandomCell {
                    mode: Some(Mode::Dark),
                },
            ] {
                studio.dispatch(trigger, &mut surface).unwrap();
            }
            surface.ops
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn trigger_json_shape() {
        let t: Trigger = serde_json::from_str(r#"{"trigger": "regenerate", "palette": 2}"#).unwrap();
        assert_eq!(t, Trigger::Regenerate { palette: 2 });
        let t: Trigger =
            serde_json::from_str(r#"{"trigger": "paint_random_cell", "mode": "light"}"#).unwrap();
        assert_eq!(t, Trigger::PaintRandomCell { mode: Some(Mode::Light) });
    }
}
