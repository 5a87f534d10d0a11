#![deny(unsafe_code)]
//! Core of the brushgrid painting system.
//!
//! Deforms a regular lattice into an organic grid ([`NoiseGridDeformer`]),
//! allocates its cells into single strokes and rectangular blocks
//! ([`CellOccupancyAllocator`]), paints them as clipped, tinted brush layers
//! ([`BrushCompositor`]) and draws the lattice lines between them
//! ([`draw_lattice`]). [`Studio`] ties these together behind discrete
//! [`Trigger`]s. Drawing goes through the [`Surface`] trait; the core never
//! touches pixels itself.

pub mod allocator;
pub mod color;
pub mod composition;
pub mod compositor;
pub mod config;
pub mod deform;
pub mod error;
pub mod geometry;
pub mod lattice;
pub mod palette;
pub mod params;
pub mod prng;
pub mod studio;
pub mod surface;

pub use allocator::{Allocation, CellOccupancyAllocator, DynamicAttempt, PaintOp};
pub use color::{Hsb, Srgb};
pub use composition::{Block, CompositionState, Mode};
pub use compositor::{BrushCompositor, Outline};
pub use config::GridConfig;
pub use deform::NoiseGridDeformer;
pub use error::GridError;
pub use geometry::PointMatrix;
pub use lattice::{draw_lattice, lattice_paths, CurvePath, LATTICE_STROKE};
pub use palette::{Palette, PaletteCatalog, PaletteEntry, PaletteKind, PaletteRules};
pub use prng::Xorshift64;
pub use studio::{Phase, Studio, Trigger};
pub use surface::{BrushImage, BrushSet, ClipScope, StrokeStyle, Surface};
