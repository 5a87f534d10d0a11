//! Organic lattice deformation.
//!
//! [`NoiseGridDeformer`] displaces a regular `(cols + 1) × (rows + 1)`
//! lattice with three octaves of Perlin noise plus a slow sinusoidal wobble,
//! clamps the result to the canvas margin, and relaxes interior points once
//! toward their neighbors.

use glam::DVec2;
use noise::{NoiseFn, Perlin};
use tracing::debug;

use crate::config::GridConfig;
use crate::error::GridError;
use crate::geometry::PointMatrix;
use crate::prng::Xorshift64;

/// One noise octave: domain scale, time multiplier, y-channel domain offset
/// and blend weight.
struct NoiseLayer {
    scale: f64,
    time: f64,
    y_offset: f64,
    weight: f64,
}

const LAYERS: [NoiseLayer; 3] = [
    NoiseLayer {
        scale: 0.015,
        time: 0.3,
        y_offset: 500.0,
        weight: 0.6,
    },
    NoiseLayer {
        scale: 0.08,
        time: 0.8,
        y_offset: 300.0,
        weight: 0.3,
    },
    NoiseLayer {
        scale: 0.25,
        time: 1.5,
        y_offset: 200.0,
        weight: 0.1,
    },
];

/// Fraction of the smaller cell side a point may be displaced by noise.
const MAX_DISPLACEMENT: f64 = 0.35;
const WAVE_X_AMPLITUDE: f64 = 15.0;
const WAVE_Y_AMPLITUDE: f64 = 30.0;
/// Interpolation factor of the relaxation pass.
const SMOOTHING: f64 = 0.10;
/// Time offset advance per generated lattice.
pub const TIME_STEP: f64 = 0.01;
/// Upper bound (exclusive) of per-point decorrelation seeds.
const SEED_RANGE: f64 = 1000.0;

/// Builds deformed lattices. Keeps the noise source and the time offset
/// across calls so successive lattices drift rather than jump.
#[derive(Clone)]
pub struct NoiseGridDeformer {
    noise: Perlin,
    time_offset: f64,
}

impl NoiseGridDeformer {
    /// Seeds the noise source and draws a starting time offset in
    /// `[0, 1000)` from `rng`.
    pub fn new(rng: &mut Xorshift64) -> Self {
        let seed = rng.next_u32();
        let time_offset = rng.next_range(0.0, SEED_RANGE);
        Self::with_time_offset(seed, time_offset)
    }

    /// A deformer with an explicit noise seed and time offset.
    pub fn with_time_offset(noise_seed: u32, time_offset: f64) -> Self {
        Self {
            noise: Perlin::new(noise_seed),
            time_offset,
        }
    }

    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    /// Perlin sample recentred to `[-0.5, 0.5]`.
    fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        (self.noise.get([x, y, z]) * 0.5).clamp(-0.5, 0.5)
    }

    /// Generates a deformed lattice for `config` and advances the time
    /// offset by [`TIME_STEP`].
    ///
    /// Every point ends within `[-margin, area_size + margin]` on both axes.
    pub fn generate(
        &mut self,
        config: &GridConfig,
        rng: &mut Xorshift64,
    ) -> Result<PointMatrix, GridError> {
        config.validate()?;
        let (cols, rows) = (config.cols, config.rows);
        let area = config.area_size;
        let margin = config.margin;
        let t = self.time_offset;
        let max_disp = config.cell_width().min(config.cell_height()) * MAX_DISPLACEMENT;

        let mut points = PointMatrix::regular(cols, rows, area)?;
        for j in 0..=rows {
            for i in 0..=cols {
                let seed = rng.next_range(0.0, SEED_RANGE);
                let base = points.get(i, j).unwrap_or_default();
                let (fi, fj) = (i as f64, j as f64);

                let mut n = DVec2::ZERO;
                for layer in &LAYERS {
                    let x = fi * layer.scale + seed;
                    let y = fj * layer.scale + seed;
                    let z = t * layer.time;
                    n.x += self.sample(x, y, z) * layer.weight;
                    n.y += self.sample(x + layer.y_offset, y + layer.y_offset, z) * layer.weight;
                }
                let wave = DVec2::new(
                    (fi * 0.4 + fj * 0.2 + t * 0.02).sin() * WAVE_X_AMPLITUDE,
                    (fj * 0.3 + fi * 0.15 + t * 0.025).cos() * WAVE_Y_AMPLITUDE,
                );

                let mut p = (base + n * max_disp + wave)
                    .clamp(DVec2::splat(-margin), DVec2::splat(area + margin));
                p.x = clamp_edge(p.x, i, cols, area, margin);
                p.y = clamp_edge(p.y, j, rows, area, margin);
                points.set(i, j, p);
            }
        }

        let points = relax(&points);
        self.time_offset += TIME_STEP;
        debug!(cols, rows, time_offset = t, "generated lattice");
        Ok(points)
    }
}

/// One relaxation pass: each interior point moves [`SMOOTHING`] of the way
/// toward the mean of itself and its four orthogonal neighbors, all read
/// from the unrelaxed lattice. The outer ring is left as is.
fn relax(displaced: &PointMatrix) -> PointMatrix {
    let mut points = displaced.clone();
    for j in 1..displaced.rows() {
        for i in 1..displaced.cols() {
            let cross = [(i, j), (i - 1, j), (i + 1, j), (i, j - 1), (i, j + 1)];
            let avg = cross
                .iter()
                .filter_map(|&(ci, cj)| displaced.get(ci, cj))
                .sum::<DVec2>()
                / cross.len() as f64;
            if let Some(p) = displaced.get(i, j) {
                points.set(i, j, p.lerp(avg, SMOOTHING));
            }
        }
    }
    points
}

/// Outward-biased clamp for the first and last lattice line. The margin
/// clamp runs first so the margin bound still holds.
fn clamp_edge(v: f64, index: usize, last: usize, area: f64, margin: f64) -> f64 {
    let v = v.clamp(-margin, area + margin);
    if index == 0 {
        v.min(area * 0.3)
    } else if index == last {
        v.max(area * 0.7)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(p: DVec2, config: &GridConfig) -> bool {
        let lo = -config.margin;
        let hi = config.area_size + config.margin;
        (lo..=hi).contains(&p.x) && (lo..=hi).contains(&p.y)
    }

    #[test]
    fn default_grid_has_17_by_13_points() {
        let config = GridConfig::default();
        let mut rng = Xorshift64::new(42);
        let mut deformer = NoiseGridDeformer::new(&mut rng);
        let points = deformer.generate(&config, &mut rng).unwrap();
        assert_eq!(points.points().len(), 17 * 13);
        assert!(points.points().iter().all(|&p| within(p, &config)));
    }

    #[test]
    fn time_offset_advances_per_call() {
        let config = GridConfig::default();
        let mut rng = Xorshift64::new(7);
        let mut deformer = NoiseGridDeformer::with_time_offset(1, 10.0);
        deformer.generate(&config, &mut rng).unwrap();
        deformer.generate(&config, &mut rng).unwrap();
        assert!((deformer.time_offset() - 10.02).abs() < 1e-12);
    }

    #[test]
    fn same_state_gives_same_lattice() {
        let config = GridConfig::default();
        let mut a = NoiseGridDeformer::with_time_offset(3, 5.0);
        let mut b = a.clone();
        let pa = a.generate(&config, &mut Xorshift64::new(9)).unwrap();
        let pb = b.generate(&config, &mut Xorshift64::new(9)).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn edge_columns_are_biased_outward() {
        let config = GridConfig::default();
        let mut rng = Xorshift64::new(123);
        let mut deformer = NoiseGridDeformer::new(&mut rng);
        let points = deformer.generate(&config, &mut rng).unwrap();
        for j in 0..=config.rows {
            let first = points.get(0, j).unwrap();
            let last = points.get(config.cols, j).unwrap();
            assert!(first.x <= config.area_size * 0.3);
            assert!(last.x >= config.area_size * 0.7);
        }
    }

    #[test]
    fn relax_moves_interior_points_a_tenth_toward_the_cross_mean() {
        let (cols, rows) = (4, 3);
        let lattice: Vec<DVec2> = (0..=rows)
            .flat_map(|j| {
                (0..=cols).map(move |i| {
                    let (x, y) = (i as f64, j as f64);
                    DVec2::new(x * x * 10.0 + y, y * y * 5.0 - x * 3.0)
                })
            })
            .collect();
        let displaced = PointMatrix::from_points(cols, rows, lattice).unwrap();
        let relaxed = relax(&displaced);
        let at = |i: usize, j: usize| displaced.get(i, j).unwrap();

        for j in 0..=rows {
            for i in 0..=cols {
                let before = at(i, j);
                let after = relaxed.get(i, j).unwrap();
                if i == 0 || j == 0 || i == cols || j == rows {
                    assert_eq!(after, before, "edge point ({i}, {j}) moved");
                    continue;
                }
                let mean = (before + at(i - 1, j) + at(i + 1, j) + at(i, j - 1) + at(i, j + 1)) / 5.0;
                let expected = before + (mean - before) * 0.1;
                assert!(
                    (after - expected).length() < 1e-9,
                    "({i}, {j}): {after:?} != {expected:?}"
                );
            }
        }
        // The curved lattice is not already at rest.
        assert_ne!(relaxed.get(1, 1), displaced.get(1, 1));
    }

    #[test]
    fn clamp_edge_keeps_margin_bound() {
        assert_eq!(clamp_edge(-500.0, 0, 16, 720.0, 150.0), -150.0);
        assert_eq!(clamp_edge(500.0, 0, 16, 720.0, 150.0), 216.0);
        assert_eq!(clamp_edge(100.0, 16, 16, 720.0, 150.0), 504.0);
        assert_eq!(clamp_edge(100.0, 5, 16, 720.0, 150.0), 100.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GridConfig {
            cols: 0,
            ..GridConfig::default()
        };
        let mut rng = Xorshift64::new(1);
        let mut deformer = NoiseGridDeformer::new(&mut rng);
        assert!(matches!(
            deformer.generate(&config, &mut rng),
            Err(GridError::InvalidDimensions)
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn points_stay_within_margin(
                seed: u64,
                cols in 1_usize..24,
                rows in 1_usize..24,
                area in 50.0_f64..1500.0,
                margin in 0.0_f64..300.0,
            ) {
                let config = GridConfig { cols, rows, area_size: area, margin, ..GridConfig::default() };
                let mut rng = Xorshift64::new(seed);
                let mut deformer = NoiseGridDeformer::new(&mut rng);
                let points = deformer.generate(&config, &mut rng).unwrap();
                prop_assert_eq!(points.points().len(), (cols + 1) * (rows + 1));
                for &p in points.points() {
                    prop_assert!(within(p, &config), "{p:?} escaped the margin");
                }
            }
        }
    }
}
