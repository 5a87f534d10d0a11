//! Lattice line rendering.
//!
//! Every lattice row and column becomes one or more Catmull-Rom paths. A
//! lattice vertex that falls strictly inside a block ends the current path
//! and starts the next one, so lines break where a block covers them.

use glam::DVec2;

use crate::color::Srgb;
use crate::composition::Block;
use crate::geometry::PointMatrix;
use crate::prng::Xorshift64;
use crate::surface::{StrokeStyle, Surface};

/// Horizontal reach of the lead and tail control points of row lines.
const ROW_EXTENSION: f64 = 30.0;
/// Jitter of column lead/tail control points.
const COLUMN_EXTENSION: DVec2 = DVec2::new(10.0, 20.0);
/// Jitter of every column vertex.
const COLUMN_JITTER: f64 = 3.0;

/// Near-black, barely visible hairline.
pub const LATTICE_STROKE: StrokeStyle = StrokeStyle {
    color: Srgb {
        r: 0.01,
        g: 0.01,
        b: 0.01,
    },
    alpha: 0.1,
    weight: 0.1,
};

/// One control point of a lattice path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveVertex {
    pub point: DVec2,
    /// The lattice vertex `(i, j)` this point was taken from; `None` for
    /// lead and tail control points.
    pub lattice: Option<(usize, usize)>,
}

/// A Catmull-Rom control polygon. The drawn curve spans the second through
/// the second-to-last vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurvePath {
    pub vertices: Vec<CurveVertex>,
}

impl CurvePath {
    pub fn points(&self) -> Vec<DVec2> {
        self.vertices.iter().map(|v| v.point).collect()
    }

    /// Vertices the drawn curve passes through.
    pub fn drawn(&self) -> &[CurveVertex] {
        match self.vertices.len() {
            0..=2 => &[],
            n => &self.vertices[1..n - 1],
        }
    }
}

/// Builds the row and column paths of the lattice, breaking them inside
/// `blocks`.
pub fn lattice_paths(points: &PointMatrix, blocks: &[Block], rng: &mut Xorshift64) -> Vec<CurvePath> {
    let (cols, rows) = (points.cols(), points.rows());
    let at = |i: usize, j: usize| points.get(i, j).unwrap_or_default();
    let mut paths = Vec::with_capacity(cols + rows + 2);

    for j in 0..=rows {
        let mut builder = PathBuilder::default();
        if j > 0 {
            builder.control(at(0, j) - DVec2::new(ROW_EXTENSION, 0.0));
        }
        for i in 0..=cols {
            let hidden = blocks.iter().any(|b| b.hides_row_vertex(i, j));
            builder.vertex(at(i, j), (i, j), hidden);
        }
        if j < rows {
            builder.control(at(cols, j) + DVec2::new(ROW_EXTENSION, 0.0));
        }
        builder.finish_into(&mut paths);
    }

    for i in 0..=cols {
        let mut builder = PathBuilder::default();
        if i > 0 {
            let jitter = jitter2(COLUMN_EXTENSION, rng);
            builder.control(at(i, 0) + DVec2::new(jitter.x, -jitter.y));
        }
        for j in 0..=rows {
            let jitter = jitter2(DVec2::splat(COLUMN_JITTER), rng);
            let hidden = blocks.iter().any(|b| b.hides_column_vertex(i, j));
            builder.vertex(at(i, j) + jitter, (i, j), hidden);
        }
        if i < cols {
            builder.control(at(i, rows) + jitter2(COLUMN_EXTENSION, rng));
        }
        builder.finish_into(&mut paths);
    }

    paths
}

/// Strokes every lattice path onto `surface`.
pub fn draw_lattice<S: Surface + ?Sized>(
    surface: &mut S,
    points: &PointMatrix,
    blocks: &[Block],
    rng: &mut Xorshift64,
) {
    for path in lattice_paths(points, blocks, rng) {
        surface.stroke_curve(&path.points(), &LATTICE_STROKE);
    }
}

fn jitter2(reach: DVec2, rng: &mut Xorshift64) -> DVec2 {
    DVec2::new(
        rng.next_range(-reach.x, reach.x),
        rng.next_range(-reach.y, reach.y),
    )
}

#[derive(Default)]
struct PathBuilder {
    current: CurvePath,
    done: Vec<CurvePath>,
}

impl PathBuilder {
    fn control(&mut self, point: DVec2) {
        self.current.vertices.push(CurveVertex {
            point,
            lattice: None,
        });
    }

    /// Adds a lattice vertex. A hidden vertex closes the current path and
    /// opens a new one with the vertex as its leading control point.
    fn vertex(&mut self, point: DVec2, lattice: (usize, usize), hidden: bool) {
        if hidden {
            let closed = std::mem::take(&mut self.current);
            if !closed.vertices.is_empty() {
                self.done.push(closed);
            }
        }
        self.current.vertices.push(CurveVertex {
            point,
            lattice: Some(lattice),
        });
    }

    fn finish_into(mut self, out: &mut Vec<CurvePath>) {
        if !self.current.vertices.is_empty() {
            self.done.push(self.current);
        }
        out.append(&mut self.done);
    }
}
