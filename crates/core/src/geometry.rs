//! Lattice point storage and the polygon math used to paint cells.
//!
//! A [`PointMatrix`] holds `(cols + 1) × (rows + 1)` lattice points in canvas
//! space. Cell `(col, row)` is bounded by lattice points `(col, row)`,
//! `(col + 1, row)`, `(col + 1, row + 1)` and `(col, row + 1)`.

use glam::DVec2;

use crate::error::GridError;

/// Deformed lattice points, addressed by lattice column `i` and row `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMatrix {
    cols: usize,
    rows: usize,
    points: Vec<DVec2>,
}

impl PointMatrix {
    /// Wraps a row-major point vector of length `(cols + 1) * (rows + 1)`.
    pub fn from_points(cols: usize, rows: usize, points: Vec<DVec2>) -> Result<Self, GridError> {
        if cols == 0 || rows == 0 {
            return Err(GridError::InvalidDimensions);
        }
        let expected = (cols + 1)
            .checked_mul(rows + 1)
            .ok_or(GridError::InvalidDimensions)?;
        if points.len() != expected {
            return Err(GridError::InvalidDimensions);
        }
        Ok(Self { cols, rows, points })
    }

    /// The undeformed lattice: `(i / cols · area, j / rows · area)`.
    pub fn regular(cols: usize, rows: usize, area_size: f64) -> Result<Self, GridError> {
        if cols == 0 || rows == 0 {
            return Err(GridError::InvalidDimensions);
        }
        let points = (0..=rows)
            .flat_map(|j| {
                (0..=cols).map(move |i| {
                    DVec2::new(
                        i as f64 / cols as f64 * area_size,
                        j as f64 / rows as f64 * area_size,
                    )
                })
            })
            .collect();
        Self::from_points(cols, rows, points)
    }

    /// Number of cell columns (lattice columns minus one).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cell rows (lattice rows minus one).
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn points(&self) -> &[DVec2] {
        &self.points
    }

    fn index(&self, i: usize, j: usize) -> Option<usize> {
        (i <= self.cols && j <= self.rows).then(|| j * (self.cols + 1) + i)
    }

    /// The lattice point at `(i, j)`, if inside the matrix.
    pub fn get(&self, i: usize, j: usize) -> Option<DVec2> {
        self.index(i, j).map(|idx| self.points[idx])
    }

    pub(crate) fn set(&mut self, i: usize, j: usize, p: DVec2) {
        if let Some(idx) = self.index(i, j) {
            self.points[idx] = p;
        }
    }

    /// Checks that a `width × height` cell footprint at `(col, row)` lies
    /// inside the grid.
    pub fn check_footprint(
        &self,
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    ) -> Result<(), GridError> {
        let fits = width > 0
            && height > 0
            && col.checked_add(width).is_some_and(|end| end <= self.cols)
            && row.checked_add(height).is_some_and(|end| end <= self.rows);
        if fits {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                col,
                row,
                width,
                height,
                cols: self.cols,
                rows: self.rows,
            })
        }
    }

    /// Corner points of a footprint in clockwise order starting top-left.
    pub fn footprint_corners(
        &self,
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    ) -> Result<[DVec2; 4], GridError> {
        self.check_footprint(col, row, width, height)?;
        let p = |i, j| self.points[j * (self.cols + 1) + i];
        Ok([
            p(col, row),
            p(col + width, row),
            p(col + width, row + height),
            p(col, row + height),
        ])
    }

    /// Every lattice point on the footprint's boundary, clockwise from the
    /// top-left corner, each point once.
    pub fn footprint_perimeter(
        &self,
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    ) -> Result<Vec<DVec2>, GridError> {
        self.check_footprint(col, row, width, height)?;
        let p = |i: usize, j: usize| self.points[j * (self.cols + 1) + i];
        let mut out = Vec::with_capacity(2 * (width + height));
        out.extend((col..=col + width).map(|c| p(c, row)));
        out.extend((row + 1..=row + height).map(|r| p(col + width, r)));
        out.extend((col..col + width).rev().map(|c| p(c, row + height)));
        out.extend((row + 1..row + height).rev().map(|r| p(col, r)));
        Ok(out)
    }
}

/// Vertex average of a polygon.
pub fn centroid(polygon: &[DVec2]) -> DVec2 {
    if polygon.is_empty() {
        return DVec2::ZERO;
    }
    polygon.iter().copied().sum::<DVec2>() / polygon.len() as f64
}

/// Average width and height of a quad given clockwise from top-left:
/// the mean of its top and bottom edge lengths, and of its left and right.
pub fn quad_extents(quad: &[DVec2; 4]) -> DVec2 {
    let [tl, tr, br, bl] = *quad;
    DVec2::new(
        (tl.distance(tr) + bl.distance(br)) / 2.0,
        (tl.distance(bl) + tr.distance(br)) / 2.0,
    )
}

/// Axis-aligned bounds `(min, max)` of a point set.
pub fn bounds(points: &[DVec2]) -> Option<(DVec2, DVec2)> {
    let first = *points.first()?;
    Some(
        points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
    )
}

/// Even-odd point-in-polygon test.
pub fn contains(polygon: &[DVec2], p: DVec2) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
