//! A CPU surface backed by `vello_cpu`.
//!
//! Draw calls are recorded into a [`RenderContext`] and rasterized
//! (anti-aliased) when the pixels are read back. Polygons and clips use the
//! even-odd rule. Brushes become image paints under their affine transform,
//! pre-tinted and premultiplied per draw. Lattice curves are converted from
//! Catmull-Rom to cubic Béziers and stroked at their own weight.

use std::sync::Arc;

use brushgrid_core::error::GridError;
use brushgrid_core::surface::{BrushImage, StrokeStyle, Surface};
use brushgrid_core::Srgb;
use glam::{DAffine2, DVec2};
use tracing::warn;
use vello_cpu::kurbo::{Affine, BezPath, Point, Rect, Stroke};
use vello_cpu::peniko::color::PremulRgba8;
use vello_cpu::peniko::{Color, Fill, ImageSampler};
use vello_cpu::{Image, ImageSource, Pixmap, RenderContext};

/// A drawing target of `width × height` pixels.
pub struct PixelSurface {
    width: u16,
    height: u16,
    ctx: RenderContext,
    clips: Vec<BezPath>,
}

impl PixelSurface {
    /// A transparent surface. Each side must be in `1..=65535`.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        let w = u16::try_from(width).map_err(|_| GridError::InvalidDimensions)?;
        let h = u16::try_from(height).map_err(|_| GridError::InvalidDimensions)?;
        if w == 0 || h == 0 {
            return Err(GridError::InvalidDimensions);
        }
        let mut ctx = RenderContext::new(w, h);
        ctx.set_fill_rule(Fill::EvenOdd);
        Ok(Self {
            width: w,
            height: h,
            ctx,
            clips: Vec::new(),
        })
    }

    /// Number of clips currently pushed.
    pub fn clip_depth(&self) -> usize {
        self.clips.len()
    }

    /// Rasterizes everything drawn so far into straight (non-premultiplied)
    /// RGBA8, row-major.
    ///
    /// Fails while a clip is open, since the clip layer has not been
    /// composited yet.
    pub fn to_rgba(&mut self) -> Result<Vec<u8>, GridError> {
        if !self.clips.is_empty() {
            return Err(GridError::Io(format!(
                "cannot read back a surface with {} open clip(s)",
                self.clips.len()
            )));
        }
        let mut pixmap = Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        let mut rgba = pixmap.data_as_u8_slice().to_vec();
        unpremultiply_in_place(&mut rgba);
        Ok(rgba)
    }

    fn reset_transform(&mut self) {
        self.ctx.set_transform(Affine::IDENTITY);
        self.ctx.set_paint_transform(Affine::IDENTITY);
    }
}

fn color(c: Srgb, alpha: f64) -> Color {
    let [r, g, b] = c.to_rgb8();
    Color::from_rgba8(r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn to_affine(t: DAffine2) -> Affine {
    let m = t.matrix2;
    Affine::new([
        m.x_axis.x,
        m.x_axis.y,
        m.y_axis.x,
        m.y_axis.y,
        t.translation.x,
        t.translation.y,
    ])
}

fn point(p: DVec2) -> Point {
    Point::new(p.x, p.y)
}

/// A closed path through `polygon`; empty for fewer than 3 points.
fn polygon_path(polygon: &[DVec2]) -> BezPath {
    let mut path = BezPath::new();
    if let [first, rest @ ..] = polygon {
        if rest.len() >= 2 {
            path.move_to(point(*first));
            for p in rest {
                path.line_to(point(*p));
            }
            path.close_path();
        }
    }
    path
}

/// The uniform Catmull-Rom spline through `points` as cubic Béziers. Runs
/// from the second point to the second-to-last; empty for fewer than 4.
fn catmull_rom_path(points: &[DVec2]) -> BezPath {
    let mut path = BezPath::new();
    if points.len() < 4 {
        return path;
    }
    path.move_to(point(points[1]));
    for w in points.windows(4) {
        let c1 = w[1] + (w[2] - w[0]) / 6.0;
        let c2 = w[2] - (w[3] - w[1]) / 6.0;
        path.curve_to(point(c1), point(c2), point(w[2]));
    }
    path
}

/// Brush texels multiplied by `tint`, premultiplied for `vello_cpu`.
fn tinted_pixmap(brush: &BrushImage, tint: Srgb) -> Option<Pixmap> {
    let w = u16::try_from(brush.width()).ok()?;
    let h = u16::try_from(brush.height()).ok()?;
    let tint = [tint.r, tint.g, tint.b];
    let pixels = brush
        .as_rgba()
        .chunks_exact(4)
        .map(|px| {
            let a = px[3] as f64 / 255.0;
            let c = |i: usize| (px[i] as f64 * tint[i] * a).round().clamp(0.0, 255.0) as u8;
            PremulRgba8::from_u8_array([c(0), c(1), c(2), px[3]])
        })
        .collect();
    Some(Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

impl Surface for PixelSurface {
    fn width(&self) -> u32 {
        self.width as u32
    }

    fn height(&self) -> u32 {
        self.height as u32
    }

    /// Drops everything recorded so far and paints `color` edge to edge.
    /// Open clips are re-applied afterwards.
    fn clear(&mut self, c: Srgb) {
        self.ctx.reset();
        self.ctx.set_fill_rule(Fill::EvenOdd);
        self.reset_transform();
        self.ctx.set_paint(color(c, 1.0));
        self.ctx
            .fill_rect(&Rect::new(0.0, 0.0, self.width as f64, self.height as f64));
        for clip in &self.clips {
            self.ctx.push_clip_layer(clip);
        }
    }

    fn fill_polygon(&mut self, polygon: &[DVec2], c: Srgb) {
        let path = polygon_path(polygon);
        if path.elements().is_empty() {
            return;
        }
        self.reset_transform();
        self.ctx.set_paint(color(c, 1.0));
        self.ctx.fill_path(&path);
    }

    fn push_clip(&mut self, polygon: &[DVec2]) {
        let path = polygon_path(polygon);
        self.reset_transform();
        self.ctx.push_clip_layer(&path);
        self.clips.push(path);
    }

    fn pop_clip(&mut self) {
        if self.clips.pop().is_some() {
            self.ctx.pop_layer();
        }
    }

    fn draw_brush(&mut self, brush: &BrushImage, transform: DAffine2, tint: Srgb) {
        let det = transform.matrix2.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return;
        }
        let Some(pixmap) = tinted_pixmap(brush, tint) else {
            warn!(
                width = brush.width(),
                height = brush.height(),
                "brush too large for the raster backend"
            );
            return;
        };
        let size = brush.size();
        let paint = Image {
            image: ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: ImageSampler::default(),
        };
        self.ctx.set_paint_transform(Affine::IDENTITY);
        self.ctx
            .set_transform(to_affine(transform) * Affine::translate((-size.x / 2.0, -size.y / 2.0)));
        self.ctx.set_paint(paint);
        self.ctx.fill_rect(&Rect::new(0.0, 0.0, size.x, size.y));
        self.reset_transform();
    }

    fn stroke_curve(&mut self, points: &[DVec2], style: &StrokeStyle) {
        let path = catmull_rom_path(points);
        if path.elements().is_empty() || style.weight <= 0.0 {
            return;
        }
        self.reset_transform();
        self.ctx.set_stroke(Stroke::new(style.weight));
        self.ctx.set_paint(color(style.color, style.alpha));
        self.ctx.stroke_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brushgrid_core::surface::ClipScope;
    use vello_cpu::kurbo::PathEl;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> [DVec2; 4] {
        [
            DVec2::new(x0, y0),
            DVec2::new(x1, y0),
            DVec2::new(x1, y1),
            DVec2::new(x0, y1),
        ]
    }

    fn red() -> Srgb {
        Srgb::from_hex("#ff0000").unwrap()
    }

    fn white_brush(w: u32, h: u32) -> BrushImage {
        BrushImage::new(w, h, vec![255; (w * h * 4) as usize]).unwrap()
    }

    fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
    }

    fn covered(rgba: &[u8]) -> usize {
        rgba.chunks_exact(4).filter(|px| px[3] > 128).count()
    }

    #[test]
    fn new_rejects_zero_and_oversized() {
        assert!(matches!(
            PixelSurface::new(0, 4),
            Err(GridError::InvalidDimensions)
        ));
        assert!(matches!(
            PixelSurface::new(70_000, 4),
            Err(GridError::InvalidDimensions)
        ));
    }

    #[test]
    fn clear_paints_every_pixel_opaque() {
        let mut s = PixelSurface::new(3, 2).unwrap();
        s.clear(Srgb::from_hex("#59592d").unwrap());
        let rgba = s.to_rgba().unwrap();
        assert!(rgba.chunks_exact(4).all(|px| px == [0x59, 0x59, 0x2d, 255]));
    }

    #[test]
    fn clear_replaces_earlier_drawing() {
        let mut s = PixelSurface::new(8, 8).unwrap();
        s.fill_polygon(&rect(0.0, 0.0, 8.0, 8.0), red());
        s.clear(Srgb::BLACK);
        let rgba = s.to_rgba().unwrap();
        assert!(rgba.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn fill_polygon_covers_the_polygon() {
        let mut s = PixelSurface::new(10, 10).unwrap();
        s.fill_polygon(&rect(2.0, 2.0, 5.0, 4.0), red());
        let rgba = s.to_rgba().unwrap();
        assert_eq!(pixel(&rgba, 10, 2, 2), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 10, 4, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 10, 5, 3)[3], 0);
        assert_eq!(pixel(&rgba, 10, 2, 4)[3], 0);
        assert_eq!(covered(&rgba), 3 * 2);
    }

    #[test]
    fn degenerate_polygons_draw_nothing() {
        let mut s = PixelSurface::new(4, 4).unwrap();
        s.fill_polygon(&[DVec2::ZERO, DVec2::splat(4.0)], red());
        assert!(s.to_rgba().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn clip_restricts_and_pop_restores() {
        let mut s = PixelSurface::new(10, 10).unwrap();
        {
            let mut clip = ClipScope::new(&mut s, &rect(0.0, 0.0, 5.0, 10.0));
            clip.fill_polygon(&rect(0.0, 0.0, 10.0, 10.0), red());
        }
        assert_eq!(s.clip_depth(), 0);
        let rgba = s.to_rgba().unwrap();
        assert_eq!(pixel(&rgba, 10, 4, 4), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 10, 6, 4)[3], 0);

        s.fill_polygon(&rect(0.0, 0.0, 10.0, 10.0), red());
        let rgba = s.to_rgba().unwrap();
        assert_eq!(pixel(&rgba, 10, 6, 4), [255, 0, 0, 255]);
    }

    #[test]
    fn nested_clips_intersect() {
        let mut s = PixelSurface::new(10, 10).unwrap();
        s.push_clip(&rect(0.0, 0.0, 6.0, 10.0));
        s.push_clip(&rect(4.0, 0.0, 10.0, 10.0));
        s.fill_polygon(&rect(0.0, 0.0, 10.0, 10.0), red());
        s.pop_clip();
        s.pop_clip();
        let rgba = s.to_rgba().unwrap();
        assert_eq!(pixel(&rgba, 10, 3, 0)[3], 0);
        assert_eq!(pixel(&rgba, 10, 5, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 10, 7, 0)[3], 0);
    }

    #[test]
    fn readback_with_open_clip_fails() {
        let mut s = PixelSurface::new(4, 4).unwrap();
        s.push_clip(&rect(0.0, 0.0, 2.0, 2.0));
        assert!(matches!(s.to_rgba(), Err(GridError::Io(_))));
        s.pop_clip();
        assert!(s.to_rgba().is_ok());
    }

    #[test]
    fn unbalanced_pop_is_ignored() {
        let mut s = PixelSurface::new(4, 4).unwrap();
        s.pop_clip();
        assert_eq!(s.clip_depth(), 0);
        assert!(s.to_rgba().is_ok());
    }

    #[test]
    fn brush_is_tinted_and_centred_on_the_translation() {
        let mut s = PixelSurface::new(20, 20).unwrap();
        let transform = DAffine2::from_translation(DVec2::new(10.0, 10.0));
        s.draw_brush(&white_brush(4, 4), transform, red());
        let rgba = s.to_rgba().unwrap();
        for (x, y) in [(8, 8), (11, 11), (9, 10)] {
            let [r, g, b, a] = pixel(&rgba, 20, x, y);
            assert!(r >= 250 && g <= 5 && b <= 5 && a >= 250, "({x}, {y})");
        }
        assert_eq!(pixel(&rgba, 20, 12, 12)[3], 0);
        assert_eq!(pixel(&rgba, 20, 7, 10)[3], 0);
    }

    #[test]
    fn brush_scale_grows_the_footprint() {
        let mut s = PixelSurface::new(40, 40).unwrap();
        let transform = DAffine2::from_scale_angle_translation(
            DVec2::splat(3.0),
            0.0,
            DVec2::new(20.0, 20.0),
        );
        s.draw_brush(&white_brush(4, 4), transform, red());
        assert_eq!(covered(&s.to_rgba().unwrap()), 12 * 12);
    }

    #[test]
    fn transparent_texels_leave_the_destination() {
        let mut s = PixelSurface::new(8, 8).unwrap();
        s.clear(Srgb::BLACK);
        let clear_brush = BrushImage::new(2, 2, vec![255, 255, 255, 0].repeat(4)).unwrap();
        s.draw_brush(&clear_brush, DAffine2::from_translation(DVec2::splat(4.0)), red());
        let rgba = s.to_rgba().unwrap();
        assert!(rgba.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn degenerate_transform_draws_nothing() {
        let mut s = PixelSurface::new(8, 8).unwrap();
        s.draw_brush(&white_brush(2, 2), DAffine2::from_scale(DVec2::ZERO), red());
        assert!(s.to_rgba().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn catmull_rom_segments_use_one_sixth_tangents() {
        let pts = [
            DVec2::new(0.0, 0.0),
            DVec2::new(6.0, 0.0),
            DVec2::new(12.0, 6.0),
            DVec2::new(18.0, 6.0),
        ];
        let path = catmull_rom_path(&pts);
        let els = path.elements();
        assert_eq!(els.len(), 2);
        assert_eq!(els[0], PathEl::MoveTo(Point::new(6.0, 0.0)));
        assert_eq!(
            els[1],
            PathEl::CurveTo(
                Point::new(8.0, 1.0),
                Point::new(10.0, 5.0),
                Point::new(12.0, 6.0)
            )
        );
        assert!(catmull_rom_path(&pts[..3]).elements().is_empty());
    }

    #[test]
    fn stroke_darkens_along_the_curve() {
        let mut s = PixelSurface::new(40, 10).unwrap();
        s.clear(Srgb::from_hex("#ffffff").unwrap());
        let style = StrokeStyle {
            color: Srgb::BLACK,
            alpha: 0.5,
            weight: 1.0,
        };
        let line = [
            DVec2::new(-10.0, 5.5),
            DVec2::new(0.0, 5.5),
            DVec2::new(30.0, 5.5),
            DVec2::new(40.0, 5.5),
        ];
        s.stroke_curve(&line, &style);
        let rgba = s.to_rgba().unwrap();
        let [r, ..] = pixel(&rgba, 40, 15, 5);
        assert!((110..=145).contains(&r), "expected one half-alpha pass, got {r}");
        assert_eq!(pixel(&rgba, 40, 35, 5), [255, 255, 255, 255]);
        assert_eq!(pixel(&rgba, 40, 15, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn hairline_weight_is_fainter_than_a_full_pixel() {
        let line = [
            DVec2::new(-10.0, 5.5),
            DVec2::new(0.0, 5.5),
            DVec2::new(30.0, 5.5),
            DVec2::new(40.0, 5.5),
        ];
        let darkness = |weight: f64| {
            let mut s = PixelSurface::new(40, 10).unwrap();
            s.clear(Srgb::from_hex("#ffffff").unwrap());
            let style = StrokeStyle {
                color: Srgb::BLACK,
                alpha: 1.0,
                weight,
            };
            s.stroke_curve(&line, &style);
            255 - pixel(&s.to_rgba().unwrap(), 40, 15, 5)[0] as i32
        };
        let hair = darkness(0.1);
        let full = darkness(1.0);
        assert!(hair > 0, "hairline left no trace");
        assert!(hair * 3 < full, "hairline {hair} vs full {full}");
    }

    #[test]
    fn short_strokes_draw_nothing() {
        let mut s = PixelSurface::new(10, 10).unwrap();
        let style = StrokeStyle {
            color: Srgb::BLACK,
            alpha: 1.0,
            weight: 1.0,
        };
        s.stroke_curve(&[DVec2::ZERO, DVec2::ONE, DVec2::splat(5.0)], &style);
        assert!(s.to_rgba().unwrap().iter().all(|&b| b == 0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn nothing_lands_outside_the_clip(
                cx in 0.0_f64..30.0,
                cy in 0.0_f64..30.0,
                w in 1.0_f64..15.0,
                h in 1.0_f64..15.0,
                angle in -3.2_f64..3.2,
                scale in 0.5_f64..4.0,
            ) {
                let mut s = PixelSurface::new(32, 32).unwrap();
                let (x1, y1) = ((cx + w).min(32.0), (cy + h).min(32.0));
                {
                    let mut scope = ClipScope::new(&mut s, &rect(cx, cy, x1, y1));
                    let t = DAffine2::from_scale_angle_translation(DVec2::splat(scale), angle, DVec2::new(16.0, 16.0));
                    scope.draw_brush(&white_brush(8, 8), t, red());
                    scope.fill_polygon(&rect(0.0, 0.0, 32.0, 32.0), red());
                }
                let rgba = s.to_rgba().unwrap();
                for y in 0..32_u32 {
                    for x in 0..32_u32 {
                        let (px, py) = (x as f64, y as f64);
                        let disjoint = px + 1.0 <= cx || px >= x1 || py + 1.0 <= cy || py >= y1;
                        if disjoint {
                            prop_assert_eq!(pixel(&rgba, 32, x, y)[3], 0, "pixel ({}, {}) escaped", x, y);
                        }
                    }
                }
            }
        }
    }
}
