//! # Bezier Edge Curves
//!
//! Piece edges are chains of cubic bezier segments. A curve with `k`
//! segments holds `3k + 1` points: anchors at indices `0, 3, 6, ..` and two
//! control points between each pair of anchors. Edge templates use seven
//! anchors, so six segments and nineteen points.
//!
//! Templates live in a normalized frame (`x` from -1 to 1 along the edge,
//! `y` perpendicular, negative towards the outside of a top edge). Scaling
//! maps a template onto a piece of a given size.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{try_vec, Result};

/// Anchors of one edge template.
pub const ANCHOR_POINTS: usize = 7;

/// Total points (anchors and controls) of one edge template.
pub const CURVE_POINTS: usize = 3 * (ANCHOR_POINTS - 1) + 1;

/// Parameter step used when sampling a curve.
pub const SAMPLE_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    points: Vec<Point>,
}

impl BezierCurve {
    /// Build a curve from `3k + 1` points (`k >= 1`).
    pub fn from_points(points: Vec<Point>) -> Option<Self> {
        if points.len() < 4 || (points.len() - 1) % 3 != 0 {
            return None;
        }
        Some(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn segments(&self) -> usize {
        (self.points.len() - 1) / 3
    }

    /// Number of anchors; sampling runs over `t` in `0..=anchors - 1`.
    pub fn anchors(&self) -> usize {
        self.segments() + 1
    }

    pub fn first(&self) -> Point {
        self.points[0]
    }

    pub fn last(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    /// Cubic blending polynomial on one axis of `segment`, `t` in `0..=1`.
    pub fn value(&self, t: f32, segment: usize, axis: Axis) -> f32 {
        let base = 3 * segment;
        let coord = |i: usize| match axis {
            Axis::X => self.points[base + i].x,
            Axis::Y => self.points[base + i].y,
        };
        let u = 1.0 - t;
        u * u * u * coord(0)
            + 3.0 * t * u * u * coord(1)
            + 3.0 * t * t * u * coord(2)
            + t * t * t * coord(3)
    }

    /// Points along the whole curve at [`SAMPLE_STEP`] parameter spacing,
    /// both ends included.
    pub fn samples(&self) -> impl Iterator<Item = Point> + '_ {
        let last_segment = self.segments() - 1;
        let steps = self.segments() * 10;
        (0..=steps).map(move |step| {
            let t = step as f32 * SAMPLE_STEP;
            let segment = (step / 10).min(last_segment);
            let sub_t = t - segment as f32;
            Point::new(
                self.value(sub_t, segment, Axis::X),
                self.value(sub_t, segment, Axis::Y),
            )
        })
    }

    fn map(&self, f: impl Fn(Point) -> Point) -> Result<Self> {
        let mut points = try_vec(self.points.len(), "bezier points")?;
        points.extend(self.points.iter().copied().map(f));
        Ok(Self { points })
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Scale a template onto a horizontal edge of `width` x `lines` pixels.
    ///
    /// The curve spans `0..=width`. The perpendicular excursion is reduced
    /// until every inner point sits inside the triangle a top edge owns
    /// (towards the piece center), then scaled by `shape_size` percent.
    pub fn scale_h(&self, width: i32, lines: i32, shape_size: u32) -> Result<Self> {
        let w = width.max(1) as f32;
        let l = lines.max(1) as f32;
        let x_ratio = w / 2.0;
        let x_offset = w / 2.0;
        let y_ratio = l / 2.0;

        let mut scale = 1.0_f32;
        loop {
            let fits = self.points[1..self.points.len() - 1].iter().all(|p| {
                let x = p.x * x_ratio + x_offset;
                let distance = x.min(w - x).max(0.0);
                (p.y * y_ratio * scale).abs() <= distance * 0.9 * l / w
            });
            if fits || scale <= 0.1 {
                break;
            }
            scale *= 0.9;
        }

        let excursion = y_ratio * scale * shape_size as f32 / 100.0;
        self.map(|p| Point::new(p.x * x_ratio + x_offset, p.y * excursion))
    }

    /// Scale a template onto a vertical edge: the curve spans `0..=lines`
    /// along `y` with its excursion along `x`.
    pub fn scale_v(&self, width: i32, lines: i32, shape_size: u32) -> Result<Self> {
        self.scale_h(lines, width, shape_size)?.h_to_v()
    }

    /// Mirror a horizontal curve across its baseline.
    pub fn h_negative(&self) -> Result<Self> {
        self.map(|p| Point::new(p.x, -p.y))
    }

    /// Mirror a vertical curve across its baseline.
    pub fn v_negative(&self) -> Result<Self> {
        self.map(|p| Point::new(-p.x, p.y))
    }

    /// Turn a horizontal curve into a vertical one without rescaling.
    pub fn h_to_v(&self) -> Result<Self> {
        self.map(|p| Point::new(p.y, p.x))
    }

    /// Random edge template: a convex blend of the tab primitives, flipped
    /// to the other side of the edge half of the time.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut weights = [0.0_f32; TAB_PRIMITIVES.len()];
        for weight in weights.iter_mut() {
            *weight = rng.random::<f32>();
        }
        let total: f32 = weights.iter().sum();
        if total <= f32::EPSILON {
            weights = [0.0; TAB_PRIMITIVES.len()];
            weights[0] = 1.0;
        } else {
            weights.iter_mut().for_each(|w| *w /= total);
        }
        let invert = if rng.random::<bool>() { -1.0 } else { 1.0 };

        let mut points = try_vec(CURVE_POINTS, "bezier template")?;
        for i in 0..CURVE_POINTS {
            let mut p = Point::default();
            for (primitive, weight) in TAB_PRIMITIVES.iter().zip(weights.iter()) {
                p.x += primitive[i].x * weight;
                p.y += primitive[i].y * weight;
            }
            p.y *= invert;
            points.push(p);
        }
        Ok(Self { points })
    }
}

// ============================================================================
// Tab primitives
// ============================================================================

const fn p(x: f32, y: f32) -> Point {
    Point::new(x, y)
}

/// Seven-anchor tab shapes sharing the end anchors `(-1, 0)` and `(1, 0)`.
/// Each starts along the baseline, narrows into a neck and closes around a
/// bulb that overhangs the neck.
const TAB_PRIMITIVES: [[Point; CURVE_POINTS]; 4] = [
    // classic centered tab
    [
        p(-1.0, 0.0), p(-0.6, 0.0), p(-0.35, 0.05),
        p(-0.2, 0.0), p(-0.1, -0.05), p(-0.05, -0.15),
        p(-0.15, -0.25), p(-0.25, -0.35), p(-0.15, -0.5),
        p(0.0, -0.5), p(0.15, -0.5), p(0.25, -0.35),
        p(0.15, -0.25), p(0.05, -0.15), p(0.1, -0.05),
        p(0.2, 0.0), p(0.35, 0.05), p(0.6, 0.0),
        p(1.0, 0.0),
    ],
    // wide bulb
    [
        p(-1.0, 0.0), p(-0.7, 0.0), p(-0.4, 0.04),
        p(-0.25, 0.0), p(-0.12, -0.04), p(-0.1, -0.12),
        p(-0.22, -0.22), p(-0.36, -0.32), p(-0.25, -0.46),
        p(0.0, -0.46), p(0.25, -0.46), p(0.36, -0.32),
        p(0.22, -0.22), p(0.1, -0.12), p(0.12, -0.04),
        p(0.25, 0.0), p(0.4, 0.04), p(0.7, 0.0),
        p(1.0, 0.0),
    ],
    // tab leaning towards the start of the edge
    [
        p(-1.0, 0.0), p(-0.7, 0.0), p(-0.45, 0.04),
        p(-0.3, 0.0), p(-0.2, -0.05), p(-0.16, -0.15),
        p(-0.26, -0.24), p(-0.36, -0.34), p(-0.26, -0.48),
        p(-0.1, -0.48), p(0.06, -0.48), p(0.14, -0.34),
        p(0.04, -0.24), p(-0.04, -0.15), p(0.0, -0.05),
        p(0.1, 0.0), p(0.3, 0.04), p(0.6, 0.0),
        p(1.0, 0.0),
    ],
    // tab leaning towards the end of the edge
    [
        p(-1.0, 0.0), p(-0.6, 0.0), p(-0.3, 0.04),
        p(-0.1, 0.0), p(0.0, -0.05), p(0.04, -0.15),
        p(-0.04, -0.24), p(-0.14, -0.34), p(-0.06, -0.48),
        p(0.1, -0.48), p(0.26, -0.48), p(0.36, -0.34),
        p(0.26, -0.24), p(0.16, -0.15), p(0.2, -0.05),
        p(0.3, 0.0), p(0.45, 0.04), p(0.7, 0.0),
        p(1.0, 0.0),
    ],
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template() -> BezierCurve {
        BezierCurve::from_points(TAB_PRIMITIVES[0].to_vec()).unwrap()
    }

    #[test]
    fn point_count_must_form_whole_segments() {
        assert!(BezierCurve::from_points(vec![Point::default(); 3]).is_none());
        assert!(BezierCurve::from_points(vec![Point::default(); 5]).is_none());
        let curve = BezierCurve::from_points(vec![Point::default(); CURVE_POINTS]).unwrap();
        assert_eq!(curve.segments(), 6);
        assert_eq!(curve.anchors(), ANCHOR_POINTS);
    }

    #[test]
    fn blending_hits_anchors_and_midpoint() {
        let curve = BezierCurve::from_points(vec![
            p(0.0, 0.0),
            p(1.0, 3.0),
            p(2.0, 3.0),
            p(3.0, 0.0),
        ])
        .unwrap();
        assert_eq!(curve.value(0.0, 0, Axis::X), 0.0);
        assert_eq!(curve.value(1.0, 0, Axis::X), 3.0);
        assert!((curve.value(0.5, 0, Axis::X) - 1.5).abs() < 1e-6);
        assert!((curve.value(0.5, 0, Axis::Y) - 2.25).abs() < 1e-6);
    }

    #[test]
    fn blending_is_symmetric_for_mirrored_controls() {
        let curve = template();
        let negative = curve.h_negative().unwrap();
        for segment in 0..curve.segments() {
            for step in 0..=10 {
                let t = step as f32 / 10.0;
                let a = curve.value(t, segment, Axis::Y);
                let b = negative.value(t, segment, Axis::Y);
                assert!((a + b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn samples_cover_both_ends() {
        let curve = template();
        let samples: Vec<Point> = curve.samples().collect();
        assert_eq!(samples.len(), 61);
        assert_eq!(samples[0], curve.first());
        let last = samples[samples.len() - 1];
        assert!((last.x - curve.last().x).abs() < 1e-6);
        assert!((last.y - curve.last().y).abs() < 1e-6);
    }

    #[test]
    fn horizontal_scale_spans_the_width() {
        let scaled = template().scale_h(120, 80, 100).unwrap();
        assert_eq!(scaled.first(), Point::new(0.0, 0.0));
        assert_eq!(scaled.last(), Point::new(120.0, 0.0));
        for p in &scaled.points()[1..CURVE_POINTS - 1] {
            let distance = p.x.min(120.0 - p.x);
            assert!(p.y.abs() <= distance * 0.9 * 80.0 / 120.0 + 1e-3);
        }
    }

    #[test]
    fn shape_size_scales_the_excursion() {
        let full = template().scale_h(100, 100, 100).unwrap();
        let half = template().scale_h(100, 100, 50).unwrap();
        for (a, b) in full.points().iter().zip(half.points()) {
            assert_eq!(a.x, b.x);
            assert!((a.y / 2.0 - b.y).abs() < 1e-4);
        }
    }

    #[test]
    fn vertical_scale_swaps_axes() {
        let v = template().scale_v(60, 90, 100).unwrap();
        assert_eq!(v.first(), Point::new(0.0, 0.0));
        assert_eq!(v.last(), Point::new(0.0, 90.0));
        let h = template().scale_h(90, 60, 100).unwrap();
        for (a, b) in v.points().iter().zip(h.points()) {
            assert_eq!(a.x, b.y);
            assert_eq!(a.y, b.x);
        }
    }

    #[test]
    fn negatives_flip_one_axis() {
        let h = template().scale_h(100, 60, 90).unwrap();
        let v = h.h_to_v().unwrap();
        let hn = h.h_negative().unwrap();
        let vn = v.v_negative().unwrap();
        for (a, b) in h.points().iter().zip(hn.points()) {
            assert_eq!(a.x, b.x);
            assert_eq!(a.y, -b.y);
        }
        for (a, b) in v.points().iter().zip(vn.points()) {
            assert_eq!(a.x, -b.x);
            assert_eq!(a.y, b.y);
        }
    }

    #[test]
    fn random_templates_keep_their_end_anchors() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let curve = BezierCurve::random(&mut rng).unwrap();
            assert_eq!(curve.points().len(), CURVE_POINTS);
            assert!((curve.first().x + 1.0).abs() < 1e-5);
            assert!((curve.last().x - 1.0).abs() < 1e-5);
            assert!(curve.first().y.abs() < 1e-6);
            assert!(curve.last().y.abs() < 1e-6);
            assert!(curve.points().iter().all(|p| p.x.abs() <= 1.0 && p.y.abs() <= 0.5 + 1e-5));
        }
    }
}
