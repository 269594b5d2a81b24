//! # Parametric curves
//!
//! Curves are defined over an internal parameter `t` in [0, 1], but are
//! queried by arc length `s`. Each curve caches a table mapping arc length
//! back to the internal parameter, built once on construction by integrating
//! the curve's speed `|r'(t)|` with the trapezium rule.
//!
//! Derivatives with respect to arc length are found from the internal
//! derivatives by the chain rule, using
//!
//! - `dt/ds = 1/|r'|`
//! - `d2t/ds2 = -(r'.r'')/|r'|^4`
//! - `d3t/ds3 = -(r''.r'' + r'.r''')/|r'|^5 + 4 (r'.r'')^2/|r'|^7`
//!
//! Wherever one of these is undefined (zero length tangent) the result is
//! replaced by zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::poly::{QuinticPolynomial, Waypoint};
use crate::geometry::{nan_to_zero, Vector2d};
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of intervals used to build the arc length table.
pub const LENGTH_SAMPLES: usize = 1000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Position and arc length derivatives of a curve at one point.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub pos: Vector2d,
    pub deriv: Vector2d,
    pub second_deriv: Vector2d,
    pub third_deriv: Vector2d,
}

/// Table mapping arc length to the internal curve parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcLengthTable {
    /// Cumulative arc length at each sample, starting from zero
    s_samples: Vec<f64>,

    /// Internal parameter at each sample, from 0 to 1 inclusive
    t_samples: Vec<f64>,
}

/// A cursor into an `ArcLengthTable` which remembers the last bracketing
/// interval.
///
/// Lookups are amortised O(1) when the queried arc lengths move
/// monotonically, in either direction.
#[derive(Debug, Clone)]
pub struct ArcLengthCursor<'a> {
    table: &'a ArcLengthTable,

    /// Upper index of the current bracket, `s[index - 1] < s <= s[index]`
    index: usize,
}

/// A straight line between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    start: Vector2d,
    end: Vector2d,
}

/// A quintic spline between two waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct QuinticSpline {
    x: QuinticPolynomial,
    y: QuinticPolynomial,
    table: ArcLengthTable,
}

/// Evaluates a curve at a sequence of arc lengths, reusing the table bracket
/// between queries.
#[derive(Debug, Clone)]
pub struct CurveSweep<'a> {
    curve: &'a ParametricCurve,
    cursor: Option<ArcLengthCursor<'a>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An arc length parameterised curve in the plane.
#[derive(Debug, Clone, PartialEq)]
pub enum ParametricCurve {
    Line(LineSegment),
    QuinticSpline(QuinticSpline),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CurvePoint {
    /// Angle of the tangent.
    pub fn tangent_angle(&self) -> f64 {
        self.deriv.y.atan2(self.deriv.x)
    }

    /// Derivative of the tangent angle with respect to arc length.
    pub fn tangent_angle_deriv(&self) -> f64 {
        let d = self.deriv;
        let d2 = self.second_deriv;

        finite_or_zero((d.x * d2.y - d2.x * d.y) / (d.x * d.x + d.y * d.y))
    }

    /// Second derivative of the tangent angle with respect to arc length.
    pub fn tangent_angle_second_deriv(&self) -> f64 {
        let d = self.deriv;
        let d2 = self.second_deriv;
        let d3 = self.third_deriv;

        let denom = d.x * d.x + d.y * d.y;
        let first = (d3.y * d.x - d3.x * d.y) / denom;
        let second = (d.x * d2.y - d2.x * d.y) * 2.0 * (d.x * d2.x + d.y * d2.y)
            / (denom * denom);

        finite_or_zero(first - second)
    }

    /// Unsigned curvature.
    pub fn curvature(&self) -> f64 {
        let d = self.deriv;
        let d2 = self.second_deriv;

        finite_or_zero((d.x * d2.y - d.y * d2.x).abs() / d.norm().powi(3))
    }
}

impl ArcLengthTable {
    /// Build the table by trapezoidal integration of `speed` over [0, 1].
    fn build<F>(speed: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let mut s_samples = Vec::with_capacity(LENGTH_SAMPLES + 1);
        let mut t_samples = Vec::with_capacity(LENGTH_SAMPLES + 1);
        let dt = 1.0 / LENGTH_SAMPLES as f64;

        s_samples.push(0.0);
        t_samples.push(0.0);

        let mut sum = 0.0;
        let mut last = speed(0.0);

        for i in 1..=LENGTH_SAMPLES {
            let t = i as f64 / LENGTH_SAMPLES as f64;
            let v = speed(t);

            sum += 0.5 * (v + last) * dt;
            last = v;

            s_samples.push(sum);
            t_samples.push(t);
        }

        Self {
            s_samples,
            t_samples,
        }
    }

    pub fn length(&self) -> f64 {
        self.s_samples.last().copied().unwrap_or(0.0)
    }

    /// Internal parameter at arc length `s`, found by binary search.
    pub fn reparam(&self, s: f64) -> f64 {
        if s <= 0.0 {
            return 0.0;
        }
        if s >= self.length() {
            return 1.0;
        }

        let index = self.s_samples.partition_point(|&v| v < s);
        self.interpolate(index, s)
    }

    pub fn cursor(&self) -> ArcLengthCursor<'_> {
        ArcLengthCursor {
            table: self,
            index: 1,
        }
    }

    fn interpolate(&self, index: usize, s: f64) -> f64 {
        let (s0, s1) = (self.s_samples[index - 1], self.s_samples[index]);
        let (t0, t1) = (self.t_samples[index - 1], self.t_samples[index]);

        if s1 - s0 <= 0.0 {
            t0
        } else {
            lin_map((s0, s1), (t0, t1), s)
        }
    }
}

impl<'a> ArcLengthCursor<'a> {
    /// Internal parameter at arc length `s`.
    pub fn reparam(&mut self, s: f64) -> f64 {
        let table = self.table;
        let last = table.s_samples.len() - 1;

        if s <= 0.0 {
            return 0.0;
        }
        if s >= table.length() {
            return 1.0;
        }

        while self.index < last && table.s_samples[self.index] < s {
            self.index += 1;
        }
        while self.index > 1 && table.s_samples[self.index - 1] >= s {
            self.index -= 1;
        }

        table.interpolate(self.index, s)
    }
}

impl ParametricCurve {
    /// A straight line from `start` to `end`.
    pub fn line(start: Vector2d, end: Vector2d) -> Self {
        ParametricCurve::Line(LineSegment { start, end })
    }

    /// A quintic spline from `start` to `end`.
    ///
    /// Waypoint derivatives are with respect to the internal parameter, so
    /// their magnitude shapes the curve.
    pub fn quintic_spline(start: Waypoint, end: Waypoint) -> Self {
        let x = QuinticPolynomial::new(start.x, start.dx, start.d2x, end.x, end.dx, end.d2x);
        let y = QuinticPolynomial::new(start.y, start.dy, start.d2y, end.y, end.dy, end.d2y);

        let table = ArcLengthTable::build(|t| Vector2d::new(x.deriv(t), y.deriv(t)).norm());

        ParametricCurve::QuinticSpline(QuinticSpline { x, y, table })
    }

    pub fn length(&self) -> f64 {
        match self {
            ParametricCurve::Line(l) => (l.end - l.start).norm(),
            ParametricCurve::QuinticSpline(q) => q.table.length(),
        }
    }

    /// Internal parameter at arc length `s`, clamped to [0, 1].
    pub fn reparam(&self, s: f64) -> f64 {
        match self {
            ParametricCurve::Line(_) => {
                let t = s / self.length();
                if t.is_nan() { 0.0 } else { t.max(0.0).min(1.0) }
            }
            ParametricCurve::QuinticSpline(q) => q.table.reparam(s),
        }
    }

    /// Position at arc length `s`.
    pub fn get(&self, s: f64) -> Vector2d {
        self.internal_get(self.reparam(s))
    }

    /// Unit tangent at arc length `s`.
    pub fn deriv(&self, s: f64) -> Vector2d {
        self.point_at_param(self.reparam(s)).deriv
    }

    pub fn second_deriv(&self, s: f64) -> Vector2d {
        self.point_at_param(self.reparam(s)).second_deriv
    }

    pub fn third_deriv(&self, s: f64) -> Vector2d {
        self.point_at_param(self.reparam(s)).third_deriv
    }

    /// Position and all derivatives at arc length `s`.
    pub fn point(&self, s: f64) -> CurvePoint {
        self.point_at_param(self.reparam(s))
    }

    pub fn start(&self) -> Vector2d {
        self.internal_get(0.0)
    }

    pub fn end(&self) -> Vector2d {
        self.internal_get(1.0)
    }

    /// Begin a sweep of lookups along the curve.
    pub fn sweep(&self) -> CurveSweep<'_> {
        let cursor = match self {
            ParametricCurve::Line(_) => None,
            ParametricCurve::QuinticSpline(q) => Some(q.table.cursor()),
        };

        CurveSweep {
            curve: self,
            cursor,
        }
    }

    /// Evaluate the curve at internal parameter `t`, with derivatives taken
    /// with respect to arc length.
    pub fn point_at_param(&self, t: f64) -> CurvePoint {
        let d1 = self.internal_deriv(t);
        let d2 = self.internal_second_deriv(t);
        let d3 = self.internal_third_deriv(t);

        let dd = d1.dot(&d1);
        let mag = dd.sqrt();
        let d1_d2 = d1.dot(&d2);

        let p1 = 1.0 / mag;
        let p2 = -d1_d2 / (dd * dd);
        let p3 = -(d2.dot(&d2) + d1.dot(&d3)) / (dd * dd * mag)
            + 4.0 * d1_d2 * d1_d2 / (dd * dd * dd * mag);

        CurvePoint {
            pos: self.internal_get(t),
            deriv: nan_to_zero(d1 * p1),
            second_deriv: nan_to_zero(d2 * (p1 * p1) + d1 * p2),
            third_deriv: nan_to_zero(d3 * (p1 * p1 * p1) + d2 * (3.0 * p1 * p2) + d1 * p3),
        }
    }

    fn internal_get(&self, t: f64) -> Vector2d {
        match self {
            ParametricCurve::Line(l) => l.start + (l.end - l.start) * t,
            ParametricCurve::QuinticSpline(q) => Vector2d::new(q.x.get(t), q.y.get(t)),
        }
    }

    fn internal_deriv(&self, t: f64) -> Vector2d {
        match self {
            ParametricCurve::Line(l) => l.end - l.start,
            ParametricCurve::QuinticSpline(q) => Vector2d::new(q.x.deriv(t), q.y.deriv(t)),
        }
    }

    fn internal_second_deriv(&self, t: f64) -> Vector2d {
        match self {
            ParametricCurve::Line(_) => Vector2d::zeros(),
            ParametricCurve::QuinticSpline(q) => {
                Vector2d::new(q.x.second_deriv(t), q.y.second_deriv(t))
            }
        }
    }

    fn internal_third_deriv(&self, t: f64) -> Vector2d {
        match self {
            ParametricCurve::Line(_) => Vector2d::zeros(),
            ParametricCurve::QuinticSpline(q) => {
                Vector2d::new(q.x.third_deriv(t), q.y.third_deriv(t))
            }
        }
    }
}

impl<'a> CurveSweep<'a> {
    /// Evaluate the curve at arc length `s`.
    pub fn point(&mut self, s: f64) -> CurvePoint {
        let t = match self.cursor {
            Some(ref mut c) => c.reparam(s),
            None => self.curve.reparam(s),
        };

        self.curve.point_at_param(t)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_spline() -> ParametricCurve {
        ParametricCurve::quintic_spline(
            Waypoint::new(0.0, 0.0, 20.0, 40.0),
            Waypoint::new(45.0, 35.0, 60.0, 10.0),
        )
    }

    /// Check `deriv` against a central difference of `value` over `count`
    /// steps.
    fn check_deriv<F, G>(length: f64, count: usize, value: F, deriv: G)
    where
        F: Fn(f64) -> f64,
        G: Fn(f64) -> f64,
    {
        let ds = length / count as f64;

        for i in 1..count {
            let s = i as f64 * ds;
            let numeric = (value(s + ds) - value(s - ds)) / (2.0 * ds);
            let analytic = deriv(s);

            assert!(
                (numeric - analytic).abs() < 1e-2 * analytic.abs().max(1.0),
                "derivative mismatch at s = {}: numeric {}, analytic {}",
                s,
                numeric,
                analytic
            );
        }
    }

    #[test]
    fn test_line() {
        let line = ParametricCurve::line(Vector2d::new(1.0, 1.0), Vector2d::new(4.0, 5.0));

        assert!((line.length() - 5.0).abs() < 1e-12);
        assert!((line.get(2.5) - Vector2d::new(2.5, 3.0)).norm() < 1e-12);
        assert!((line.deriv(1.0) - Vector2d::new(0.6, 0.8)).norm() < 1e-12);
        assert_eq!(line.second_deriv(1.0), Vector2d::zeros());

        // Out of range queries clamp
        assert!((line.get(-1.0) - Vector2d::new(1.0, 1.0)).norm() < 1e-12);
        assert!((line.get(10.0) - Vector2d::new(4.0, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn test_degenerate_line() {
        let p = Vector2d::new(2.0, 2.0);
        let line = ParametricCurve::line(p, p);

        assert_eq!(line.length(), 0.0);
        assert_eq!(line.get(0.0), p);
        assert_eq!(line.deriv(0.0), Vector2d::zeros());

        let point = line.point(0.0);
        assert_eq!(point.tangent_angle(), 0.0);
        assert_eq!(point.tangent_angle_deriv(), 0.0);
        assert_eq!(point.curvature(), 0.0);
    }

    #[test]
    fn test_straight_spline_length() {
        let spline = ParametricCurve::quintic_spline(
            Waypoint::new(0.0, 0.0, 10.0, 0.0),
            Waypoint::new(10.0, 0.0, 10.0, 0.0),
        );

        assert!((spline.length() - 10.0).abs() < 1e-9);
        assert!((spline.get(3.0) - Vector2d::new(3.0, 0.0)).norm() < 1e-9);
        assert!((spline.deriv(3.0) - Vector2d::new(1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_spline_endpoints() {
        let spline = test_spline();

        assert!((spline.get(0.0) - Vector2d::new(0.0, 0.0)).norm() < 1e-9);
        assert!((spline.get(spline.length()) - Vector2d::new(45.0, 35.0)).norm() < 1e-9);
        assert_eq!(spline.start(), spline.get(0.0));

        // Tangent is a unit vector along the waypoint derivative
        let expected = Vector2d::new(20.0, 40.0).normalize();
        assert!((spline.deriv(0.0) - expected).norm() < 1e-9);
    }

    #[test]
    fn test_cursor_matches_search() {
        let spline = test_spline();
        let table = match spline {
            ParametricCurve::QuinticSpline(ref q) => &q.table,
            _ => unreachable!(),
        };

        let length = table.length();
        let mut cursor = table.cursor();

        // Forwards then backwards
        for i in (0..=200).chain((0..=200).rev()) {
            let s = length * i as f64 / 200.0;
            assert!((cursor.reparam(s) - table.reparam(s)).abs() < 1e-12);
        }

        // Jumps
        for &s in &[length * 0.9, length * 0.1, length * 0.5, -1.0, length + 1.0] {
            assert!((cursor.reparam(s) - table.reparam(s)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_spline_derivatives() {
        let spline = test_spline();
        let length = spline.length();

        check_deriv(length, 1000, |s| spline.get(s).x, |s| spline.deriv(s).x);
        check_deriv(length, 1000, |s| spline.get(s).y, |s| spline.deriv(s).y);
        check_deriv(length, 1000, |s| spline.deriv(s).x, |s| spline.second_deriv(s).x);
        check_deriv(length, 1000, |s| spline.deriv(s).y, |s| spline.second_deriv(s).y);
        check_deriv(length, 1000, |s| spline.second_deriv(s).x, |s| spline.third_deriv(s).x);
        check_deriv(length, 1000, |s| spline.second_deriv(s).y, |s| spline.third_deriv(s).y);
    }

    #[test]
    fn test_tangent_angle_derivatives() {
        let spline = test_spline();
        let length = spline.length();

        check_deriv(
            length,
            1000,
            |s| spline.point(s).tangent_angle(),
            |s| spline.point(s).tangent_angle_deriv(),
        );
        check_deriv(
            length,
            1000,
            |s| spline.point(s).tangent_angle_deriv(),
            |s| spline.point(s).tangent_angle_second_deriv(),
        );
    }
}
