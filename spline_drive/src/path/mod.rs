//! # Path module
//!
//! A path is a sequence of curve segments, each with its own heading
//! interpolator, indexed by the total displacement along it. Segments may be
//! reversed, in which case the curve is traversed from its end to its start.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod builder;
pub mod curve;
pub mod heading;
pub mod poly;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
pub use builder::{HeadingSpec, PathBuilder};
pub use curve::{CurvePoint, CurveSweep, ParametricCurve};
pub use heading::{HeadingInterpolator, HeadingState};
pub use poly::{QuinticPolynomial, Waypoint};

use crate::geometry::{Pose2d, Vector2d};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of coarse samples per segment used to seed projection.
const PROJECT_SAMPLES_PER_SEGMENT: usize = 50;

/// Maximum number of Newton iterations used to refine a projection.
const PROJECT_MAX_ITERATIONS: usize = 30;

/// Displacement step under which a projection is considered converged.
pub const PROJECT_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One segment of a path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    curve: ParametricCurve,
    interpolator: HeadingInterpolator,
    reversed: bool,
}

/// A path made of one or more segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,

    /// Displacement at the start of each segment
    offsets: Vec<f64>,

    length: f64,
}

/// Pose and pose derivatives with respect to displacement.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct PathPoint {
    pub pose: Pose2d,
    pub deriv: Pose2d,
    pub second_deriv: Pose2d,
}

/// A point produced by sampling a path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PathSample {
    pub displacement: f64,
    pub segment_index: usize,
    pub point: PathPoint,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PathError {
    #[error("Attempted to create a path with no segments")]
    EmptySequence,

    #[error("Path segment {0} has zero length")]
    DegenerateSegment(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathSegment {
    pub fn new(curve: ParametricCurve, interpolator: HeadingInterpolator, reversed: bool) -> Self {
        Self {
            curve,
            interpolator,
            reversed,
        }
    }

    pub fn length(&self) -> f64 {
        self.curve.length()
    }

    pub fn curve(&self) -> &ParametricCurve {
        &self.curve
    }

    pub fn interpolator(&self) -> &HeadingInterpolator {
        &self.interpolator
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Evaluate at segment-local displacement `s`.
    pub fn point(&self, s: f64) -> PathPoint {
        let cs = self.curve_displacement(s);
        self.build_point(cs, &self.curve.point(cs))
    }

    fn curve_displacement(&self, s: f64) -> f64 {
        if self.reversed {
            self.length() - s
        } else {
            s
        }
    }

    fn build_point(&self, cs: f64, point: &CurvePoint) -> PathPoint {
        let heading = self.interpolator.evaluate(cs, self.length(), point);

        let pose = Pose2d::from_pos(point.pos, heading.heading).normalized();
        let deriv = Pose2d::from_pos(point.deriv, heading.deriv);
        let second_deriv = Pose2d::from_pos(point.second_deriv, heading.second_deriv);

        // Traversing backwards flips the first derivatives only
        if self.reversed {
            PathPoint {
                pose,
                deriv: -deriv,
                second_deriv,
            }
        } else {
            PathPoint {
                pose,
                deriv,
                second_deriv,
            }
        }
    }
}

impl Path {
    /// Create a new path from a list of segments.
    pub fn new(segments: Vec<PathSegment>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::EmptySequence);
        }

        let mut offsets = Vec::with_capacity(segments.len());
        let mut length = 0.0;
        for seg in segments.iter() {
            offsets.push(length);
            length += seg.length();
        }

        trace!(
            "Created path of {} segments, length {:.4}",
            segments.len(),
            length
        );

        Ok(Self {
            segments,
            offsets,
            length,
        })
    }

    /// Create a path from a single segment.
    pub fn from_segment(segment: PathSegment) -> Self {
        let length = segment.length();
        Self {
            segments: vec![segment],
            offsets: vec![0.0],
            length,
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Find the segment containing displacement `s`, returning its index and
    /// the segment-local displacement.
    ///
    /// Displacements outside the path clamp to its ends.
    pub fn locate(&self, s: f64) -> (usize, f64) {
        let mut remaining = s.max(0.0);

        for (i, seg) in self.segments.iter().enumerate() {
            if remaining <= seg.length() {
                return (i, remaining);
            }
            remaining -= seg.length();
        }

        let last = self.segments.len() - 1;
        (last, self.segments[last].length())
    }

    /// Pose and derivatives at displacement `s`.
    pub fn point(&self, s: f64) -> PathPoint {
        let (i, local) = self.locate(s);
        self.segments[i].point(local)
    }

    /// Pose at displacement `s`.
    pub fn get(&self, s: f64) -> Pose2d {
        self.point(s).pose
    }

    /// Derivative of the pose with respect to displacement.
    pub fn deriv(&self, s: f64) -> Pose2d {
        self.point(s).deriv
    }

    /// Second derivative of the pose with respect to displacement.
    pub fn second_deriv(&self, s: f64) -> Pose2d {
        self.point(s).second_deriv
    }

    pub fn start(&self) -> Pose2d {
        self.get(0.0)
    }

    pub fn end(&self) -> Pose2d {
        self.get(self.length)
    }

    /// Sample the path at `count` evenly spaced displacements from zero to
    /// the path length inclusive.
    pub fn sample(&self, count: usize) -> Vec<PathSample> {
        let mut samples = Vec::with_capacity(count);
        if count == 0 {
            return samples;
        }

        let step = if count > 1 {
            self.length / (count - 1) as f64
        } else {
            0.0
        };

        let mut seg_index = 0;
        let mut sweep = self.segments[0].curve.sweep();

        for i in 0..count {
            let s = (i as f64 * step).min(self.length);

            // Advance to the segment containing s
            let mut moved = false;
            while seg_index + 1 < self.segments.len()
                && s > self.offsets[seg_index] + self.segments[seg_index].length()
            {
                seg_index += 1;
                moved = true;
            }
            if moved {
                sweep = self.segments[seg_index].curve.sweep();
            }

            let seg = &self.segments[seg_index];
            let local = (s - self.offsets[seg_index]).max(0.0).min(seg.length());
            let cs = seg.curve_displacement(local);

            samples.push(PathSample {
                displacement: s,
                segment_index: seg_index,
                point: seg.build_point(cs, &sweep.point(cs)),
            });
        }

        samples
    }

    /// Find the displacement of the point on the path closest to `point`.
    ///
    /// A coarse scan seeds a Newton refinement of `(p(s) - q).p'(s) = 0`.
    /// The result is clamped to [0, length] and is never further from
    /// `point` than the best coarse sample.
    pub fn project(&self, point: Vector2d) -> f64 {
        let count = PROJECT_SAMPLES_PER_SEGMENT * self.segments.len() + 1;

        let (mut best_s, mut best_dist) = (0.0, std::f64::INFINITY);
        for sample in self.sample(count) {
            let dist = (sample.point.pose.pos() - point).norm();
            if dist < best_dist {
                best_s = sample.displacement;
                best_dist = dist;
            }
        }

        let mut s = best_s;
        for _ in 0..PROJECT_MAX_ITERATIONS {
            let p = self.point(s);
            let diff = p.pose.pos() - point;
            let d1 = p.deriv.pos();
            let d2 = p.second_deriv.pos();

            let f = diff.dot(&d1);
            let df = d1.dot(&d1) + diff.dot(&d2);
            if df.abs() < 1e-12 {
                break;
            }

            let next = (s - f / df).max(0.0).min(self.length);
            let step = (next - s).abs();
            s = next;

            if step < PROJECT_TOLERANCE {
                break;
            }
        }

        if (self.get(s).pos() - point).norm() <= best_dist {
            s
        } else {
            best_s
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn spline_path() -> Path {
        Path::from_segment(PathSegment::new(
            ParametricCurve::quintic_spline(
                Waypoint::new(0.0, 0.0, 20.0, 40.0),
                Waypoint::new(45.0, 35.0, 60.0, 10.0),
            ),
            HeadingInterpolator::Tangent,
            false,
        ))
    }

    fn two_line_path() -> Path {
        Path::new(vec![
            PathSegment::new(
                ParametricCurve::line(Vector2d::new(0.0, 0.0), Vector2d::new(10.0, 0.0)),
                HeadingInterpolator::Tangent,
                false,
            ),
            PathSegment::new(
                ParametricCurve::line(Vector2d::new(10.0, 0.0), Vector2d::new(10.0, 5.0)),
                HeadingInterpolator::Constant(0.0),
                false,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(Path::new(vec![]), Err(PathError::EmptySequence));
    }

    #[test]
    fn test_locate() {
        let path = two_line_path();
        assert!((path.length() - 15.0).abs() < 1e-12);

        assert_eq!(path.locate(-1.0), (0, 0.0));
        assert_eq!(path.locate(4.0), (0, 4.0));
        assert_eq!(path.locate(10.0), (0, 10.0));
        assert_eq!(path.locate(12.0).0, 1);
        assert!((path.locate(12.0).1 - 2.0).abs() < 1e-12);
        assert_eq!(path.locate(20.0), (1, 5.0));

        assert!(path.get(12.0).epsilon_equals(&Pose2d::new(10.0, 2.0, 0.0), 1e-12));
        assert!(path.end().epsilon_equals(&Pose2d::new(10.0, 5.0, 0.0), 1e-12));
    }

    #[test]
    fn test_path_derivatives() {
        let path = spline_path();
        let length = path.length();
        let count = 1000;
        let ds = length / count as f64;

        for i in 1..count {
            let s = i as f64 * ds;
            let prev = path.get(s - ds);
            let next = path.get(s + ds);
            let deriv = path.deriv(s);

            let num_x = (next.x - prev.x) / (2.0 * ds);
            let num_y = (next.y - prev.y) / (2.0 * ds);
            let num_h = util::maths::norm_angle(next.heading - prev.heading) / (2.0 * ds);

            assert!((num_x - deriv.x).abs() < 1e-2 * deriv.x.abs().max(1.0));
            assert!((num_y - deriv.y).abs() < 1e-2 * deriv.y.abs().max(1.0));
            assert!((num_h - deriv.heading).abs() < 1e-2 * deriv.heading.abs().max(1.0));

            let prev_d = path.deriv(s - ds);
            let next_d = path.deriv(s + ds);
            let second = path.second_deriv(s);

            let num_x2 = (next_d.x - prev_d.x) / (2.0 * ds);
            let num_y2 = (next_d.y - prev_d.y) / (2.0 * ds);
            let num_h2 = (next_d.heading - prev_d.heading) / (2.0 * ds);

            assert!((num_x2 - second.x).abs() < 1e-2 * second.x.abs().max(1.0));
            assert!((num_y2 - second.y).abs() < 1e-2 * second.y.abs().max(1.0));
            assert!((num_h2 - second.heading).abs() < 1e-2 * second.heading.abs().max(1.0));
        }
    }

    #[test]
    fn test_reversed_segment() {
        let line = ParametricCurve::line(Vector2d::new(0.0, 0.0), Vector2d::new(4.0, 0.0));
        let path = Path::from_segment(PathSegment::new(line, HeadingInterpolator::Tangent, true));

        // Travels from the curve end to its start, facing along the curve
        assert!(path.start().epsilon_equals(&Pose2d::new(4.0, 0.0, 0.0), 1e-12));
        assert!(path.end().epsilon_equals(&Pose2d::new(0.0, 0.0, 0.0), 1e-12));
        assert!(path.get(1.0).epsilon_equals(&Pose2d::new(3.0, 0.0, 0.0), 1e-12));
        assert!(path.deriv(1.0).epsilon_equals(&Pose2d::new(-1.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_sample_matches_point() {
        let path = Path::new(vec![
            spline_path().segments()[0].clone(),
            PathSegment::new(
                ParametricCurve::line(Vector2d::new(45.0, 35.0), Vector2d::new(60.0, 35.0)),
                HeadingInterpolator::linear(0.0, PI / 2.0),
                false,
            ),
        ])
        .unwrap();

        let samples = path.sample(101);
        assert_eq!(samples.len(), 101);
        assert_eq!(samples[0].segment_index, 0);
        assert_eq!(samples[100].segment_index, 1);

        for sample in samples {
            let expected = path.point(sample.displacement);
            assert!(sample.point.pose.epsilon_equals(&expected.pose, 1e-9));
            assert!(sample.point.deriv.epsilon_equals(&expected.deriv, 1e-9));
        }
    }

    #[test]
    fn test_project_line() {
        let path = two_line_path();

        assert!((path.project(Vector2d::new(3.0, 2.0)) - 3.0).abs() < 1e-6);
        assert!((path.project(Vector2d::new(-5.0, 1.0)) - 0.0).abs() < 1e-6);
        assert!((path.project(Vector2d::new(12.0, 3.0)) - 13.0).abs() < 1e-6);
        assert!((path.project(Vector2d::new(10.0, 50.0)) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_spline() {
        let path = spline_path();
        let length = path.length();

        for i in 0..=20 {
            let s = length * i as f64 / 20.0;
            let p = path.get(s);

            // Points on the path project onto themselves
            assert!((path.project(p.pos()) - s).abs() < 1e-3);

            // Points offset along the normal project back to the same place,
            // as long as the offset is well inside the radius of curvature
            let normal = Vector2d::new(-p.heading.sin(), p.heading.cos());
            let q = p.pos() + normal * 0.5;
            assert!((path.get(path.project(q)).pos() - p.pos()).norm() < 1e-2);
        }
    }
}
