//! Incremental path construction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::FRAC_PI_2;

use super::{
    curve::ParametricCurve,
    heading::HeadingInterpolator,
    poly::Waypoint,
    Path,
    PathError,
    PathSegment,
};
use crate::geometry::{rotate, Pose2d, Vector2d};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Segments shorter than this are rejected as degenerate.
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Builds a path one segment at a time from a start pose.
///
/// Misuse, such as a segment which ends where it starts, is reported by
/// `build` rather than corrected.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    /// Robot pose at the end of the path so far
    pose: Pose2d,

    /// Direction the next spline leaves along. When reversed this points
    /// opposite to the direction of travel, like the robot's heading.
    tangent: f64,

    reversed: bool,

    segments: Vec<PathSegment>,

    /// Index of segments added so far, including rejected ones
    num_added: usize,

    error: Option<PathError>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the robot's heading should change over a new segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum HeadingSpec {
    /// Face along the path.
    Tangent,

    /// Keep the current heading.
    Constant,

    /// Turn at a constant rate to the given heading.
    Linear(f64),

    /// Turn smoothly to the given heading.
    Spline(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingSpec {
    /// Whether the heading derivatives join smoothly onto a neighbouring
    /// tangent segment.
    pub fn respects_derivative_continuity(&self) -> bool {
        matches!(self, HeadingSpec::Tangent | HeadingSpec::Spline(_))
    }
}

impl PathBuilder {
    pub fn new(start: Pose2d) -> Self {
        Self {
            pose: start,
            tangent: start.heading,
            reversed: false,
            segments: Vec::new(),
            num_added: 0,
            error: None,
        }
    }

    /// The robot pose at the end of the path so far.
    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Drive subsequent segments backwards.
    pub fn set_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn reverse(self) -> Self {
        let reversed = !self.reversed;
        self.set_reversed(reversed)
    }

    pub fn line_to(self, pos: Vector2d) -> Self {
        self.line_to_heading(pos, HeadingSpec::Tangent)
    }

    pub fn line_to_heading(mut self, pos: Vector2d, spec: HeadingSpec) -> Self {
        self.add_line(pos, spec);
        self
    }

    /// Line to `pos` keeping the current heading.
    pub fn strafe_to(self, pos: Vector2d) -> Self {
        self.line_to_heading(pos, HeadingSpec::Constant)
    }

    /// Drive straight ahead by `distance`.
    pub fn forward(self, distance: f64) -> Self {
        let pos = self.pose.pos() + self.pose.heading_vec() * distance;
        self.line_to(pos)
    }

    /// Drive straight backwards by `distance`, keeping the robot facing the
    /// same way.
    pub fn back(self, distance: f64) -> Self {
        let reversed = self.reversed;
        self.set_reversed(!reversed)
            .forward(-distance)
            .set_reversed(reversed)
    }

    pub fn strafe_left(self, distance: f64) -> Self {
        let pos = self.pose.pos() + rotate(self.pose.heading_vec(), FRAC_PI_2) * distance;
        self.strafe_to(pos)
    }

    pub fn strafe_right(self, distance: f64) -> Self {
        self.strafe_left(-distance)
    }

    /// Spline to `pose`, arriving along its heading.
    pub fn spline_to(self, pose: Pose2d) -> Self {
        self.spline_to_heading(pose, HeadingSpec::Tangent)
    }

    /// Spline to the position of `pose`, arriving along its heading, with
    /// the robot heading set by `spec`.
    pub fn spline_to_heading(mut self, pose: Pose2d, spec: HeadingSpec) -> Self {
        self.add_spline(pose, spec);
        self
    }

    /// Build the path.
    pub fn build(mut self) -> Result<Path, PathError> {
        let segments = self.take_segments()?;
        Path::new(segments)
    }

    pub(crate) fn add_line(&mut self, pos: Vector2d, spec: HeadingSpec) {
        let start = self.pose.pos();
        let index = self.next_index();

        if (pos - start).norm() < MIN_SEGMENT_LENGTH {
            self.error.get_or_insert(PathError::DegenerateSegment(index));
            return;
        }

        let (curve, tangent) = if self.reversed {
            let d = start - pos;
            (ParametricCurve::line(pos, start), d.y.atan2(d.x))
        } else {
            let d = pos - start;
            (ParametricCurve::line(start, pos), d.y.atan2(d.x))
        };

        self.push(curve, spec, pos, tangent);
    }

    pub(crate) fn add_spline(&mut self, end: Pose2d, spec: HeadingSpec) {
        let start = self.pose.pos();
        let index = self.next_index();
        let mag = (end.pos() - start).norm();

        if mag < MIN_SEGMENT_LENGTH {
            self.error.get_or_insert(PathError::DegenerateSegment(index));
            return;
        }

        let start_wp = Waypoint::new(
            start.x,
            start.y,
            mag * self.tangent.cos(),
            mag * self.tangent.sin(),
        );
        let end_wp = Waypoint::new(end.x, end.y, mag * end.heading.cos(), mag * end.heading.sin());

        let curve = if self.reversed {
            ParametricCurve::quintic_spline(end_wp, start_wp)
        } else {
            ParametricCurve::quintic_spline(start_wp, end_wp)
        };

        self.push(curve, spec, end.pos(), end.heading);
    }

    /// Update the robot heading without adding a segment, for turns in
    /// place.
    pub(crate) fn set_heading(&mut self, heading: f64) {
        self.pose.heading = heading;
        self.tangent = heading;
    }

    /// Take the segments built so far, or the first error encountered.
    pub(crate) fn take_segments(&mut self) -> Result<Vec<PathSegment>, PathError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        Ok(std::mem::take(&mut self.segments))
    }

    pub(crate) fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Length of the segments built so far.
    pub(crate) fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    fn next_index(&mut self) -> usize {
        let index = self.num_added;
        self.num_added += 1;
        index
    }

    fn push(&mut self, curve: ParametricCurve, spec: HeadingSpec, end_pos: Vector2d, tangent: f64) {
        let start_heading = self.pose.heading;
        let end_heading = match spec {
            HeadingSpec::Tangent => tangent,
            HeadingSpec::Constant => start_heading,
            HeadingSpec::Linear(h) | HeadingSpec::Spline(h) => h,
        };

        // Interpolators run along the curve, which starts at the end of the
        // segment when reversed
        let (curve_start, curve_end) = if self.reversed {
            (end_heading, start_heading)
        } else {
            (start_heading, end_heading)
        };

        let interpolator = match spec {
            HeadingSpec::Tangent => HeadingInterpolator::Tangent,
            HeadingSpec::Constant => HeadingInterpolator::Constant(start_heading),
            HeadingSpec::Linear(_) => HeadingInterpolator::linear(curve_start, curve_end),
            HeadingSpec::Spline(_) => HeadingInterpolator::spline(&curve, curve_start, curve_end),
        };

        self.segments
            .push(PathSegment::new(curve, interpolator, self.reversed));
        self.pose = Pose2d::from_pos(end_pos, end_heading);
        self.tangent = tangent;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
