//! Trajectory builder
//!
//! Extends the path builder with point turns, waits, per-segment constraints
//! and markers. Each path added becomes its own trajectory segment, driven
//! from rest to rest, unless it is added inside a composite. The paths of a
//! composite are profiled together as one segment, so the robot does not stop
//! between them.
//!
//! A composite is split automatically around any segment whose heading does
//! not join smoothly onto its neighbours.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;

use super::{
    DriveConstraints,
    PathTrajectorySegment,
    PointTurn,
    Trajectory,
    TrajectoryError,
    TrajectoryMarker,
    TrajectorySegment,
    WaitSegment,
};
use crate::{
    geometry::{Pose2d, Vector2d},
    path::{HeadingSpec, Path, PathBuilder},
    profile::DEFAULT_RESOLUTION,
};
use util::maths::{get_ang_dist, norm_angle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Builds a trajectory one segment at a time.
///
/// Errors are held until `build`, which reports the first one.
#[derive(Debug, Clone)]
pub struct TrajectoryBuilder {
    paths: PathBuilder,

    global_constraints: DriveConstraints,

    /// Constraints for segments added until reset
    override_constraints: Option<DriveConstraints>,

    /// Constraints of each path segment not yet profiled
    pending_constraints: Vec<DriveConstraints>,

    resolution: usize,

    composite: bool,

    segments: Vec<TrajectorySegment>,

    /// Total path length of the profiled segments
    flushed_length: f64,

    markers: Vec<MarkerSpec>,

    error: Option<TrajectoryError>,
}

/// A marker whose time is resolved once the trajectory is built.
#[derive(Debug, Clone)]
struct MarkerSpec {
    position: MarkerPosition,
    label: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum MarkerPosition {
    /// At `scale * duration + offset` seconds
    Temporal { scale: f64, offset: f64 },

    /// At `scale * path_length + offset` along the trajectory's paths
    Displacement { scale: f64, offset: f64 },

    /// Where the trajectory passes closest to the point
    Spatial(Vector2d),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajectoryBuilder {
    pub fn new(start: Pose2d, constraints: DriveConstraints) -> Self {
        Self {
            paths: PathBuilder::new(start),
            global_constraints: constraints,
            override_constraints: None,
            pending_constraints: Vec::new(),
            resolution: DEFAULT_RESOLUTION,
            composite: false,
            segments: Vec::new(),
            flushed_length: 0.0,
            markers: Vec::new(),
            error: None,
        }
    }

    /// Set the number of constraint samples taken along each path segment.
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// The robot pose at the end of the trajectory so far.
    pub fn pose(&self) -> Pose2d {
        self.paths.pose()
    }

    // ---- CONSTRAINTS ----

    /// Use `constraints` for the segments added from now on.
    pub fn set_constraints(mut self, constraints: DriveConstraints) -> Self {
        self.override_constraints = Some(constraints);
        self
    }

    /// Go back to the constraints the builder was created with.
    pub fn reset_constraints(mut self) -> Self {
        self.override_constraints = None;
        self
    }

    // ---- PATHS ----

    pub fn set_reversed(self, reversed: bool) -> Self {
        self.with_paths(|p| p.set_reversed(reversed))
    }

    pub fn reverse(self) -> Self {
        self.with_paths(|p| p.reverse())
    }

    pub fn line_to(self, pos: Vector2d) -> Self {
        self.add_path(HeadingSpec::Tangent, |p| p.line_to(pos))
    }

    pub fn line_to_heading(self, pos: Vector2d, spec: HeadingSpec) -> Self {
        self.add_path(spec, |p| p.line_to_heading(pos, spec))
    }

    pub fn strafe_to(self, pos: Vector2d) -> Self {
        self.add_path(HeadingSpec::Constant, |p| p.strafe_to(pos))
    }

    pub fn forward(self, distance: f64) -> Self {
        self.add_path(HeadingSpec::Tangent, |p| p.forward(distance))
    }

    pub fn back(self, distance: f64) -> Self {
        self.add_path(HeadingSpec::Tangent, |p| p.back(distance))
    }

    pub fn strafe_left(self, distance: f64) -> Self {
        self.add_path(HeadingSpec::Constant, |p| p.strafe_left(distance))
    }

    pub fn strafe_right(self, distance: f64) -> Self {
        self.add_path(HeadingSpec::Constant, |p| p.strafe_right(distance))
    }

    pub fn spline_to(self, pose: Pose2d) -> Self {
        self.add_path(HeadingSpec::Tangent, |p| p.spline_to(pose))
    }

    pub fn spline_to_heading(self, pose: Pose2d, spec: HeadingSpec) -> Self {
        self.add_path(spec, |p| p.spline_to_heading(pose, spec))
    }

    // ---- COMPOSITES ----

    /// Profile the paths added from now on as one segment.
    pub fn begin_composite(mut self) -> Self {
        self.flush();
        self.composite = true;
        self
    }

    pub fn close_composite(mut self) -> Self {
        self.flush();
        self.composite = false;
        self
    }

    // ---- TURNS AND WAITS ----

    /// Turn on the spot by `angle` radians, positive anticlockwise. Closes
    /// any open composite.
    pub fn turn(mut self, angle: f64) -> Self {
        self = self.close_composite();

        let pose = self.paths.pose();
        match PointTurn::new(pose, angle, self.current_constraints()) {
            Ok(turn) => self.segments.push(TrajectorySegment::Turn(turn)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self.paths.set_heading(norm_angle(pose.heading + angle));

        self
    }

    /// Turn on the spot the shortest way to `heading`.
    pub fn turn_to(self, heading: f64) -> Self {
        let angle = get_ang_dist(self.paths.pose().heading, heading);
        self.turn(angle)
    }

    /// Hold the current pose for `duration` seconds.
    pub fn wait_for(mut self, duration: f64) -> Self {
        self = self.close_composite();

        if duration < 0.0 {
            self.error
                .get_or_insert(TrajectoryError::NegativeWait(duration));
            return self;
        }

        let pose = self.paths.pose();
        self.segments
            .push(TrajectorySegment::Wait(WaitSegment::new(pose, duration)));

        self
    }

    // ---- MARKERS ----

    /// Mark `time` seconds from the start of the trajectory.
    pub fn add_temporal_marker(self, time: f64, label: &str) -> Self {
        self.add_scaled_temporal_marker(0.0, time, label)
    }

    /// Mark `scale * duration + offset` seconds from the start of the
    /// trajectory.
    pub fn add_scaled_temporal_marker(mut self, scale: f64, offset: f64, label: &str) -> Self {
        self.push_marker(MarkerPosition::Temporal { scale, offset }, label);
        self
    }

    /// Mark the end of the paths added so far.
    pub fn add_displacement_marker(self, label: &str) -> Self {
        let displacement = self.flushed_length + self.paths.length();
        self.add_displacement_marker_at(displacement, label)
    }

    /// Mark the point `displacement` along the trajectory's paths.
    pub fn add_displacement_marker_at(self, displacement: f64, label: &str) -> Self {
        self.add_scaled_displacement_marker(0.0, displacement, label)
    }

    /// Mark the point `scale * path_length + offset` along the trajectory's
    /// paths.
    pub fn add_scaled_displacement_marker(
        mut self,
        scale: f64,
        offset: f64,
        label: &str,
    ) -> Self {
        self.push_marker(MarkerPosition::Displacement { scale, offset }, label);
        self
    }

    /// Mark where the trajectory passes closest to `point`.
    pub fn add_spatial_marker(mut self, point: Vector2d, label: &str) -> Self {
        self.push_marker(MarkerPosition::Spatial(point), label);
        self
    }

    // ---- BUILD ----

    pub fn build(mut self) -> Result<Trajectory, TrajectoryError> {
        self = self.close_composite();

        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let traj = Trajectory::new(self.segments)?;

        let markers = self
            .markers
            .into_iter()
            .map(|m| {
                let time = match m.position {
                    MarkerPosition::Temporal { scale, offset } => {
                        scale * traj.duration() + offset
                    }
                    MarkerPosition::Displacement { scale, offset } => {
                        traj.time_at_displacement(scale * traj.path_length() + offset)
                    }
                    MarkerPosition::Spatial(point) => traj.time_at_point(point),
                };
                TrajectoryMarker {
                    time,
                    label: m.label,
                }
            })
            .collect();

        debug!(
            "Built trajectory of {} segments lasting {:.4} s",
            traj.segments.len(),
            traj.duration()
        );

        Trajectory::with_markers(traj.segments, markers)
    }

    // ---- INTERNALS ----

    fn current_constraints(&self) -> &DriveConstraints {
        self.override_constraints
            .as_ref()
            .unwrap_or(&self.global_constraints)
    }

    fn push_marker(&mut self, position: MarkerPosition, label: &str) {
        self.markers.push(MarkerSpec {
            position,
            label: label.to_string(),
        });
    }

    /// Apply a chained path builder operation.
    fn with_paths<F>(mut self, op: F) -> Self
    where
        F: FnOnce(PathBuilder) -> PathBuilder,
    {
        let pose = self.paths.pose();
        let paths = std::mem::replace(&mut self.paths, PathBuilder::new(pose));
        self.paths = op(paths);
        self
    }

    /// Add a path segment, profiling it now unless it belongs to a
    /// composite.
    fn add_path<F>(mut self, spec: HeadingSpec, op: F) -> Self
    where
        F: FnOnce(PathBuilder) -> PathBuilder,
    {
        let split = self.composite && !spec.respects_derivative_continuity();
        if split {
            self.flush();
        }

        let before = self.paths.num_segments();
        self = self.with_paths(op);
        if self.paths.num_segments() > before {
            let constraints = self.current_constraints().clone();
            self.pending_constraints.push(constraints);
        }

        if !self.composite || split {
            self.flush();
        }

        self
    }

    /// Profile the pending path segments into a single trajectory segment.
    fn flush(&mut self) {
        let constraints = std::mem::take(&mut self.pending_constraints);

        let segments = match self.paths.take_segments() {
            Ok(s) => s,
            Err(e) => {
                self.error.get_or_insert(e.into());
                return;
            }
        };
        if segments.is_empty() {
            return;
        }

        let result = Path::new(segments)
            .map_err(TrajectoryError::from)
            .and_then(|path| PathTrajectorySegment::new(path, &constraints, self.resolution));

        match result {
            Ok(seg) => {
                self.flushed_length += seg.path().length();
                self.segments.push(TrajectorySegment::Path(seg));
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::PathError;
    use crate::profile::ProfileError;
    use std::f64::consts::PI;

    fn constraints() -> DriveConstraints {
        DriveConstraints::new(50.0, 25.0, PI, PI)
    }

    fn builder() -> TrajectoryBuilder {
        TrajectoryBuilder::new(Pose2d::new(0.0, 0.0, 0.0), constraints())
    }

    #[test]
    fn test_composite_lines() {
        let traj = builder()
            .begin_composite()
            .forward(2.5)
            .forward(2.5)
            .close_composite()
            .build()
            .unwrap();

        // Rest to rest over 5 without reaching the velocity limit
        assert_eq!(traj.segments().len(), 1);
        assert!((traj.duration() - 2.0 * (2.0 * 2.5 / 25.0f64).sqrt()).abs() < 1e-6);
        assert!(traj.end().epsilon_equals(&Pose2d::new(5.0, 0.0, 0.0), 1e-9));

        // Stopping in the middle takes longer
        let stopping = builder().forward(2.5).forward(2.5).build().unwrap();
        assert_eq!(stopping.segments().len(), 2);
        assert!(stopping.duration() > traj.duration() + 0.1);
    }

    #[test]
    fn test_composite_split() {
        let traj = builder()
            .begin_composite()
            .forward(10.0)
            .line_to_heading(Vector2d::new(20.0, 0.0), HeadingSpec::Linear(1.0))
            .forward(10.0)
            .spline_to(Pose2d::new(40.0, 10.0, 0.0))
            .build()
            .unwrap();

        // The linear heading segment stands alone
        assert_eq!(traj.segments().len(), 3);
        assert!(traj.end().epsilon_equals(&Pose2d::new(40.0, 10.0, 0.0), 1e-6));
    }

    #[test]
    fn test_turns_and_waits() {
        let traj = builder()
            .forward(10.0)
            .turn(PI / 2.0)
            .forward(10.0)
            .wait_for(1.5)
            .turn_to(0.0)
            .build()
            .unwrap();

        assert_eq!(traj.segments().len(), 5);
        assert!(traj.end().epsilon_equals(&Pose2d::new(10.0, 10.0, 0.0), 1e-6));

        match &traj.segments()[3] {
            TrajectorySegment::Wait(w) => assert_eq!(w.duration(), 1.5),
            s => panic!("Expected a wait, found {:?}", s),
        }
        match &traj.segments()[4] {
            TrajectorySegment::Turn(t) => assert!((t.angle() + PI / 2.0).abs() < 1e-9),
            s => panic!("Expected a turn, found {:?}", s),
        }
    }

    #[test]
    fn test_back_and_reverse() {
        let traj = builder().back(10.0).build().unwrap();
        assert!(traj.end().epsilon_equals(&Pose2d::new(-10.0, 0.0, 0.0), 1e-6));
        assert!(traj.velocity(0.5 * traj.duration()).x < 0.0);

        let traj = builder()
            .reverse()
            .spline_to(Pose2d::new(-20.0, -10.0, 0.0))
            .build()
            .unwrap();
        assert!(traj.end().epsilon_equals(&Pose2d::new(-20.0, -10.0, 0.0), 1e-6));
    }

    #[test]
    fn test_constraint_override() {
        let slow = DriveConstraints::new(5.0, 25.0, PI, PI);
        let traj = builder()
            .set_constraints(slow)
            .forward(20.0)
            .reset_constraints()
            .forward(20.0)
            .build()
            .unwrap();

        let durations: Vec<_> = traj.segments().iter().map(|s| s.duration()).collect();
        assert!(durations[0] > durations[1]);

        for i in 0..=20 {
            let t = durations[0] * i as f64 / 20.0;
            assert!(traj.velocity(t).x <= 5.0 + 1e-6);
        }
    }

    #[test]
    fn test_markers() {
        let traj = builder()
            .forward(10.0)
            .add_displacement_marker("first")
            .wait_for(1.0)
            .forward(10.0)
            .add_temporal_marker(0.1, "start")
            .add_scaled_temporal_marker(1.0, -0.5, "end")
            .add_scaled_displacement_marker(0.25, 0.0, "quarter")
            .add_spatial_marker(Vector2d::new(15.0, 1.0), "spatial")
            .build()
            .unwrap();

        let first = traj.segments()[0].duration();
        let time = |label: &str| {
            traj.markers()
                .iter()
                .find(|m| m.label == label)
                .map(|m| m.time)
                .unwrap()
        };

        assert!((time("first") - first).abs() < 1e-6);
        assert!((time("start") - 0.1).abs() < 1e-12);
        assert!((time("end") - (traj.duration() - 0.5)).abs() < 1e-12);
        assert!((time("quarter") - 0.5 * first).abs() < 1e-6);
        assert!((time("spatial") - (first + 1.0 + 0.5 * first)).abs() < 1e-6);

        // Sorted by time
        let times: Vec<_> = traj.markers().iter().map(|m| m.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_errors() {
        assert_eq!(builder().build(), Err(TrajectoryError::EmptyTrajectory));

        assert_eq!(
            builder().forward(10.0).forward(0.0).forward(10.0).build(),
            Err(TrajectoryError::Path(PathError::DegenerateSegment(1)))
        );

        assert_eq!(
            builder().forward(10.0).wait_for(-1.0).build(),
            Err(TrajectoryError::NegativeWait(-1.0))
        );

        // No angular velocity allowed, so turns cannot be profiled
        let stalled = DriveConstraints::new(50.0, 25.0, 0.0, PI);
        assert_eq!(
            TrajectoryBuilder::new(Pose2d::new(0.0, 0.0, 0.0), stalled)
                .turn(PI / 2.0)
                .build(),
            Err(TrajectoryError::Profile(ProfileError::ZeroVelocity(0.0)))
        );
    }

    #[test]
    fn test_branching() {
        let prefix = builder().forward(10.0);

        // Both branches share the prefix
        let left = prefix.clone().strafe_left(5.0).build().unwrap();
        let right = prefix.clone().strafe_right(5.0).build().unwrap();
        assert!(left.end().epsilon_equals(&Pose2d::new(10.0, 5.0, 0.0), 1e-6));
        assert!(right.end().epsilon_equals(&Pose2d::new(10.0, -5.0, 0.0), 1e-6));

        // An error in the prefix reaches every branch
        let failed = prefix.wait_for(-2.0);
        assert_eq!(
            failed.clone().forward(5.0).build(),
            Err(TrajectoryError::NegativeWait(-2.0))
        );
        assert_eq!(failed.build(), Err(TrajectoryError::NegativeWait(-2.0)));
    }
}
