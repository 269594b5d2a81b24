//! Trajectory segments
//!
//! Each segment is a time-parameterised motion of its own, starting at time
//! zero. A trajectory strings them together.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;

use super::{DriveConstraints, TrajectoryError};
use crate::{
    geometry::{Pose2d, Vector2d},
    path::Path,
    profile::{
        generate_motion_profile,
        generate_simple_motion_profile,
        MotionProfile,
        MotionState,
        SampledMotionConstraints,
    },
};
use util::maths::{get_ang_dist, norm_angle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path driven under a motion profile along its displacement.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrajectorySegment {
    path: Path,
    profile: MotionProfile,
}

/// A turn on the spot.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTurn {
    start: Pose2d,

    /// Profile of the heading change, from zero to the turn angle
    profile: MotionProfile,
}

/// Holding still for a fixed time.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSegment {
    pose: Pose2d,
    duration: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A segment of a trajectory.
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectorySegment {
    Path(PathTrajectorySegment),
    Turn(PointTurn),
    Wait(WaitSegment),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathTrajectorySegment {
    /// Profile `path` from rest to rest.
    ///
    /// `constraints` holds either one set for the whole path or one per path
    /// segment. They are sampled `resolution` times along the path.
    pub fn new(
        path: Path,
        constraints: &[DriveConstraints],
        resolution: usize,
    ) -> Result<Self, TrajectoryError> {
        let num_segments = path.segments().len();
        if constraints.len() != 1 && constraints.len() != num_segments {
            return Err(TrajectoryError::ConstraintCountMismatch {
                expected: num_segments,
                found: constraints.len(),
            });
        }

        let resolution = resolution.max(1);
        let samples = path.sample(resolution + 1);

        let (max_vels, max_accels) = samples
            .iter()
            .map(|s| {
                let c = if constraints.len() == 1 {
                    &constraints[0]
                } else {
                    &constraints[s.segment_index]
                };
                (c.max_velocity(&s.point), c.max_acceleration(&s.point))
            })
            .unzip();

        let length = path.length();
        let sampled = SampledMotionConstraints::new(
            0.0,
            length / resolution as f64,
            max_vels,
            max_accels,
        )?;

        let profile = generate_motion_profile(
            MotionState::new(0.0, 0.0, 0.0),
            MotionState::new(length, 0.0, 0.0),
            &sampled,
            resolution,
        )?;

        debug!(
            "Profiled path of length {:.4} in {:.4} s",
            length,
            profile.duration()
        );

        Ok(Self { path, profile })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    pub fn duration(&self) -> f64 {
        self.profile.duration()
    }

    pub fn get(&self, t: f64) -> Pose2d {
        self.path.get(self.profile.get(t).x)
    }

    pub fn velocity(&self, t: f64) -> Pose2d {
        let state = self.profile.get(t);
        self.path.deriv(state.x) * state.v
    }

    pub fn acceleration(&self, t: f64) -> Pose2d {
        let state = self.profile.get(t);
        let point = self.path.point(state.x);

        point.second_deriv * (state.v * state.v) + point.deriv * state.a
    }

    /// Time at which the segment reaches displacement `s` along its path.
    pub fn time_at_displacement(&self, s: f64) -> f64 {
        self.profile.time_at_position(s)
    }

    /// Displacement of the closest point on the path to `point`, with its
    /// distance.
    pub fn project(&self, point: Vector2d) -> (f64, f64) {
        let s = self.path.project(point);
        (s, (self.path.get(s).pos() - point).norm())
    }
}

impl PointTurn {
    /// Turn by `angle` radians, positive anticlockwise.
    ///
    /// Fails if the angular velocity limit is zero.
    pub fn new(
        start: Pose2d,
        angle: f64,
        constraints: &DriveConstraints,
    ) -> Result<Self, TrajectoryError> {
        let profile = generate_simple_motion_profile(
            MotionState::new(0.0, 0.0, 0.0),
            MotionState::new(angle, 0.0, 0.0),
            constraints.max_ang_vel,
            constraints.max_ang_accel,
        )?;

        Ok(Self { start, profile })
    }

    /// Turn the shortest way to `heading`.
    pub fn to_heading(
        start: Pose2d,
        heading: f64,
        constraints: &DriveConstraints,
    ) -> Result<Self, TrajectoryError> {
        Self::new(start, get_ang_dist(start.heading, heading), constraints)
    }

    /// Total signed turn angle.
    pub fn angle(&self) -> f64 {
        self.profile.end().x
    }

    pub fn duration(&self) -> f64 {
        self.profile.duration()
    }

    pub fn get(&self, t: f64) -> Pose2d {
        Pose2d::from_pos(
            self.start.pos(),
            norm_angle(self.start.heading + self.profile.get(t).x),
        )
    }

    pub fn velocity(&self, t: f64) -> Pose2d {
        Pose2d::new(0.0, 0.0, self.profile.get(t).v)
    }

    pub fn acceleration(&self, t: f64) -> Pose2d {
        Pose2d::new(0.0, 0.0, self.profile.get(t).a)
    }
}

impl WaitSegment {
    pub fn new(pose: Pose2d, duration: f64) -> Self {
        Self { pose, duration }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn get(&self, _t: f64) -> Pose2d {
        self.pose
    }

    pub fn velocity(&self, _t: f64) -> Pose2d {
        Pose2d::default()
    }

    pub fn acceleration(&self, _t: f64) -> Pose2d {
        Pose2d::default()
    }
}

impl TrajectorySegment {
    pub fn duration(&self) -> f64 {
        match self {
            TrajectorySegment::Path(s) => s.duration(),
            TrajectorySegment::Turn(s) => s.duration(),
            TrajectorySegment::Wait(s) => s.duration(),
        }
    }

    /// Pose at segment-local time `t`.
    pub fn get(&self, t: f64) -> Pose2d {
        match self {
            TrajectorySegment::Path(s) => s.get(t),
            TrajectorySegment::Turn(s) => s.get(t),
            TrajectorySegment::Wait(s) => s.get(t),
        }
    }

    /// Field frame velocity at segment-local time `t`.
    pub fn velocity(&self, t: f64) -> Pose2d {
        match self {
            TrajectorySegment::Path(s) => s.velocity(t),
            TrajectorySegment::Turn(s) => s.velocity(t),
            TrajectorySegment::Wait(s) => s.velocity(t),
        }
    }

    /// Field frame acceleration at segment-local time `t`.
    pub fn acceleration(&self, t: f64) -> Pose2d {
        match self {
            TrajectorySegment::Path(s) => s.acceleration(t),
            TrajectorySegment::Turn(s) => s.acceleration(t),
            TrajectorySegment::Wait(s) => s.acceleration(t),
        }
    }

    pub fn start(&self) -> Pose2d {
        self.get(0.0)
    }

    pub fn end(&self) -> Pose2d {
        self.get(self.duration())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
