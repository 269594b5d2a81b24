//! # Trajectory module
//!
//! A trajectory is a sequence of segments (driven paths, point turns and
//! waits) laid end to end in time. It gives the target pose, velocity and
//! acceleration of the robot, in the field frame, at any time from zero to
//! its duration. Times outside that range clamp to the ends.
//!
//! Trajectories may carry markers, labelled times which the follower reports
//! as they are passed.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod builder;
mod config;
mod constraints;
mod segments;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use builder::TrajectoryBuilder;
pub use config::TrajectoryConfig;
pub use constraints::DriveConstraints;
pub use segments::{PathTrajectorySegment, PointTurn, TrajectorySegment, WaitSegment};

use crate::{
    geometry::{Pose2d, Vector2d},
    path::PathError,
    profile::ProfileError,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A complete trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    segments: Vec<TrajectorySegment>,

    /// Start time of each segment
    start_times: Vec<f64>,

    duration: f64,

    /// Markers in time order
    markers: Vec<TrajectoryMarker>,
}

/// A labelled point in time along a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryMarker {
    pub time: f64,
    pub label: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building a trajectory.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TrajectoryError {
    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("Invalid motion profile: {0}")]
    Profile(#[from] ProfileError),

    #[error("Expected 1 or {expected} sets of constraints, found {found}")]
    ConstraintCountMismatch { expected: usize, found: usize },

    #[error("Trajectory configuration has no poses")]
    EmptyConfig,

    #[error("Attempted to build a trajectory with no segments")]
    EmptyTrajectory,

    #[error("Wait duration must be nonnegative, found {0}")]
    NegativeWait(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    /// Create a trajectory from its segments.
    pub fn new(segments: Vec<TrajectorySegment>) -> Result<Self, TrajectoryError> {
        Self::with_markers(segments, Vec::new())
    }

    /// Create a trajectory carrying markers. Marker times are clamped into
    /// the trajectory.
    pub fn with_markers(
        segments: Vec<TrajectorySegment>,
        mut markers: Vec<TrajectoryMarker>,
    ) -> Result<Self, TrajectoryError> {
        if segments.is_empty() {
            return Err(TrajectoryError::EmptyTrajectory);
        }

        let mut start_times = Vec::with_capacity(segments.len());
        let mut duration = 0.0;
        for seg in segments.iter() {
            start_times.push(duration);
            duration += seg.duration();
        }

        for marker in markers.iter_mut() {
            marker.time = marker.time.max(0.0).min(duration);
        }
        markers.sort_by(|a, b| a.time.total_cmp(&b.time));

        Ok(Self {
            segments,
            start_times,
            duration,
            markers,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn segments(&self) -> &[TrajectorySegment] {
        &self.segments
    }

    pub fn markers(&self) -> &[TrajectoryMarker] {
        &self.markers
    }

    /// Markers with times in `(after, up_to]`.
    pub fn markers_between(&self, after: f64, up_to: f64) -> impl Iterator<Item = &TrajectoryMarker> {
        self.markers
            .iter()
            .filter(move |m| m.time > after && m.time <= up_to)
    }

    /// Find the segment active at time `t`, returning its index and the
    /// segment-local time.
    pub fn locate(&self, t: f64) -> (usize, f64) {
        let mut remaining = t.max(0.0).min(self.duration);

        for (i, seg) in self.segments.iter().enumerate() {
            if remaining <= seg.duration() {
                return (i, remaining);
            }
            remaining -= seg.duration();
        }

        let last = self.segments.len() - 1;
        (last, self.segments[last].duration())
    }

    /// Target pose at time `t`.
    pub fn get(&self, t: f64) -> Pose2d {
        let (i, local) = self.locate(t);
        self.segments[i].get(local)
    }

    /// Target field frame velocity at time `t`.
    pub fn velocity(&self, t: f64) -> Pose2d {
        let (i, local) = self.locate(t);
        self.segments[i].velocity(local)
    }

    /// Target field frame acceleration at time `t`.
    pub fn acceleration(&self, t: f64) -> Pose2d {
        let (i, local) = self.locate(t);
        self.segments[i].acceleration(local)
    }

    pub fn start(&self) -> Pose2d {
        self.get(0.0)
    }

    pub fn end(&self) -> Pose2d {
        self.get(self.duration)
    }

    /// Total length of the driven paths.
    pub fn path_length(&self) -> f64 {
        self.segments
            .iter()
            .filter_map(|s| match s {
                TrajectorySegment::Path(p) => Some(p.path().length()),
                _ => None,
            })
            .sum()
    }

    /// Time at which the robot has driven `displacement` along the
    /// trajectory's paths, clamped to the trajectory.
    pub fn time_at_displacement(&self, displacement: f64) -> f64 {
        let mut remaining = displacement.max(0.0);

        for (seg, start) in self.segments.iter().zip(self.start_times.iter()) {
            if let TrajectorySegment::Path(p) = seg {
                let length = p.path().length();
                if remaining <= length {
                    return start + p.time_at_displacement(remaining);
                }
                remaining -= length;
            }
        }

        self.duration
    }

    /// Time at which the robot passes closest to `point`, or zero if the
    /// trajectory drives no paths.
    pub fn time_at_point(&self, point: Vector2d) -> f64 {
        let mut best = (0.0, std::f64::INFINITY);

        for (seg, start) in self.segments.iter().zip(self.start_times.iter()) {
            if let TrajectorySegment::Path(p) = seg {
                let (s, dist) = p.project(point);
                if dist < best.1 {
                    best = (start + p.time_at_displacement(s), dist);
                }
            }
        }

        best.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
