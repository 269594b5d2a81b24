//! Trajectory configuration
//!
//! A trajectory described as a list of poses to pass through plus the
//! constraints to drive them under, as loaded from a parameter file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{DriveConstraints, Trajectory, TrajectoryBuilder, TrajectoryError};
use crate::{geometry::Pose2d, profile::DEFAULT_RESOLUTION};
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance on heading change and direction alignment under which a pair of
/// poses is joined by a line rather than a spline.
const LINE_TOLERANCE: f64 = 1e-2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrajectoryConfig {
    /// Poses to drive through, starting at the first
    pub poses: Vec<Pose2d>,

    pub constraints: DriveConstraints,

    #[serde(default = "default_resolution")]
    pub resolution: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajectoryConfig {
    /// Build a trajectory driving through every pose.
    ///
    /// Poses are joined by lines where the heading doesn't change and points
    /// along the direction of travel, and by splines elsewhere. Segments
    /// where the motion opposes the end heading are driven in reverse, with a
    /// stop wherever the direction of travel changes.
    pub fn to_trajectory(&self) -> Result<Trajectory, TrajectoryError> {
        let start = match self.poses.first() {
            Some(p) => *p,
            None => return Err(TrajectoryError::EmptyConfig),
        };

        let mut builder = TrajectoryBuilder::new(start, self.constraints.clone())
            .with_resolution(self.resolution)
            .begin_composite();

        let mut reversed = false;

        for pair in self.poses.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let diff = to.pos() - from.pos();
            let cos = to.heading_vec().dot(&diff) / diff.norm();

            // Changing direction means stopping first
            if (cos < 0.0) != reversed {
                reversed = !reversed;
                builder = builder
                    .close_composite()
                    .set_reversed(reversed)
                    .begin_composite();
            }

            let turn = get_ang_dist(from.heading, to.heading).abs();
            builder = if turn < LINE_TOLERANCE && (1.0 - cos.abs()).abs() < LINE_TOLERANCE {
                builder.line_to(to.pos())
            } else {
                builder.spline_to(to)
            };
        }

        builder.build()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_resolution() -> usize {
    DEFAULT_RESOLUTION
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
