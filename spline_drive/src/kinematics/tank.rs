//! Tank (differential) drive kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DMatrix;

use super::{apply_to_pose, apply_to_wheels, check_positive, pseudo_inverse, KinematicsError};
use crate::geometry::Pose2d;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of a drive with one left and one right wheel, in that order.
///
/// A tank drive cannot move sideways, so the lateral component of any robot
/// velocity is dropped by the wheels and comes back as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TankKinematics {
    track_width: f64,
    inverse: DMatrix<f64>,
    forward: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TankKinematics {
    pub fn new(track_width: f64) -> Result<Self, KinematicsError> {
        check_positive("track width", track_width)?;

        let half = track_width / 2.0;
        let inverse = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, -half,
            1.0, 0.0, half,
        ]);
        let forward = pseudo_inverse(&inverse, "tank")?;

        Ok(Self {
            track_width,
            inverse,
            forward,
        })
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    pub fn robot_to_wheel_velocities(&self, vel: &Pose2d) -> Vec<f64> {
        apply_to_pose(&self.inverse, vel)
    }

    pub fn wheel_to_robot_velocities(&self, wheel_vels: &[f64]) -> Result<Pose2d, KinematicsError> {
        apply_to_wheels(&self.forward, wheel_vels)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
