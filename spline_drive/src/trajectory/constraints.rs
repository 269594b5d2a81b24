//! Drive constraints
//!
//! Limits on how fast the robot may drive along a path or turn on the spot.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    geometry::{rotate, Pose2d},
    kinematics::DriveKinematics,
    path::PathPoint,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Curvatures and wheel speeds below this don't limit the velocity.
const MIN_LIMITING_VALUE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity and acceleration limits of a drivetrain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriveConstraints {
    /// Maximum robot speed along the path. With a kinematics model this is
    /// the maximum wheel speed instead.
    pub max_vel: f64,

    /// Maximum acceleration along the path
    pub max_accel: f64,

    /// Maximum turn rate during point turns
    pub max_ang_vel: f64,

    /// Maximum angular acceleration during point turns
    pub max_ang_accel: f64,

    /// Maximum centripetal acceleration, limiting speed through tight curves
    #[serde(default)]
    pub max_centripetal_accel: Option<f64>,

    /// Kinematics used to keep every wheel under `max_vel`
    #[serde(default)]
    pub kinematics: Option<DriveKinematics>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveConstraints {
    pub fn new(max_vel: f64, max_accel: f64, max_ang_vel: f64, max_ang_accel: f64) -> Self {
        Self {
            max_vel,
            max_accel,
            max_ang_vel,
            max_ang_accel,
            max_centripetal_accel: None,
            kinematics: None,
        }
    }

    pub fn with_centripetal_accel(mut self, max_centripetal_accel: f64) -> Self {
        self.max_centripetal_accel = Some(max_centripetal_accel);
        self
    }

    pub fn with_kinematics(mut self, kinematics: DriveKinematics) -> Self {
        self.kinematics = Some(kinematics);
        self
    }

    /// Maximum speed along the path at `point`.
    ///
    /// The lowest of the global limit, the centripetal limit and the speed
    /// at which the fastest wheel reaches the global limit.
    pub fn max_velocity(&self, point: &PathPoint) -> f64 {
        let mut max_vel = self.max_vel;

        if let Some(max_centripetal) = self.max_centripetal_accel {
            let curvature = path_curvature(point);
            if curvature > MIN_LIMITING_VALUE {
                max_vel = max_vel.min((max_centripetal / curvature).sqrt());
            }
        }

        if let Some(ref kinematics) = self.kinematics {
            // Wheel speeds per unit speed along the path
            let robot_deriv = Pose2d::from_pos(
                rotate(point.deriv.pos(), -point.pose.heading),
                point.deriv.heading,
            );
            let max_wheel = kinematics
                .robot_to_wheel_velocities(&robot_deriv)
                .iter()
                .fold(0f64, |m, w| m.max(w.abs()));

            if max_wheel > MIN_LIMITING_VALUE {
                max_vel = max_vel.min(self.max_vel / max_wheel);
            }
        }

        max_vel
    }

    /// Maximum acceleration along the path at `point`.
    pub fn max_acceleration(&self, _point: &PathPoint) -> f64 {
        self.max_accel
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Unsigned curvature of the path at `point`.
fn path_curvature(point: &PathPoint) -> f64 {
    let d = point.deriv.pos();
    let d2 = point.second_deriv.pos();
    let norm = d.norm();

    let curvature = (d.x * d2.y - d.y * d2.x).abs() / (norm * norm * norm);
    if curvature.is_finite() {
        curvature
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
