//! Mecanum drive kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DMatrix;

use super::{apply_to_pose, apply_to_wheels, check_positive, pseudo_inverse, KinematicsError};
use crate::geometry::Pose2d;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of a four wheel mecanum drive.
///
/// Wheels are ordered front left, rear left, rear right, front right.
#[derive(Debug, Clone, PartialEq)]
pub struct MecanumKinematics {
    track_width: f64,
    wheel_base: f64,
    inverse: DMatrix<f64>,
    forward: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MecanumKinematics {
    pub fn new(track_width: f64, wheel_base: f64) -> Result<Self, KinematicsError> {
        check_positive("track width", track_width)?;
        check_positive("wheel base", wheel_base)?;

        let k = (track_width + wheel_base) / 2.0;
        let inverse = DMatrix::from_row_slice(4, 3, &[
            1.0, -1.0, -k,
            1.0, 1.0, -k,
            1.0, -1.0, k,
            1.0, 1.0, k,
        ]);
        let forward = pseudo_inverse(&inverse, "mecanum")?;

        Ok(Self {
            track_width,
            wheel_base,
            inverse,
            forward,
        })
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
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

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;
    use std::f64::consts::PI;

    #[test]
    fn test_mecanum_forward_matrix() {
        let k = MecanumKinematics::new(10.0, 5.0).unwrap();
        let kk = 7.5;

        // The forward matrix is the familiar quarter-sum form
        let expected = DMatrix::from_row_slice(3, 4, &[
            0.25, 0.25, 0.25, 0.25,
            -0.25, 0.25, -0.25, 0.25,
            -0.25 / kk, -0.25 / kk, 0.25 / kk, 0.25 / kk,
        ]);

        for (a, b) in k.forward.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mecanum_round_trip() {
        let k = MecanumKinematics::new(10.0, 5.0).unwrap();

        let vel = Pose2d::new(2.0, 1.0, -PI / 4.0);
        let wheels = k.robot_to_wheel_velocities(&vel);
        assert!(k.wheel_to_robot_velocities(&wheels).unwrap().epsilon_equals(&vel, 1e-9));

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let vel = Pose2d::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            );
            let wheels = k.robot_to_wheel_velocities(&vel);
            let round_trip = k.wheel_to_robot_velocities(&wheels).unwrap();

            assert!(round_trip.epsilon_equals(&vel, 1e-9));
        }
    }

    #[test]
    fn test_mecanum_strafe() {
        let k = MecanumKinematics::new(10.0, 10.0).unwrap();
        let wheels = k.robot_to_wheel_velocities(&Pose2d::new(0.0, 1.0, 0.0));

        assert_eq!(wheels, vec![-1.0, 1.0, -1.0, 1.0]);
    }
}
