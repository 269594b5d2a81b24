//! Swerve drive kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DMatrix;

use super::{apply_to_wheels, check_positive, pseudo_inverse, KinematicsError};
use crate::geometry::{Pose2d, Vector2d};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Module speeds below this have no meaningful direction.
const MIN_MODULE_SPEED: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematics of a four module swerve drive.
///
/// Modules are ordered front left, rear left, rear right, front right. Wheel
/// velocities are module speeds, always nonnegative, with the direction
/// carried by the module orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct SwerveKinematics {
    track_width: f64,
    wheel_base: f64,

    /// Module positions in the robot frame
    positions: [Vector2d; 4],

    /// Maps the stacked module velocity vectors to robot velocity
    forward: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveKinematics {
    pub fn new(track_width: f64, wheel_base: f64) -> Result<Self, KinematicsError> {
        check_positive("track width", track_width)?;
        check_positive("wheel base", wheel_base)?;

        let (x, y) = (wheel_base / 2.0, track_width / 2.0);
        let positions = [
            Vector2d::new(x, y),
            Vector2d::new(-x, y),
            Vector2d::new(-x, -y),
            Vector2d::new(x, -y),
        ];

        // Each module contributes two rows, one per velocity component
        let mut inverse = DMatrix::zeros(8, 3);
        for (i, p) in positions.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -p.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = p.x;
        }
        let forward = pseudo_inverse(&inverse, "swerve")?;

        Ok(Self {
            track_width,
            wheel_base,
            positions,
            forward,
        })
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    pub fn wheel_base(&self) -> f64 {
        self.wheel_base
    }

    /// Velocity vector of each module for a robot frame velocity.
    fn module_vectors(&self, vel: &Pose2d) -> Vec<Vector2d> {
        self.positions
            .iter()
            .map(|p| Vector2d::new(vel.x - vel.heading * p.y, vel.y + vel.heading * p.x))
            .collect()
    }

    pub fn robot_to_wheel_velocities(&self, vel: &Pose2d) -> Vec<f64> {
        self.module_vectors(vel).iter().map(|v| v.norm()).collect()
    }

    pub fn robot_to_module_orientations(&self, vel: &Pose2d) -> Vec<f64> {
        self.module_vectors(vel)
            .iter()
            .map(|v| v.y.atan2(v.x))
            .collect()
    }

    /// Wheel accelerations, the component of each module's acceleration
    /// along the direction it is driving.
    ///
    /// A stationary module takes the full magnitude of its acceleration.
    pub fn robot_to_wheel_accelerations(&self, vel: &Pose2d, accel: &Pose2d) -> Vec<f64> {
        self.module_vectors(vel)
            .iter()
            .zip(self.module_vectors(accel).iter())
            .map(|(v, a)| {
                let speed = v.norm();
                if speed < MIN_MODULE_SPEED {
                    a.norm()
                } else {
                    a.dot(v) / speed
                }
            })
            .collect()
    }

    pub fn wheel_to_robot_velocities(
        &self,
        wheel_vels: &[f64],
        module_orientations: &[f64],
    ) -> Result<Pose2d, KinematicsError> {
        if module_orientations.len() != wheel_vels.len() {
            return Err(KinematicsError::WheelCountMismatch {
                expected: wheel_vels.len(),
                found: module_orientations.len(),
            });
        }

        let stacked: Vec<f64> = wheel_vels
            .iter()
            .zip(module_orientations.iter())
            .flat_map(|(v, o)| vec![v * o.cos(), v * o.sin()])
            .collect();

        apply_to_wheels(&self.forward, &stacked)
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
    fn test_swerve_round_trip() {
        let k = SwerveKinematics::new(10.0, 5.0).unwrap();

        let vel = Pose2d::new(2.0, -1.25, -PI / 4.0);
        let wheels = k.robot_to_wheel_velocities(&vel);
        let orientations = k.robot_to_module_orientations(&vel);
        let round_trip = k.wheel_to_robot_velocities(&wheels, &orientations).unwrap();
        assert!(round_trip.epsilon_equals(&vel, 1e-9));

        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let vel = Pose2d::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            );
            let wheels = k.robot_to_wheel_velocities(&vel);
            let orientations = k.robot_to_module_orientations(&vel);
            let round_trip = k.wheel_to_robot_velocities(&wheels, &orientations).unwrap();

            assert!(round_trip.epsilon_equals(&vel, 1e-9));
        }
    }

    #[test]
    fn test_swerve_orientations() {
        let k = SwerveKinematics::new(10.0, 10.0).unwrap();

        // Pure rotation points every module tangent to the circle
        let orientations = k.robot_to_module_orientations(&Pose2d::new(0.0, 0.0, 1.0));
        let expected = [3.0 * PI / 4.0, -3.0 * PI / 4.0, -PI / 4.0, PI / 4.0];
        for (o, e) in orientations.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-12);
        }

        // Straight ahead keeps every module straight
        let orientations = k.robot_to_module_orientations(&Pose2d::new(1.0, 0.0, 0.0));
        assert!(orientations.iter().all(|o| o.abs() < 1e-12));
    }

    #[test]
    fn test_swerve_accelerations() {
        let k = SwerveKinematics::new(10.0, 10.0).unwrap();

        // Speeding up in a straight line
        let accels = k.robot_to_wheel_accelerations(
            &Pose2d::new(1.0, 0.0, 0.0),
            &Pose2d::new(2.0, 0.0, 0.0),
        );
        assert!(accels.iter().all(|a| (a - 2.0).abs() < 1e-12));

        // Braking gives negative wheel accelerations
        let accels = k.robot_to_wheel_accelerations(
            &Pose2d::new(0.0, 1.0, 0.0),
            &Pose2d::new(0.0, -3.0, 0.0),
        );
        assert!(accels.iter().all(|a| (a + 3.0).abs() < 1e-12));

        // Starting from rest
        let accels = k.robot_to_wheel_accelerations(
            &Pose2d::new(0.0, 0.0, 0.0),
            &Pose2d::new(3.0, 4.0, 0.0),
        );
        assert!(accels.iter().all(|a| (a - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_orientation_count_mismatch() {
        let k = SwerveKinematics::new(10.0, 10.0).unwrap();

        assert_eq!(
            k.wheel_to_robot_velocities(&[1.0; 4], &[0.0; 3]),
            Err(KinematicsError::WheelCountMismatch {
                expected: 4,
                found: 3
            })
        );
    }
}
