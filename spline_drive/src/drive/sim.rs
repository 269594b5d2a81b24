//! Simulated drivetrain
//!
//! An ideal drivetrain for testing followers without hardware. Each wheel
//! instantly reaches the velocity its motor power asks for under the
//! follower's feedforward model, and modules steer instantly.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;

use super::Drive;
use crate::{
    geometry::Pose2d,
    kinematics::{relative_odometry_update, DriveKinematics},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimDrive {
    kinematics: DriveKinematics,

    /// Velocity gain, power per unit wheel velocity
    k_v: f64,

    /// Power needed to overcome friction
    k_static: f64,

    /// True pose of the robot
    pose: Pose2d,

    wheel_positions: Vec<f64>,
    module_orientations: Vec<f64>,
    motor_powers: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimDrive {
    pub fn new(kinematics: DriveKinematics, k_v: f64, k_static: f64, pose: Pose2d) -> Self {
        let num_wheels = kinematics.num_wheels();
        let num_modules = kinematics.module_orientations(&Pose2d::default()).len();

        Self {
            kinematics,
            k_v,
            k_static,
            pose,
            wheel_positions: vec![0.0; num_wheels],
            module_orientations: vec![0.0; num_modules],
            motor_powers: vec![0.0; num_wheels],
        }
    }

    /// The true pose of the robot.
    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    pub fn motor_powers(&self) -> &[f64] {
        &self.motor_powers
    }

    /// Velocity of each wheel under the current motor powers.
    pub fn wheel_velocities(&self) -> Vec<f64> {
        self.motor_powers
            .iter()
            .map(|p| {
                if p.abs() <= self.k_static {
                    0.0
                } else {
                    (p - p.signum() * self.k_static) / self.k_v
                }
            })
            .collect()
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let wheel_vels = self.wheel_velocities();

        let robot_vel = match self
            .kinematics
            .wheel_to_robot_velocities(&wheel_vels, &self.module_orientations)
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Simulated drive could not move: {}", e);
                return;
            }
        };

        for (pos, vel) in self.wheel_positions.iter_mut().zip(wheel_vels.iter()) {
            *pos += vel * dt;
        }
        self.pose = relative_odometry_update(&self.pose, &(robot_vel * dt));
    }
}

impl Drive for SimDrive {
    fn kinematics(&self) -> &DriveKinematics {
        &self.kinematics
    }

    fn wheel_positions(&self) -> Vec<f64> {
        self.wheel_positions.clone()
    }

    fn module_orientations(&self) -> Vec<f64> {
        self.module_orientations.clone()
    }

    fn set_motor_powers(&mut self, powers: &[f64]) {
        if powers.len() != self.motor_powers.len() {
            warn!(
                "Expected {} motor powers, found {}",
                self.motor_powers.len(),
                powers.len()
            );
            return;
        }
        self.motor_powers.copy_from_slice(powers);
    }

    fn set_module_orientations(&mut self, orientations: &[f64]) {
        if orientations.len() == self.module_orientations.len() {
            self.module_orientations.copy_from_slice(orientations);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive::{Localizer, WheelLocalizer};
    use crate::kinematics::{SwerveKinematics, TankKinematics};
    use std::f64::consts::PI;

    #[test]
    fn test_powers_to_wheels() {
        let kinematics = DriveKinematics::Tank(TankKinematics::new(2.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.5, 0.1, Pose2d::default());

        drive.set_motor_powers(&[0.6, -0.05]);
        assert_eq!(drive.wheel_velocities(), vec![1.0, 0.0]);

        // Wrong counts are ignored
        drive.set_motor_powers(&[1.0; 3]);
        assert_eq!(drive.motor_powers(), &[0.6, -0.05]);
    }

    #[test]
    fn test_localizer_tracks_sim() {
        let kinematics = DriveKinematics::Swerve(SwerveKinematics::new(1.0, 1.0).unwrap());
        let start = Pose2d::new(1.0, 2.0, PI / 4.0);
        let mut drive = SimDrive::new(kinematics.clone(), 1.0, 0.0, start);
        let mut loc = WheelLocalizer::new(start);
        loc.update(&drive);

        let vel = Pose2d::new(0.5, 0.3, 0.2);
        drive.set_module_orientations(&kinematics.module_orientations(&vel));
        drive.set_motor_powers(&kinematics.robot_to_wheel_velocities(&vel));

        for _ in 0..100 {
            drive.step(0.01);
            loc.update(&drive);
        }

        // Odometry is exact for constant velocities
        assert!(loc.pose_estimate().epsilon_equals(&drive.pose(), 1e-9));
        assert!((drive.pose().heading - (PI / 4.0 + 0.2)).abs() < 1e-9);
    }
}
