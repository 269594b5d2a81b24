//! # Drive module
//!
//! The follower talks to the robot's drivetrain through the `Drive` trait,
//! which reads wheel positions and writes motor powers once per control
//! cycle. Pose estimates come from a `Localizer`, and `WheelLocalizer`
//! provides one from wheel odometry for any kinematics model.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
pub use sim::SimDrive;

use crate::{
    geometry::Pose2d,
    kinematics::{relative_odometry_update, DriveKinematics},
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A drivetrain.
pub trait Drive {
    /// Kinematics of the drivetrain, fixing the number and order of its
    /// wheels.
    fn kinematics(&self) -> &DriveKinematics;

    /// Distance travelled by each wheel since some fixed point.
    fn wheel_positions(&self) -> Vec<f64>;

    /// Orientation of each steerable module, empty if the drivetrain has
    /// none.
    fn module_orientations(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Set the power of each drive motor, in the wheel order of the
    /// kinematics.
    fn set_motor_powers(&mut self, powers: &[f64]);

    /// Steer each module. Ignored by drivetrains without steerable modules.
    fn set_module_orientations(&mut self, _orientations: &[f64]) {}
}

/// An estimator of the robot's pose in the field frame.
pub trait Localizer {
    fn pose_estimate(&self) -> Pose2d;

    fn set_pose_estimate(&mut self, pose: Pose2d);

    /// Update the estimate from the latest drivetrain readings.
    fn update(&mut self, drive: &dyn Drive);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pose estimation from wheel odometry.
#[derive(Debug, Clone, Default)]
pub struct WheelLocalizer {
    pose: Pose2d,

    /// Wheel positions at the last update, none before the first
    last_positions: Option<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelLocalizer {
    pub fn new(pose: Pose2d) -> Self {
        Self {
            pose,
            last_positions: None,
        }
    }
}

impl Localizer for WheelLocalizer {
    fn pose_estimate(&self) -> Pose2d {
        self.pose
    }

    /// Set the pose. Wheel motion before the next update is not counted.
    fn set_pose_estimate(&mut self, pose: Pose2d) {
        self.pose = pose;
        self.last_positions = None;
    }

    fn update(&mut self, drive: &dyn Drive) {
        let positions = drive.wheel_positions();

        if let Some(ref last) = self.last_positions {
            if last.len() != positions.len() {
                warn!(
                    "Wheel count changed from {} to {}, skipping odometry update",
                    last.len(),
                    positions.len()
                );
            } else {
                let deltas: Vec<f64> = positions
                    .iter()
                    .zip(last.iter())
                    .map(|(p, l)| p - l)
                    .collect();

                // Over one update the wheel deltas relate to the robot
                // displacement as velocities do
                match drive
                    .kinematics()
                    .wheel_to_robot_velocities(&deltas, &drive.module_orientations())
                {
                    Ok(robot_delta) => {
                        self.pose = relative_odometry_update(&self.pose, &robot_delta);
                    }
                    Err(e) => warn!("Could not compute odometry update: {}", e),
                }
            }
        }

        self.last_positions = Some(positions);
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::kinematics::{MecanumKinematics, TankKinematics};
    use std::f64::consts::PI;

    struct TestDrive {
        kinematics: DriveKinematics,
        positions: Vec<f64>,
    }

    impl Drive for TestDrive {
        fn kinematics(&self) -> &DriveKinematics {
            &self.kinematics
        }

        fn wheel_positions(&self) -> Vec<f64> {
            self.positions.clone()
        }

        fn set_motor_powers(&mut self, _powers: &[f64]) {}
    }

    #[test]
    fn test_tank_odometry() {
        let mut drive = TestDrive {
            kinematics: DriveKinematics::Tank(TankKinematics::new(2.0).unwrap()),
            positions: vec![0.0, 0.0],
        };
        let mut loc = WheelLocalizer::new(Pose2d::new(1.0, 1.0, 0.0));

        // The first update only records the wheel positions
        loc.update(&drive);
        assert_eq!(loc.pose_estimate(), Pose2d::new(1.0, 1.0, 0.0));

        // Straight ahead
        drive.positions = vec![3.0, 3.0];
        loc.update(&drive);
        assert!(loc.pose_estimate().epsilon_equals(&Pose2d::new(4.0, 1.0, 0.0), 1e-12));

        // Quarter turn on the spot, wheels at radius 1
        drive.positions = vec![3.0 - PI / 2.0, 3.0 + PI / 2.0];
        loc.update(&drive);
        assert!(loc.pose_estimate().epsilon_equals(&Pose2d::new(4.0, 1.0, PI / 2.0), 1e-12));

        // Moving wheels after a reset isn't counted
        loc.set_pose_estimate(Pose2d::default());
        drive.positions = vec![10.0, 10.0];
        loc.update(&drive);
        assert_eq!(loc.pose_estimate(), Pose2d::default());
    }

    #[test]
    fn test_mecanum_odometry() {
        let mut drive = TestDrive {
            kinematics: DriveKinematics::Mecanum(MecanumKinematics::new(1.0, 1.0).unwrap()),
            positions: vec![0.0; 4],
        };
        let mut loc = WheelLocalizer::new(Pose2d::new(0.0, 0.0, PI / 2.0));
        loc.update(&drive);

        // Strafing left while facing +Y moves along -X
        drive.positions = vec![-2.0, 2.0, -2.0, 2.0];
        loc.update(&drive);
        assert!(loc.pose_estimate().epsilon_equals(&Pose2d::new(-2.0, 0.0, PI / 2.0), 1e-9));

        // A wheel going missing is skipped
        drive.positions = vec![0.0; 3];
        loc.update(&drive);
        assert!(loc.pose_estimate().epsilon_equals(&Pose2d::new(-2.0, 0.0, PI / 2.0), 1e-9));
    }
}
