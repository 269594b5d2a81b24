//! # Trajectory follower module
//!
//! The follower keeps the robot on a trajectory. Each cycle it samples the
//! target pose, velocity and acceleration at the time since the trajectory
//! started, and compares the target pose to the robot's current pose.
//!
//! Feedback is applied to the velocity demand:
//!
//! - Holonomic drives (mecanum, swerve) run a PID controller on each
//!   component of the field frame pose error, and rotate the correction into
//!   the robot frame.
//! - Tank drives cannot move sideways, so one controller corrects the error
//!   along the target heading by driving, and another corrects the cross
//!   track error by turning.
//!
//! The corrected velocity and the target acceleration are converted to wheel
//! values through the drive's kinematics, where the feedforward model gives
//! the motor powers.
//!
//! The trajectory is complete once its duration has passed and the error is
//! within the admissible error, or once the timeout has passed after that.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::{Params, PidCoefficients};
pub use state::*;
