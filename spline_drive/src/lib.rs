//! # Spline drive library.
//!
//! Trajectory generation and following for wheeled mobile robots. Paths are
//! built from arc-length parameterised curves, time-parameterised by a motion
//! profile that respects the drivetrain's limits, and tracked in closed loop
//! by a PID + feedforward follower.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry primitives - 2D vectors and poses
pub mod geometry;

/// Paths - arc-length parameterised curves with heading interpolation
pub mod path;

/// Motion profiles - 1D kinematic state sequences and their generators
pub mod profile;

/// Trajectories - time-parameterised paths, turns and waits
pub mod trajectory;

/// Kinematics - transforms between robot and wheel velocities
pub mod kinematics;

/// Drive - abstract drivetrain and wheel odometry
pub mod drive;

/// Trajectory follower - keeps the robot on the given trajectory
pub mod follower;

// ------------------------------------------------------------------------------------------------
// REEXPORTS
// ------------------------------------------------------------------------------------------------

pub use geometry::{Pose2d, Vector2d};
