//! # Follower controllers module
//!
//! This module provides the PID controllers used by the follower, along with
//! the error calculations and velocity corrections for each drivetrain type.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{Params, PidCoefficients};
use crate::{
    geometry::{rotate, Pose2d, Vector2d},
    kinematics::{calculate_pose_error, DriveKinematics},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Previous time that the error was passed in
    prev_time: Option<f64>,

    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

/// The follower's controllers
#[derive(Debug, Serialize, Clone)]
pub struct FollowerControllers {
    x_ctrl: PidController,
    y_ctrl: PidController,
    head_ctrl: PidController,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral: 0f64,
            prev_time: None,
            prev_error: None,
        }
    }

    pub fn from_coeffs(coeffs: &PidCoefficients) -> Self {
        Self::new(coeffs.k_p, coeffs.k_i, coeffs.k_d)
    }

    /// Get the value of the controller for the given error at `time`
    /// seconds.
    pub fn get(&mut self, error: f64, time: f64) -> f64 {
        // Only a positive step in time gives a usable dt
        let dt = match self.prev_time {
            Some(t0) if time > t0 => Some(time - t0),
            _ => None,
        };

        // Accumulate the integral term.
        //
        // Without a time difference the error is not accumulated, adding it
        // on would spike the integral compared to normal operation.
        self.integral += match dt {
            Some(t) => error * t,
            None => 0f64,
        };

        // Calculate the derivative, again zero without a time difference or
        // a previous error
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64,
        };

        // Calculate the output
        let out = self.k_p * error + self.k_i * self.integral + self.k_d * deriv;

        // Remember the previous error and time
        self.prev_error = Some(error);
        if dt.is_some() || self.prev_time.is_none() {
            self.prev_time = Some(time);
        }

        out
    }

    /// Forget the integral and previous error.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_time = None;
        self.prev_error = None;
    }
}

impl FollowerControllers {
    /// Create a new instance of the controllers from the parameters
    pub fn new(params: &Params) -> Self {
        Self {
            x_ctrl: PidController::from_coeffs(&params.x),
            y_ctrl: PidController::from_coeffs(&params.y),
            head_ctrl: PidController::from_coeffs(&params.heading),
        }
    }

    pub fn reset(&mut self) {
        self.x_ctrl.reset();
        self.y_ctrl.reset();
        self.head_ctrl.reset();
    }

    /// Get the corrected robot frame velocity demand.
    ///
    /// `target_robot_vel` is the trajectory's velocity in the frame of the
    /// target pose.
    pub fn get_velocity_dem(
        &mut self,
        kinematics: &DriveKinematics,
        target: &Pose2d,
        target_robot_vel: &Pose2d,
        current: &Pose2d,
        time: f64,
    ) -> Pose2d {
        if kinematics.is_holonomic() {
            self.holonomic_velocity_dem(target, target_robot_vel, current, time)
        } else {
            self.tank_velocity_dem(target, target_robot_vel, current, time)
        }
    }

    /// Correct each field axis independently, then rotate the correction into
    /// the robot frame.
    fn holonomic_velocity_dem(
        &mut self,
        target: &Pose2d,
        target_robot_vel: &Pose2d,
        current: &Pose2d,
        time: f64,
    ) -> Pose2d {
        let error = calculate_pose_error(target, current);

        let field_correction = Vector2d::new(
            self.x_ctrl.get(error.x, time),
            self.y_ctrl.get(error.y, time),
        );
        let head_correction = self.head_ctrl.get(error.heading, time);

        *target_robot_vel
            + Pose2d::from_pos(rotate(field_correction, -current.heading), head_correction)
    }

    /// Correct the error along the target heading by driving, and the cross
    /// track error by turning.
    fn tank_velocity_dem(
        &mut self,
        target: &Pose2d,
        target_robot_vel: &Pose2d,
        current: &Pose2d,
        time: f64,
    ) -> Pose2d {
        let error = rotate(target.pos() - current.pos(), -target.heading);

        let axial_correction = self.x_ctrl.get(error.x, time);

        // Turning towards the path only closes on it when driving forwards
        let direction = if target_robot_vel.x < 0.0 { -1f64 } else { 1f64 };
        let head_correction = direction * self.y_ctrl.get(error.y, time);

        *target_robot_vel + Pose2d::new(axial_correction, 0.0, head_correction)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
