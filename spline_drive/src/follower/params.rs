//! Trajectory follower parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::geometry::Pose2d;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a PID controller
#[derive(Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct PidCoefficients {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    #[serde(default)]
    pub k_i: f64,

    /// Derivative gain
    #[serde(default)]
    pub k_d: f64,
}

/// Parameters for the trajectory follower
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Params {
    /// X controller gains.
    ///
    /// Holonomic drives control the field X error. Tank drives control the
    /// error along the target's heading.
    pub x: PidCoefficients,

    /// Y controller gains.
    ///
    /// Holonomic drives control the field Y error. Tank drives correct the
    /// cross track error by turning.
    pub y: PidCoefficients,

    /// Heading controller gains, used by holonomic drives only
    pub heading: PidCoefficients,

    /// Feedforward velocity gain, power per unit wheel velocity
    pub k_v: f64,

    /// Feedforward acceleration gain, power per unit wheel acceleration
    pub k_a: f64,

    /// Power added in the direction of motion to overcome static friction
    pub k_static: f64,

    /// The absolute pose error under which the trajectory is complete once
    /// its duration has passed
    pub admissible_error: Pose2d,

    /// Time allowed after the trajectory's duration for the error to become
    /// admissible
    pub timeout_s: f64,
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
