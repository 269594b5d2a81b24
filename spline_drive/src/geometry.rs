//! Geometry primitives
//!
//! Positions are `nalgebra` 2D vectors, poses add a heading to a position.
//! Headings are in radians, measured anticlockwise from the field X axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::ops::{Add, Div, Mul, Neg, Sub};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::norm_angle;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A 2D vector
pub type Vector2d = Vector2<f64>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and heading in the plane.
///
/// The same type is used for pose derivatives (velocities, accelerations), in
/// which case the heading is a rate and is not normalised.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    pub x: f64,
    pub y: f64,

    #[serde(default)]
    pub heading: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Build a pose from a position and heading.
    pub fn from_pos(pos: Vector2d, heading: f64) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            heading,
        }
    }

    /// The position part of the pose.
    pub fn pos(&self) -> Vector2d {
        Vector2d::new(self.x, self.y)
    }

    /// Unit vector pointing along the heading.
    pub fn heading_vec(&self) -> Vector2d {
        Vector2d::new(self.heading.cos(), self.heading.sin())
    }

    /// The same pose with its heading normalised into (-pi, pi].
    pub fn normalized(&self) -> Self {
        Self {
            heading: norm_angle(self.heading),
            ..*self
        }
    }

    /// Rotate the position part of the pose about the origin, leaving the
    /// heading untouched.
    pub fn rotated(&self, angle: f64) -> Self {
        Self::from_pos(rotate(self.pos(), angle), self.heading)
    }

    pub fn epsilon_equals(&self, other: &Pose2d, eps: f64) -> bool {
        (self.x - other.x).abs() < eps
            && (self.y - other.y).abs() < eps
            && (self.heading - other.heading).abs() < eps
    }
}

impl Add for Pose2d {
    type Output = Pose2d;

    fn add(self, rhs: Pose2d) -> Pose2d {
        Pose2d::new(self.x + rhs.x, self.y + rhs.y, self.heading + rhs.heading)
    }
}

impl Sub for Pose2d {
    type Output = Pose2d;

    fn sub(self, rhs: Pose2d) -> Pose2d {
        Pose2d::new(self.x - rhs.x, self.y - rhs.y, self.heading - rhs.heading)
    }
}

impl Mul<f64> for Pose2d {
    type Output = Pose2d;

    fn mul(self, rhs: f64) -> Pose2d {
        Pose2d::new(self.x * rhs, self.y * rhs, self.heading * rhs)
    }
}

impl Div<f64> for Pose2d {
    type Output = Pose2d;

    fn div(self, rhs: f64) -> Pose2d {
        Pose2d::new(self.x / rhs, self.y / rhs, self.heading / rhs)
    }
}

impl Neg for Pose2d {
    type Output = Pose2d;

    fn neg(self) -> Pose2d {
        Pose2d::new(-self.x, -self.y, -self.heading)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Rotate a vector anticlockwise by `angle`.
pub fn rotate(vec: Vector2d, angle: f64) -> Vector2d {
    Rotation2::new(angle) * vec
}

/// Replace NaN components with zero.
pub(crate) fn nan_to_zero(vec: Vector2d) -> Vector2d {
    vec.map(|c| if c.is_nan() { 0.0 } else { c })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
