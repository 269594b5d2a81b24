//! # Kinematics module
//!
//! Transforms between the robot's body velocity and the velocities of its
//! wheels for the supported drivetrains, along with the frame transforms and
//! odometry update shared by the followers and localisers.
//!
//! ## Conventions
//!
//! Robot frame velocities are `Pose2d`s with X forward, Y to the left and the
//! heading component the anticlockwise turn rate. Each model is described by
//! an inverse kinematics matrix mapping robot velocity to wheel velocity. The
//! forward kinematics are the pseudo-inverse of that matrix, so that a robot
//! velocity survives the round trip through the wheels unchanged.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod mecanum;
mod swerve;
mod tank;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::TryFrom;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

// Internal
pub use mecanum::MecanumKinematics;
pub use swerve::SwerveKinematics;
pub use tank::TankKinematics;

use crate::geometry::{rotate, Pose2d, Vector2d};
use util::maths::{get_ang_dist, norm_angle};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Heading changes below this use the series expansion in the odometry
/// update.
const ODOMETRY_SERIES_THRESHOLD: f64 = 1e-6;

/// Singular values below this are treated as zero by the pseudo-inverse.
const PSEUDO_INVERSE_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the kinematics models.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum KinematicsError {
    #[error("Invalid drivetrain geometry, {0} must be positive (got {1})")]
    InvalidGeometry(&'static str, f64),

    #[error("The {0} kinematics matrix has no pseudo-inverse")]
    SingularMatrix(&'static str),

    #[error("Expected {expected} wheel values but found {found}")]
    WheelCountMismatch { expected: usize, found: usize },
}

/// Drivetrain geometry as given in parameter files.
///
/// The wheel base defaults to the track width when not given.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KinematicsParams {
    Tank {
        track_width: f64,
    },
    Mecanum {
        track_width: f64,
        #[serde(default)]
        wheel_base: Option<f64>,
    },
    Swerve {
        track_width: f64,
        #[serde(default)]
        wheel_base: Option<f64>,
    },
}

/// A drivetrain kinematics model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "KinematicsParams")]
pub enum DriveKinematics {
    Tank(TankKinematics),
    Mecanum(MecanumKinematics),
    Swerve(SwerveKinematics),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TryFrom<KinematicsParams> for DriveKinematics {
    type Error = KinematicsError;

    fn try_from(params: KinematicsParams) -> Result<Self, Self::Error> {
        match params {
            KinematicsParams::Tank { track_width } => {
                Ok(DriveKinematics::Tank(TankKinematics::new(track_width)?))
            }
            KinematicsParams::Mecanum {
                track_width,
                wheel_base,
            } => Ok(DriveKinematics::Mecanum(MecanumKinematics::new(
                track_width,
                wheel_base.unwrap_or(track_width),
            )?)),
            KinematicsParams::Swerve {
                track_width,
                wheel_base,
            } => Ok(DriveKinematics::Swerve(SwerveKinematics::new(
                track_width,
                wheel_base.unwrap_or(track_width),
            )?)),
        }
    }
}

impl DriveKinematics {
    /// Build a model from its parameters.
    pub fn new(params: KinematicsParams) -> Result<Self, KinematicsError> {
        Self::try_from(params)
    }

    /// Number of driven wheels.
    pub fn num_wheels(&self) -> usize {
        match self {
            DriveKinematics::Tank(_) => 2,
            DriveKinematics::Mecanum(_) | DriveKinematics::Swerve(_) => 4,
        }
    }

    /// Whether the drivetrain can move sideways.
    pub fn is_holonomic(&self) -> bool {
        !matches!(self, DriveKinematics::Tank(_))
    }

    /// Wheel velocities for a robot frame velocity.
    pub fn robot_to_wheel_velocities(&self, vel: &Pose2d) -> Vec<f64> {
        match self {
            DriveKinematics::Tank(k) => k.robot_to_wheel_velocities(vel),
            DriveKinematics::Mecanum(k) => k.robot_to_wheel_velocities(vel),
            DriveKinematics::Swerve(k) => k.robot_to_wheel_velocities(vel),
        }
    }

    /// Wheel accelerations for a robot frame velocity and acceleration.
    ///
    /// Only swerve depends on the velocity, which sets the direction each
    /// module is pointing.
    pub fn robot_to_wheel_accelerations(&self, vel: &Pose2d, accel: &Pose2d) -> Vec<f64> {
        match self {
            DriveKinematics::Tank(k) => k.robot_to_wheel_velocities(accel),
            DriveKinematics::Mecanum(k) => k.robot_to_wheel_velocities(accel),
            DriveKinematics::Swerve(k) => k.robot_to_wheel_accelerations(vel, accel),
        }
    }

    /// Robot frame velocity from wheel velocities.
    ///
    /// `module_orientations` is only read for swerve drives.
    pub fn wheel_to_robot_velocities(
        &self,
        wheel_vels: &[f64],
        module_orientations: &[f64],
    ) -> Result<Pose2d, KinematicsError> {
        match self {
            DriveKinematics::Tank(k) => k.wheel_to_robot_velocities(wheel_vels),
            DriveKinematics::Mecanum(k) => k.wheel_to_robot_velocities(wheel_vels),
            DriveKinematics::Swerve(k) => {
                k.wheel_to_robot_velocities(wheel_vels, module_orientations)
            }
        }
    }

    /// Module orientations for a robot frame velocity. Empty for drivetrains
    /// without steerable modules.
    pub fn module_orientations(&self, vel: &Pose2d) -> Vec<f64> {
        match self {
            DriveKinematics::Swerve(k) => k.robot_to_module_orientations(vel),
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Rotate a field frame velocity into the frame of a robot at `pose`.
pub fn field_to_robot_velocity(pose: &Pose2d, field_vel: &Pose2d) -> Pose2d {
    Pose2d::from_pos(rotate(field_vel.pos(), -pose.heading), field_vel.heading)
}

/// Rotate a field frame acceleration into the frame of a robot at `pose`.
///
/// The robot frame rotates with the robot, which adds a term proportional to
/// the turn rate.
pub fn field_to_robot_acceleration(
    pose: &Pose2d,
    field_vel: &Pose2d,
    field_accel: &Pose2d,
) -> Pose2d {
    let (sin, cos) = pose.heading.sin_cos();
    let rotating = Vector2d::new(
        -field_vel.x * sin + field_vel.y * cos,
        -field_vel.x * cos - field_vel.y * sin,
    ) * field_vel.heading;

    Pose2d::from_pos(
        rotate(field_accel.pos(), -pose.heading) + rotating,
        field_accel.heading,
    )
}

/// Field frame error from `current` to `target`, with the heading error the
/// shortest signed angle.
pub fn calculate_pose_error(target: &Pose2d, current: &Pose2d) -> Pose2d {
    Pose2d::new(
        target.x - current.x,
        target.y - current.y,
        get_ang_dist(current.heading, target.heading),
    )
}

/// Apply a robot frame pose change to a field frame pose.
///
/// The change is assumed to happen at constant velocity and turn rate, so the
/// robot moves along a circular arc.
pub fn relative_odometry_update(field_pose: &Pose2d, robot_delta: &Pose2d) -> Pose2d {
    let dtheta = robot_delta.heading;

    let (sine_term, cos_term) = if dtheta.abs() < ODOMETRY_SERIES_THRESHOLD {
        (1.0 - dtheta * dtheta / 6.0, dtheta / 2.0)
    } else {
        (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
    };

    let robot_pos_delta = Vector2d::new(
        sine_term * robot_delta.x - cos_term * robot_delta.y,
        cos_term * robot_delta.x + sine_term * robot_delta.y,
    );
    let field_pos_delta = rotate(robot_pos_delta, field_pose.heading);

    Pose2d::from_pos(
        field_pose.pos() + field_pos_delta,
        norm_angle(field_pose.heading + dtheta),
    )
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Moore-Penrose pseudo-inverse, through the SVD.
///
/// Rank deficient matrices are accepted. The tank matrix has no lateral
/// column, so its forward kinematics map every wheel set to zero lateral
/// velocity.
pub(crate) fn pseudo_inverse(
    mat: &DMatrix<f64>,
    name: &'static str,
) -> Result<DMatrix<f64>, KinematicsError> {
    mat.clone()
        .pseudo_inverse(PSEUDO_INVERSE_EPS)
        .map_err(|_| KinematicsError::SingularMatrix(name))
}

/// Multiply a robot velocity by a matrix with three columns.
pub(crate) fn apply_to_pose(mat: &DMatrix<f64>, pose: &Pose2d) -> Vec<f64> {
    let out = mat * DVector::from_column_slice(&[pose.x, pose.y, pose.heading]);
    out.iter().copied().collect()
}

/// Multiply wheel values by a matrix with three rows.
pub(crate) fn apply_to_wheels(
    mat: &DMatrix<f64>,
    wheels: &[f64],
) -> Result<Pose2d, KinematicsError> {
    if wheels.len() != mat.ncols() {
        return Err(KinematicsError::WheelCountMismatch {
            expected: mat.ncols(),
            found: wheels.len(),
        });
    }

    let out = mat * DVector::from_column_slice(wheels);
    Ok(Pose2d::new(out[0], out[1], out[2]))
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), KinematicsError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(KinematicsError::InvalidGeometry(name, value))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_params() {
        let tank: DriveKinematics =
            util::params::parse("type = \"tank\"\ntrack_width = 10.0").unwrap();
        assert_eq!(tank, DriveKinematics::Tank(TankKinematics::new(10.0).unwrap()));
        assert!(!tank.is_holonomic());

        let mecanum = DriveKinematics::new(KinematicsParams::Mecanum {
            track_width: 10.0,
            wheel_base: None,
        })
        .unwrap();
        assert_eq!(
            mecanum,
            DriveKinematics::Mecanum(MecanumKinematics::new(10.0, 10.0).unwrap())
        );
        assert!(mecanum.is_holonomic());
        assert_eq!(mecanum.num_wheels(), 4);

        assert_eq!(
            DriveKinematics::new(KinematicsParams::Tank { track_width: -1.0 }),
            Err(KinematicsError::InvalidGeometry("track width", -1.0))
        );
    }

    #[test]
    fn test_wheel_count_mismatch() {
        let tank = DriveKinematics::new(KinematicsParams::Tank { track_width: 10.0 }).unwrap();

        assert_eq!(
            tank.wheel_to_robot_velocities(&[1.0, 2.0, 3.0], &[]),
            Err(KinematicsError::WheelCountMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_rank_deficient_inverse() {
        // Tank wheels have no lateral column
        let inverse = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, -5.0, 1.0, 0.0, 5.0]);
        let forward = pseudo_inverse(&inverse, "tank").unwrap();

        assert_eq!(forward.shape(), (3, 2));
        assert!((&inverse * &forward * &inverse - &inverse).amax() < 1e-12);

        // Lateral velocity is never produced
        assert!(forward.row(1).amax() < 1e-12);

        let tank = DriveKinematics::new(KinematicsParams::Tank { track_width: 10.0 }).unwrap();
        let vel = tank.wheel_to_robot_velocities(&[1.0, 3.0], &[]).unwrap();
        assert!(vel.epsilon_equals(&Pose2d::new(2.0, 0.0, 0.2), 1e-12));
    }

    #[test]
    fn test_field_to_robot() {
        let pose = Pose2d::new(1.0, 2.0, PI / 2.0);
        let vel = field_to_robot_velocity(&pose, &Pose2d::new(0.0, 3.0, 0.5));
        assert!(vel.epsilon_equals(&Pose2d::new(3.0, 0.0, 0.5), 1e-12));

        // Driving a circle at constant speed the robot frame velocity does
        // not change
        let pose = Pose2d::new(1.0, 0.0, PI / 2.0);
        let field_vel = Pose2d::new(0.0, 1.0, 1.0);
        let field_accel = Pose2d::new(-1.0, 0.0, 0.0);
        let accel = field_to_robot_acceleration(&pose, &field_vel, &field_accel);
        assert!(accel.epsilon_equals(&Pose2d::new(0.0, 0.0, 0.0), 1e-12));
    }

    #[test]
    fn test_pose_error() {
        let err = calculate_pose_error(
            &Pose2d::new(1.0, 1.0, -3.0),
            &Pose2d::new(0.5, 2.0, 3.0),
        );

        assert!((err.x - 0.5).abs() < 1e-12);
        assert!((err.y + 1.0).abs() < 1e-12);
        assert!((err.heading - (2.0 * PI - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_odometry_straight() {
        let pose = relative_odometry_update(
            &Pose2d::new(1.0, 1.0, PI / 2.0),
            &Pose2d::new(2.0, 0.0, 0.0),
        );
        assert!(pose.epsilon_equals(&Pose2d::new(1.0, 3.0, PI / 2.0), 1e-12));
    }

    #[test]
    fn test_odometry_arc() {
        // A quarter circle of radius 1 to the left
        let pose = relative_odometry_update(
            &Pose2d::new(0.0, 0.0, 0.0),
            &Pose2d::new(PI / 2.0, 0.0, PI / 2.0),
        );
        assert!(pose.epsilon_equals(&Pose2d::new(1.0, 1.0, PI / 2.0), 1e-12));

        // Tiny turns agree with the exact form
        let delta = Pose2d::new(1.0, 0.2, 1e-7);
        let series = relative_odometry_update(&Pose2d::default(), &delta);
        let exact = Pose2d::new(
            1.0 * (1e-7f64).sin() / 1e-7 - 0.2 * (1.0 - (1e-7f64).cos()) / 1e-7,
            1.0 * (1.0 - (1e-7f64).cos()) / 1e-7 + 0.2 * (1e-7f64).sin() / 1e-7,
            1e-7,
        );
        assert!(series.epsilon_equals(&exact, 1e-9));
    }
}
