//! Trajectory follower state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::{
    drive::Drive,
    geometry::Pose2d,
    kinematics::{
        calculate_pose_error,
        field_to_robot_acceleration,
        field_to_robot_velocity,
        DriveKinematics,
    },
    trajectory::Trajectory,
};
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Keeps the robot on a trajectory using PID feedback on the pose error and
/// feedforward on the trajectory's velocity and acceleration.
///
/// The follower is driven by the caller, who passes in the current pose and
/// time on every cycle through `update`.
#[derive(Debug, Clone)]
pub struct TrajFollower {
    params: Params,

    /// Executing mode
    mode: FollowerMode,

    /// The trajectory being followed
    trajectory: Option<Trajectory>,

    /// Time at which the trajectory started
    start_time: f64,

    /// Elapsed time at the previous update, markers after this are yet to be
    /// reported
    prev_elapsed: f64,

    report: StatusReport,

    /// Controller objects used to correct the velocity demand
    controllers: FollowerControllers,
}

/// The status report containing the tracking error and other monitoring
/// quantities.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StatusReport {
    pub mode: FollowerMode,

    /// Time since the start of the trajectory
    pub elapsed_s: f64,

    /// The target pose at this time
    pub target_pose: Pose2d,

    /// Field frame error from the current pose to the target pose
    pub pose_error: Pose2d,

    /// The powers sent to the drive this cycle, empty if none were sent
    pub motor_powers: Vec<f64>,

    /// Labels of the markers passed since the previous update
    pub markers: Vec<String>,

    /// If true the trajectory finished without the error becoming admissible
    pub timed_out: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum FollowerError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),
}

/// The possible modes of execution of the follower. Each mode is handled by
/// a `mode_xyz` function.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum FollowerMode {
    /// No trajectory has been given
    Idle,

    /// Following a trajectory
    Following,

    /// The trajectory is complete or was aborted, the drive is held stopped
    Done,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FollowerMode {
    fn default() -> Self {
        FollowerMode::Idle
    }
}

impl TrajFollower {
    /// Initialise the follower.
    ///
    /// Expected init data is a path to the parameter file.
    pub fn init(params_path: &str) -> Result<Self, FollowerError> {
        let params = match params::load(params_path) {
            Ok(p) => p,
            Err(e) => return Err(FollowerError::ParamLoadError(e)),
        };

        Ok(Self::new(params))
    }

    pub fn new(params: Params) -> Self {
        let controllers = FollowerControllers::new(&params);

        Self {
            params,
            mode: FollowerMode::Idle,
            trajectory: None,
            start_time: 0f64,
            prev_elapsed: std::f64::NEG_INFINITY,
            report: StatusReport::default(),
            controllers,
        }
    }

    pub fn mode(&self) -> FollowerMode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        self.mode == FollowerMode::Following
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// Begin following a trajectory which starts at `start_time`.
    ///
    /// Any trajectory already being followed is replaced, and the
    /// controllers are reset.
    pub fn follow_trajectory(&mut self, trajectory: Trajectory, start_time: f64) {
        info!(
            "Following trajectory of {} segments lasting {:.3} s",
            trajectory.segments().len(),
            trajectory.duration()
        );

        self.trajectory = Some(trajectory);
        self.start_time = start_time;
        self.prev_elapsed = std::f64::NEG_INFINITY;
        self.controllers.reset();
        self.mode = FollowerMode::Following;
    }

    /// Abort the current trajectory.
    ///
    /// This will transfer the mode into done so that on the next call to
    /// `update` the drive is stopped.
    pub fn abort(&mut self) {
        if self.mode == FollowerMode::Following {
            info!("Trajectory aborted");
            self.mode = FollowerMode::Done;
        }
    }

    /// Process the follower for the current pose at time `now`, sending
    /// commands to `drive`.
    pub fn update(&mut self, pose: &Pose2d, now: f64, drive: &mut dyn Drive) -> StatusReport {
        // Setup cycle data
        self.report = StatusReport::default();

        match self.mode {
            FollowerMode::Idle => self.mode_idle(),
            FollowerMode::Following => self.mode_following(pose, now, drive),
            FollowerMode::Done => self.mode_done(drive),
        }

        self.report.mode = self.mode;
        self.report.clone()
    }

    /// Mode idle.
    ///
    /// No actions are taken in this mode. To start following the user must
    /// call `follow_trajectory`.
    fn mode_idle(&mut self) {}

    /// Mode following.
    ///
    /// Tracks the trajectory until its duration has passed and the error is
    /// admissible, or until the timeout.
    fn mode_following(&mut self, pose: &Pose2d, now: f64, drive: &mut dyn Drive) {
        let traj = match self.trajectory {
            Some(ref t) => t,
            None => {
                self.mode = FollowerMode::Idle;
                return;
            }
        };

        let elapsed = now - self.start_time;
        let target = traj.get(elapsed);
        let error = calculate_pose_error(&target, pose);

        self.report.elapsed_s = elapsed;
        self.report.target_pose = target;
        self.report.pose_error = error;
        self.report.markers = traj
            .markers_between(self.prev_elapsed, elapsed)
            .map(|m| m.label.clone())
            .collect();
        self.prev_elapsed = elapsed;

        // ---- COMPLETION ----

        if elapsed >= traj.duration() {
            if self.is_admissible(&error) {
                info!("Trajectory complete after {:.3} s", elapsed);
                self.mode = FollowerMode::Done;
            } else if elapsed >= traj.duration() + self.params.timeout_s {
                warn!(
                    "Trajectory timed out with error ({:.3}, {:.3}, {:.3})",
                    error.x, error.y, error.heading
                );
                self.report.timed_out = true;
                self.mode = FollowerMode::Done;
            }

            if self.mode == FollowerMode::Done {
                self.mode_done(drive);
                return;
            }
        }

        // ---- COMMAND GENERATION ----

        let target_vel = traj.velocity(elapsed);
        let target_accel = traj.acceleration(elapsed);

        let target_robot_vel = field_to_robot_velocity(&target, &target_vel);
        let target_robot_accel = field_to_robot_acceleration(&target, &target_vel, &target_accel);

        let vel_dem = self.controllers.get_velocity_dem(
            drive.kinematics(),
            &target,
            &target_robot_vel,
            pose,
            now,
        );

        let powers = self.get_motor_powers(drive.kinematics(), &vel_dem, &target_robot_accel);

        let orientations = drive.kinematics().module_orientations(&vel_dem);
        if !orientations.is_empty() {
            drive.set_module_orientations(&orientations);
        }
        drive.set_motor_powers(&powers);

        self.report.motor_powers = powers;
    }

    /// Mode done.
    ///
    /// Holds the drive stopped until a new trajectory is given.
    fn mode_done(&mut self, drive: &mut dyn Drive) {
        let powers = vec![0f64; drive.kinematics().num_wheels()];
        drive.set_motor_powers(&powers);
        self.report.motor_powers = powers;
    }

    fn is_admissible(&self, error: &Pose2d) -> bool {
        let adm = &self.params.admissible_error;

        error.x.abs() <= adm.x && error.y.abs() <= adm.y && error.heading.abs() <= adm.heading
    }

    /// Motor powers from the feedforward model at the wheels.
    fn get_motor_powers(
        &self,
        kinematics: &DriveKinematics,
        vel: &Pose2d,
        accel: &Pose2d,
    ) -> Vec<f64> {
        let wheel_vels = kinematics.robot_to_wheel_velocities(vel);
        let wheel_accels = kinematics.robot_to_wheel_accelerations(vel, accel);

        wheel_vels
            .iter()
            .zip(wheel_accels.iter())
            .map(|(v, a)| {
                let power = self.params.k_v * v + self.params.k_a * a;

                // Static friction only needs overcoming when moving
                if power == 0f64 {
                    0f64
                } else {
                    power + power.signum() * self.params.k_static
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        drive::SimDrive,
        geometry::Vector2d,
        kinematics::{MecanumKinematics, SwerveKinematics, TankKinematics},
        path::HeadingSpec,
        trajectory::{DriveConstraints, TrajectoryBuilder},
    };
    use std::f64::consts::PI;

    const DT: f64 = 0.01;

    fn params() -> Params {
        Params {
            x: PidCoefficients { k_p: 2.0, k_i: 0.0, k_d: 0.0 },
            y: PidCoefficients { k_p: 2.0, k_i: 0.0, k_d: 0.2 },
            heading: PidCoefficients { k_p: 2.0, k_i: 0.0, k_d: 0.0 },
            k_v: 0.05,
            k_a: 0.0,
            k_static: 0.01,
            admissible_error: Pose2d::new(0.5, 0.5, 0.1),
            timeout_s: 2.0,
        }
    }

    fn constraints() -> DriveConstraints {
        DriveConstraints::new(20.0, 20.0, PI, PI)
    }

    /// Run the follower against the simulated drive until it finishes,
    /// returning every report.
    fn run(follower: &mut TrajFollower, drive: &mut SimDrive) -> Vec<StatusReport> {
        let mut reports = Vec::new();

        for i in 0..5000 {
            let pose = drive.pose();
            let report = follower.update(&pose, i as f64 * DT, drive);
            let done = report.mode != FollowerMode::Following;
            reports.push(report);

            if done {
                break;
            }
            drive.step(DT);
        }

        reports
    }

    #[test]
    fn test_idle() {
        let kinematics = DriveKinematics::Tank(TankKinematics::new(1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::default());
        let mut follower = TrajFollower::new(params());

        let report = follower.update(&Pose2d::default(), 0.0, &mut drive);
        assert_eq!(report.mode, FollowerMode::Idle);
        assert!(report.motor_powers.is_empty());
    }

    #[test]
    fn test_tank_following() {
        let traj = TrajectoryBuilder::new(Pose2d::default(), constraints())
            .forward(20.0)
            .spline_to(Pose2d::new(40.0, 20.0, PI / 2.0))
            .add_temporal_marker(0.0, "start")
            .add_displacement_marker_at(10.0, "middle")
            .build()
            .unwrap();
        let end = traj.end();

        let kinematics = DriveKinematics::Tank(TankKinematics::new(1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::default());
        let mut follower = TrajFollower::new(params());
        follower.follow_trajectory(traj, 0.0);

        let reports = run(&mut follower, &mut drive);
        let last = reports.last().unwrap();

        assert_eq!(last.mode, FollowerMode::Done);
        assert!(!last.timed_out);
        assert!(last.motor_powers.iter().all(|p| *p == 0.0));
        assert!((drive.pose().pos() - end.pos()).norm() < 0.5);

        // Each marker is reported once, in order
        let markers: Vec<_> = reports.iter().flat_map(|r| r.markers.clone()).collect();
        assert_eq!(markers, vec!["start".to_string(), "middle".to_string()]);
    }

    #[test]
    fn test_mecanum_following() {
        let traj = TrajectoryBuilder::new(Pose2d::default(), constraints())
            .strafe_left(10.0)
            .spline_to_heading(Pose2d::new(20.0, 20.0, 0.0), HeadingSpec::Spline(PI / 2.0))
            .build()
            .unwrap();

        // Start off the trajectory
        let kinematics = DriveKinematics::Mecanum(MecanumKinematics::new(1.0, 1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::new(0.3, -0.3, 0.1));
        let mut follower = TrajFollower::new(params());
        follower.follow_trajectory(traj, 0.0);

        let reports = run(&mut follower, &mut drive);
        let last = reports.last().unwrap();

        assert_eq!(last.mode, FollowerMode::Done);
        assert!(!last.timed_out);
        assert!(drive.pose().epsilon_equals(&Pose2d::new(20.0, 20.0, PI / 2.0), 0.5));

        // The initial error is corrected
        let mid = &reports[reports.len() / 2];
        assert!(mid.pose_error.pos().norm() < 0.2);
    }

    #[test]
    fn test_swerve_following() {
        let traj = TrajectoryBuilder::new(Pose2d::default(), constraints())
            .line_to_heading(Vector2d::new(10.0, 10.0), HeadingSpec::Linear(PI / 2.0))
            .build()
            .unwrap();

        let kinematics = DriveKinematics::Swerve(SwerveKinematics::new(1.0, 1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::default());
        let mut follower = TrajFollower::new(params());
        follower.follow_trajectory(traj, 0.0);

        let last = run(&mut follower, &mut drive).pop().unwrap();

        assert_eq!(last.mode, FollowerMode::Done);
        assert!(!last.timed_out);
        assert!(drive.pose().epsilon_equals(&Pose2d::new(10.0, 10.0, PI / 2.0), 0.5));
    }

    #[test]
    fn test_timeout() {
        let traj = TrajectoryBuilder::new(Pose2d::default(), constraints())
            .forward(10.0)
            .build()
            .unwrap();
        let duration = traj.duration();

        // A drive which never moves
        let kinematics = DriveKinematics::Tank(TankKinematics::new(1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::default());
        let mut follower = TrajFollower::new(params());
        follower.follow_trajectory(traj, 5.0);

        let mut t = 5.0;
        let last = loop {
            let report = follower.update(&Pose2d::default(), t, &mut drive);
            if report.mode == FollowerMode::Done {
                break report;
            }
            t += DT;
        };

        assert!(last.timed_out);
        assert!(last.elapsed_s >= duration + 2.0);
        assert!(last.elapsed_s < duration + 2.0 + 2.0 * DT);
    }

    #[test]
    fn test_abort() {
        let traj = TrajectoryBuilder::new(Pose2d::default(), constraints())
            .forward(10.0)
            .build()
            .unwrap();

        let kinematics = DriveKinematics::Tank(TankKinematics::new(1.0).unwrap());
        let mut drive = SimDrive::new(kinematics, 0.05, 0.01, Pose2d::default());
        let mut follower = TrajFollower::new(params());
        follower.follow_trajectory(traj.clone(), 0.0);

        follower.update(&Pose2d::default(), 0.0, &mut drive);
        drive.step(DT);
        let report = follower.update(&drive.pose(), DT, &mut drive);
        assert!(drive.motor_powers().iter().all(|p| *p > 0.0));
        assert!(report.motor_powers.iter().all(|p| *p > 0.0));

        follower.abort();
        let report = follower.update(&drive.pose(), 2.0 * DT, &mut drive);
        assert_eq!(report.mode, FollowerMode::Done);
        assert_eq!(drive.motor_powers(), &[0.0, 0.0]);

        // A new trajectory replaces the finished one
        follower.follow_trajectory(traj, 1.0);
        assert!(follower.is_following());
    }
}
