//! # Follower Simulation
//!
//! This binary runs the trajectory follower in closed loop against a simulated drivetrain, allowing
//! trajectories and follower gains to be tried out without a robot. The robot's pose is estimated
//! from wheel odometry, as it would be on a real drivetrain.
//!
//! Everything is configured in `params/follow_sim.toml`. The follower's status report from every
//! cycle is saved to `reports.json` in the session directory.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Result};
use log::{debug, info, warn};
use serde::Deserialize;

use spline_drive::{
    drive::{Localizer, SimDrive, WheelLocalizer},
    follower::{self, FollowerMode, TrajFollower},
    kinematics::{DriveKinematics, KinematicsParams},
    trajectory::TrajectoryConfig,
    Pose2d,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Extra time allowed after the follower's timeout before giving up on the simulation.
const OVERRUN_S: f64 = 1.0;

/// Number of cycles between progress reports.
const REPORT_INTERVAL: usize = 50;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize)]
struct SimParams {
    /// Period of one control cycle
    cycle_period_s: f64,

    /// Offset of the robot's true start pose from the start of the trajectory
    #[serde(default)]
    start_offset: Pose2d,

    drive: KinematicsParams,

    trajectory: TrajectoryConfig,

    follower: follower::Params,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session =
        Session::new("follow_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Follower Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: SimParams =
        util::params::load("follow_sim.toml").wrap_err("Could not load simulation params")?;

    // ---- MODULE INIT ----

    let kinematics =
        DriveKinematics::new(params.drive).wrap_err("Invalid drivetrain parameters")?;

    let trajectory = params
        .trajectory
        .to_trajectory()
        .wrap_err("Could not build the trajectory")?;
    let start = trajectory.start();
    let end = trajectory.end();
    let time_limit = trajectory.duration() + params.follower.timeout_s + OVERRUN_S;

    info!(
        "Trajectory from ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3}), {:.3} s long",
        start.x,
        start.y,
        start.heading,
        end.x,
        end.y,
        end.heading,
        trajectory.duration()
    );

    let mut drive = SimDrive::new(
        kinematics,
        params.follower.k_v,
        params.follower.k_static,
        start + params.start_offset,
    );
    let mut localizer = WheelLocalizer::new(start);

    let mut follower = TrajFollower::new(params.follower);
    follower.follow_trajectory(trajectory, 0.0);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut cycle = 0usize;
    let mut reports = Vec::new();

    loop {
        let time = cycle as f64 * params.cycle_period_s;

        // Estimate the pose from the wheels and run the follower on it
        localizer.update(&drive);
        let pose = localizer.pose_estimate();
        let report = follower.update(&pose, time, &mut drive);

        for marker in report.markers.iter() {
            info!("Passed marker \"{}\" at {:.3} s", marker, report.elapsed_s);
        }

        if cycle % REPORT_INTERVAL == 0 {
            debug!(
                "t = {:.3} s, error = ({:.4}, {:.4}, {:.4}), powers = {:.3?}",
                report.elapsed_s,
                report.pose_error.x,
                report.pose_error.y,
                report.pose_error.heading,
                report.motor_powers
            );
        }

        let done = report.mode == FollowerMode::Done;
        if done && report.timed_out {
            warn!("Follower timed out");
        }
        reports.push(report);

        if done {
            break;
        }

        if time > time_limit {
            warn!("Simulation overran the follower's timeout, stopping");
            break;
        }

        drive.step(params.cycle_period_s);
        cycle += 1;
    }

    // ---- SUMMARY ----

    let true_pose = drive.pose();
    let estimate = localizer.pose_estimate();

    info!(
        "Finished after {} cycles at ({:.3}, {:.3}, {:.3}), target was ({:.3}, {:.3}, {:.3})",
        cycle, true_pose.x, true_pose.y, true_pose.heading, end.x, end.y, end.heading
    );
    info!(
        "Odometry drift: ({:.2e}, {:.2e}, {:.2e})",
        estimate.x - true_pose.x,
        estimate.y - true_pose.y,
        estimate.heading - true_pose.heading
    );

    session.save("reports.json", &reports);

    Ok(())
}
