//! # Motion profile generation
//!
//! Two generators are provided:
//!
//! - `generate_motion_profile` handles position dependent velocity and
//!   acceleration limits. A forward pass accelerates away from the start as
//!   hard as the limits allow, a backward pass does the same from the goal,
//!   and the lower envelope of the two is the profile.
//! - `generate_jerk_limited_profile` additionally limits jerk for constant
//!   velocity and acceleration limits. It reduces to the first generator
//!   when the jerk limit is zero.
//!
//! Both handle a goal behind the start by generating the mirrored problem and
//! reversing the result in time.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};

// Internal
use super::{
    constraints::{MotionConstraints, SimpleMotionConstraints},
    state::{MotionProfile, MotionProfileBuilder, MotionSegment, MotionState},
};
use util::maths::solve_quadratic;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default number of constraint samples used by the dynamic generator.
pub const DEFAULT_RESOLUTION: usize = 250;

/// Accelerations, and interval length differences, below this are treated as
/// zero.
const EPSILON: f64 = 1e-6;

/// Maximum number of bisection steps when searching for a peak velocity.
pub const MAX_BISECTION_ITERATIONS: usize = 1000;

/// Tolerance on the end position of a bisected profile.
const BISECTION_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The constraints cannot be satisfied.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ProfileError {
    #[error("Peak velocity search did not converge within {0} iterations")]
    BisectionDiverged(usize),

    #[error("No nonnegative ramp time exists at the {0} of the profile")]
    NoRampRoot(&'static str),

    #[error("Velocity limit is zero at {0}, the profile cannot move past it")]
    ZeroVelocity(f64),

    #[error(
        "Constraint samples must be non-empty and of equal length, got {velocities} velocities \
         and {accelerations} accelerations"
    )]
    InvalidSamples {
        velocities: usize,
        accelerations: usize,
    },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate a profile between two states under position dependent
/// constraints.
///
/// The constraints are sampled `resolution` times over the displacement.
/// Start and goal velocities are taken as given, start and goal
/// accelerations are ignored.
///
/// Fails if a stretch of nonzero length has to be crossed at zero velocity.
pub fn generate_motion_profile<C>(
    start: MotionState,
    goal: MotionState,
    constraints: &C,
    resolution: usize,
) -> Result<MotionProfile, ProfileError>
where
    C: MotionConstraints + ?Sized,
{
    if goal.x < start.x {
        let flipped_start = MotionState::new(goal.x, -goal.v, goal.a);
        let flipped_goal = MotionState::new(start.x, -start.v, start.a);

        return generate_motion_profile(flipped_start, flipped_goal, constraints, resolution)
            .map(|p| p.reversed());
    }

    let length = goal.x - start.x;
    if length <= 0.0 {
        return Ok(MotionProfile::stationary(MotionState::new(start.x, start.v, 0.0)));
    }

    let resolution = resolution.max(1);
    let dx = length / resolution as f64;

    let forward: Vec<_> = forward_pass(
        MotionState::new(0.0, start.v, start.a),
        |d| constraints.max_velocity(start.x + d),
        |d| constraints.max_acceleration(start.x + d),
        resolution,
        dx,
    )
    .into_iter()
    .map(|(s, dx)| (MotionState::new(start.x + s.x, s.v, s.a), dx))
    .collect();

    // Backward pass is a forward pass over the mirrored problem, mapped back
    // so that each interval starts at its lower position
    let backward: Vec<_> = forward_pass(
        MotionState::new(0.0, goal.v, goal.a),
        |d| constraints.max_velocity(goal.x - d),
        |d| constraints.max_acceleration(goal.x - d),
        resolution,
        dx,
    )
    .into_iter()
    .map(|(s, dx)| {
        let end = s.after_displacement(dx);
        (MotionState::new(goal.x - end.x, end.v, -end.a), dx)
    })
    .rev()
    .collect();

    let merged = merge_envelopes(forward, backward);

    // Each interval should end at the velocity the next one starts with
    let end_vels = merged
        .iter()
        .skip(1)
        .map(|(s, _)| s.v)
        .chain(std::iter::once(goal.v));

    let segments = merged
        .iter()
        .zip(end_vels)
        .map(|(&(s, dx), end_v)| Ok(MotionSegment::new(s, segment_duration(&s, dx, end_v)?)))
        .collect::<Result<Vec<_>, ProfileError>>()?;

    let profile = MotionProfile::new(segments);

    trace!(
        "Generated motion profile over {:.4}: {} segments, duration {:.4} s",
        length,
        profile.segments().len(),
        profile.duration()
    );

    Ok(profile)
}

/// Generate a profile under constant velocity and acceleration limits.
pub fn generate_simple_motion_profile(
    start: MotionState,
    goal: MotionState,
    max_vel: f64,
    max_accel: f64,
) -> Result<MotionProfile, ProfileError> {
    generate_motion_profile(
        start,
        goal,
        &SimpleMotionConstraints::new(max_vel, max_accel),
        1,
    )
}

/// Generate a profile under constant velocity, acceleration and jerk limits.
///
/// A zero jerk limit means jerk is unconstrained.
pub fn generate_jerk_limited_profile(
    start: MotionState,
    goal: MotionState,
    max_vel: f64,
    max_accel: f64,
    max_jerk: f64,
) -> Result<MotionProfile, ProfileError> {
    if goal.x < start.x {
        let flipped_start = MotionState::new(goal.x, -goal.v, goal.a);
        let flipped_goal = MotionState::new(start.x, -start.v, start.a);

        return generate_jerk_limited_profile(
            flipped_start,
            flipped_goal,
            max_vel,
            max_accel,
            max_jerk,
        )
        .map(|p| p.reversed());
    }

    if max_jerk.abs() < EPSILON {
        return generate_simple_motion_profile(start, goal, max_vel, max_accel);
    }

    let no_coast = no_coast_profile(&start, &goal, max_vel, max_accel, max_jerk)?;
    let remaining = goal.x - no_coast.end().x;

    if remaining >= 0.0 {
        // Room to spare, so coast at the velocity limit between the ramps
        let segs = no_coast.segments();
        let mut builder = MotionProfileBuilder::new(start);

        for seg in &segs[..3] {
            builder.append_jerk_control(seg.start.j, seg.dt);
        }
        builder.append_acceleration_control(0.0, remaining / max_vel);
        for seg in &segs[3..] {
            builder.append_jerk_control(seg.start.j, seg.dt);
        }

        return Ok(builder.build());
    }

    // Otherwise find the peak velocity at which the ramps meet the goal
    let (mut low, mut high) = (0.0, max_vel);
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let peak = 0.5 * (low + high);
        let profile = no_coast_profile(&start, &goal, peak, max_accel, max_jerk)?;
        let error = goal.x - profile.end().x;

        if error.abs() < BISECTION_TOLERANCE {
            return Ok(profile);
        }

        if error > 0.0 {
            low = peak;
        } else {
            high = peak;
        }
    }

    warn!(
        "Jerk limited profile from {:?} to {:?} did not converge",
        start, goal
    );
    Err(ProfileError::BisectionDiverged(MAX_BISECTION_ITERATIONS))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Accelerate from `start` as hard as allowed, sampling the limits at the
/// start of each of the `resolution` intervals of length `dx`.
///
/// Returns the (start state, displacement) of each constant acceleration
/// interval.
fn forward_pass<V, A>(
    start: MotionState,
    max_vel: V,
    max_accel: A,
    resolution: usize,
    dx: f64,
) -> Vec<(MotionState, f64)>
where
    V: Fn(f64) -> f64,
    A: Fn(f64) -> f64,
{
    let mut states = Vec::with_capacity(resolution + 1);
    let mut last = start;

    for i in 0..resolution {
        let x = i as f64 * dx;
        let vel_limit = max_vel(x);
        let accel_limit = max_accel(x);

        if last.v >= vel_limit {
            // Coast at the limit
            let state = MotionState::new(x, vel_limit, 0.0);
            states.push((state, dx));
            last = state.after_displacement(dx);
            continue;
        }

        let desired = (last.v * last.v + 2.0 * accel_limit * dx).sqrt();

        if desired <= vel_limit {
            // Accelerate for the whole interval
            let state = MotionState::new(x, last.v, accel_limit);
            states.push((state, dx));
            last = state.after_displacement(dx);
        } else {
            // Accelerate up to the limit then coast
            let accel_dx = (vel_limit * vel_limit - last.v * last.v) / (2.0 * accel_limit);
            let accel_state = MotionState::new(x, last.v, accel_limit);
            let coast_state = MotionState::new(x + accel_dx, vel_limit, 0.0);

            states.push((accel_state, accel_dx));
            states.push((coast_state, dx - accel_dx));
            last = coast_state.after_displacement(dx - accel_dx);
        }
    }

    states
}

/// Merge forward and backward envelopes into their lower envelope.
///
/// Both lists must cover the same displacement range in increasing order.
/// Intervals are split wherever their boundaries disagree, and wherever the
/// two velocity curves cross.
pub(crate) fn merge_envelopes(
    forward: Vec<(MotionState, f64)>,
    backward: Vec<(MotionState, f64)>,
) -> Vec<(MotionState, f64)> {
    let mut merged = Vec::with_capacity(forward.len() + backward.len());

    let mut fwd_iter = forward.into_iter();
    let mut bwd_iter = backward.into_iter();
    let mut fwd = fwd_iter.next();
    let mut bwd = bwd_iter.next();

    while let (Some((fwd_start, fwd_dx)), Some((bwd_start, bwd_dx))) = (fwd, bwd) {
        // Align the intervals, keeping the remainder of the longer one
        let mut fwd_rest = None;
        let mut bwd_rest = None;
        let dx = if (fwd_dx - bwd_dx).abs() > EPSILON {
            if fwd_dx < bwd_dx {
                bwd_rest = Some((bwd_start.after_displacement(fwd_dx), bwd_dx - fwd_dx));
                fwd_dx
            } else {
                fwd_rest = Some((fwd_start.after_displacement(bwd_dx), fwd_dx - bwd_dx));
                bwd_dx
            }
        } else {
            fwd_dx
        };

        let fwd_end = fwd_start.after_displacement(dx);
        let bwd_end = bwd_start.after_displacement(dx);

        if fwd_start.v <= bwd_start.v {
            if fwd_end.v <= bwd_end.v {
                merged.push((fwd_start, dx));
            } else {
                let cross = intersection(&fwd_start, &bwd_start, dx);
                merged.push((fwd_start, cross));
                merged.push((bwd_start.after_displacement(cross), dx - cross));
            }
        } else if fwd_end.v >= bwd_end.v {
            merged.push((bwd_start, dx));
        } else {
            let cross = intersection(&fwd_start, &bwd_start, dx);
            merged.push((bwd_start, cross));
            merged.push((fwd_start.after_displacement(cross), dx - cross));
        }

        fwd = fwd_rest.or_else(|| fwd_iter.next());
        bwd = bwd_rest.or_else(|| bwd_iter.next());
    }

    merged
}

/// Displacement at which the velocities of two constant acceleration states
/// starting at the same position are equal, clamped to [0, dx].
fn intersection(state_1: &MotionState, state_2: &MotionState, dx: f64) -> f64 {
    let denom = 2.0 * (state_2.a - state_1.a);
    if denom.abs() < EPSILON {
        return dx;
    }

    ((state_1.v * state_1.v - state_2.v * state_2.v) / denom)
        .max(0.0)
        .min(dx)
}

/// Time taken to move `dx` from `state` under constant acceleration.
///
/// `end_v` is the velocity the interval is expected to end at. It replaces the
/// computed end velocity when the two agree to within rounding, as the end
/// velocity of a stop is the square root of a near zero discriminant.
fn segment_duration(state: &MotionState, dx: f64, end_v: f64) -> Result<f64, ProfileError> {
    if dx <= 0.0 {
        return Ok(0.0);
    }

    let computed = state.after_displacement(dx).v;
    let end_v = if (computed - end_v).abs() <= EPSILON * end_v.abs().max(1.0) {
        end_v
    } else {
        computed
    };

    let mean_v = 0.5 * (state.v + end_v);
    if mean_v > 0.0 {
        return Ok(dx / mean_v);
    }

    // Slivers left over from splitting intervals take no time
    if dx < EPSILON {
        return Ok(0.0);
    }

    warn!("Cannot move {} from {:?}, velocity limit is zero", dx, state);
    Err(ProfileError::ZeroVelocity(state.x))
}

/// Time deltas of a (+jerk, 0, -jerk) ramp taking `state` to `max_vel` with
/// zero final acceleration.
///
/// If the acceleration limit cannot be reached the constant acceleration
/// phase is dropped and the ramp shortened.
fn accel_time_deltas(
    state: &MotionState,
    max_vel: f64,
    max_accel: f64,
    max_jerk: f64,
) -> Option<[f64; 3]> {
    let (v, a) = (state.v, state.a);

    let dt1 = (max_accel - a) / max_jerk;
    let dt3 = max_accel / max_jerk;
    if dt1 < 0.0 {
        return None;
    }

    let dv1 = a * dt1 + 0.5 * max_jerk * dt1 * dt1;
    let dv3 = max_accel * dt3 - 0.5 * max_jerk * dt3 * dt3;
    let dv2 = max_vel - v - dv1 - dv3;

    if dv2 >= 0.0 {
        return Some([dt1, dv2 / max_accel, dt3]);
    }

    let new_dt1 = solve_quadratic(
        max_jerk,
        2.0 * a,
        v - max_vel + a * a / (2.0 * max_jerk),
    )
    .into_iter()
    .find(|&t| t >= 0.0)?;
    let new_dt3 = new_dt1 + a / max_jerk;

    if new_dt3 < 0.0 {
        None
    } else {
        Some([new_dt1, 0.0, new_dt3])
    }
}

/// Time deltas of a (-jerk, 0, +jerk) ramp taking `state` down to `max_vel`
/// with zero final acceleration.
fn decel_time_deltas(
    state: &MotionState,
    max_vel: f64,
    max_accel: f64,
    max_jerk: f64,
) -> Option<[f64; 3]> {
    let mirrored = MotionState::new(state.x, -state.v, -state.a);
    accel_time_deltas(&mirrored, -max_vel, max_accel, max_jerk)
}

/// Ramp from `start` to `max_vel` and straight back down to `goal`, without
/// a coast phase.
fn no_coast_profile(
    start: &MotionState,
    goal: &MotionState,
    max_vel: f64,
    max_accel: f64,
    max_jerk: f64,
) -> Result<MotionProfile, ProfileError> {
    let mut builder = MotionProfileBuilder::new(*start);

    if let Some(d) = accel_time_deltas(start, max_vel, max_accel, max_jerk) {
        builder
            .append_jerk_control(max_jerk, d[0])
            .append_jerk_control(0.0, d[1])
            .append_jerk_control(-max_jerk, d[2]);
    } else if let Some(d) = decel_time_deltas(start, max_vel, max_accel, max_jerk) {
        builder
            .append_jerk_control(-max_jerk, d[0])
            .append_jerk_control(0.0, d[1])
            .append_jerk_control(max_jerk, d[2]);
    } else {
        return Err(ProfileError::NoRampRoot("start"));
    }

    // The goal ramp is found backwards in time from the goal, so it is
    // played in reverse with the jerk signs swapped
    let goal_mirror = MotionState::new(goal.x, goal.v, -goal.a);

    if let Some(d) = accel_time_deltas(&goal_mirror, max_vel, max_accel, max_jerk) {
        builder
            .append_jerk_control(-max_jerk, d[2])
            .append_jerk_control(0.0, d[1])
            .append_jerk_control(max_jerk, d[0]);
    } else if let Some(d) = decel_time_deltas(&goal_mirror, max_vel, max_accel, max_jerk) {
        builder
            .append_jerk_control(max_jerk, d[2])
            .append_jerk_control(0.0, d[1])
            .append_jerk_control(-max_jerk, d[0]);
    } else {
        return Err(ProfileError::NoRampRoot("goal"));
    }

    Ok(builder.build())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
