//! # Motion profiles
//!
//! One dimensional motion, described by a sequence of constant jerk segments,
//! along with the generators which fit such a profile between two states
//! under velocity, acceleration and jerk limits.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod constraints;
mod generator;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use constraints::{MotionConstraints, SampledMotionConstraints, SimpleMotionConstraints};
pub use generator::{
    generate_jerk_limited_profile,
    generate_motion_profile,
    generate_simple_motion_profile,
    ProfileError,
    DEFAULT_RESOLUTION,
    MAX_BISECTION_ITERATIONS,
};
pub use state::{MotionProfile, MotionProfileBuilder, MotionSegment, MotionState};
