//! Motion constraints

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::lin_map;

use super::generator::ProfileError;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Position dependent limits on a 1D motion.
pub trait MotionConstraints {
    /// Maximum velocity at position `x`.
    fn max_velocity(&self, x: f64) -> f64;

    /// Maximum acceleration magnitude at position `x`.
    fn max_acceleration(&self, x: f64) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Constant velocity and acceleration limits.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleMotionConstraints {
    pub max_vel: f64,
    pub max_accel: f64,
}

/// Limits sampled on an evenly spaced grid of positions and linearly
/// interpolated between samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledMotionConstraints {
    /// Position of the first sample
    start: f64,

    /// Spacing between samples
    step: f64,

    max_vels: Vec<f64>,
    max_accels: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimpleMotionConstraints {
    pub fn new(max_vel: f64, max_accel: f64) -> Self {
        Self { max_vel, max_accel }
    }
}

impl MotionConstraints for SimpleMotionConstraints {
    fn max_velocity(&self, _x: f64) -> f64 {
        self.max_vel
    }

    fn max_acceleration(&self, _x: f64) -> f64 {
        self.max_accel
    }
}

impl SampledMotionConstraints {
    /// Create sampled constraints. `max_vels` and `max_accels` must hold the
    /// same, nonzero, number of samples.
    pub fn new(
        start: f64,
        step: f64,
        max_vels: Vec<f64>,
        max_accels: Vec<f64>,
    ) -> Result<Self, ProfileError> {
        if max_vels.is_empty() || max_vels.len() != max_accels.len() {
            return Err(ProfileError::InvalidSamples {
                velocities: max_vels.len(),
                accelerations: max_accels.len(),
            });
        }

        Ok(Self {
            start,
            step,
            max_vels,
            max_accels,
        })
    }

    fn interpolate(&self, samples: &[f64], x: f64) -> f64 {
        let last = samples.len() - 1;
        if last == 0 || self.step <= 0.0 {
            return samples[0];
        }

        let pos = ((x - self.start) / self.step).max(0.0);
        let i = (pos.floor() as usize).min(last - 1);

        lin_map(
            (i as f64, (i + 1) as f64),
            (samples[i], samples[i + 1]),
            pos.min(last as f64),
        )
    }
}

impl MotionConstraints for SampledMotionConstraints {
    fn max_velocity(&self, x: f64) -> f64 {
        self.interpolate(&self.max_vels, x)
    }

    fn max_acceleration(&self, x: f64) -> f64 {
        self.interpolate(&self.max_accels, x)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
