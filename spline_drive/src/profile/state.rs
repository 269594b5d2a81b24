//! Motion states, segments and profiles

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic state of a 1D motion.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct MotionState {
    /// Position
    pub x: f64,

    /// Velocity
    pub v: f64,

    /// Acceleration
    pub a: f64,

    /// Jerk, zero except in jerk limited profiles
    pub j: f64,
}

/// Constant jerk motion for a fixed duration.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct MotionSegment {
    pub start: MotionState,
    pub dt: f64,
}

/// A sequence of motion segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionProfile {
    segments: Vec<MotionSegment>,
}

/// Builds a profile by appending controls to a start state.
#[derive(Debug, Clone)]
pub struct MotionProfileBuilder {
    start: MotionState,
    segments: Vec<MotionSegment>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionState {
    pub fn new(x: f64, v: f64, a: f64) -> Self {
        Self { x, v, a, j: 0.0 }
    }

    pub fn with_jerk(x: f64, v: f64, a: f64, j: f64) -> Self {
        Self { x, v, a, j }
    }

    /// State after `t` seconds.
    pub fn get(&self, t: f64) -> MotionState {
        let t2 = t * t;
        let t3 = t2 * t;

        MotionState {
            x: self.x + self.v * t + self.a * t2 / 2.0 + self.j * t3 / 6.0,
            v: self.v + self.a * t + self.j * t2 / 2.0,
            a: self.a + self.j * t,
            j: self.j,
        }
    }

    /// State after moving `dx` under constant acceleration.
    ///
    /// The squared velocity is clamped at zero, so a decelerating state
    /// stops rather than producing NaN.
    pub fn after_displacement(&self, dx: f64) -> MotionState {
        let disc = (self.v * self.v + 2.0 * self.a * dx).max(0.0);

        MotionState::new(self.x + dx, disc.sqrt(), self.a)
    }

    /// Negate every component.
    pub fn flipped(&self) -> MotionState {
        MotionState::with_jerk(-self.x, -self.v, -self.a, -self.j)
    }
}

impl MotionSegment {
    pub fn new(start: MotionState, dt: f64) -> Self {
        Self { start, dt }
    }

    pub fn get(&self, t: f64) -> MotionState {
        self.start.get(t)
    }

    pub fn end(&self) -> MotionState {
        self.start.get(self.dt)
    }

    /// The same motion played backwards in time.
    pub fn reversed(&self) -> MotionSegment {
        let end = self.end();
        MotionSegment::new(MotionState::with_jerk(end.x, -end.v, end.a, -end.j), self.dt)
    }
}

impl MotionProfile {
    /// Create a profile from its segments.
    ///
    /// An empty list produces a single stationary segment at the origin.
    pub fn new(segments: Vec<MotionSegment>) -> Self {
        if segments.is_empty() {
            return Self {
                segments: vec![MotionSegment::new(MotionState::default(), 0.0)],
            };
        }
        Self { segments }
    }

    /// A zero length profile holding `state`.
    pub fn stationary(state: MotionState) -> Self {
        Self {
            segments: vec![MotionSegment::new(state, 0.0)],
        }
    }

    pub fn segments(&self) -> &[MotionSegment] {
        &self.segments
    }

    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.dt).sum()
    }

    /// State at time `t`, clamped to the profile's start and end.
    pub fn get(&self, t: f64) -> MotionState {
        if t <= 0.0 {
            return self.start();
        }

        let mut remaining = t;
        for seg in self.segments.iter() {
            if remaining <= seg.dt {
                return seg.get(remaining);
            }
            remaining -= seg.dt;
        }

        self.end()
    }

    pub fn start(&self) -> MotionState {
        self.segments[0].start
    }

    pub fn end(&self) -> MotionState {
        self.segments[self.segments.len() - 1].end()
    }

    /// The profile played backwards in time.
    pub fn reversed(&self) -> MotionProfile {
        MotionProfile {
            segments: self.segments.iter().rev().map(|s| s.reversed()).collect(),
        }
    }

    /// The profile mirrored in position, velocity and acceleration.
    pub fn flipped(&self) -> MotionProfile {
        MotionProfile {
            segments: self
                .segments
                .iter()
                .map(|s| MotionSegment::new(s.start.flipped(), s.dt))
                .collect(),
        }
    }

    /// Time at which the profile first reaches position `x`.
    ///
    /// Assumes a monotonically non-decreasing position, clamping to the
    /// profile's ends.
    pub fn time_at_position(&self, x: f64) -> f64 {
        if x <= self.start().x {
            return 0.0;
        }

        let mut elapsed = 0.0;
        for seg in self.segments.iter() {
            if x <= seg.end().x {
                // Bisect within the segment
                let (mut lo, mut hi) = (0.0, seg.dt);
                for _ in 0..60 {
                    let mid = 0.5 * (lo + hi);
                    if seg.get(mid).x < x {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                return elapsed + hi;
            }
            elapsed += seg.dt;
        }

        elapsed
    }
}

impl MotionProfileBuilder {
    pub fn new(start: MotionState) -> Self {
        Self {
            start,
            segments: Vec::new(),
        }
    }

    fn current(&self) -> MotionState {
        match self.segments.last() {
            Some(s) => s.end(),
            None => self.start,
        }
    }

    /// Apply constant jerk `j` for `dt` seconds.
    pub fn append_jerk_control(&mut self, j: f64, dt: f64) -> &mut Self {
        let c = self.current();
        self.segments
            .push(MotionSegment::new(MotionState::with_jerk(c.x, c.v, c.a, j), dt));
        self
    }

    /// Apply constant acceleration `a` for `dt` seconds.
    pub fn append_acceleration_control(&mut self, a: f64, dt: f64) -> &mut Self {
        let c = self.current();
        self.segments
            .push(MotionSegment::new(MotionState::new(c.x, c.v, a), dt));
        self
    }

    /// Append the segments of another profile.
    pub fn append_profile(&mut self, profile: &MotionProfile) -> &mut Self {
        for seg in profile.segments() {
            if seg.start.j.abs() > 0.0 {
                self.append_jerk_control(seg.start.j, seg.dt);
            } else {
                self.append_acceleration_control(seg.start.a, seg.dt);
            }
        }
        self
    }

    pub fn build(&self) -> MotionProfile {
        if self.segments.is_empty() {
            return MotionProfile::stationary(self.start);
        }
        MotionProfile::new(self.segments.clone())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
