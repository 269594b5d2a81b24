//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Returns true if the two values are within `eps` of each other.
pub fn epsilon_equals<T>(a: T, b: T, eps: T) -> bool
where
    T: Float
{
    (a - b).abs() < eps
}

/// Get the shortest signed angular distance from `a` to `b`.
///
/// The result lies in (-pi, pi]. Exactly opposite angles resolve to `+pi`.
pub fn get_ang_dist<T>(a: T, b: T) -> T
where
    T: Float + FloatConst
{
    let c = rem_euclid(a - b, T::TAU());
    let d = rem_euclid(b - a, T::TAU());

    if c < d {
        -c
    }
    else {
        d
    }
}

/// Normalise an angle into the range (-pi, pi].
pub fn norm_angle<T>(value: T) -> T
where
    T: Float + FloatConst
{
    let r = rem_euclid(value, T::TAU());

    if r > T::PI() {
        r - T::TAU()
    }
    else {
        r
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Real roots of `a*x^2 + b*x + c = 0`, in ascending order.
///
/// Degrades to the linear solution when `a` is zero. Returns an empty vector
/// when there are no real roots.
pub fn solve_quadratic<T>(a: T, b: T, c: T) -> Vec<T>
where
    T: Float
{
    let two = T::one() + T::one();

    if a == T::zero() {
        if b == T::zero() {
            return Vec::new();
        }
        return vec![-c / b];
    }

    let disc = b * b - two * two * a * c;

    if disc < T::zero() {
        Vec::new()
    }
    else if disc == T::zero() {
        vec![-b / (two * a)]
    }
    else {
        let root = disc.sqrt();
        let x0 = (-b - root) / (two * a);
        let x1 = (-b + root) / (two * a);
        if x0 < x1 { vec![x0, x1] } else { vec![x1, x0] }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
