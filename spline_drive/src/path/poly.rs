//! Quintic polynomials and spline waypoints

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::geometry::Vector2d;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A quintic polynomial over the internal parameter `t` in [0, 1].
///
/// Coefficients are stored highest power first, `a*t^5 + ... + f`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct QuinticPolynomial {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

/// Boundary condition for one end of a quintic spline segment.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,

    #[serde(default)]
    pub d2x: f64,

    #[serde(default)]
    pub d2y: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl QuinticPolynomial {
    /// Solve for the polynomial matching the value, first and second
    /// derivative at both `t = 0` and `t = 1`.
    pub fn new(
        start: f64,
        start_deriv: f64,
        start_second_deriv: f64,
        end: f64,
        end_deriv: f64,
        end_second_deriv: f64,
    ) -> Self {
        let f = start;
        let e = start_deriv;
        let d = start_second_deriv / 2.0;

        // Remaining conditions at t = 1 once the known low order terms are
        // taken out
        let p = end - (d + e + f);
        let v = end_deriv - (2.0 * d + e);
        let acc = end_second_deriv - 2.0 * d;

        Self {
            a: 6.0 * p - 3.0 * v + 0.5 * acc,
            b: -15.0 * p + 7.0 * v - acc,
            c: 10.0 * p - 4.0 * v + 0.5 * acc,
            d,
            e,
            f,
        }
    }

    pub fn get(&self, t: f64) -> f64 {
        ((((self.a * t + self.b) * t + self.c) * t + self.d) * t + self.e) * t + self.f
    }

    pub fn deriv(&self, t: f64) -> f64 {
        (((5.0 * self.a * t + 4.0 * self.b) * t + 3.0 * self.c) * t + 2.0 * self.d) * t + self.e
    }

    pub fn second_deriv(&self, t: f64) -> f64 {
        ((20.0 * self.a * t + 12.0 * self.b) * t + 6.0 * self.c) * t + 2.0 * self.d
    }

    pub fn third_deriv(&self, t: f64) -> f64 {
        (60.0 * self.a * t + 24.0 * self.b) * t + 6.0 * self.c
    }
}

impl Waypoint {
    /// A waypoint with zero second derivative.
    pub fn new(x: f64, y: f64, dx: f64, dy: f64) -> Self {
        Self {
            x,
            y,
            dx,
            dy,
            d2x: 0.0,
            d2y: 0.0,
        }
    }

    pub fn pos(&self) -> Vector2d {
        Vector2d::new(self.x, self.y)
    }

    pub fn deriv(&self) -> Vector2d {
        Vector2d::new(self.dx, self.dy)
    }

    pub fn second_deriv(&self) -> Vector2d {
        Vector2d::new(self.d2x, self.d2y)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_boundary_values() {
        let poly = QuinticPolynomial::new(1.0, -2.0, 3.5, 10.0, 4.0, -1.25);

        assert!((poly.get(0.0) - 1.0).abs() < 1e-12);
        assert!((poly.deriv(0.0) + 2.0).abs() < 1e-12);
        assert!((poly.second_deriv(0.0) - 3.5).abs() < 1e-12);

        assert!((poly.get(1.0) - 10.0).abs() < 1e-9);
        assert!((poly.deriv(1.0) - 4.0).abs() < 1e-9);
        assert!((poly.second_deriv(1.0) + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_linear_reduces() {
        // Matching first derivatives and zero curvature give a straight line
        let poly = QuinticPolynomial::new(0.0, 10.0, 0.0, 10.0, 10.0, 0.0);

        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert!((poly.get(t) - 10.0 * t).abs() < 1e-12);
            assert!(poly.third_deriv(t).abs() < 1e-12);
        }
    }
}
