//! # Heading interpolation
//!
//! A heading interpolator gives the robot's heading along a curve, along with
//! its first and second derivatives with respect to arc length. Headings are
//! continuous (not wrapped), wrapping is applied when a pose is built.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::curve::{CurvePoint, ParametricCurve};
use super::poly::QuinticPolynomial;
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Heading and its arc length derivatives at one point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct HeadingState {
    pub heading: f64,
    pub deriv: f64,
    pub second_deriv: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HeadingInterpolator {
    /// Face along the curve's tangent.
    Tangent,

    /// Hold a fixed heading.
    Constant(f64),

    /// Rotate at a constant rate from `start_heading` by `angle`.
    Linear { start_heading: f64, angle: f64 },

    /// Quintic in normalised arc length, matched to the tangent heading
    /// derivatives at both ends of the curve.
    Spline { poly: QuinticPolynomial },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingInterpolator {
    /// Linear interpolation taking the shortest way round between the two
    /// headings.
    pub fn linear(start_heading: f64, end_heading: f64) -> Self {
        HeadingInterpolator::Linear {
            start_heading,
            angle: get_ang_dist(start_heading, end_heading),
        }
    }

    /// Spline interpolation between two headings along `curve`.
    pub fn spline(curve: &ParametricCurve, start_heading: f64, end_heading: f64) -> Self {
        let len = curve.length();
        let start = curve.point(0.0);
        let end = curve.point(len);

        let poly = QuinticPolynomial::new(
            start_heading,
            start.tangent_angle_deriv() * len,
            start.tangent_angle_second_deriv() * len * len,
            start_heading + get_ang_dist(start_heading, end_heading),
            end.tangent_angle_deriv() * len,
            end.tangent_angle_second_deriv() * len * len,
        );

        HeadingInterpolator::Spline { poly }
    }

    /// Whether joining this to a tangent segment keeps the heading derivative
    /// continuous.
    pub fn respects_derivative_continuity(&self) -> bool {
        match self {
            HeadingInterpolator::Tangent | HeadingInterpolator::Spline { .. } => true,
            HeadingInterpolator::Constant(_) | HeadingInterpolator::Linear { .. } => false,
        }
    }

    /// Evaluate at arc length `s` along a curve of length `length`, given the
    /// curve's point at `s`.
    pub fn evaluate(&self, s: f64, length: f64, point: &CurvePoint) -> HeadingState {
        match *self {
            HeadingInterpolator::Tangent => HeadingState {
                heading: point.tangent_angle(),
                deriv: point.tangent_angle_deriv(),
                second_deriv: point.tangent_angle_second_deriv(),
            },
            HeadingInterpolator::Constant(heading) => HeadingState {
                heading,
                ..Default::default()
            },
            HeadingInterpolator::Linear {
                start_heading,
                angle,
            } => {
                if length <= 0.0 {
                    return HeadingState {
                        heading: start_heading,
                        ..Default::default()
                    };
                }

                HeadingState {
                    heading: start_heading + angle * s / length,
                    deriv: angle / length,
                    second_deriv: 0.0,
                }
            }
            HeadingInterpolator::Spline { ref poly } => {
                if length <= 0.0 {
                    return HeadingState {
                        heading: poly.get(0.0),
                        ..Default::default()
                    };
                }

                let u = s / length;
                HeadingState {
                    heading: poly.get(u),
                    deriv: poly.deriv(u) / length,
                    second_deriv: poly.second_deriv(u) / (length * length),
                }
            }
        }
    }

    pub fn get(&self, curve: &ParametricCurve, s: f64) -> f64 {
        self.evaluate(s, curve.length(), &curve.point(s)).heading
    }

    pub fn deriv(&self, curve: &ParametricCurve, s: f64) -> f64 {
        self.evaluate(s, curve.length(), &curve.point(s)).deriv
    }

    pub fn second_deriv(&self, curve: &ParametricCurve, s: f64) -> f64 {
        self.evaluate(s, curve.length(), &curve.point(s)).second_deriv
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::poly::Waypoint;
    use std::f64::consts::PI;

    fn test_spline() -> ParametricCurve {
        ParametricCurve::quintic_spline(
            Waypoint::new(0.0, 0.0, 20.0, 40.0),
            Waypoint::new(45.0, 35.0, 60.0, 10.0),
        )
    }

    fn check_consistency(interp: &HeadingInterpolator, curve: &ParametricCurve) {
        let length = curve.length();
        let ds = length / 1000.0;

        for i in 1..1000 {
            let s = i as f64 * ds;

            let num_deriv =
                (interp.get(curve, s + ds) - interp.get(curve, s - ds)) / (2.0 * ds);
            let deriv = interp.deriv(curve, s);
            assert!((num_deriv - deriv).abs() < 1e-2 * deriv.abs().max(1.0));

            let num_second =
                (interp.deriv(curve, s + ds) - interp.deriv(curve, s - ds)) / (2.0 * ds);
            let second = interp.second_deriv(curve, s);
            assert!((num_second - second).abs() < 1e-2 * second.abs().max(1.0));
        }
    }

    #[test]
    fn test_constant() {
        let curve = test_spline();
        let interp = HeadingInterpolator::Constant(1.0);

        assert_eq!(interp.get(&curve, 10.0), 1.0);
        assert_eq!(interp.deriv(&curve, 10.0), 0.0);
        assert!(!interp.respects_derivative_continuity());
    }

    #[test]
    fn test_linear() {
        let curve = test_spline();
        let length = curve.length();

        // Shortest way from 3 rad to -3 rad is anticlockwise through pi
        let interp = HeadingInterpolator::linear(3.0, -3.0);
        assert!((interp.get(&curve, 0.0) - 3.0).abs() < 1e-12);
        assert!((interp.get(&curve, length) - (2.0 * PI - 3.0)).abs() < 1e-9);

        check_consistency(&interp, &curve);
    }

    #[test]
    fn test_tangent() {
        let curve = test_spline();
        let interp = HeadingInterpolator::Tangent;

        let expected = 40f64.atan2(20.0);
        assert!((interp.get(&curve, 0.0) - expected).abs() < 1e-9);
        assert!(interp.respects_derivative_continuity());

        check_consistency(&interp, &curve);
    }

    #[test]
    fn test_spline_interp() {
        let curve = test_spline();
        let length = curve.length();
        let interp = HeadingInterpolator::spline(&curve, 0.0, PI / 2.0);

        assert!(interp.get(&curve, 0.0).abs() < 1e-9);
        assert!((interp.get(&curve, length) - PI / 2.0).abs() < 1e-9);

        // End derivatives match the tangent heading
        let tangent = HeadingInterpolator::Tangent;
        assert!((interp.deriv(&curve, 0.0) - tangent.deriv(&curve, 0.0)).abs() < 1e-9);
        assert!((interp.deriv(&curve, length) - tangent.deriv(&curve, length)).abs() < 1e-9);

        check_consistency(&interp, &curve);
    }
}
