//! Numerics for collision timing
//!
//! - `bairstow`: real roots of arbitrary-degree polynomials
//! - `frame`: rotation into a velocity-aligned frame
//! - [`RootFinder`]: smallest non-negative contact time with the degenerate
//!   cases handled up front

pub mod bairstow;
pub mod frame;

use thiserror::Error;

pub use bairstow::{evaluate, real_roots};
pub use frame::Frame;

use crate::settings::SimSettings;

/// Numerical failure inside the root finder
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    #[error("Quadratic factor did not converge after {iterations} iterations")]
    NonConvergence { iterations: u32 },
}

/// Finds the first time a separation polynomial reaches zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootFinder {
    pub epsilon: f64,
    pub max_iterations: u32,
}

impl RootFinder {
    pub fn new(epsilon: f64, max_iterations: u32) -> Self {
        Self {
            epsilon,
            max_iterations,
        }
    }

    pub fn from_settings(settings: &SimSettings) -> Self {
        Self::new(settings.root_epsilon, settings.max_iterations)
    }

    /// Smallest root `t ≥ 0` of the ascending-order polynomial `coeffs`.
    ///
    /// The polynomial is a separation measure: positive while apart, zero at
    /// contact. When it starts at (or below) zero the answer is decided by
    /// the first non-negligible derivative term: closing in means contact is
    /// now. A pair touching and moving apart can still meet again later; that
    /// time is a root of the polynomial with the zero root divided out.
    pub fn min_non_negative_root(&self, coeffs: &[f64]) -> Result<Option<f64>, SolverError> {
        let Some((&c0, rest)) = coeffs.split_first() else {
            return Ok(None);
        };

        if c0 < self.epsilon {
            let closing = rest
                .iter()
                .find(|c| c.abs() >= self.epsilon)
                .is_some_and(|c| *c < 0.0);
            if closing {
                return Ok(Some(0.0));
            }
            if c0 <= -self.epsilon {
                // Overlapping and separating: no contact to report
                return Ok(None);
            }
            // Touching and separating is not "no root" here: the pair can
            // still meet again later, so drop the t = 0 root and keep looking.
            // The epsilon band is absolute while the coefficients carry
            // different units (m², m²/s, ...), so "significant" depends on
            // the scale of the setup.
            return Ok(self.min_non_negative_root(rest)?.filter(|t| *t > self.epsilon));
        }

        // Every term pulls the same way as the constant: never reaches zero
        if rest.iter().all(|c| *c >= 0.0) {
            return Ok(None);
        }

        let roots = real_roots(coeffs, self.epsilon, self.max_iterations)?;
        Ok(roots
            .into_iter()
            .filter(|t| *t >= -self.epsilon)
            .map(|t| t.max(0.0))
            .min_by(|a, b| a.total_cmp(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn finder() -> RootFinder {
        RootFinder::from_settings(&SimSettings::default())
    }

    #[test]
    fn test_touching_and_closing_is_immediate() {
        assert_eq!(finder().min_non_negative_root(&[0.0, -1.0, 0.5]).unwrap(), Some(0.0));
    }

    #[test]
    fn test_touching_and_separating_is_none() {
        assert_eq!(finder().min_non_negative_root(&[1e-9, 2.0, 1.0]).unwrap(), None);
        assert_eq!(finder().min_non_negative_root(&[-1e-3, 2.0, -1.0]).unwrap(), None);
    }

    #[test]
    fn test_separating_pair_meets_again() {
        // t·(2 - t): apart until t = 2
        let t = finder().min_non_negative_root(&[1e-9, 2.0, -1.0]).unwrap().unwrap();
        assert!((t - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_first_significant_derivative_decides() {
        // Linear term negligible, quadratic term closing
        assert_eq!(finder().min_non_negative_root(&[0.0, 1e-9, -3.0]).unwrap(), Some(0.0));
    }

    #[test]
    fn test_same_signs_fast_reject() {
        assert_eq!(finder().min_non_negative_root(&[1.0, 0.0, 2.0, 1.0, 3.0]).unwrap(), None);
    }

    #[test]
    fn test_only_negative_roots() {
        // (t + 1)(t + 2)
        assert_eq!(finder().min_non_negative_root(&[2.0, 3.0, 1.0]).unwrap(), None);
    }

    #[test]
    fn test_quadratic_smallest_positive() {
        // (t - 1)(t - 2)
        let t = finder().min_non_negative_root(&[2.0, -3.0, 1.0]).unwrap();
        assert!((t.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_quadratic_finds_earlier_root() {
        // 0.5·(t - 0.2)(t - 0.8)
        let t = finder().min_non_negative_root(&[0.08, -0.5, 0.5]).unwrap().unwrap();
        assert!((t - 0.2).abs() < 1e-9, "t = {t}");
    }

    #[test]
    fn test_quartic_smallest_positive() {
        // (t - 0.3)(t - 0.7)(t + 1)(t + 2)
        let coeffs = [0.42, -1.37, -0.79, 2.0, 1.0];
        let t = finder().min_non_negative_root(&coeffs).unwrap().unwrap();
        assert!((t - 0.3).abs() < 1e-6, "t = {t}");
    }

    #[test]
    fn test_empty_polynomial() {
        assert_eq!(finder().min_non_negative_root(&[]).unwrap(), None);
    }

    proptest! {
        #[test]
        fn prop_recovers_smallest_positive_root(
            r1 in 0.01f64..5.0,
            gap in 0.05f64..5.0,
            neg in 0.1f64..5.0,
            scale in 0.5f64..4.0,
        ) {
            // scale·(t - r1)(t - r1 - gap)(t + neg)
            let r2 = r1 + gap;
            let coeffs = [
                scale * r1 * r2 * neg,
                scale * (r1 * r2 - r1 * neg - r2 * neg),
                scale * (neg - r1 - r2),
                scale,
            ];
            let t = finder().min_non_negative_root(&coeffs).unwrap();
            prop_assert!(t.is_some());
            prop_assert!((t.unwrap() - r1).abs() < 1e-5, "t = {:?}, r1 = {}", t, r1);
        }

        #[test]
        fn prop_no_root_when_complex_pair_and_negative_root(
            re in -3.0f64..3.0,
            im in 0.5f64..3.0,
            neg in 0.1f64..5.0,
        ) {
            // (t² - 2·re·t + re² + im²)(t + neg)
            let q0 = re * re + im * im;
            let q1 = -2.0 * re;
            let coeffs = [q0 * neg, q0 + q1 * neg, q1 + neg, 1.0];
            prop_assert_eq!(finder().min_non_negative_root(&coeffs).unwrap(), None);
        }
    }
}
