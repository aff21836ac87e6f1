//! Bairstow's method
//!
//! Real roots of a real polynomial by repeatedly extracting quadratic factors
//! `x² - r·x - s`. Each factor is found with a two-variable Newton correction
//! on `(r, s)`; the quotient is then deflated and the process repeats until a
//! linear or quadratic remainder is left.
//!
//! Coefficients are passed in ascending order: `c[0] + c[1]·x + ... + c[n]·xⁿ`.

use super::SolverError;

/// Seeds tried after the near-origin guess fails to converge
const FALLBACK_SEEDS: [(f64, f64); 4] = [(0.5, -0.5), (-1.0, 1.0), (1.0, 1.0), (100.0, -100.0)];

/// Newton steps spent polishing each root on the undeflated polynomial
const POLISH_STEPS: usize = 8;

/// Every real root of the polynomial (with multiplicity, unordered).
///
/// Leading coefficients smaller than `epsilon` are dropped before solving,
/// and `max_iterations` bounds the total work spent finding factors.
pub fn real_roots(coeffs: &[f64], epsilon: f64, max_iterations: u32) -> Result<Vec<f64>, SolverError> {
    let degree = match coeffs.iter().rposition(|c| c.abs() >= epsilon) {
        Some(d) => d,
        None => return Ok(Vec::new()),
    };
    let poly = &coeffs[..=degree];

    let mut roots = Vec::with_capacity(degree);

    // Descending, monic working copy
    let lead = poly[degree];
    let mut a: Vec<f64> = poly.iter().rev().map(|c| c / lead).collect();

    // Roots at the origin
    while a.len() > 3 && a[a.len() - 1].abs() < epsilon {
        a.pop();
        roots.push(0.0);
    }

    let mut budget = max_iterations;
    while a.len() > 3 {
        let (r, s, quotient) = extract_quadratic(&a, epsilon, &mut budget)?;
        push_factor_roots(r, s, &mut roots);
        a = quotient;
    }

    match a.len() {
        3 => push_quadratic_roots(a[0], a[1], a[2], &mut roots),
        2 => roots.push(-a[1] / a[0]),
        _ => {}
    }

    Ok(roots
        .into_iter()
        .filter_map(|root| polish(poly, root, epsilon))
        .collect())
}

/// Evaluate an ascending-order polynomial (Horner)
pub fn evaluate(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Evaluate an ascending-order polynomial and its derivative
fn evaluate_with_derivative(coeffs: &[f64], x: f64) -> (f64, f64) {
    let mut value = 0.0;
    let mut slope = 0.0;
    for c in coeffs.iter().rev() {
        slope = slope * x + value;
        value = value * x + c;
    }
    (value, slope)
}

/// Find a quadratic factor of the monic descending polynomial `a`
/// (degree ≥ 3). Returns `(r, s, quotient)` with the quotient descending.
fn extract_quadratic(a: &[f64], epsilon: f64, budget: &mut u32) -> Result<(f64, f64, Vec<f64>), SolverError> {
    let n = a.len() - 1;
    let mut b = vec![0.0; n + 1];
    let mut c = vec![0.0; n + 1];

    let near_origin = (a[n - 2].abs() >= epsilon)
        .then(|| (-a[n - 1] / a[n - 2], -a[n] / a[n - 2]))
        .filter(|(r, s)| r.is_finite() && s.is_finite());

    let mut spent = 0;
    for (mut r, mut s) in near_origin.into_iter().chain(FALLBACK_SEEDS) {
        loop {
            if *budget == 0 {
                return Err(SolverError::NonConvergence { iterations: spent });
            }
            *budget -= 1;
            spent += 1;

            b[0] = a[0];
            b[1] = a[1] + r * b[0];
            for j in 2..=n {
                b[j] = a[j] + r * b[j - 1] + s * b[j - 2];
            }
            c[0] = b[0];
            c[1] = b[1] + r * c[0];
            for j in 2..n {
                c[j] = b[j] + r * c[j - 1] + s * c[j - 2];
            }

            let det = c[n - 2] * c[n - 2] - c[n - 1] * c[n - 3];
            if det == 0.0 || !det.is_finite() {
                break;
            }
            let dr = (-b[n - 1] * c[n - 2] + b[n] * c[n - 3]) / det;
            let ds = (-b[n] * c[n - 2] + b[n - 1] * c[n - 1]) / det;
            r += dr;
            s += ds;
            if !(r.is_finite() && s.is_finite()) {
                break;
            }

            if dr.abs() <= epsilon * (1.0 + r.abs()) && ds.abs() <= epsilon * (1.0 + s.abs()) {
                // Recompute the quotient for the converged factor
                b[0] = a[0];
                b[1] = a[1] + r * b[0];
                for j in 2..=n - 2 {
                    b[j] = a[j] + r * b[j - 1] + s * b[j - 2];
                }
                return Ok((r, s, b[..=n - 2].to_vec()));
            }
        }
    }

    Err(SolverError::NonConvergence { iterations: spent })
}

/// Roots of `x² - r·x - s`
fn push_factor_roots(r: f64, s: f64, roots: &mut Vec<f64>) {
    push_quadratic_roots(1.0, -r, -s, roots);
}

/// Real roots of `a·x² + b·x + c` using the cancellation-free form
fn push_quadratic_roots(a: f64, b: f64, c: f64, roots: &mut Vec<f64>) {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return;
    }
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    if q == 0.0 {
        roots.push(0.0);
        roots.push(0.0);
        return;
    }
    roots.push(q / a);
    roots.push(c / q);
}

/// A few Newton steps against the full polynomial to undo deflation error.
/// `None` when the residual stays large relative to the size of the terms.
fn polish(poly: &[f64], mut x: f64, epsilon: f64) -> Option<f64> {
    let (mut value, _) = evaluate_with_derivative(poly, x);
    for _ in 0..POLISH_STEPS {
        let (_, slope) = evaluate_with_derivative(poly, x);
        if slope == 0.0 || value == 0.0 {
            break;
        }
        let next = x - value / slope;
        let (next_value, _) = evaluate_with_derivative(poly, next);
        if !next.is_finite() || next_value.abs() >= value.abs() {
            break;
        }
        x = next;
        value = next_value;
    }

    let scale = poly.iter().rev().fold(0.0, |acc, c| acc * x.abs() + c.abs());
    if value.abs() <= epsilon * scale {
        Some(x)
    } else {
        log::debug!("discarding root candidate {x}: residual {value:e} against term size {scale:e}");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 5e-6;

    fn sorted(mut v: Vec<f64>) -> Vec<f64> {
        v.sort_by(|a, b| a.total_cmp(b));
        v
    }

    /// Ascending coefficients of ∏(x - rᵢ)
    fn from_roots(roots: &[f64]) -> Vec<f64> {
        let mut coeffs = vec![1.0];
        for r in roots {
            let mut next = vec![0.0; coeffs.len() + 1];
            for (i, c) in coeffs.iter().enumerate() {
                next[i + 1] += c;
                next[i] -= r * c;
            }
            coeffs = next;
        }
        coeffs
    }

    fn assert_roots(found: Vec<f64>, expected: &[f64]) {
        let found = sorted(found);
        assert_eq!(found.len(), expected.len(), "roots {found:?}");
        for (f, e) in found.iter().zip(sorted(expected.to_vec())) {
            assert!((f - e).abs() < 1e-6, "found {found:?}, expected {expected:?}");
        }
    }

    #[test]
    fn test_linear() {
        assert_roots(real_roots(&[-3.0, 2.0], EPS, 100).unwrap(), &[1.5]);
    }

    #[test]
    fn test_quadratic_without_real_roots() {
        assert!(real_roots(&[1.0, 0.0, 1.0], EPS, 100).unwrap().is_empty());
    }

    #[test]
    fn test_cubic() {
        let coeffs = from_roots(&[0.5, -2.0, 3.0]);
        assert_roots(real_roots(&coeffs, EPS, 10_000).unwrap(), &[0.5, -2.0, 3.0]);
    }

    #[test]
    fn test_quartic() {
        let coeffs = from_roots(&[0.25, 1.0, 2.0, -4.0]);
        assert_roots(real_roots(&coeffs, EPS, 10_000).unwrap(), &[0.25, 1.0, 2.0, -4.0]);
    }

    #[test]
    fn test_quartic_with_complex_pair() {
        // (x² + 1)(x - 1)(x - 2)
        let coeffs = [2.0, -3.0, 3.0, -3.0, 1.0];
        assert_roots(real_roots(&coeffs, EPS, 10_000).unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_quadratic_remainder_keeps_both_roots() {
        // 0.5·(x - 0.2)(x - 0.8)
        assert_roots(real_roots(&[0.08, -0.5, 0.5], EPS, 100).unwrap(), &[0.2, 0.8]);
        // Quartic whose last factor is left as a quadratic remainder
        let coeffs = from_roots(&[0.1, 0.4, 3.0, 7.0]);
        assert_roots(real_roots(&coeffs, EPS, 10_000).unwrap(), &[0.1, 0.4, 3.0, 7.0]);
    }

    #[test]
    fn test_polish_rejects_non_root() {
        // x² + 1 has nothing near 0.3
        assert_eq!(polish(&[1.0, 0.0, 1.0], 0.3, EPS), None);
        let root = polish(&[2.0, -3.0, 1.0], 1.01, EPS).unwrap();
        assert!((root - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_root_at_origin_is_deflated() {
        // x(x - 1)(x + 2)
        let coeffs = [0.0, -2.0, 1.0, 1.0];
        assert_roots(real_roots(&coeffs, EPS, 10_000).unwrap(), &[0.0, 1.0, -2.0]);
    }

    #[test]
    fn test_tiny_leading_coefficient_is_trimmed() {
        // Effectively 2x - 1
        let coeffs = [-1.0, 2.0, 1e-9];
        assert_roots(real_roots(&coeffs, EPS, 100).unwrap(), &[0.5]);
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_eq!(evaluate(&[], 2.0), 0.0);
    }

    #[test]
    fn test_zero_budget_fails() {
        let coeffs = from_roots(&[0.5, -2.0, 3.0]);
        assert!(matches!(
            real_roots(&coeffs, EPS, 0),
            Err(SolverError::NonConvergence { .. })
        ));
    }
}
