//! Conditional-gradient solve for the constrained mixing coefficients.
//!
//! Minimizes `cᵀGc` over the polytope `{c : Σc = 1, ‖c − c₀‖₁ ≤ C}`, where
//! `c₀` puts weight 1 on the newest iterate. Every vertex of that set has the
//! form `c₀ + (C/2)(eᵢ − eⱼ)`, so the linear-minimization oracle moves mass
//! from the coordinate with the largest gradient entry to the one with the
//! smallest. Only matrix-vector products with G are required, which keeps the
//! solve well-posed when G is ill-conditioned, and the radius bound caps the
//! extrapolation magnitude.

use crate::mixing::MixingError;
use ndarray::{Array1, Array2};

/// Result of a constrained coefficient solve.
#[derive(Debug, Clone)]
pub struct FrankWolfeOutcome {
    pub coefficients: Array1<f64>,
    /// Duality gap at the returned point; certifies optimality when below
    /// the requested tolerance.
    pub gap: f64,
    /// Whether the returned point sits on the L1 constraint boundary. Drives
    /// the radius continuation rule.
    pub on_boundary: bool,
}

/// The vertex the extrapolation starts from: weight 1 on the newest iterate.
pub fn trivial_vertex(len: usize) -> Array1<f64> {
    let mut vertex = Array1::zeros(len);
    vertex[len - 1] = 1.0;
    vertex
}

pub fn minimize_quadratic(
    gram: &Array2<f64>,
    radius: f64,
    tol: f64,
    max_iter: usize,
) -> Result<FrankWolfeOutcome, MixingError> {
    let k = gram.nrows();
    let origin = trivial_vertex(k);
    let mut c = origin.clone();
    let mut gap = f64::INFINITY;

    for _ in 0..max_iter {
        let mut gradient = gram.dot(&c);
        gradient *= 2.0;
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(MixingError::ConstrainedSolveFailure);
        }

        let (mut lowest, mut highest) = (0, 0);
        for i in 1..k {
            if gradient[i] < gradient[lowest] {
                lowest = i;
            }
            if gradient[i] > gradient[highest] {
                highest = i;
            }
        }
        let mut vertex = origin.clone();
        vertex[lowest] += 0.5 * radius;
        vertex[highest] -= 0.5 * radius;

        let direction = &vertex - &c;
        gap = -gradient.dot(&direction);
        if !gap.is_finite() {
            return Err(MixingError::ConstrainedSolveFailure);
        }
        if gap < tol || gap == 0.0 {
            break;
        }

        // Exact line search for the quadratic, clipped to the segment.
        let curvature = direction.dot(&gram.dot(&direction));
        let step = if curvature > 0.0 {
            (gap / (2.0 * curvature)).min(1.0)
        } else {
            1.0
        };
        c.scaled_add(step, &direction);
    }

    if c.iter().any(|v| !v.is_finite()) {
        return Err(MixingError::ConstrainedSolveFailure);
    }

    let l1_offset: f64 = c.iter().zip(&origin).map(|(a, b)| (a - b).abs()).sum();
    let on_boundary = l1_offset >= radius - 1e-9 * radius.max(1.0);
    Ok(FrankWolfeOutcome {
        coefficients: c,
        gap,
        on_boundary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixing::unconstrained_coefficients;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn coefficients_stay_on_the_affine_constraint() {
        let gram = array![[2.0, 0.3], [0.3, 1.0]];
        for radius in [0.1, 0.5, 2.0, 100.0] {
            let outcome = minimize_quadratic(&gram, radius, 1e-12, 10_000).expect("solve");
            assert_abs_diff_eq!(outcome.coefficients.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn small_radius_bounds_the_l1_offset_and_flags_the_boundary() {
        let gram = array![[2.0, 0.3], [0.3, 1.0]];
        let radius = 0.2;
        let outcome = minimize_quadratic(&gram, radius, 1e-12, 10_000).expect("solve");
        let origin = trivial_vertex(2);
        let offset: f64 = outcome
            .coefficients
            .iter()
            .zip(&origin)
            .map(|(a, b)| (a - b).abs())
            .sum();
        assert!(offset <= radius + 1e-9, "offset {offset} exceeds {radius}");
        assert!(outcome.on_boundary);
    }

    #[test]
    fn large_radius_recovers_the_hyperplane_optimum() {
        // For an inactive constraint the minimizer of cᵀGc over Σc = 1 is
        // G⁻¹1 normalized, which is what the closed-form path computes.
        let gram = array![
            [3.0, 0.2, -0.1],
            [0.2, 2.0, 0.4],
            [-0.1, 0.4, 1.5]
        ];
        let unconstrained = unconstrained_coefficients(&gram).expect("well-conditioned");
        let outcome = minimize_quadratic(&gram, 1e6, 1e-14, 50_000).expect("solve");
        for i in 0..3 {
            assert_abs_diff_eq!(outcome.coefficients[i], unconstrained[i], epsilon = 1e-6);
        }
        assert!(!outcome.on_boundary);
    }

    #[test]
    fn duality_gap_certifies_convergence() {
        let gram = array![[2.0, 0.3], [0.3, 1.0]];
        let tol = 1e-10;
        let outcome = minimize_quadratic(&gram, 5.0, tol, 10_000).expect("solve");
        assert!(outcome.gap < tol, "gap {} not below {tol}", outcome.gap);
    }

    #[test]
    fn single_column_window_returns_the_trivial_vertex() {
        let gram = array![[1.5]];
        let outcome = minimize_quadratic(&gram, 1.0, 1e-12, 100).expect("solve");
        assert_eq!(outcome.coefficients.len(), 1);
        assert_abs_diff_eq!(outcome.coefficients[0], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn non_finite_gram_is_a_recoverable_failure() {
        let gram = array![[f64::NAN, 0.0], [0.0, 1.0]];
        assert!(matches!(
            minimize_quadratic(&gram, 1.0, 1e-12, 100),
            Err(MixingError::ConstrainedSolveFailure)
        ));
    }
}
