//! Residual and Gram matrix construction plus the closed-form coefficient
//! solve used when no constraint radius is configured.

use crate::linalg::{solve_symmetric, symmetric_spectral_norm};
use ndarray::{Array1, Array2, s};
use thiserror::Error;

/// Recoverable failures of a coefficient solve. The driver reacts to both by
/// keeping the previously accepted coefficients for the current cycle.
#[derive(Debug, Error)]
pub enum MixingError {
    #[error("Gram system is numerically singular")]
    SingularSystem,
    #[error("constrained coefficient solve broke down")]
    ConstrainedSolveFailure,
}

/// Residual matrix of a temporally ordered snapshot: column k is the
/// difference between iterates k+1 and k.
pub fn residual_matrix(snapshot: &Array2<f64>) -> Array2<f64> {
    let windows = snapshot.ncols() - 1;
    let mut residuals = Array2::zeros((snapshot.nrows(), windows));
    for k in 0..windows {
        let step = &snapshot.column(k + 1) - &snapshot.column(k);
        residuals.column_mut(k).assign(&step);
    }
    residuals
}

/// `G = RᵀR`. Symmetric positive-semidefinite; near-singular when residuals
/// are collinear.
pub fn gram_matrix(residuals: &Array2<f64>) -> Array2<f64> {
    residuals.t().dot(residuals)
}

/// Tikhonov term scaled by the spectral norm: `G ← G + amount·‖G‖₂·I`.
///
/// Trades a small bias for conditioning before the direct solve; the
/// constrained path never inverts G and does not use this.
pub fn regularize_gram(gram: &mut Array2<f64>, amount: f64) -> Result<(), MixingError> {
    let scale = symmetric_spectral_norm(gram).map_err(|err| {
        log::debug!("spectral norm for Gram regularization failed: {err}");
        MixingError::SingularSystem
    })?;
    let shift = amount * scale;
    for i in 0..gram.nrows() {
        gram[[i, i]] += shift;
    }
    Ok(())
}

/// Closed-form mixing coefficients: solve `G·z = 1` and normalize to sum 1.
pub fn unconstrained_coefficients(gram: &Array2<f64>) -> Result<Array1<f64>, MixingError> {
    let ones = Array1::ones(gram.nrows());
    let z = solve_symmetric(gram, &ones).map_err(|err| {
        log::debug!("Gram factorization failed: {err}");
        MixingError::SingularSystem
    })?;
    let total: f64 = z.sum();
    if !total.is_finite() || total.abs() < f64::MIN_POSITIVE || z.iter().any(|v| !v.is_finite()) {
        return Err(MixingError::SingularSystem);
    }
    Ok(z / total)
}

/// Extrapolated iterate: the K newest snapshot columns weighted by the
/// mixing coefficients (the oldest slot is excluded).
pub fn extrapolate(snapshot: &Array2<f64>, coefficients: &Array1<f64>) -> Array1<f64> {
    snapshot.slice(s![.., 1..]).dot(coefficients)
}
