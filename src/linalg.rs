//! Minimal ndarray/faer bridge for the small symmetric systems solved during
//! coefficient mixing.

use faer::diag::DiagRef;
use faer::linalg::solvers::{self, Solve};
use faer::{MatMut, MatRef, Side};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use std::marker::PhantomData;
use thiserror::Error;

pub use faer::linalg::solvers::{Ldlt as FaerLdlt, Llt as FaerLlt};

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Cholesky factorization failed: {0:?}")]
    Cholesky(solvers::LltError),
    #[error("LDLT factorization failed: {0:?}")]
    Ldlt(solvers::LdltError),
    #[error("Self-adjoint eigendecomposition failed: {0:?}")]
    SelfAdjointEigen(solvers::EvdError),
}

/// Zero-copy view of an ndarray matrix as a faer `MatRef`.
///
/// Layouts that faer kernels cannot traverse safely (negative or zero
/// strides) are materialized into a compact owned copy instead.
pub struct FaerArrayView<'a> {
    ptr: *const f64,
    rows: usize,
    cols: usize,
    row_stride: isize,
    col_stride: isize,
    owned: Option<Array2<f64>>,
    _marker: PhantomData<&'a f64>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let (rows, cols) = array.dim();
        let strides = array.strides();
        if strides[0] <= 0 || strides[1] <= 0 {
            let owned = array.to_owned();
            let owned_strides = owned.strides();
            return Self {
                ptr: owned.as_ptr(),
                rows,
                cols,
                row_stride: owned_strides[0],
                col_stride: owned_strides[1],
                owned: Some(owned),
                _marker: PhantomData,
            };
        }
        Self {
            ptr: array.as_ptr(),
            rows,
            cols,
            row_stride: strides[0],
            col_stride: strides[1],
            owned: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        let (ptr, rows, cols, row_stride, col_stride) = if let Some(owned) = &self.owned {
            let strides = owned.strides();
            (
                owned.as_ptr(),
                owned.nrows(),
                owned.ncols(),
                strides[0],
                strides[1],
            )
        } else {
            (
                self.ptr,
                self.rows,
                self.cols,
                self.row_stride,
                self.col_stride,
            )
        };
        // SAFETY: pointer, shape, and strides come straight from a live
        // ndarray borrow (or the owned fallback), both of which outlive self.
        unsafe { MatRef::from_raw_parts(ptr, rows, cols, row_stride, col_stride) }
    }
}

#[inline]
pub fn array1_to_col_mat_mut(array: &mut Array1<f64>) -> MatMut<'_, f64> {
    let len = array.len();
    let stride = array.strides()[0];
    // SAFETY: raw parts of a uniquely borrowed ndarray vector; the column
    // stride is irrelevant for a single column.
    unsafe { MatMut::from_raw_parts_mut(array.as_mut_ptr(), len, 1, stride, 0) }
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((mat.nrows(), mat.ncols()));
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            out[[i, j]] = mat[(i, j)];
        }
    }
    out
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    let mut out = Array1::<f64>::zeros(mat.nrows());
    for i in 0..mat.nrows() {
        out[i] = mat[(i, 0)];
    }
    out
}

/// Self-adjoint eigendecomposition returning `(eigenvalues, eigenvectors)`.
pub trait FaerEigh {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerEigh for ArrayBase<S, Ix2> {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
        let faer_view = FaerArrayView::new(self);
        let eigen = faer_view
            .as_ref()
            .self_adjoint_eigen(side)
            .map_err(FaerLinalgError::SelfAdjointEigen)?;
        let values = diag_to_array(eigen.S());
        let vectors = mat_to_array(eigen.U());
        Ok((values, vectors))
    }
}

pub enum FaerSymmetricFactor {
    Llt(FaerLlt<f64>),
    Ldlt(FaerLdlt<f64>),
}

impl FaerSymmetricFactor {
    pub fn solve_vec(&self, rhs: &Array1<f64>) -> Array1<f64> {
        let mut out = rhs.to_owned();
        let mut out_view = array1_to_col_mat_mut(&mut out);
        match self {
            FaerSymmetricFactor::Llt(f) => f.solve_in_place(out_view.as_mut()),
            FaerSymmetricFactor::Ldlt(f) => f.solve_in_place(out_view.as_mut()),
        }
        out
    }
}

/// Factorize a symmetric system with an LLT first attempt and LDLT fallback.
#[inline]
pub fn factorize_symmetric_with_fallback(
    matrix: MatRef<'_, f64>,
    side: Side,
) -> Result<FaerSymmetricFactor, FaerLinalgError> {
    if let Ok(llt) = FaerLlt::new(matrix, side) {
        return Ok(FaerSymmetricFactor::Llt(llt));
    }
    let ldlt = FaerLdlt::new(matrix, side).map_err(FaerLinalgError::Ldlt)?;
    Ok(FaerSymmetricFactor::Ldlt(ldlt))
}

/// Solve `A x = b` for symmetric `A`.
pub fn solve_symmetric(
    matrix: &Array2<f64>,
    rhs: &Array1<f64>,
) -> Result<Array1<f64>, FaerLinalgError> {
    let view = FaerArrayView::new(matrix);
    let factor = factorize_symmetric_with_fallback(view.as_ref(), Side::Lower)?;
    Ok(factor.solve_vec(rhs))
}

/// Spectral norm of a symmetric matrix (largest absolute eigenvalue).
pub fn symmetric_spectral_norm(matrix: &Array2<f64>) -> Result<f64, FaerLinalgError> {
    let (values, _) = matrix.eigh(Side::Lower)?;
    Ok(values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solve_symmetric_recovers_known_solution() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let x_true = array![0.5, -2.0];
        let b = a.dot(&x_true);
        let x = solve_symmetric(&a, &b).expect("well-conditioned solve");
        for i in 0..2 {
            assert!((x[i] - x_true[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn indefinite_system_uses_ldlt_fallback() {
        // Indefinite (eigenvalues 3 and -1) but nonsingular: LLT must fail,
        // LDLT must succeed.
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        let x_true = array![1.0, -1.0];
        let b = a.dot(&x_true);
        let x = solve_symmetric(&a, &b).expect("ldlt fallback");
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn exactly_singular_system_is_an_error() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let b = array![1.0, 1.0];
        assert!(solve_symmetric(&a, &b).is_err());
    }

    #[test]
    fn spectral_norm_matches_hand_computed_eigenvalues() {
        // Eigenvalues 3 and 1.
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let norm = symmetric_spectral_norm(&a).expect("eigh");
        assert!((norm - 3.0).abs() < 1e-10);
    }

    #[test]
    fn eigh_reproduces_matrix_from_factors() {
        let a = array![[2.0, 0.5, 0.0], [0.5, 1.0, -0.3], [0.0, -0.3, 0.7]];
        let (values, vectors) = a.eigh(Side::Lower).expect("eigh");
        let lambda = Array2::from_diag(&values);
        let rebuilt = vectors.dot(&lambda).dot(&vectors.t());
        for i in 0..3 {
            for j in 0..3 {
                assert!((rebuilt[[i, j]] - a[[i, j]]).abs() < 1e-10);
            }
        }
    }
}
