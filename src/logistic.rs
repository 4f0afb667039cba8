use crate::matrix::DesignMatrix;
use ndarray::{Array1, Zip};

/// L2-regularized logistic regression problem.
///
/// Minimizes `Σ log(1 + exp(-yᵢ·xᵢᵀw)) + rho/2·‖w‖²` for labels in {-1, +1}.
/// The struct only evaluates; it never mutates the data it borrows.
pub struct LogisticProblem<'a> {
    x: &'a DesignMatrix,
    y: &'a Array1<f64>,
    rho: f64,
}

impl<'a> LogisticProblem<'a> {
    pub fn new(x: &'a DesignMatrix, y: &'a Array1<f64>, rho: f64) -> Self {
        Self { x, y, rho }
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// `X·w`, the linear predictor the driver caches between steps.
    pub fn linear_predictor(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.x.matrix_vector_multiply(weights)
    }

    /// Gradient `-Xᵀ(y ⊘ (1 + exp(y ⊙ Xw))) + rho·w` at `weights`, reusing a
    /// previously computed linear predictor.
    pub fn gradient_from_predictor(
        &self,
        weights: &Array1<f64>,
        predictor: &Array1<f64>,
    ) -> Array1<f64> {
        let mut scaled = Array1::<f64>::zeros(self.y.len());
        Zip::from(&mut scaled)
            .and(self.y)
            .and(predictor)
            .for_each(|s, &label, &eta| {
                *s = label / (1.0 + (label * eta).exp());
            });
        let mut gradient = self.x.transpose_vector_multiply(&scaled);
        gradient.mapv_inplace(|g| -g);
        gradient.scaled_add(self.rho, weights);
        gradient
    }

    /// Objective value at `weights`; diagnostic only, the solver steers on
    /// gradient norms.
    pub fn objective(&self, weights: &Array1<f64>, predictor: &Array1<f64>) -> f64 {
        let mut loss = 0.0;
        Zip::from(self.y).and(predictor).for_each(|&label, &eta| {
            // log(1 + exp(t)) evaluated without overflow for large |t|.
            let t = -label * eta;
            loss += t.max(0.0) + (-t.abs()).exp().ln_1p();
        });
        loss + 0.5 * self.rho * weights.dot(weights)
    }
}
