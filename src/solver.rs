//! Gradient-descent driver with optional Anderson extrapolation.

use crate::buffer::IterateBuffer;
use crate::frank_wolfe::{minimize_quadratic, trivial_vertex};
use crate::logistic::LogisticProblem;
use crate::matrix::DesignMatrix;
use crate::mixing::{
    extrapolate, gram_matrix, regularize_gram, residual_matrix, unconstrained_coefficients,
};
use crate::radius::RadiusSchedule;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Inner iteration cap for the Frank-Wolfe coefficient solve.
const FW_MAX_ITER: usize = 5_000;
/// The Frank-Wolfe gap tolerance is this fraction of the first residual norm.
const FW_TOL_SCALE: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid solver input: {0}")]
    InvalidInput(String),
}

/// Why a run stopped. All three are normal completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Gradient norm dropped below the configured tolerance.
    Converged,
    MaxIterationsReached,
    TimeBudgetExhausted,
}

fn default_max_iter() -> usize {
    10_000
}

fn default_max_time() -> f64 {
    100.0
}

fn default_tol() -> f64 {
    1e-4
}

fn default_f_grad() -> usize {
    10
}

fn default_window() -> usize {
    5
}

/// Solver configuration.
///
/// `c0 = None` selects the closed-form (unconstrained) coefficient solve;
/// `c0 = Some(radius)` selects the Frank-Wolfe solve, with `adaptive_c`
/// controlling whether the radius follows the gradient-norm schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// L2 regularization strength.
    #[serde(default)]
    pub rho: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Wall-clock budget in seconds, checked once per iteration.
    #[serde(default = "default_max_time")]
    pub max_time: f64,
    /// Early-exit threshold on the gradient norm.
    #[serde(default = "default_tol")]
    pub tol: f64,
    /// Gradient-norm sampling cadence in iterations.
    #[serde(default = "default_f_grad")]
    pub f_grad: usize,
    /// Number of residual columns used for extrapolation; the iterate buffer
    /// holds k + 1 points.
    #[serde(default = "default_window")]
    pub k: usize,
    #[serde(default)]
    pub use_acc: bool,
    /// Base L1 constraint radius for the Frank-Wolfe solve.
    #[serde(default)]
    pub c0: Option<f64>,
    #[serde(default)]
    pub adaptive_c: bool,
    /// Spectral-norm-scaled Tikhonov amount for the unconstrained solve.
    #[serde(default)]
    pub reg_amount: Option<f64>,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rho: 0.0,
            max_iter: default_max_iter(),
            max_time: default_max_time(),
            tol: default_tol(),
            f_grad: default_f_grad(),
            k: default_window(),
            use_acc: false,
            c0: None,
            adaptive_c: false,
            reg_amount: None,
            verbose: false,
        }
    }
}

/// Gradient norms and elapsed seconds sampled every `f_grad` iterations.
/// Both sequences are append-only and always equal in length.
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    pub gradient_norms: Vec<f64>,
    pub elapsed: Vec<f64>,
}

impl MetricsHistory {
    fn record(&mut self, gradient_norm: f64, elapsed: f64) {
        self.gradient_norms.push(gradient_norm);
        self.elapsed.push(elapsed);
    }

    pub fn len(&self) -> usize {
        self.gradient_norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradient_norms.is_empty()
    }
}

/// Result of a solver run.
#[derive(Debug, Clone)]
pub struct LogregFit {
    pub weights: Array1<f64>,
    pub metrics: MetricsHistory,
    /// Number of gradient-descent steps taken.
    pub iterations: usize,
    pub reason: TerminationReason,
}

/// Per-run acceleration state: the cyclic iterate buffer, the last accepted
/// mixing coefficients, and the constraint-radius schedule when one is
/// configured.
struct Accelerator {
    buffer: IterateBuffer,
    coefficients: Array1<f64>,
    schedule: Option<RadiusSchedule>,
    reg_amount: Option<f64>,
    window: usize,
}

impl Accelerator {
    fn new(n_features: usize, config: &SolverConfig) -> Self {
        let window = config.k;
        Self {
            buffer: IterateBuffer::new(n_features, window + 1),
            coefficients: trivial_vertex(window),
            schedule: config
                .c0
                .map(|base| RadiusSchedule::new(base, config.adaptive_c)),
            reg_amount: config.reg_amount,
            window,
        }
    }

    /// One mixing event: build residuals, solve for coefficients, extrapolate,
    /// and let the safeguard decide.
    ///
    /// A failed solve keeps the previously accepted coefficients; the
    /// extrapolation still runs with them and the safeguard filters the
    /// result (initially they select the newest iterate, which the strict
    /// comparison always rejects).
    fn mix(
        &mut self,
        problem: &LogisticProblem<'_>,
        weights: &mut Array1<f64>,
        predictor: &mut Array1<f64>,
        lipschitz: f64,
        step: usize,
        verbose: bool,
    ) {
        let snapshot = self.buffer.snapshot();
        let residuals = residual_matrix(&snapshot);
        let gram = gram_matrix(&residuals);

        let plain_gradient = problem.gradient_from_predictor(weights, predictor);
        let plain_norm = plain_gradient.dot(&plain_gradient).sqrt();

        let solve = if let Some(schedule) = self.schedule.as_mut() {
            let radius = schedule.next_radius(plain_norm, lipschitz, step, self.window);
            let first_residual = residuals.column(0);
            let gap_tol = FW_TOL_SCALE * first_residual.dot(&first_residual).sqrt();
            minimize_quadratic(&gram, radius, gap_tol, FW_MAX_ITER).map(|outcome| {
                schedule.record_boundary(outcome.on_boundary);
                outcome.coefficients
            })
        } else {
            let mut gram = gram;
            match self.reg_amount {
                Some(amount) => regularize_gram(&mut gram, amount)
                    .and_then(|()| unconstrained_coefficients(&gram)),
                None => unconstrained_coefficients(&gram),
            }
        };
        match solve {
            Ok(coefficients) => self.coefficients = coefficients,
            Err(err) => {
                if verbose {
                    log::warn!(
                        "mixing solve failed at iteration {step}; keeping previous coefficients: {err}"
                    );
                }
            }
        }

        let candidate = extrapolate(&snapshot, &self.coefficients);
        let candidate_predictor = problem.linear_predictor(&candidate);
        let candidate_gradient = problem.gradient_from_predictor(&candidate, &candidate_predictor);
        let candidate_norm = candidate_gradient.dot(&candidate_gradient).sqrt();

        // Safeguard: extrapolation must strictly reduce the gradient norm.
        if candidate_norm < plain_norm {
            *weights = candidate;
            *predictor = candidate_predictor;
        }
    }
}

fn validate(
    x: &DesignMatrix,
    y: &Array1<f64>,
    lipschitz: f64,
    config: &SolverConfig,
) -> Result<(), SolverError> {
    if x.nrows() != y.len() {
        return Err(SolverError::InvalidInput(format!(
            "design matrix has {} rows but the label vector has {} entries",
            x.nrows(),
            y.len()
        )));
    }
    if !lipschitz.is_finite() || lipschitz <= 0.0 {
        return Err(SolverError::InvalidInput(format!(
            "Lipschitz estimate must be positive and finite, got {lipschitz}"
        )));
    }
    if config.f_grad == 0 {
        return Err(SolverError::InvalidInput(
            "f_grad must be at least 1".to_string(),
        ));
    }
    if config.use_acc && config.k == 0 {
        return Err(SolverError::InvalidInput(
            "acceleration window k must be at least 1".to_string(),
        ));
    }
    if let Some(base) = config.c0 {
        if !base.is_finite() || base <= 0.0 {
            return Err(SolverError::InvalidInput(format!(
                "constraint radius c0 must be positive and finite, got {base}"
            )));
        }
    }
    Ok(())
}

/// Fit L2-regularized logistic regression by gradient descent, optionally
/// with constrained Anderson extrapolation.
///
/// `lipschitz` is the precomputed step-size scalar (an upper bound on the
/// gradient Lipschitz constant, typically `‖X‖₂²/4 + rho`); the solver takes
/// steps of `1/lipschitz` and never estimates it itself.
pub fn solve_logreg(
    x: &DesignMatrix,
    y: &Array1<f64>,
    lipschitz: f64,
    config: &SolverConfig,
) -> Result<LogregFit, SolverError> {
    validate(x, y, lipschitz, config)?;

    let problem = LogisticProblem::new(x, y, config.rho);
    let mut weights = Array1::<f64>::zeros(x.ncols());
    let mut predictor = Array1::<f64>::zeros(y.len());
    let mut metrics = MetricsHistory::default();
    let mut accelerator = config
        .use_acc
        .then(|| Accelerator::new(x.ncols(), config));

    let start = Instant::now();
    let mut reason = TerminationReason::MaxIterationsReached;
    let mut iterations = 0;

    for it in 0..config.max_iter {
        if start.elapsed().as_secs_f64() > config.max_time {
            reason = TerminationReason::TimeBudgetExhausted;
            break;
        }

        let gradient = problem.gradient_from_predictor(&weights, &predictor);
        if it % config.f_grad == 0 {
            let norm = gradient.dot(&gradient).sqrt();
            metrics.record(norm, start.elapsed().as_secs_f64());
            if norm < config.tol {
                reason = TerminationReason::Converged;
                break;
            }
            if config.verbose {
                log::info!("iteration {it}: gradient norm {norm:.10e}");
            }
        }

        weights.scaled_add(-1.0 / lipschitz, &gradient);
        predictor = problem.linear_predictor(&weights);
        iterations = it + 1;

        if let Some(accelerator) = accelerator.as_mut() {
            accelerator.buffer.push(&weights);
            if it % (accelerator.window + 1) == accelerator.window {
                accelerator.mix(
                    &problem,
                    &mut weights,
                    &mut predictor,
                    lipschitz,
                    it,
                    config.verbose,
                );
            }
        }
    }

    Ok(LogregFit {
        weights,
        metrics,
        iterations,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (DesignMatrix, Array1<f64>) {
        let x = DesignMatrix::from(array![[1.0, 2.0], [2.0, 1.0], [-1.0, -2.0], [-2.0, -1.0]]);
        let y = array![1.0, 1.0, -1.0, -1.0];
        (x, y)
    }

    // Frobenius bound on ‖X‖₂² / 4, valid as a step-size scalar for toy_data.
    const TOY_LIPSCHITZ: f64 = 5.0;

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (x, _) = toy_data();
        let y = array![1.0, -1.0];
        let err = solve_logreg(&x, &y, TOY_LIPSCHITZ, &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)));
    }

    #[test]
    fn degenerate_configuration_is_rejected() {
        let (x, y) = toy_data();
        for bad_lipschitz in [0.0, -1.0, f64::NAN] {
            assert!(solve_logreg(&x, &y, bad_lipschitz, &SolverConfig::default()).is_err());
        }

        let no_cadence = SolverConfig {
            f_grad: 0,
            ..SolverConfig::default()
        };
        assert!(solve_logreg(&x, &y, TOY_LIPSCHITZ, &no_cadence).is_err());

        let empty_window = SolverConfig {
            use_acc: true,
            k: 0,
            ..SolverConfig::default()
        };
        assert!(solve_logreg(&x, &y, TOY_LIPSCHITZ, &empty_window).is_err());

        let bad_radius = SolverConfig {
            use_acc: true,
            c0: Some(-1.0),
            ..SolverConfig::default()
        };
        assert!(solve_logreg(&x, &y, TOY_LIPSCHITZ, &bad_radius).is_err());
    }

    #[test]
    fn metric_cadence_matches_f_grad() {
        let (x, y) = toy_data();
        let config = SolverConfig {
            max_iter: 5,
            f_grad: 2,
            tol: 0.0,
            ..SolverConfig::default()
        };
        let fit = solve_logreg(&x, &y, TOY_LIPSCHITZ, &config).expect("fit");
        // Iterations 0, 2, 4 are sampled.
        assert_eq!(fit.metrics.len(), 3);
        assert_eq!(fit.metrics.gradient_norms.len(), fit.metrics.elapsed.len());
        assert_eq!(fit.iterations, 5);
        assert_eq!(fit.reason, TerminationReason::MaxIterationsReached);
    }

    #[test]
    fn immediate_convergence_with_loose_tolerance() {
        let (x, y) = toy_data();
        let config = SolverConfig {
            tol: 1e6,
            f_grad: 1,
            ..SolverConfig::default()
        };
        let fit = solve_logreg(&x, &y, TOY_LIPSCHITZ, &config).expect("fit");
        assert_eq!(fit.reason, TerminationReason::Converged);
        assert_eq!(fit.iterations, 0);
        assert_eq!(fit.metrics.len(), 1);
        assert!(fit.weights.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn exhausted_time_budget_is_reported() {
        let (x, y) = toy_data();
        let config = SolverConfig {
            max_time: 0.0,
            ..SolverConfig::default()
        };
        let fit = solve_logreg(&x, &y, TOY_LIPSCHITZ, &config).expect("fit");
        assert_eq!(fit.reason, TerminationReason::TimeBudgetExhausted);
        assert_eq!(fit.iterations, 0);
        assert!(fit.metrics.is_empty());
    }

    #[test]
    fn config_defaults_survive_serde_roundtrip() {
        let config = SolverConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: SolverConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.max_iter, config.max_iter);
        assert_eq!(back.tol, config.tol);
        assert_eq!(back.f_grad, config.f_grad);
        assert_eq!(back.k, config.k);
        assert_eq!(back.use_acc, config.use_acc);

        let sparse_json = "{}";
        let defaulted: SolverConfig = serde_json::from_str(sparse_json).expect("defaults");
        assert_eq!(defaulted.max_iter, default_max_iter());
        assert_eq!(defaulted.k, default_window());
        assert!(defaulted.c0.is_none());
    }
}
