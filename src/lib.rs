pub mod buffer;
pub mod frank_wolfe;
pub mod linalg;
pub mod logistic;
pub mod matrix;
pub mod mixing;
pub mod radius;
pub mod solver;

pub use buffer::IterateBuffer;
pub use frank_wolfe::{FrankWolfeOutcome, minimize_quadratic};
pub use linalg::FaerLinalgError;
pub use logistic::LogisticProblem;
pub use matrix::DesignMatrix;
pub use mixing::MixingError;
pub use radius::RadiusSchedule;
pub use solver::{
    LogregFit, MetricsHistory, SolverConfig, SolverError, TerminationReason, solve_logreg,
};
