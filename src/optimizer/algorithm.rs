//! Algorithm abstraction between the optimizer loop and concrete solvers.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::error::{OptimizerError, OptimizerResult};
use crate::optimizer::SparseOptimizer;

/// Marginal covariance blocks keyed by `(row, col)` hessian block index
pub type MarginalCovariance = HashMap<(usize, usize), DMatrix<f64>>;

/// Result of a single algorithm iteration
#[derive(Debug)]
pub enum SolveOutcome {
    /// Increment to apply to the active vertices
    Step(DVector<f64>),
    /// The algorithm already applied (and kept) a step itself
    StepApplied,
    /// Convergence detected, stop iterating
    Converged,
}

/// A concrete nonlinear solver plugged into [`SparseOptimizer::optimize`].
///
/// The optimizer owns the outer loop: it refreshes errors and the
/// linearization before every call to [`solve`](Self::solve) and applies
/// returned [`SolveOutcome::Step`] increments itself.
pub trait OptimizationAlgorithm: Send {
    /// Short human-readable name used in log messages
    fn name(&self) -> &'static str;

    /// Prepare internal state before the first iteration of a batch.
    ///
    /// `online` is true when resuming from a previous solution, in which
    /// case algorithms keep tuned state (e.g. damping) instead of
    /// resetting it.
    fn init(&mut self, optimizer: &mut SparseOptimizer, online: bool) -> OptimizerResult<()>;

    /// Perform one iteration on the freshly linearized system
    fn solve(
        &mut self,
        optimizer: &mut SparseOptimizer,
        iteration: usize,
        online: bool,
    ) -> OptimizerResult<SolveOutcome>;

    /// Whether [`compute_marginals`](Self::compute_marginals) is available
    fn supports_marginals(&self) -> bool {
        false
    }

    /// Recover covariance blocks of the inverse Hessian.
    ///
    /// `block_pairs` are `(row, col)` hessian block indices of
    /// non-fixed active vertices.
    fn compute_marginals(
        &mut self,
        _optimizer: &SparseOptimizer,
        _block_pairs: &[(usize, usize)],
    ) -> OptimizerResult<MarginalCovariance> {
        Err(OptimizerError::MarginalsUnsupported(self.name().to_string()))
    }
}
