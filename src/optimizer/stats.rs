//! Per-iteration statistics collected during optimization.

use std::fmt;
use std::time::Duration;

/// Snapshot of one optimization iteration.
///
/// Collected when [`SparseOptimizer::set_compute_batch_statistics`] is
/// enabled and retrieved through [`SparseOptimizer::batch_statistics`].
///
/// [`SparseOptimizer::set_compute_batch_statistics`]: crate::optimizer::SparseOptimizer::set_compute_batch_statistics
/// [`SparseOptimizer::batch_statistics`]: crate::optimizer::SparseOptimizer::batch_statistics
#[derive(Debug, Clone, Default)]
pub struct BatchStatistics {
    /// Iteration number, starting at 0 for the first performed iteration
    pub iteration: usize,
    /// Active chi-squared after this iteration
    pub chi2: f64,
    /// Number of vertices in the active set
    pub num_active_vertices: usize,
    /// Number of edges in the active set
    pub num_active_edges: usize,
    /// Total scalar dimension of the reduced system
    pub hessian_dimension: usize,
    /// Time spent evaluating residuals
    pub time_residuals: Duration,
    /// Time spent building the linear system
    pub time_linearize: Duration,
    /// Wall-clock time of the whole iteration
    pub time_iteration: Duration,
}

impl fmt::Display for BatchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iter {}: chi2 = {:.6e}, vertices = {}, edges = {}, dim = {}, time = {:?}",
            self.iteration,
            self.chi2,
            self.num_active_vertices,
            self.num_active_edges,
            self.hessian_dimension,
            self.time_iteration
        )
    }
}
