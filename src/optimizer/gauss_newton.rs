//! Gauss-Newton solver: one full undamped step per iteration.

use tracing::debug;

use crate::error::OptimizerResult;
use crate::optimizer::SparseOptimizer;
use crate::optimizer::algorithm::{MarginalCovariance, OptimizationAlgorithm, SolveOutcome};
use crate::optimizer::linear_system::BlockLinearSystem;

/// Gauss-Newton with cost-change and step-norm convergence tests.
///
/// Suited to well-conditioned problems with good initial guesses; use
/// [`LevenbergMarquardt`](crate::optimizer::LevenbergMarquardt) when the
/// linearization may overshoot.
pub struct GaussNewton {
    cost_tolerance: f64,
    step_tolerance: f64,
    last_chi2: Option<f64>,
}

impl Default for GaussNewton {
    fn default() -> Self {
        Self {
            cost_tolerance: 1e-10,
            step_tolerance: 1e-10,
            last_chi2: None,
        }
    }
}

impl GaussNewton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converge when the absolute chi-squared change drops below this
    pub fn with_cost_tolerance(mut self, tolerance: f64) -> Self {
        self.cost_tolerance = tolerance;
        self
    }

    /// Converge when the increment norm drops below this
    pub fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }
}

impl OptimizationAlgorithm for GaussNewton {
    fn name(&self) -> &'static str {
        "GaussNewton"
    }

    fn init(&mut self, _optimizer: &mut SparseOptimizer, online: bool) -> OptimizerResult<()> {
        if !online {
            self.last_chi2 = None;
        }
        Ok(())
    }

    fn solve(
        &mut self,
        optimizer: &mut SparseOptimizer,
        iteration: usize,
        _online: bool,
    ) -> OptimizerResult<SolveOutcome> {
        let chi2 = optimizer.active_chi2();
        if let Some(last) = self.last_chi2
            && (last - chi2).abs() < self.cost_tolerance
        {
            debug!(iteration, chi2, "cost change below tolerance");
            return Ok(SolveOutcome::Converged);
        }
        self.last_chi2 = Some(chi2);

        let mut system = BlockLinearSystem::build(optimizer)?;
        let dx = system.solve()?;
        debug!(iteration, chi2, step_norm = dx.norm(), "gauss-newton step");
        if dx.norm() < self.step_tolerance {
            return Ok(SolveOutcome::Converged);
        }
        Ok(SolveOutcome::Step(dx))
    }

    fn supports_marginals(&self) -> bool {
        true
    }

    fn compute_marginals(
        &mut self,
        optimizer: &SparseOptimizer,
        block_pairs: &[(usize, usize)],
    ) -> OptimizerResult<MarginalCovariance> {
        BlockLinearSystem::build(optimizer)?.marginal_blocks(block_pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_tolerances() {
        let gn = GaussNewton::new()
            .with_cost_tolerance(1e-6)
            .with_step_tolerance(1e-8);
        assert_eq!(gn.cost_tolerance, 1e-6);
        assert_eq!(gn.step_tolerance, 1e-8);
        assert!(gn.supports_marginals());
    }
}
