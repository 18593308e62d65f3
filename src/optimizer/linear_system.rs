//! Sparse block linear system `H dx = b` assembled from the active set.
//!
//! The Hessian is accumulated block-wise as `H += J_a^T Omega J_b` over
//! every endpoint pair of every active edge, stored in faer's sparse
//! column format, and factorized with a sparse Cholesky whose symbolic
//! analysis is cached across solves of the same structure.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::{SparseColMat, Triplet};
use faer::{Mat, Side};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{OptimizerError, OptimizerResult};
use crate::optimizer::SparseOptimizer;
use crate::optimizer::algorithm::MarginalCovariance;

/// The reduced normal equations of one linearization point
pub struct BlockLinearSystem {
    block_dims: Vec<usize>,
    block_offsets: Vec<usize>,
    dimension: usize,
    triplets: Vec<Triplet<usize, usize, f64>>,
    rhs: DVector<f64>,
    symbolic: Option<SymbolicLlt<usize>>,
}

impl BlockLinearSystem {
    /// Assemble the system from the optimizer's cached linearization.
    ///
    /// Fails with [`OptimizerError::NotLinearized`] if residuals or
    /// Jacobians have not been computed for an active edge.
    pub fn build(optimizer: &SparseOptimizer) -> OptimizerResult<Self> {
        let graph = optimizer.graph();
        let mapping = optimizer.index_mapping();
        let mut block_dims = Vec::with_capacity(mapping.len());
        let mut block_offsets = Vec::with_capacity(mapping.len());
        let mut dimension = 0;
        for &vertex_id in mapping {
            let vertex = graph
                .vertex(vertex_id)
                .ok_or(crate::error::GraphError::UnknownVertex(vertex_id))?;
            block_offsets.push(dimension);
            block_dims.push(vertex.dimension());
            dimension += vertex.dimension();
        }

        // only Sync pieces cross into the parallel assembly
        let error_cache = &optimizer.error_cache;
        let jacobian_cache = &optimizer.jacobian_cache;
        let block_offsets_ref = &block_offsets;

        // Per-edge contributions computed in parallel, merged sequentially
        let contributions: OptimizerResult<Vec<_>> = optimizer
            .active_edges()
            .par_iter()
            .map(|&edge_id| {
                let edge = graph
                    .edge(edge_id)
                    .ok_or(crate::error::GraphError::UnknownEdge(edge_id))?;
                let error = error_cache
                    .get(&edge_id)
                    .ok_or(OptimizerError::NotLinearized)?;
                let jacobians = jacobian_cache
                    .get(&edge_id)
                    .ok_or(OptimizerError::NotLinearized)?;
                let omega = edge.information();

                let slots: Vec<Option<(usize, usize)>> = edge
                    .vertex_ids()
                    .iter()
                    .map(|&vid| {
                        graph
                            .vertex(vid)
                            .and_then(|v| v.hessian_index())
                            .map(|hi| (hi, block_offsets_ref[hi]))
                    })
                    .collect();

                let mut triplets = Vec::new();
                let mut rhs_parts = Vec::new();
                for (a, slot_a) in slots.iter().enumerate() {
                    let Some((_, offset_a)) = slot_a else { continue };
                    let jt_omega = jacobians[a].transpose() * omega;
                    let grad = &jt_omega * error;
                    rhs_parts.push((*offset_a, grad));
                    for (b, slot_b) in slots.iter().enumerate() {
                        let Some((_, offset_b)) = slot_b else { continue };
                        let block = &jt_omega * &jacobians[b];
                        for r in 0..block.nrows() {
                            for c in 0..block.ncols() {
                                triplets.push(Triplet::new(
                                    offset_a + r,
                                    offset_b + c,
                                    block[(r, c)],
                                ));
                            }
                        }
                    }
                }
                Ok((triplets, rhs_parts))
            })
            .collect();

        let mut triplets = Vec::new();
        let mut rhs = DVector::zeros(dimension);
        for (edge_triplets, rhs_parts) in contributions? {
            triplets.extend(edge_triplets);
            for (offset, grad) in rhs_parts {
                for k in 0..grad.len() {
                    rhs[offset + k] -= grad[k];
                }
            }
        }
        // explicit zeros keep the sparsity pattern identical between the
        // damped and undamped assemblies
        for i in 0..dimension {
            triplets.push(Triplet::new(i, i, 0.0));
        }

        Ok(Self {
            block_dims,
            block_offsets,
            dimension,
            triplets,
            rhs,
            symbolic: None,
        })
    }

    /// Total scalar dimension of the system
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Scalar offset of a hessian block
    pub fn block_offset(&self, index: usize) -> Option<usize> {
        self.block_offsets.get(index).copied()
    }

    /// Dimension of a hessian block
    pub fn block_dim(&self, index: usize) -> Option<usize> {
        self.block_dims.get(index).copied()
    }

    /// Right-hand side `b = -J^T Omega e`
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Diagonal of the undamped Hessian, used to seed damping heuristics
    pub fn hessian_diagonal(&self) -> DVector<f64> {
        let mut diagonal = DVector::zeros(self.dimension);
        for triplet in &self.triplets {
            if triplet.row == triplet.col {
                diagonal[triplet.row] += triplet.val;
            }
        }
        diagonal
    }

    fn assemble(&self, lambda: f64) -> OptimizerResult<SparseColMat<usize, f64>> {
        let mut triplets = self.triplets.clone();
        if lambda != 0.0 {
            for i in 0..self.dimension {
                triplets.push(Triplet::new(i, i, lambda));
            }
        }
        SparseColMat::try_new_from_triplets(self.dimension, self.dimension, &triplets)
            .map_err(|e| OptimizerError::SolverFailure(format!("hessian assembly: {e:?}")))
    }

    fn factorize(&mut self, lambda: f64) -> OptimizerResult<Llt<usize, f64>> {
        let hessian = self.assemble(lambda)?;
        if self.symbolic.is_none() {
            let symbolic = SymbolicLlt::try_new(hessian.symbolic(), Side::Lower)
                .map_err(|e| OptimizerError::SolverFailure(format!("symbolic analysis: {e:?}")))?;
            self.symbolic = Some(symbolic);
        }
        let symbolic = self
            .symbolic
            .as_ref()
            .ok_or_else(|| OptimizerError::SolverFailure("missing symbolic analysis".into()))?;
        Llt::try_new_with_symbolic(symbolic.clone(), hessian.as_ref(), Side::Lower)
            .map_err(|e| OptimizerError::SolverFailure(format!("cholesky factorization: {e:?}")))
    }

    /// Solve `H dx = b`
    pub fn solve(&mut self) -> OptimizerResult<DVector<f64>> {
        self.solve_damped(0.0)
    }

    /// Solve `(H + lambda I) dx = b`
    pub fn solve_damped(&mut self, lambda: f64) -> OptimizerResult<DVector<f64>> {
        let llt = self.factorize(lambda)?;
        let rhs = Mat::from_fn(self.dimension, 1, |i, _| self.rhs[i]);
        let solution = llt.solve(rhs);
        Ok(DVector::from_column_slice(solution.col_as_slice(0)))
    }

    /// Recover blocks of `H^-1` by solving against unit block columns
    pub fn marginal_blocks(
        &mut self,
        block_pairs: &[(usize, usize)],
    ) -> OptimizerResult<MarginalCovariance> {
        for &(row, col) in block_pairs {
            if row >= self.block_dims.len() || col >= self.block_dims.len() {
                return Err(OptimizerError::InvalidBlockIndex(row, col));
            }
        }

        let llt = self.factorize(0.0)?;
        let mut covariance = MarginalCovariance::new();
        let mut columns: Vec<usize> = block_pairs.iter().map(|&(_, col)| col).collect();
        columns.sort_unstable();
        columns.dedup();

        for col in columns {
            let col_offset = self.block_offsets[col];
            let col_dim = self.block_dims[col];
            let mut rhs = Mat::zeros(self.dimension, col_dim);
            for k in 0..col_dim {
                rhs[(col_offset + k, k)] = 1.0;
            }
            let solution = llt.solve(rhs);
            for &(row, pair_col) in block_pairs.iter().filter(|&&(_, c)| c == col) {
                let row_offset = self.block_offsets[row];
                let row_dim = self.block_dims[row];
                let block = DMatrix::from_fn(row_dim, col_dim, |r, c| {
                    solution[(row_offset + r, c)]
                });
                covariance.insert((row, pair_col), block);
            }
        }
        Ok(covariance)
    }
}
