use nalgebra::{DMatrix, DVector};

use crate::graph::vertex::{Vertex, VertexId};

/// Unique identifier for edges in the hypergraph
pub type EdgeId = usize;

/// An observation constraint connecting one or more vertices.
///
/// An edge contributes an error term weighted by its information matrix;
/// the weighted squared error is the edge's chi-square contribution. Error
/// vectors and Jacobian blocks are computed on demand against the current
/// vertex estimates and cached by the optimizer, not by the edge itself.
pub trait Edge: Send + Sync {
    /// Identifier of this edge
    fn id(&self) -> EdgeId;

    /// Ordered endpoints of this hyperedge
    fn vertex_ids(&self) -> &[VertexId];

    /// Level of this edge in multilevel optimization
    fn level(&self) -> i32 {
        0
    }

    /// Dimension of the error vector
    fn dimension(&self) -> usize;

    /// Information (inverse covariance) matrix, `dimension x dimension`
    fn information(&self) -> &DMatrix<f64>;

    /// Compute the error vector against the given endpoint estimates.
    /// `vertices` is ordered parallel to [`Edge::vertex_ids`].
    fn compute_error(&self, vertices: &[&dyn Vertex]) -> DVector<f64>;

    /// Compute one Jacobian block per endpoint, ordered parallel to
    /// [`Edge::vertex_ids`]; each block is `dimension x vertex.dimension()`
    fn jacobians(&self, vertices: &[&dyn Vertex]) -> Vec<DMatrix<f64>>;

    /// Chi-square contribution of a previously computed error vector
    fn chi2(&self, error: &DVector<f64>) -> f64 {
        let weighted = self.information() * error;
        error.dot(&weighted)
    }

    /// Propose an estimate for the endpoint at `to_slot` by composing the
    /// measurement with the estimate of the endpoint at `from_slot`.
    ///
    /// Used by initial-guess propagation; returns `None` when the edge
    /// cannot seed the target (hyperedges, priors).
    fn initial_estimate(
        &self,
        vertices: &[&dyn Vertex],
        from_slot: usize,
        to_slot: usize,
    ) -> Option<DVector<f64>> {
        let _ = (vertices, from_slot, to_slot);
        None
    }
}

/// Unary prior on a Euclidean vertex: `e = x - target`
pub struct LinearPriorEdge {
    id: EdgeId,
    vertices: [VertexId; 1],
    target: DVector<f64>,
    information: DMatrix<f64>,
}

impl LinearPriorEdge {
    /// Create a prior with unit information
    pub fn new(id: EdgeId, vertex: VertexId, target: DVector<f64>) -> Self {
        let dim = target.len();
        Self {
            id,
            vertices: [vertex],
            target,
            information: DMatrix::identity(dim, dim),
        }
    }

    /// Set the information matrix
    pub fn with_information(mut self, information: DMatrix<f64>) -> Self {
        assert_eq!(information.nrows(), self.target.len());
        assert_eq!(information.ncols(), self.target.len());
        self.information = information;
        self
    }
}

impl Edge for LinearPriorEdge {
    fn id(&self) -> EdgeId {
        self.id
    }

    fn vertex_ids(&self) -> &[VertexId] {
        &self.vertices
    }

    fn dimension(&self) -> usize {
        self.target.len()
    }

    fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    fn compute_error(&self, vertices: &[&dyn Vertex]) -> DVector<f64> {
        vertices[0].estimate() - &self.target
    }

    fn jacobians(&self, _vertices: &[&dyn Vertex]) -> Vec<DMatrix<f64>> {
        let dim = self.target.len();
        vec![DMatrix::identity(dim, dim)]
    }
}

/// Relative constraint between two Euclidean vertices: `e = xj - xi - m`
pub struct LinearBetweenEdge {
    id: EdgeId,
    vertices: [VertexId; 2],
    measurement: DVector<f64>,
    information: DMatrix<f64>,
    level: i32,
}

impl LinearBetweenEdge {
    /// Create a between constraint with unit information
    pub fn new(id: EdgeId, from: VertexId, to: VertexId, measurement: DVector<f64>) -> Self {
        let dim = measurement.len();
        Self {
            id,
            vertices: [from, to],
            measurement,
            information: DMatrix::identity(dim, dim),
            level: 0,
        }
    }

    /// Set the information matrix
    pub fn with_information(mut self, information: DMatrix<f64>) -> Self {
        assert_eq!(information.nrows(), self.measurement.len());
        assert_eq!(information.ncols(), self.measurement.len());
        self.information = information;
        self
    }

    /// Set the optimization level
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }
}

impl Edge for LinearBetweenEdge {
    fn id(&self) -> EdgeId {
        self.id
    }

    fn vertex_ids(&self) -> &[VertexId] {
        &self.vertices
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn dimension(&self) -> usize {
        self.measurement.len()
    }

    fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    fn compute_error(&self, vertices: &[&dyn Vertex]) -> DVector<f64> {
        vertices[1].estimate() - vertices[0].estimate() - &self.measurement
    }

    fn jacobians(&self, _vertices: &[&dyn Vertex]) -> Vec<DMatrix<f64>> {
        let dim = self.measurement.len();
        vec![
            -DMatrix::identity(dim, dim),
            DMatrix::identity(dim, dim),
        ]
    }

    fn initial_estimate(
        &self,
        vertices: &[&dyn Vertex],
        from_slot: usize,
        to_slot: usize,
    ) -> Option<DVector<f64>> {
        let from = vertices[from_slot].estimate();
        match (from_slot, to_slot) {
            (0, 1) => Some(from + &self.measurement),
            (1, 0) => Some(from - &self.measurement),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::vertex::VectorVertex;
    use nalgebra::dvector;

    #[test]
    fn test_prior_error_and_chi2() {
        let v = VectorVertex::new(0, dvector![3.0]);
        let edge = LinearPriorEdge::new(0, 0, dvector![1.0])
            .with_information(DMatrix::from_element(1, 1, 2.0));
        let vertices: Vec<&dyn Vertex> = vec![&v];
        let error = edge.compute_error(&vertices);
        assert_eq!(error, dvector![2.0]);
        // e^T * omega * e = 2 * 2 * 2
        assert_eq!(edge.chi2(&error), 8.0);
    }

    #[test]
    fn test_between_error_and_jacobians() {
        let vi = VectorVertex::new(0, dvector![1.0]);
        let vj = VectorVertex::new(1, dvector![4.0]);
        let edge = LinearBetweenEdge::new(0, 0, 1, dvector![2.0]);
        let vertices: Vec<&dyn Vertex> = vec![&vi, &vj];
        assert_eq!(edge.compute_error(&vertices), dvector![1.0]);
        let jacs = edge.jacobians(&vertices);
        assert_eq!(jacs[0][(0, 0)], -1.0);
        assert_eq!(jacs[1][(0, 0)], 1.0);
    }

    #[test]
    fn test_between_initial_estimate_both_directions() {
        let vi = VectorVertex::new(0, dvector![1.0]);
        let vj = VectorVertex::new(1, dvector![10.0]);
        let edge = LinearBetweenEdge::new(0, 0, 1, dvector![2.0]);
        let vertices: Vec<&dyn Vertex> = vec![&vi, &vj];
        assert_eq!(edge.initial_estimate(&vertices, 0, 1), Some(dvector![3.0]));
        assert_eq!(edge.initial_estimate(&vertices, 1, 0), Some(dvector![8.0]));
    }
}
