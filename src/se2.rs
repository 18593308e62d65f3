//! SE(2) pose parameterization for 2D pose-graph problems.
//!
//! Poses are stored as `[x, y, theta]` with the angle kept in `(-pi, pi]`.
//! Increments are applied additively with angle wrapping, matching the
//! Jacobians of [`Se2Edge`].

use std::fmt;

use nalgebra::{DMatrix, DVector, DVectorView, dvector};
use tracing::warn;

use crate::graph::edge::{Edge, EdgeId};
use crate::graph::vertex::{Vertex, VertexId};

/// Wrap an angle into `(-pi, pi]`
pub fn normalize_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// A rigid transformation in the plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Se2 {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Se2 {
    /// Create a transformation from translation and rotation angle
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// Identity transformation
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Group composition `self * other`
    pub fn compose(&self, other: &Se2) -> Se2 {
        let (s, c) = self.theta.sin_cos();
        Se2::new(
            self.x + c * other.x - s * other.y,
            self.y + s * other.x + c * other.y,
            self.theta + other.theta,
        )
    }

    /// Group inverse
    pub fn inverse(&self) -> Se2 {
        let (s, c) = self.theta.sin_cos();
        Se2::new(-(c * self.x + s * self.y), s * self.x - c * self.y, -self.theta)
    }

    /// Read a pose from a `[x, y, theta]` vector
    pub fn from_vector(v: &DVector<f64>) -> Se2 {
        Se2::new(v[0], v[1], v[2])
    }

    /// Flatten to a `[x, y, theta]` vector
    pub fn to_vector(self) -> DVector<f64> {
        dvector![self.x, self.y, self.theta]
    }
}

impl fmt::Display for Se2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Se2({:.4}, {:.4}, {:.4})", self.x, self.y, self.theta)
    }
}

/// A 2D pose vertex with additive increments and angle wrapping
#[derive(Debug, Clone)]
pub struct Se2Vertex {
    id: VertexId,
    estimate: Se2,
    fixed: bool,
    marginalized: bool,
    hessian_index: Option<usize>,
    stack: Vec<Se2>,
}

impl Se2Vertex {
    /// Create a new pose vertex
    pub fn new(id: VertexId, estimate: Se2) -> Self {
        Self {
            id,
            estimate,
            fixed: false,
            marginalized: false,
            hessian_index: None,
            stack: Vec::new(),
        }
    }

    /// Mark the vertex as fixed on construction
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Current pose
    pub fn pose(&self) -> Se2 {
        self.estimate
    }
}

impl Vertex for Se2Vertex {
    fn id(&self) -> VertexId {
        self.id
    }

    fn dimension(&self) -> usize {
        3
    }

    fn is_fixed(&self) -> bool {
        self.fixed
    }

    fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    fn is_marginalized(&self) -> bool {
        self.marginalized
    }

    fn set_marginalized(&mut self, marginalized: bool) {
        self.marginalized = marginalized;
    }

    fn hessian_index(&self) -> Option<usize> {
        self.hessian_index
    }

    fn set_hessian_index(&mut self, index: Option<usize>) {
        self.hessian_index = index;
    }

    fn estimate(&self) -> DVector<f64> {
        self.estimate.to_vector()
    }

    fn set_estimate(&mut self, estimate: DVector<f64>) {
        self.estimate = Se2::from_vector(&estimate);
    }

    fn oplus(&mut self, delta: DVectorView<'_, f64>) {
        self.estimate = Se2::new(
            self.estimate.x + delta[0],
            self.estimate.y + delta[1],
            self.estimate.theta + delta[2],
        );
    }

    fn push(&mut self) {
        self.stack.push(self.estimate);
    }

    fn pop(&mut self) -> bool {
        match self.stack.pop() {
            Some(estimate) => {
                self.estimate = estimate;
                true
            }
            None => {
                warn!(vertex = self.id, "pop on empty checkpoint stack");
                false
            }
        }
    }

    fn discard_top(&mut self) -> bool {
        if self.stack.pop().is_some() {
            true
        } else {
            warn!(vertex = self.id, "discard_top on empty checkpoint stack");
            false
        }
    }

    fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}

/// Relative pose constraint between two [`Se2Vertex`] endpoints.
///
/// The error is `t2v(Z^-1 * Xi^-1 * Xj)` with analytic Jacobians.
pub struct Se2Edge {
    id: EdgeId,
    vertices: [VertexId; 2],
    measurement: Se2,
    information: DMatrix<f64>,
    level: i32,
}

impl Se2Edge {
    /// Create a relative pose constraint with unit information
    pub fn new(id: EdgeId, from: VertexId, to: VertexId, measurement: Se2) -> Self {
        Self {
            id,
            vertices: [from, to],
            measurement,
            information: DMatrix::identity(3, 3),
            level: 0,
        }
    }

    /// Set the information matrix
    pub fn with_information(mut self, information: DMatrix<f64>) -> Self {
        assert_eq!(information.nrows(), 3);
        assert_eq!(information.ncols(), 3);
        self.information = information;
        self
    }

    /// Set the optimization level
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }
}

impl Edge for Se2Edge {
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
        3
    }

    fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    fn compute_error(&self, vertices: &[&dyn Vertex]) -> DVector<f64> {
        let xi = Se2::from_vector(&vertices[0].estimate());
        let xj = Se2::from_vector(&vertices[1].estimate());
        let delta = self.measurement.inverse().compose(&xi.inverse().compose(&xj));
        delta.to_vector()
    }

    fn jacobians(&self, vertices: &[&dyn Vertex]) -> Vec<DMatrix<f64>> {
        let xi = Se2::from_vector(&vertices[0].estimate());
        let xj = Se2::from_vector(&vertices[1].estimate());
        let (si, ci) = xi.theta.sin_cos();
        let (sz, cz) = self.measurement.theta.sin_cos();

        // Rz^T * Ri^T = R(theta_i + theta_z)^T
        let c = ci * cz - si * sz;
        let s = si * cz + ci * sz;
        let rzt_rit = DMatrix::from_row_slice(2, 2, &[c, s, -s, c]);
        let dt = dvector![xj.x - xi.x, xj.y - xi.y];
        // d(Ri^T)/dtheta * (tj - ti)
        let drit_dt = dvector![-si * dt[0] + ci * dt[1], -ci * dt[0] - si * dt[1]];
        // Rz^T * d(Ri^T)/dtheta * (tj - ti)
        let rzt_drit_dt = dvector![
            cz * drit_dt[0] + sz * drit_dt[1],
            -sz * drit_dt[0] + cz * drit_dt[1]
        ];

        let mut ja = DMatrix::zeros(3, 3);
        ja.view_mut((0, 0), (2, 2)).copy_from(&(-&rzt_rit));
        ja[(0, 2)] = rzt_drit_dt[0];
        ja[(1, 2)] = rzt_drit_dt[1];
        ja[(2, 2)] = -1.0;

        let mut jb = DMatrix::zeros(3, 3);
        jb.view_mut((0, 0), (2, 2)).copy_from(&rzt_rit);
        jb[(2, 2)] = 1.0;

        vec![ja, jb]
    }

    fn initial_estimate(
        &self,
        vertices: &[&dyn Vertex],
        from_slot: usize,
        to_slot: usize,
    ) -> Option<DVector<f64>> {
        let from = Se2::from_vector(&vertices[from_slot].estimate());
        match (from_slot, to_slot) {
            (0, 1) => Some(from.compose(&self.measurement).to_vector()),
            (1, 0) => Some(from.compose(&self.measurement.inverse()).to_vector()),
            _ => None,
        }
    }
}

/// Unary pose prior anchoring an [`Se2Vertex`]: `e = [dx, dy, wrap(dtheta)]`
pub struct Se2PriorEdge {
    id: EdgeId,
    vertices: [VertexId; 1],
    measurement: Se2,
    information: DMatrix<f64>,
}

impl Se2PriorEdge {
    /// Create a pose prior with unit information
    pub fn new(id: EdgeId, vertex: VertexId, measurement: Se2) -> Self {
        Self {
            id,
            vertices: [vertex],
            measurement,
            information: DMatrix::identity(3, 3),
        }
    }

    /// Set the information matrix
    pub fn with_information(mut self, information: DMatrix<f64>) -> Self {
        assert_eq!(information.nrows(), 3);
        assert_eq!(information.ncols(), 3);
        self.information = information;
        self
    }
}

impl Edge for Se2PriorEdge {
    fn id(&self) -> EdgeId {
        self.id
    }

    fn vertex_ids(&self) -> &[VertexId] {
        &self.vertices
    }

    fn dimension(&self) -> usize {
        3
    }

    fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    fn compute_error(&self, vertices: &[&dyn Vertex]) -> DVector<f64> {
        let x = Se2::from_vector(&vertices[0].estimate());
        dvector![
            x.x - self.measurement.x,
            x.y - self.measurement.y,
            normalize_angle(x.theta - self.measurement.theta)
        ]
    }

    fn jacobians(&self, _vertices: &[&dyn Vertex]) -> Vec<DMatrix<f64>> {
        vec![DMatrix::identity(3, 3)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_inverse_is_identity() {
        let a = Se2::new(1.0, -2.0, 0.7);
        let id = a.compose(&a.inverse());
        assert_relative_eq!(id.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(id.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(id.theta, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_rotates_translation() {
        let a = Se2::new(1.0, 2.0, FRAC_PI_2);
        let b = Se2::new(1.0, 0.0, 0.0);
        let c = a.compose(&b);
        assert_relative_eq!(c.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.y, 3.0, epsilon = 1e-12);
        assert_relative_eq!(c.theta, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_error_zero_at_measurement() {
        let xi = Se2::new(0.5, 0.5, 0.3);
        let meas = Se2::new(1.0, 0.2, -0.4);
        let xj = xi.compose(&meas);

        let vi = Se2Vertex::new(0, xi);
        let vj = Se2Vertex::new(1, xj);
        let edge = Se2Edge::new(0, 0, 1, meas);
        let vertices: Vec<&dyn Vertex> = vec![&vi, &vj];
        let error = edge.compute_error(&vertices);
        assert_relative_eq!(error.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_edge_jacobians_match_numeric_differences() {
        let vi = Se2Vertex::new(0, Se2::new(0.3, -0.2, 0.5));
        let vj = Se2Vertex::new(1, Se2::new(1.1, 0.4, -0.8));
        let edge = Se2Edge::new(0, 0, 1, Se2::new(0.9, 0.1, -1.2));

        let vertices: Vec<&dyn Vertex> = vec![&vi, &vj];
        let jacs = edge.jacobians(&vertices);

        let eps = 1e-7;
        for slot in 0..2 {
            for k in 0..3 {
                let mut plus = if slot == 0 { vi.clone() } else { vj.clone() };
                let mut minus = plus.clone();
                let mut delta = DVector::zeros(3);
                delta[k] = eps;
                plus.oplus(delta.rows(0, 3));
                delta[k] = -eps;
                minus.oplus(delta.rows(0, 3));

                let (e_plus, e_minus) = if slot == 0 {
                    let vp: Vec<&dyn Vertex> = vec![&plus, &vj];
                    let vm: Vec<&dyn Vertex> = vec![&minus, &vj];
                    (edge.compute_error(&vp), edge.compute_error(&vm))
                } else {
                    let vp: Vec<&dyn Vertex> = vec![&vi, &plus];
                    let vm: Vec<&dyn Vertex> = vec![&vi, &minus];
                    (edge.compute_error(&vp), edge.compute_error(&vm))
                };

                let numeric = (e_plus - e_minus) / (2.0 * eps);
                for row in 0..3 {
                    assert_relative_eq!(
                        jacs[slot][(row, k)],
                        numeric[row],
                        epsilon = 1e-5,
                        max_relative = 1e-5
                    );
                }
            }
        }
    }

    #[test]
    fn test_initial_estimate_composes_measurement() {
        let vi = Se2Vertex::new(0, Se2::new(1.0, 2.0, FRAC_PI_2));
        let vj = Se2Vertex::new(1, Se2::identity());
        let edge = Se2Edge::new(0, 0, 1, Se2::new(1.0, 0.0, 0.0));
        let vertices: Vec<&dyn Vertex> = vec![&vi, &vj];

        let guess = edge.initial_estimate(&vertices, 0, 1).unwrap();
        assert_relative_eq!(guess[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(guess[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(guess[2], FRAC_PI_2, epsilon = 1e-12);
    }
}
