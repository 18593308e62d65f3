use nalgebra::{DVector, DVectorView};
use tracing::warn;

/// Unique identifier for vertices in the hypergraph
pub type VertexId = usize;

/// A parameter block in the hypergraph.
///
/// A vertex owns an estimate of fixed tangent dimension, a *fixed* flag
/// (excluded from the solve but still contributing error), a *marginalized*
/// flag (eliminated via Schur complement rather than solved directly), a
/// mutable Hessian index assigned during active-set construction, and a
/// private LIFO stack of previously held estimates used for trial steps.
pub trait Vertex: Send + Sync {
    /// Identifier of this vertex
    fn id(&self) -> VertexId;

    /// Dimension of the parameter block in the linear system (tangent space)
    fn dimension(&self) -> usize;

    /// Whether this vertex is excluded from the solve
    fn is_fixed(&self) -> bool;

    /// Set the fixed flag
    fn set_fixed(&mut self, fixed: bool);

    /// Whether this vertex is eliminated via the Schur complement
    fn is_marginalized(&self) -> bool;

    /// Set the marginalized flag
    fn set_marginalized(&mut self, marginalized: bool);

    /// Block row/column of this vertex in the Hessian, `None` outside an
    /// active optimization session and for fixed vertices
    fn hessian_index(&self) -> Option<usize>;

    /// Assign or clear the Hessian index
    fn set_hessian_index(&mut self, index: Option<usize>);

    /// Current estimate as a flat vector
    fn estimate(&self) -> DVector<f64>;

    /// Overwrite the current estimate from a flat vector
    fn set_estimate(&mut self, estimate: DVector<f64>);

    /// Apply an increment to the estimate (manifold retraction)
    fn oplus(&mut self, delta: DVectorView<'_, f64>);

    /// Copy the current estimate onto the checkpoint stack
    fn push(&mut self);

    /// Restore the estimate from the top of the checkpoint stack.
    /// Returns false on an empty stack (usage error, no-op).
    fn pop(&mut self) -> bool;

    /// Drop the top of the checkpoint stack without restoring.
    /// Returns false on an empty stack (usage error, no-op).
    fn discard_top(&mut self) -> bool;

    /// Number of checkpoints currently stored
    fn stack_depth(&self) -> usize;
}

/// A plain Euclidean parameter block.
///
/// The estimate lives in R^n and increments are applied additively.
#[derive(Debug, Clone)]
pub struct VectorVertex {
    id: VertexId,
    estimate: DVector<f64>,
    fixed: bool,
    marginalized: bool,
    hessian_index: Option<usize>,
    stack: Vec<DVector<f64>>,
}

impl VectorVertex {
    /// Create a new Euclidean vertex with the given initial estimate
    pub fn new(id: VertexId, estimate: DVector<f64>) -> Self {
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

    /// Mark the vertex as marginalized on construction
    pub fn marginalized(mut self) -> Self {
        self.marginalized = true;
        self
    }
}

impl Vertex for VectorVertex {
    fn id(&self) -> VertexId {
        self.id
    }

    fn dimension(&self) -> usize {
        self.estimate.len()
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
        self.estimate.clone()
    }

    fn set_estimate(&mut self, estimate: DVector<f64>) {
        self.estimate = estimate;
    }

    fn oplus(&mut self, delta: DVectorView<'_, f64>) {
        self.estimate += delta;
    }

    fn push(&mut self) {
        self.stack.push(self.estimate.clone());
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

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_oplus_is_additive() {
        let mut v = VectorVertex::new(0, dvector![1.0, 2.0]);
        let delta = dvector![0.5, -1.0];
        v.oplus(delta.rows(0, 2));
        assert_eq!(v.estimate(), dvector![1.5, 1.0]);
    }

    #[test]
    fn test_push_pop_restores_estimate() {
        let mut v = VectorVertex::new(0, dvector![1.0, 2.0]);
        v.push();
        v.set_estimate(dvector![9.0, 9.0]);
        assert!(v.pop());
        assert_eq!(v.estimate(), dvector![1.0, 2.0]);
        assert_eq!(v.stack_depth(), 0);
    }

    #[test]
    fn test_discard_top_keeps_estimate() {
        let mut v = VectorVertex::new(0, dvector![1.0]);
        v.push();
        v.set_estimate(dvector![5.0]);
        assert!(v.discard_top());
        assert_eq!(v.estimate(), dvector![5.0]);
    }

    #[test]
    fn test_pop_underflow_is_noop() {
        let mut v = VectorVertex::new(3, dvector![4.0]);
        assert!(!v.pop());
        assert!(!v.discard_top());
        assert_eq!(v.estimate(), dvector![4.0]);
    }
}
