//! Error types for the arbor-solver library
//!
//! This module provides the error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use crate::graph::{EdgeId, VertexId};
use thiserror::Error;

/// Result type for graph container operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by the graph container
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A vertex with this id is already stored
    #[error("vertex {0} already exists in the graph")]
    DuplicateVertex(VertexId),

    /// An edge with this id is already stored
    #[error("edge {0} already exists in the graph")]
    DuplicateEdge(EdgeId),

    /// The vertex id does not refer to a stored vertex
    #[error("vertex {0} does not exist in the graph")]
    UnknownVertex(VertexId),

    /// The edge id does not refer to a stored edge
    #[error("edge {0} does not exist in the graph")]
    UnknownEdge(EdgeId),

    /// An edge references an endpoint that is not stored
    #[error("edge {edge} references non-existent vertex {vertex}")]
    DanglingEndpoint { edge: EdgeId, vertex: VertexId },
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Errors raised by the sparse optimizer core
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// An operation requiring an active session was called before a
    /// successful `initialize_optimization`
    #[error("no active optimization session, call initialize_optimization first")]
    NotInitialized,

    /// No optimization algorithm has been configured
    #[error("no optimization algorithm configured, call set_algorithm first")]
    NoAlgorithm,

    /// The requested vertex/edge subset yields an empty active set
    #[error("the requested subset yields an empty active set")]
    EmptyActiveSet,

    /// An edge subset mixes edges annotated with different levels
    #[error("active edges carry inconsistent levels ({0} and {1})")]
    InconsistentLevel(i32, i32),

    /// A marginal or solve request was issued without a current linearization
    #[error("no current linearization, call linearize_system first")]
    NotLinearized,

    /// The increment vector does not match the layout of the linear system
    #[error("increment dimension {actual} does not match system dimension {expected}")]
    IncrementDimension { expected: usize, actual: usize },

    /// A requested Hessian block lies outside the index mapping
    #[error("block index ({0}, {1}) lies outside the index mapping")]
    InvalidBlockIndex(usize, usize),

    /// The algorithm could not produce a step (singular system, divergence)
    #[error("solver failure: {0}")]
    SolverFailure(String),

    /// The configured algorithm does not support marginal recovery
    #[error("algorithm {0} does not support marginal covariance recovery")]
    MarginalsUnsupported(String),

    /// An underlying graph operation failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let error = GraphError::UnknownVertex(42);
        assert_eq!(error.to_string(), "vertex 42 does not exist in the graph");
    }

    #[test]
    fn test_optimizer_error_from_graph_error() {
        let error: OptimizerError = GraphError::UnknownEdge(7).into();
        assert!(matches!(error, OptimizerError::Graph(_)));
        assert_eq!(error.to_string(), "edge 7 does not exist in the graph");
    }

    #[test]
    fn test_increment_dimension_display() {
        let error = OptimizerError::IncrementDimension {
            expected: 9,
            actual: 6,
        };
        assert_eq!(
            error.to_string(),
            "increment dimension 6 does not match system dimension 9"
        );
    }
}
