//! arbor-solver: sparse nonlinear least-squares optimization over
//! factor graphs.
//!
//! The crate separates the problem description from the solving
//! machinery:
//!
//! - [`graph`] holds the [`SparseGraph`](graph::SparseGraph) container
//!   with its [`Vertex`](graph::Vertex) and [`Edge`](graph::Edge)
//!   traits,
//! - [`optimizer`] drives the iteration: active-set selection, the
//!   [`SparseOptimizer::optimize`](optimizer::SparseOptimizer::optimize)
//!   loop, checkpointing, gauge and marginal analysis, and spanning-tree
//!   initial guesses,
//! - [`se2`] provides ready-made 2D pose-graph types.
//!
//! ```no_run
//! use arbor_solver::optimizer::{GaussNewton, SparseOptimizer};
//! use arbor_solver::se2::{Se2, Se2Edge, Se2Vertex};
//!
//! let mut optimizer = SparseOptimizer::with_algorithm(Box::new(GaussNewton::new()));
//! let graph = optimizer.graph_mut();
//! graph.add_vertex(Box::new(Se2Vertex::new(0, Se2::identity()).fixed()))?;
//! graph.add_vertex(Box::new(Se2Vertex::new(1, Se2::new(0.9, 0.1, 0.0))))?;
//! graph.add_edge(Box::new(Se2Edge::new(0, 0, 1, Se2::new(1.0, 0.0, 0.0))))?;
//!
//! optimizer.initialize_optimization()?;
//! let iterations = optimizer.optimize(10, false)?;
//! println!("done after {iterations} iterations");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod graph;
pub mod logger;
pub mod optimizer;
pub mod se2;

pub use error::{GraphError, GraphResult, OptimizerError, OptimizerResult};
pub use logger::{init_logger, init_logger_with_level};
pub use graph::{Edge, EdgeId, SparseGraph, Vertex, VertexId};
pub use optimizer::{
    BatchStatistics, GaussNewton, LevenbergMarquardt, MarginalCovariance,
    OptimizationAlgorithm, SolveOutcome, SparseOptimizer,
};
