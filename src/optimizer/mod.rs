//! Sparse graph optimizer: active-set sessions, the iteration loop,
//! checkpoint stacks, gauge and marginal analysis, and initial-guess
//! propagation over a [`SparseGraph`].
//!
//! A session is opened with one of the `initialize_optimization_*`
//! methods, which select the active subgraph and assign contiguous
//! hessian indices to the free vertices (marginalized ones last, so
//! Schur-style solvers can split the system by index range). The loop
//! in [`SparseOptimizer::optimize`] then alternates residual
//! evaluation, linearization, and one step of the plugged-in
//! [`OptimizationAlgorithm`] until the iteration budget, a convergence
//! signal, or the force-stop flag ends it.

pub mod algorithm;
pub mod gauss_newton;
pub mod levenberg_marquardt;
pub mod linear_system;
pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{GraphError, OptimizerError, OptimizerResult};
use crate::graph::{EdgeId, SparseGraph, VertexId};

pub use algorithm::{MarginalCovariance, OptimizationAlgorithm, SolveOutcome};
pub use gauss_newton::GaussNewton;
pub use levenberg_marquardt::LevenbergMarquardt;
pub use linear_system::BlockLinearSystem;
pub use stats::BatchStatistics;

/// Handle of a registered compute-error action
pub type ActionId = usize;

/// Callback dispatched before every residual evaluation
pub type ComputeErrorAction = Box<dyn Fn(&SparseOptimizer) + Send>;

/// Optimizer over an active subset of a [`SparseGraph`]
pub struct SparseOptimizer {
    graph: SparseGraph,
    algorithm: Option<Box<dyn OptimizationAlgorithm>>,
    initialized: bool,
    active_vertices: Vec<VertexId>,
    active_edges: Vec<EdgeId>,
    index_mapping: Vec<VertexId>,
    error_cache: HashMap<EdgeId, DVector<f64>>,
    jacobian_cache: HashMap<EdgeId, Vec<DMatrix<f64>>>,
    compute_error_actions: Vec<(ActionId, ComputeErrorAction)>,
    next_action_id: ActionId,
    force_stop: Option<Arc<AtomicBool>>,
    statistics: Option<Vec<BatchStatistics>>,
    collect_statistics: bool,
    verbose: bool,
}

impl Default for SparseOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseOptimizer {
    pub fn new() -> Self {
        Self {
            graph: SparseGraph::new(),
            algorithm: None,
            initialized: false,
            active_vertices: Vec::new(),
            active_edges: Vec::new(),
            index_mapping: Vec::new(),
            error_cache: HashMap::new(),
            jacobian_cache: HashMap::new(),
            compute_error_actions: Vec::new(),
            next_action_id: 0,
            force_stop: None,
            statistics: None,
            collect_statistics: false,
            verbose: false,
        }
    }

    /// Construct with an algorithm already plugged in
    pub fn with_algorithm(algorithm: Box<dyn OptimizationAlgorithm>) -> Self {
        let mut optimizer = Self::new();
        optimizer.algorithm = Some(algorithm);
        optimizer
    }

    /// Replace the current algorithm, dropping the previous one
    pub fn set_algorithm(&mut self, algorithm: Box<dyn OptimizationAlgorithm>) {
        self.algorithm = Some(algorithm);
    }

    pub fn graph(&self) -> &SparseGraph {
        &self.graph
    }

    /// Mutable graph access.
    ///
    /// Structural edits made through this handle do not update an
    /// active session; re-initialize afterwards, or use
    /// [`remove_vertex`](Self::remove_vertex) /
    /// [`update_initialization`](Self::update_initialization) which do.
    pub fn graph_mut(&mut self) -> &mut SparseGraph {
        &mut self.graph
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Install (or clear) the cooperative cancellation flag
    pub fn set_force_stop_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.force_stop = flag;
    }

    /// Whether the force-stop flag is currently raised
    pub fn terminate(&self) -> bool {
        self.force_stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Enable or disable per-iteration statistics collection
    pub fn set_compute_batch_statistics(&mut self, enable: bool) {
        self.collect_statistics = enable;
        if enable && self.statistics.is_none() {
            self.statistics = Some(Vec::new());
        }
    }

    /// Records collected so far, empty when collection is disabled
    pub fn batch_statistics(&self) -> &[BatchStatistics] {
        self.statistics.as_deref().unwrap_or(&[])
    }

    /// Register an action invoked before every residual evaluation.
    ///
    /// Actions run in registration order and observe the optimizer
    /// read-only.
    pub fn add_compute_error_action(&mut self, action: ComputeErrorAction) -> ActionId {
        let id = self.next_action_id;
        self.next_action_id += 1;
        self.compute_error_actions.push((id, action));
        id
    }

    /// Remove a registered action, returns false for unknown handles
    pub fn remove_compute_error_action(&mut self, id: ActionId) -> bool {
        let before = self.compute_error_actions.len();
        self.compute_error_actions.retain(|(aid, _)| *aid != id);
        self.compute_error_actions.len() != before
    }

    // ---- active-set builder -------------------------------------------------

    /// Open a session over the whole graph at level 0
    pub fn initialize_optimization(&mut self) -> OptimizerResult<()> {
        self.initialize_optimization_with_level(0)
    }

    /// Open a session over the whole graph at the given level
    pub fn initialize_optimization_with_level(&mut self, level: i32) -> OptimizerResult<()> {
        let vertices: Vec<VertexId> = self.graph.vertex_ids().collect();
        self.initialize_optimization_from_vertices(&vertices, level)
    }

    /// Open a session over a vertex subset.
    ///
    /// The active edges are the edges at `level` whose endpoints all lie
    /// in the subset; the active vertices are the subset itself.
    pub fn initialize_optimization_from_vertices(
        &mut self,
        vertices: &[VertexId],
        level: i32,
    ) -> OptimizerResult<()> {
        self.clear_session();
        let result = self.try_initialize_from_vertices(vertices, level);
        if result.is_err() {
            self.clear_session();
        }
        result
    }

    fn try_initialize_from_vertices(
        &mut self,
        vertices: &[VertexId],
        level: i32,
    ) -> OptimizerResult<()> {
        let mut active_vertices: Vec<VertexId> = Vec::with_capacity(vertices.len());
        for &vid in vertices {
            if !self.graph.contains_vertex(vid) {
                return Err(GraphError::UnknownVertex(vid).into());
            }
            active_vertices.push(vid);
        }
        active_vertices.sort_unstable();
        active_vertices.dedup();

        let mut active_edges: Vec<EdgeId> = Vec::new();
        for eid in self.graph.edge_ids() {
            let edge = self
                .graph
                .edge(eid)
                .ok_or(GraphError::UnknownEdge(eid))?;
            if edge.level() != level {
                continue;
            }
            if edge
                .vertex_ids()
                .iter()
                .all(|vid| active_vertices.binary_search(vid).is_ok())
            {
                active_edges.push(eid);
            }
        }
        if active_edges.is_empty() {
            return Err(OptimizerError::EmptyActiveSet);
        }
        for &vid in &active_vertices {
            let connected = self
                .graph
                .edges_of(vid)
                .any(|eid| active_edges.binary_search(&eid).is_ok());
            if !connected {
                warn!(vertex = vid, "active vertex has no active edge");
            }
        }

        self.active_vertices = active_vertices;
        self.active_edges = active_edges;
        self.build_index_mapping()?;
        self.initialized = true;
        debug!(
            vertices = self.active_vertices.len(),
            edges = self.active_edges.len(),
            free = self.index_mapping.len(),
            level,
            "initialized optimization"
        );
        Ok(())
    }

    /// Open a session over an explicit edge subset.
    ///
    /// The active vertices are the union of the edges' endpoints. All
    /// edges must share one level.
    pub fn initialize_optimization_from_edges(&mut self, edges: &[EdgeId]) -> OptimizerResult<()> {
        self.clear_session();
        let result = self.try_initialize_from_edges(edges);
        if result.is_err() {
            self.clear_session();
        }
        result
    }

    fn try_initialize_from_edges(&mut self, edges: &[EdgeId]) -> OptimizerResult<()> {
        let mut active_edges: Vec<EdgeId> = Vec::with_capacity(edges.len());
        let mut active_vertices: Vec<VertexId> = Vec::new();
        let mut level: Option<i32> = None;
        for &eid in edges {
            let edge = self
                .graph
                .edge(eid)
                .ok_or(GraphError::UnknownEdge(eid))?;
            match level {
                None => level = Some(edge.level()),
                Some(expected) if expected != edge.level() => {
                    return Err(OptimizerError::InconsistentLevel(expected, edge.level()));
                }
                Some(_) => {}
            }
            active_edges.push(eid);
            active_vertices.extend_from_slice(edge.vertex_ids());
        }
        active_edges.sort_unstable();
        active_edges.dedup();
        active_vertices.sort_unstable();
        active_vertices.dedup();
        if active_edges.is_empty() {
            return Err(OptimizerError::EmptyActiveSet);
        }

        self.active_vertices = active_vertices;
        self.active_edges = active_edges;
        self.build_index_mapping()?;
        self.initialized = true;
        debug!(
            vertices = self.active_vertices.len(),
            edges = self.active_edges.len(),
            free = self.index_mapping.len(),
            "initialized optimization from edges"
        );
        Ok(())
    }

    /// Extend an active session with additional vertices and edges.
    ///
    /// Existing hessian indices are kept; new free vertices are appended
    /// after the current maximum index.
    pub fn update_initialization(
        &mut self,
        vertices: &[VertexId],
        edges: &[EdgeId],
    ) -> OptimizerResult<()> {
        if !self.initialized {
            return Err(OptimizerError::NotInitialized);
        }
        for &vid in vertices {
            if !self.graph.contains_vertex(vid) {
                return Err(GraphError::UnknownVertex(vid).into());
            }
        }
        for &eid in edges {
            if !self.graph.contains_edge(eid) {
                return Err(GraphError::UnknownEdge(eid).into());
            }
        }

        let mut new_vertices: Vec<VertexId> = vertices
            .iter()
            .copied()
            .filter(|vid| self.active_vertices.binary_search(vid).is_err())
            .collect();
        new_vertices.sort_unstable();
        new_vertices.dedup();

        // two passes keep the marginalized-last partition among the appended indices
        for marginalized_pass in [false, true] {
            for &vid in &new_vertices {
                let vertex = self
                    .graph
                    .vertex_mut(vid)
                    .ok_or(GraphError::UnknownVertex(vid))?;
                if vertex.is_fixed() || vertex.is_marginalized() != marginalized_pass {
                    continue;
                }
                vertex.set_hessian_index(Some(self.index_mapping.len()));
                self.index_mapping.push(vid);
            }
        }

        self.active_vertices.extend(new_vertices);
        self.active_vertices.sort_unstable();
        let new_edges: Vec<EdgeId> = edges
            .iter()
            .copied()
            .filter(|eid| self.active_edges.binary_search(eid).is_err())
            .collect();
        self.active_edges.extend(new_edges);
        self.active_edges.sort_unstable();
        self.active_edges.dedup();
        self.error_cache.clear();
        self.jacobian_cache.clear();
        Ok(())
    }

    /// Reset every assigned hessian index and close the session
    pub fn clear_index_mapping(&mut self) {
        self.clear_session();
    }

    /// Clear the session, caches, and collected statistics.
    ///
    /// The graph and the algorithm stay untouched.
    pub fn clear(&mut self) {
        self.clear_session();
        if let Some(stats) = self.statistics.as_mut() {
            stats.clear();
        }
    }

    fn clear_session(&mut self) {
        let ids: Vec<VertexId> = self.graph.vertex_ids().collect();
        for vid in ids {
            if let Some(vertex) = self.graph.vertex_mut(vid) {
                vertex.set_hessian_index(None);
            }
        }
        self.active_vertices.clear();
        self.active_edges.clear();
        self.index_mapping.clear();
        self.error_cache.clear();
        self.jacobian_cache.clear();
        self.initialized = false;
    }

    fn build_index_mapping(&mut self) -> OptimizerResult<()> {
        self.index_mapping.clear();
        for marginalized_pass in [false, true] {
            for &vid in &self.active_vertices {
                let vertex = self
                    .graph
                    .vertex_mut(vid)
                    .ok_or(GraphError::UnknownVertex(vid))?;
                if vertex.is_fixed() {
                    vertex.set_hessian_index(None);
                    continue;
                }
                if vertex.is_marginalized() != marginalized_pass {
                    continue;
                }
                vertex.set_hessian_index(Some(self.index_mapping.len()));
                self.index_mapping.push(vid);
            }
        }
        Ok(())
    }

    // ---- session queries ----------------------------------------------------

    pub fn active_vertices(&self) -> &[VertexId] {
        &self.active_vertices
    }

    pub fn active_edges(&self) -> &[EdgeId] {
        &self.active_edges
    }

    /// Vertex ids positioned by hessian index
    pub fn index_mapping(&self) -> &[VertexId] {
        &self.index_mapping
    }

    pub fn find_active_vertex(&self, id: VertexId) -> bool {
        self.active_vertices.binary_search(&id).is_ok()
    }

    pub fn find_active_edge(&self, id: EdgeId) -> bool {
        self.active_edges.binary_search(&id).is_ok()
    }

    // ---- graph maintenance --------------------------------------------------

    /// Remove a vertex and its incident edges, keeping an active session
    /// consistent: dropped elements leave the active containers and the
    /// index mapping is rebuilt.
    pub fn remove_vertex(&mut self, id: VertexId) -> OptimizerResult<()> {
        let (_, removed_edges) = self.graph.remove_vertex(id)?;
        if !self.initialized {
            return Ok(());
        }
        self.active_vertices.retain(|&vid| vid != id);
        self.active_edges
            .retain(|eid| !removed_edges.contains(eid));
        for eid in &removed_edges {
            self.error_cache.remove(eid);
            self.jacobian_cache.remove(eid);
        }
        if self.active_edges.is_empty() {
            warn!(vertex = id, "active set empty after vertex removal");
            self.clear_session();
            return Ok(());
        }
        self.build_index_mapping()?;
        // the mapping changed, cached jacobian block positions are stale
        self.error_cache.clear();
        self.jacobian_cache.clear();
        Ok(())
    }

    // ---- error evaluation and linearization ---------------------------------

    /// Evaluate and cache the residual of every active edge.
    ///
    /// Registered compute-error actions run first, in order.
    pub fn compute_active_errors(&mut self) -> OptimizerResult<()> {
        let actions = std::mem::take(&mut self.compute_error_actions);
        for (_, action) in &actions {
            action(self);
        }
        self.compute_error_actions = actions;

        let errors: OptimizerResult<Vec<(EdgeId, DVector<f64>)>> = self
            .active_edges
            .par_iter()
            .map(|&eid| {
                let edge = self.graph.edge(eid).ok_or(GraphError::UnknownEdge(eid))?;
                let vertices = self.graph.edge_vertices(edge);
                Ok((eid, edge.compute_error(&vertices)))
            })
            .collect();
        self.error_cache = errors?.into_iter().collect();
        Ok(())
    }

    /// Weighted sum of the cached residuals
    pub fn active_chi2(&self) -> f64 {
        self.active_edges
            .iter()
            .filter_map(|eid| {
                let edge = self.graph.edge(*eid)?;
                let error = self.error_cache.get(eid)?;
                Some(edge.chi2(error))
            })
            .sum()
    }

    /// Evaluate and cache the Jacobian blocks of every active edge
    pub fn linearize_system(&mut self) -> OptimizerResult<()> {
        let jacobians: OptimizerResult<Vec<(EdgeId, Vec<DMatrix<f64>>)>> = self
            .active_edges
            .par_iter()
            .map(|&eid| {
                let edge = self.graph.edge(eid).ok_or(GraphError::UnknownEdge(eid))?;
                let vertices = self.graph.edge_vertices(edge);
                Ok((eid, edge.jacobians(&vertices)))
            })
            .collect();
        self.jacobian_cache = jacobians?.into_iter().collect();
        Ok(())
    }

    /// Apply an increment to the mapped vertices via `oplus`.
    ///
    /// The increment is laid out by hessian index, one slice per free
    /// vertex.
    pub fn update(&mut self, increment: &DVector<f64>) -> OptimizerResult<()> {
        let expected: usize = self
            .index_mapping
            .iter()
            .map(|&vid| {
                self.graph
                    .vertex(vid)
                    .map(|v| v.dimension())
                    .unwrap_or(0)
            })
            .sum();
        if increment.len() != expected {
            return Err(OptimizerError::IncrementDimension {
                expected,
                actual: increment.len(),
            });
        }
        let mapping = std::mem::take(&mut self.index_mapping);
        let mut offset = 0;
        for &vid in &mapping {
            if let Some(vertex) = self.graph.vertex_mut(vid) {
                let dim = vertex.dimension();
                vertex.oplus(increment.rows(offset, dim));
                offset += dim;
            }
        }
        self.index_mapping = mapping;
        Ok(())
    }

    // ---- optimization loop --------------------------------------------------

    /// Run up to `iterations` iterations of the plugged-in algorithm.
    ///
    /// Returns the number of iterations performed. Convergence, the
    /// force-stop flag, and solver failure all end the loop early
    /// without an error; only a missing session or algorithm is one.
    pub fn optimize(&mut self, iterations: usize, online: bool) -> OptimizerResult<usize> {
        if !self.initialized {
            return Err(OptimizerError::NotInitialized);
        }
        let mut algorithm = self.algorithm.take().ok_or(OptimizerError::NoAlgorithm)?;
        if self.index_mapping.is_empty() {
            warn!("no free vertices in the active set, nothing to optimize");
            self.algorithm = Some(algorithm);
            return Ok(0);
        }

        if let Err(err) = algorithm.init(self, online) {
            warn!(%err, algorithm = algorithm.name(), "algorithm initialization failed");
            self.algorithm = Some(algorithm);
            return Ok(0);
        }

        let mut performed = 0;
        for iteration in 0..iterations {
            if self.terminate() {
                info!(iteration, "optimization stopped by force-stop flag");
                break;
            }
            let iter_start = Instant::now();

            let residual_start = Instant::now();
            if let Err(err) = self.compute_active_errors() {
                warn!(%err, "residual evaluation failed");
                break;
            }
            let time_residuals = residual_start.elapsed();

            let linearize_start = Instant::now();
            if let Err(err) = self.linearize_system() {
                warn!(%err, "linearization failed");
                break;
            }
            let time_linearize = linearize_start.elapsed();

            match algorithm.solve(self, iteration, online) {
                Ok(SolveOutcome::Step(dx)) => {
                    if let Err(err) = self.update(&dx) {
                        warn!(%err, "increment application failed");
                        break;
                    }
                }
                Ok(SolveOutcome::StepApplied) => {}
                Ok(SolveOutcome::Converged) => {
                    debug!(iteration, "algorithm signalled convergence");
                    break;
                }
                Err(err) => {
                    warn!(%err, iteration, algorithm = algorithm.name(), "solver failure");
                    break;
                }
            }
            performed += 1;

            if self.collect_statistics || self.verbose {
                if let Err(err) = self.compute_active_errors() {
                    warn!(%err, "residual evaluation failed");
                    break;
                }
                let chi2 = self.active_chi2();
                if self.verbose {
                    info!(iteration, chi2, "iteration finished");
                }
                if self.collect_statistics {
                    let record = BatchStatistics {
                        iteration,
                        chi2,
                        num_active_vertices: self.active_vertices.len(),
                        num_active_edges: self.active_edges.len(),
                        hessian_dimension: self
                            .index_mapping
                            .iter()
                            .filter_map(|&vid| self.graph.vertex(vid))
                            .map(|v| v.dimension())
                            .sum(),
                        time_residuals,
                        time_linearize,
                        time_iteration: iter_start.elapsed(),
                    };
                    self.statistics.get_or_insert_with(Vec::new).push(record);
                }
            }
        }

        self.algorithm = Some(algorithm);
        Ok(performed)
    }

    // ---- checkpoint stacks --------------------------------------------------

    /// Checkpoint the estimates of every active vertex
    pub fn push(&mut self) {
        let vertices = std::mem::take(&mut self.active_vertices);
        self.push_vertices(&vertices);
        self.active_vertices = vertices;
    }

    /// Restore every active vertex from its checkpoint
    pub fn pop(&mut self) {
        let vertices = std::mem::take(&mut self.active_vertices);
        self.pop_vertices(&vertices);
        self.active_vertices = vertices;
    }

    /// Drop the newest checkpoint of every active vertex
    pub fn discard_top(&mut self) {
        let vertices = std::mem::take(&mut self.active_vertices);
        self.discard_top_vertices(&vertices);
        self.active_vertices = vertices;
    }

    /// Checkpoint the estimates of an explicit vertex subset
    pub fn push_vertices(&mut self, vertices: &[VertexId]) {
        for &vid in vertices {
            match self.graph.vertex_mut(vid) {
                Some(vertex) => vertex.push(),
                None => warn!(vertex = vid, "push on unknown vertex"),
            }
        }
    }

    /// Restore an explicit vertex subset from its checkpoints
    pub fn pop_vertices(&mut self, vertices: &[VertexId]) {
        for &vid in vertices {
            match self.graph.vertex_mut(vid) {
                Some(vertex) => {
                    vertex.pop();
                }
                None => warn!(vertex = vid, "pop on unknown vertex"),
            }
        }
    }

    /// Drop the newest checkpoint of an explicit vertex subset
    pub fn discard_top_vertices(&mut self, vertices: &[VertexId]) {
        for &vid in vertices {
            match self.graph.vertex_mut(vid) {
                Some(vertex) => {
                    vertex.discard_top();
                }
                None => warn!(vertex = vid, "discard_top on unknown vertex"),
            }
        }
    }

    // ---- gauge and marginal analysis ----------------------------------------

    /// Active vertex of maximal dimension, lowest id on ties
    pub fn find_gauge(&self) -> Option<VertexId> {
        let mut best: Option<(usize, VertexId)> = None;
        for &vid in &self.active_vertices {
            let Some(vertex) = self.graph.vertex(vid) else {
                continue;
            };
            let dim = vertex.dimension();
            match best {
                Some((best_dim, _)) if best_dim >= dim => {}
                _ => best = Some((dim, vid)),
            }
        }
        best.map(|(_, vid)| vid)
    }

    /// Whether the active problem is free to drift.
    ///
    /// Returns false if any maximal-dimension active vertex is fixed or
    /// anchored by a full-dimension unary edge.
    pub fn gauge_freedom(&self) -> bool {
        let max_dim = self
            .active_vertices
            .iter()
            .filter_map(|&vid| self.graph.vertex(vid))
            .map(|v| v.dimension())
            .max();
        let Some(max_dim) = max_dim else {
            return false;
        };
        for &vid in &self.active_vertices {
            let Some(vertex) = self.graph.vertex(vid) else {
                continue;
            };
            if vertex.dimension() != max_dim {
                continue;
            }
            if vertex.is_fixed() {
                return false;
            }
            let anchored = self.graph.edges_of(vid).any(|eid| {
                self.find_active_edge(eid)
                    && self.graph.edge(eid).is_some_and(|edge| {
                        edge.vertex_ids().len() == 1 && edge.dimension() == vertex.dimension()
                    })
            });
            if anchored {
                return false;
            }
        }
        true
    }

    /// Covariance blocks of the current linearization.
    ///
    /// `block_pairs` are `(row, col)` hessian block indices. Requires an
    /// active session with a cached linearization and an algorithm that
    /// supports marginal recovery.
    pub fn compute_marginals(
        &mut self,
        block_pairs: &[(usize, usize)],
    ) -> OptimizerResult<MarginalCovariance> {
        if !self.initialized {
            return Err(OptimizerError::NotInitialized);
        }
        if self.jacobian_cache.len() != self.active_edges.len()
            || self.error_cache.len() != self.active_edges.len()
        {
            return Err(OptimizerError::NotLinearized);
        }
        let mut algorithm = self.algorithm.take().ok_or(OptimizerError::NoAlgorithm)?;
        let result = algorithm.compute_marginals(self, block_pairs);
        self.algorithm = Some(algorithm);
        result
    }

    // ---- initial guess ------------------------------------------------------

    /// Propagate estimates from the fixed vertices over the active edges.
    ///
    /// Breadth-first: roots are the fixed active vertices in id order,
    /// and each binary edge proposes the undetermined endpoint's
    /// estimate from the determined one. Unreachable vertices keep
    /// their current estimates.
    pub fn compute_initial_guess(&mut self) -> OptimizerResult<()> {
        if !self.initialized {
            return Err(OptimizerError::NotInitialized);
        }
        let mut determined: Vec<VertexId> = Vec::new();
        let mut frontier: std::collections::VecDeque<VertexId> = std::collections::VecDeque::new();
        for &vid in &self.active_vertices {
            let fixed = self
                .graph
                .vertex(vid)
                .is_some_and(|vertex| vertex.is_fixed());
            if fixed {
                determined.push(vid);
                frontier.push_back(vid);
            }
        }
        if frontier.is_empty() {
            warn!("no fixed vertex in the active set, initial guess skipped");
            return Ok(());
        }

        while let Some(current) = frontier.pop_front() {
            let mut incident: Vec<EdgeId> = self
                .graph
                .edges_of(current)
                .filter(|eid| self.find_active_edge(*eid))
                .collect();
            incident.sort_unstable();

            let mut proposals: Vec<(VertexId, DVector<f64>)> = Vec::new();
            for eid in incident {
                let Some(edge) = self.graph.edge(eid) else {
                    continue;
                };
                let ids = edge.vertex_ids();
                if ids.len() != 2 {
                    continue;
                }
                let (from_slot, other) = if ids[0] == current {
                    (0, ids[1])
                } else {
                    (1, ids[0])
                };
                if determined.binary_search(&other).is_ok()
                    || proposals.iter().any(|(vid, _)| *vid == other)
                {
                    continue;
                }
                let vertices = self.graph.edge_vertices(edge);
                if let Some(guess) = edge.initial_estimate(&vertices, from_slot, 1 - from_slot) {
                    proposals.push((other, guess));
                }
            }

            for (vid, guess) in proposals {
                if let Some(vertex) = self.graph.vertex_mut(vid) {
                    vertex.set_estimate(guess);
                }
                let insert_at = determined
                    .binary_search(&vid)
                    .unwrap_or_else(|position| position);
                determined.insert(insert_at, vid);
                frontier.push_back(vid);
            }
        }
        Ok(())
    }
}
