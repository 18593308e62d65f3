//! Hypergraph storage for vertices and edges.
//!
//! The containers use `BTreeMap`s keyed by identifier so that iteration
//! order is deterministic across runs, which the optimizer relies on for a
//! reproducible linear-system layout.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{GraphError, GraphResult};

pub mod edge;
pub mod vertex;

pub use edge::{Edge, EdgeId, LinearBetweenEdge, LinearPriorEdge};
pub use vertex::{VectorVertex, Vertex, VertexId};

/// Summary counts of a hypergraph
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    pub num_vertices: usize,
    pub num_edges: usize,
    pub num_fixed_vertices: usize,
    pub total_dimension: usize,
}

impl fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Graph: {} vertices ({} fixed), {} edges, total dimension {}",
            self.num_vertices, self.num_fixed_vertices, self.num_edges, self.total_dimension
        )
    }
}

/// Hypergraph of parameter vertices and observation edges.
///
/// Owns the vertices and edges as trait objects and maintains the
/// vertex-to-edge adjacency used for active-subgraph construction.
#[derive(Default)]
pub struct SparseGraph {
    vertices: BTreeMap<VertexId, Box<dyn Vertex>>,
    edges: BTreeMap<EdgeId, Box<dyn Edge>>,
    adjacency: BTreeMap<VertexId, BTreeSet<EdgeId>>,
}

impl SparseGraph {
    /// Creates a new, empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its id
    pub fn add_vertex(&mut self, vertex: Box<dyn Vertex>) -> GraphResult<VertexId> {
        let id = vertex.id();
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        self.adjacency.insert(id, BTreeSet::new());
        self.vertices.insert(id, vertex);
        Ok(id)
    }

    /// Add an edge and return its id.
    ///
    /// All endpoints must already be stored.
    pub fn add_edge(&mut self, edge: Box<dyn Edge>) -> GraphResult<EdgeId> {
        let id = edge.id();
        if self.edges.contains_key(&id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        for &vertex in edge.vertex_ids() {
            if !self.vertices.contains_key(&vertex) {
                return Err(GraphError::DanglingEndpoint { edge: id, vertex });
            }
        }
        for &vertex in edge.vertex_ids() {
            self.adjacency
                .get_mut(&vertex)
                .expect("adjacency entry exists for every stored vertex")
                .insert(id);
        }
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Remove an edge, returning it
    pub fn remove_edge(&mut self, id: EdgeId) -> GraphResult<Box<dyn Edge>> {
        let edge = self.edges.remove(&id).ok_or(GraphError::UnknownEdge(id))?;
        for vertex in edge.vertex_ids() {
            if let Some(incident) = self.adjacency.get_mut(vertex) {
                incident.remove(&id);
            }
        }
        Ok(edge)
    }

    /// Remove a vertex together with its incident edges.
    ///
    /// Returns the removed vertex and the ids of the removed edges.
    pub fn remove_vertex(&mut self, id: VertexId) -> GraphResult<(Box<dyn Vertex>, Vec<EdgeId>)> {
        if !self.vertices.contains_key(&id) {
            return Err(GraphError::UnknownVertex(id));
        }
        let incident: Vec<EdgeId> = self
            .adjacency
            .get(&id)
            .map(|edges| edges.iter().copied().collect())
            .unwrap_or_default();
        for &edge in &incident {
            self.remove_edge(edge)?;
        }
        self.adjacency.remove(&id);
        let vertex = self
            .vertices
            .remove(&id)
            .expect("vertex presence checked above");
        Ok((vertex, incident))
    }

    /// Get a vertex by id
    pub fn vertex(&self, id: VertexId) -> Option<&dyn Vertex> {
        self.vertices.get(&id).map(|v| v.as_ref())
    }

    /// Get a mutable vertex by id
    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut dyn Vertex> {
        match self.vertices.get_mut(&id) {
            Some(vertex) => Some(vertex.as_mut()),
            None => None,
        }
    }

    /// Get an edge by id
    pub fn edge(&self, id: EdgeId) -> Option<&dyn Edge> {
        self.edges.get(&id).map(|e| e.as_ref())
    }

    /// Whether the vertex id is stored
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Whether the edge id is stored
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// All vertex ids in ascending order
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys().copied()
    }

    /// All edge ids in ascending order
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    /// Ids of the edges incident to a vertex, in ascending order
    pub fn edges_of(&self, id: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|edges| edges.iter().copied())
    }

    /// Number of stored vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of stored edges
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Resolve the endpoints of an edge, ordered parallel to its
    /// [`Edge::vertex_ids`]
    pub fn edge_vertices<'a>(&'a self, edge: &dyn Edge) -> Vec<&'a dyn Vertex> {
        edge.vertex_ids()
            .iter()
            .map(|id| {
                self.vertex(*id)
                    .expect("edge endpoints are validated on insert")
            })
            .collect()
    }

    /// Summary counts
    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            num_vertices: self.vertices.len(),
            num_edges: self.edges.len(),
            num_fixed_vertices: self.vertices.values().filter(|v| v.is_fixed()).count(),
            total_dimension: self.vertices.values().map(|v| v.dimension()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    fn chain(n: usize) -> SparseGraph {
        let mut graph = SparseGraph::new();
        for i in 0..n {
            graph
                .add_vertex(Box::new(VectorVertex::new(i, dvector![i as f64])))
                .unwrap();
        }
        for i in 0..n - 1 {
            graph
                .add_edge(Box::new(LinearBetweenEdge::new(i, i, i + 1, dvector![1.0])))
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_duplicate_vertex_rejected() {
        let mut graph = SparseGraph::new();
        graph
            .add_vertex(Box::new(VectorVertex::new(0, dvector![0.0])))
            .unwrap();
        let result = graph.add_vertex(Box::new(VectorVertex::new(0, dvector![1.0])));
        assert!(matches!(result, Err(GraphError::DuplicateVertex(0))));
    }

    #[test]
    fn test_dangling_endpoint_rejected() {
        let mut graph = SparseGraph::new();
        graph
            .add_vertex(Box::new(VectorVertex::new(0, dvector![0.0])))
            .unwrap();
        let result = graph.add_edge(Box::new(LinearBetweenEdge::new(0, 0, 7, dvector![1.0])));
        assert!(matches!(
            result,
            Err(GraphError::DanglingEndpoint { edge: 0, vertex: 7 })
        ));
    }

    #[test]
    fn test_adjacency_tracks_edges() {
        let graph = chain(3);
        let incident: Vec<EdgeId> = graph.edges_of(1).collect();
        assert_eq!(incident, vec![0, 1]);
    }

    #[test]
    fn test_remove_vertex_removes_incident_edges() {
        let mut graph = chain(3);
        let (_, removed) = graph.remove_vertex(1).unwrap();
        assert_eq!(removed, vec![0, 1]);
        assert_eq!(graph.num_edges(), 0);
        assert_eq!(graph.num_vertices(), 2);
        assert_eq!(graph.edges_of(0).count(), 0);
    }

    #[test]
    fn test_vertex_mut_updates_through_trait_object() {
        let mut graph = chain(2);
        graph.vertex_mut(1).unwrap().set_estimate(dvector![7.0]);
        assert_eq!(graph.vertex(1).unwrap().estimate(), dvector![7.0]);
        assert!(graph.vertex_mut(9).is_none());
    }

    #[test]
    fn test_statistics() {
        let mut graph = chain(3);
        graph.vertex_mut(0).unwrap().set_fixed(true);
        let stats = graph.statistics();
        assert_eq!(stats.num_vertices, 3);
        assert_eq!(stats.num_edges, 2);
        assert_eq!(stats.num_fixed_vertices, 1);
        assert_eq!(stats.total_dimension, 3);
    }
}
