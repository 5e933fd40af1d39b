//! Navigation graph: node/edge store and shortest-path search.
//!
//! Nodes and edges live in slot arenas. Deleting a node tombstones its slot
//! and drops every incident edge; identifiers are never reused, so a
//! `NodeId` held elsewhere either still names the same node or resolves to
//! nothing.
//!
//! Shortest paths use Dijkstra over a dense distance matrix with array-scan
//! minimum extraction. That is O(V²), fine for the few hundred nodes a
//! factory floor has. When several candidates share the minimum distance the
//! first one in slot order wins.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::OcclusionQuery;
use super::types::Point;

/// Stable identity of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Stable identity of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Role of a node on the factory floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Standard,
    Task,
    Parking,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub position: Point,
    pub kind: NodeKind,
}

/// Where an edge's traversal cost comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeWeight {
    /// Straight-line length between the endpoints.
    Geometric,
    /// Explicit override.
    Fixed(f64),
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub one_way: bool,
    pub weight: EdgeWeight,
}

/// Errors raised by graph operations.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The endpoints are not connected.
    NoPath { start: NodeId, end: NodeId },
    /// Self-loop or duplicate edge.
    Rejected { from: NodeId, to: NodeId },
    UnknownNode(NodeId),
    UnknownEdge(EdgeId),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::NoPath { start, end } => write!(f, "No path from {} to {}", start, end),
            GraphError::Rejected { from, to } => write!(f, "Connection {} -> {} rejected (self-loop or duplicate)", from, to),
            GraphError::UnknownNode(id) => write!(f, "Unknown node {}", id),
            GraphError::UnknownEdge(id) => write!(f, "Unknown edge e{}", id.0),
        }
    }
}

impl std::error::Error for GraphError {}

#[derive(Debug, Clone, Default)]
pub struct NavigationGraph {
    nodes: Vec<Option<GraphNode>>,
    edges: Vec<Option<GraphEdge>>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Point, kind: NodeKind) -> NodeId {
        self.nodes.push(Some(GraphNode { position, kind }));
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn position(&self, id: NodeId) -> Option<Point> {
        self.node(id).map(|n| n.position)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        self.edges.get(id.0).and_then(Option::as_ref)
    }

    /// Live nodes in slot order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes.iter().enumerate().filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i), n)))
    }

    /// Live edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &GraphEdge)> {
        self.edges.iter().enumerate().filter_map(|(i, e)| e.as_ref().map(|e| (EdgeId(i), e)))
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes().filter(|(_, n)| n.kind == kind).map(|(id, _)| id).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Connect two nodes.
    ///
    /// `weight` overrides the geometric length when given. Rejected when
    /// `a == b`, when the weight is negative or not finite, or when an edge
    /// already covers this direction: a one-way edge covers only
    /// `from -> to`, a two-way edge covers both directions.
    pub fn connect(&mut self, a: NodeId, b: NodeId, one_way: bool, weight: Option<f64>) -> Result<EdgeId, GraphError> {
        if self.node(a).is_none() {
            return Err(GraphError::UnknownNode(a));
        }
        if self.node(b).is_none() {
            return Err(GraphError::UnknownNode(b));
        }
        let bad_weight = weight.is_some_and(|w| !(w.is_finite() && w >= 0.0));
        if a == b || bad_weight || self.connection_exists(a, b) {
            return Err(GraphError::Rejected { from: a, to: b });
        }

        self.edges.push(Some(GraphEdge {
            from: a,
            to: b,
            one_way,
            weight: weight.map_or(EdgeWeight::Geometric, EdgeWeight::Fixed),
        }));
        Ok(EdgeId(self.edges.len() - 1))
    }

    fn connection_exists(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_between(a, b).is_some() || self.edge_between(b, a).and_then(|id| self.edge(id)).is_some_and(|e| !e.one_way)
    }

    /// Edge starting at `from` and ending at `to`, as stored.
    pub fn edge_between(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.edges().find(|(_, e)| e.from == from && e.to == to).map(|(id, _)| id)
    }

    /// Tombstone a node and remove every edge touching it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        match self.nodes.get_mut(id.0) {
            Some(slot @ Some(_)) => *slot = None,
            _ => return Err(GraphError::UnknownNode(id)),
        }
        for slot in self.edges.iter_mut() {
            if slot.as_ref().is_some_and(|e| e.from == id || e.to == id) {
                *slot = None;
            }
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<GraphEdge, GraphError> {
        self.edges.get_mut(id.0).and_then(Option::take).ok_or(GraphError::UnknownEdge(id))
    }

    /// Traversal cost of an edge.
    pub fn edge_weight(&self, edge: &GraphEdge) -> f64 {
        match edge.weight {
            EdgeWeight::Fixed(w) => w,
            EdgeWeight::Geometric => match (self.position(edge.from), self.position(edge.to)) {
                (Some(a), Some(b)) => a.distance(&b),
                _ => f64::INFINITY,
            },
        }
    }

    /// Split an edge at its midpoint.
    ///
    /// The new standard node replaces the edge with two halves that keep the
    /// one-way flag; a fixed weight is halved as well.
    pub fn half_connection(&mut self, id: EdgeId) -> Result<NodeId, GraphError> {
        let edge = self.edge(id).cloned().ok_or(GraphError::UnknownEdge(id))?;
        let start = self.position(edge.from).ok_or(GraphError::UnknownNode(edge.from))?;
        let end = self.position(edge.to).ok_or(GraphError::UnknownNode(edge.to))?;

        self.remove_edge(id)?;
        let center = self.add_node(start.midpoint(&end), NodeKind::Standard);
        let half = match edge.weight {
            EdgeWeight::Fixed(w) => Some(w / 2.0),
            EdgeWeight::Geometric => None,
        };
        self.connect(edge.from, center, edge.one_way, half)?;
        self.connect(center, edge.to, edge.one_way, half)?;
        Ok(center)
    }

    /// Closest live node to `point`; the first one wins on ties.
    pub fn nearest_node(&self, point: &Point) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for (id, node) in self.nodes() {
            let d = node.position.distance(point);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Dense distance matrix over all slots. Tombstoned slots stay isolated.
    fn distance_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.nodes.len();
        let mut matrix = vec![vec![f64::INFINITY; n]; n];
        for (i, row) in matrix.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        for (_, edge) in self.edges() {
            let weight = self.edge_weight(edge);
            let (from, to) = (edge.from.0, edge.to.0);
            if weight < matrix[from][to] {
                matrix[from][to] = weight;
            }
            if !edge.one_way && weight < matrix[to][from] {
                matrix[to][from] = weight;
            }
        }
        matrix
    }

    /// Dijkstra from `start`. Returns (distances, predecessors) per slot.
    fn dijkstra(&self, matrix: &[Vec<f64>], start: usize) -> (Vec<f64>, Vec<Option<usize>>) {
        let n = matrix.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut pred = vec![None; n];
        let mut queued: Vec<bool> = self.nodes.iter().map(Option::is_some).collect();
        dist[start] = 0.0;

        loop {
            // Array-scan minimum extraction.
            let mut u: Option<usize> = None;
            for (i, &open) in queued.iter().enumerate() {
                if open && u.is_none_or(|best| dist[i] < dist[best]) {
                    u = Some(i);
                }
            }
            let Some(u) = u else { break };
            if dist[u].is_infinite() {
                break;
            }
            queued[u] = false;

            for v in 0..n {
                if v == u || !queued[v] || matrix[u][v].is_infinite() {
                    continue;
                }
                let alt = dist[u] + matrix[u][v];
                if alt < dist[v] {
                    dist[v] = alt;
                    pred[v] = Some(u);
                }
            }
        }

        (dist, pred)
    }

    /// Shortest path from `start` to `end`, both inclusive.
    pub fn shortest_path(&self, start: NodeId, end: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if self.node(start).is_none() {
            return Err(GraphError::UnknownNode(start));
        }
        if self.node(end).is_none() {
            return Err(GraphError::UnknownNode(end));
        }
        if start == end {
            return Ok(vec![start]);
        }

        let matrix = self.distance_matrix();
        let (_, pred) = self.dijkstra(&matrix, start.0);

        let mut reversed = vec![end.0];
        let mut current = end.0;
        while let Some(previous) = pred[current] {
            reversed.push(previous);
            current = previous;
        }
        if current != start.0 {
            return Err(GraphError::NoPath { start, end });
        }

        Ok(reversed.into_iter().rev().map(NodeId).collect())
    }

    /// Sum of edge costs along a path. `None` if a hop has no usable edge.
    pub fn path_cost(&self, path: &[NodeId]) -> Option<f64> {
        let mut total = 0.0;
        for hop in path.windows(2) {
            let (a, b) = (hop[0], hop[1]);
            let cost = self
                .edges()
                .filter(|(_, e)| (e.from == a && e.to == b) || (!e.one_way && e.from == b && e.to == a))
                .map(|(_, e)| self.edge_weight(e))
                .fold(f64::INFINITY, f64::min);
            if cost.is_infinite() {
                return None;
            }
            total += cost;
        }
        Some(total)
    }

    /// Number of obstacles crossed by all edges, in both directions.
    ///
    /// Used by scene generators to score a layout; a clean floor plan reports 0.
    pub fn obstructed_edge_count(&self, occlusion: &dyn OcclusionQuery) -> usize {
        self.edges()
            .filter_map(|(_, e)| Some((self.position(e.from)?, self.position(e.to)?)))
            .map(|(a, b)| occlusion.obstruction_count(&a, &b) + occlusion.obstruction_count(&b, &a))
            .sum()
    }
}
