//! Scene loading, parsing, and validation logic.
//!
//! A scene is the pre-generated factory floor a run starts from: the
//! navigation graph, static obstacles, mobile nodes and access points.
//! Scenes are JSON documents:
//!
//! ```json
//! {
//!   "seed": 42,
//!   "world_size": { "x": 200, "y": 100 },
//!   "graph": {
//!     "nodes": [ { "position": { "x": 0, "y": 0 }, "kind": "task" } ],
//!     "edges": [ { "from": 0, "to": 1, "one_way": false } ]
//!   },
//!   "obstacles": [ { "type": "circle", "center_position": { "x": 5, "y": 5 }, "radius": 2 } ],
//!   "agents": [ { "address": 1, "position": { "x": 0, "y": 0 } } ],
//!   "access_points": [ { "position": { "x": 50, "y": 50 }, "working": true } ]
//! }
//! ```

use anyhow::Context;
use log::warn;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::simulation::graph::{NavigationGraph, NodeId, NodeKind};
use crate::simulation::types::{AgentAddress, Obstacle, Point};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// Extent of the factory floor.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct WorldSize {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SceneNode {
    pub position: Point,
    #[serde(default)]
    pub kind: NodeKind,
}

/// Edge between two nodes, referenced by their index in `graph.nodes`.
#[derive(Debug, Deserialize, Clone)]
pub struct SceneEdge {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub one_way: bool,
    /// Overrides the geometric length as path cost.
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SceneGraph {
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub edges: Vec<SceneEdge>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SceneAgent {
    pub address: AgentAddress,
    pub position: Point,
}

fn default_working() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SceneAccessPoint {
    pub position: Point,
    #[serde(default = "default_working")]
    pub working: bool,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize, Clone)]
pub struct Scene {
    /// Seed the scene was generated with; also seeds the run unless overridden.
    #[serde(default)]
    pub seed: u64,
    pub world_size: WorldSize,
    pub graph: SceneGraph,
    /// Static obstacles for line-of-sight checks.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Mobile nodes in registration order.
    #[serde(default)]
    pub agents: Vec<SceneAgent>,
    #[serde(default)]
    pub access_points: Vec<SceneAccessPoint>,
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;
    parse_scene(&data)
}

/// Parse and validate a scene from its JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;
    Ok(scene)
}

fn check_point(what: &str, p: &Point) -> Result<(), String> {
    const MAX_WORLD_COORD: f64 = 100000.0;
    if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
        return Err(format!("{} position is not finite", what));
    }
    if p.x.abs() > MAX_WORLD_COORD || p.y.abs() > MAX_WORLD_COORD || p.z.abs() > MAX_WORLD_COORD {
        return Err(format!("{} position ({}, {}, {}) exceeds world bounds (±{})", what, p.x, p.y, p.z, MAX_WORLD_COORD));
    }
    Ok(())
}

/// Validate scene configuration.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_NODES: usize = 10000;

    if !(scene.world_size.x > 0.0 && scene.world_size.y > 0.0) {
        return Err(format!("World size ({}, {}) must be positive", scene.world_size.x, scene.world_size.y));
    }

    let node_count = scene.graph.nodes.len();
    if node_count == 0 {
        return Err("Scene graph must contain at least one node".to_string());
    }
    if node_count > MAX_NODES {
        return Err(format!("Node count {} exceeds maximum of {}", node_count, MAX_NODES));
    }
    for (idx, node) in scene.graph.nodes.iter().enumerate() {
        check_point(&format!("Graph node {}", idx), &node.position)?;
    }

    for (idx, edge) in scene.graph.edges.iter().enumerate() {
        if edge.from >= node_count || edge.to >= node_count {
            return Err(format!("Edge {} references node {} -> {}, but the graph has {} nodes", idx, edge.from, edge.to, node_count));
        }
        if let Some(weight) = edge.weight {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(format!("Edge {} has invalid weight {}", idx, weight));
            }
        }
    }

    // Check for duplicate agent addresses
    let mut addresses = HashSet::new();
    for agent in &scene.agents {
        if agent.address == 0 {
            return Err("Agent address 0 is reserved for broadcasts".to_string());
        }
        if !addresses.insert(agent.address) {
            return Err(format!("Duplicate agent address found: {}", agent.address));
        }
        check_point(&format!("Agent {}", agent.address), &agent.position)?;
    }

    for (idx, ap) in scene.access_points.iter().enumerate() {
        check_point(&format!("Access point {}", idx), &ap.position)?;
    }

    for (idx, obstacle) in scene.obstacles.iter().enumerate() {
        match obstacle {
            Obstacle::Rectangle { position } => {
                check_point(&format!("Obstacle {} (rectangle)", idx), &position.top_left)?;
                check_point(&format!("Obstacle {} (rectangle)", idx), &position.bottom_right)?;
                if position.top_left.x >= position.bottom_right.x || position.top_left.y >= position.bottom_right.y {
                    return Err(format!(
                        "Obstacle {} (rectangle) has invalid geometry: top-left ({}, {}) must be strictly less than bottom-right ({}, {})",
                        idx, position.top_left.x, position.top_left.y, position.bottom_right.x, position.bottom_right.y
                    ));
                }
            }
            Obstacle::Circle { position } => {
                check_point(&format!("Obstacle {} (circle)", idx), &position.center)?;
                if !(position.radius > 0.0) {
                    return Err(format!("Obstacle {} (circle) has non-positive radius {}", idx, position.radius));
                }
            }
        }
    }

    Ok(())
}

/// Build the navigation graph described by the scene.
///
/// Edges the graph rejects (self-loops, duplicates) are skipped with a
/// warning. Returns the graph and the node id of every scene node, by index.
pub fn build_graph(scene: &Scene) -> (NavigationGraph, Vec<NodeId>) {
    let mut graph = NavigationGraph::new();
    let ids: Vec<NodeId> = scene.graph.nodes.iter().map(|n| graph.add_node(n.position, n.kind)).collect();

    for (idx, edge) in scene.graph.edges.iter().enumerate() {
        let (Some(&from), Some(&to)) = (ids.get(edge.from), ids.get(edge.to)) else {
            warn!("Skipping edge {}: unknown endpoint", idx);
            continue;
        };
        if let Err(e) = graph.connect(from, to, edge.one_way, edge.weight) {
            warn!("Skipping edge {}: {}", idx, e);
        }
    }

    (graph, ids)
}
