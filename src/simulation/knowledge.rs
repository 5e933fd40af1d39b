//! Spatial connectivity knowledge, gossiped between mobile nodes.
//!
//! Each node keeps one [`KnowledgeCell`] per task/parking location of the
//! navigation graph and counts how often it was (dis)connected near it.
//! Cells are addressed by position: every lookup resolves to the nearest
//! cell by linear scan.
//!
//! Merging a gossiped snapshot adds its counts into whatever local cell is
//! nearest to the snapshot's position. Counts of a snapshot that was itself
//! merged from elsewhere are therefore re-added, and a node that receives
//! its own cell back double-counts it. The estimator is biased towards
//! frequently gossiped cells; callers treat it as a heuristic risk score.
//!
//! Two nodes trading the same cell back and forth grow its counts
//! exponentially, so counters saturate at `u64::MAX` instead of wrapping.
//! A saturated cell keeps `connected <= visited`.

use rand::Rng;
use rand::rngs::StdRng;

use super::graph::{NavigationGraph, NodeKind};
use super::types::Point;

/// Connection statistics for one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnowledgeCell {
    pub position: Point,
    pub visited: u64,
    pub connected: u64,
}

impl KnowledgeCell {
    pub fn new(position: Point) -> Self {
        Self {
            position,
            visited: 0,
            connected: 0,
        }
    }

    fn register(&mut self, connected: bool) {
        self.visited = self.visited.saturating_add(1);
        if connected {
            self.connected = self.connected.saturating_add(1);
        }
    }

    fn add(&mut self, other: &KnowledgeCell) {
        self.visited = self.visited.saturating_add(other.visited);
        self.connected = self.connected.saturating_add(other.connected);
    }

    /// `connected / visited`, or `-1.0` if never visited.
    pub fn probability(&self) -> f64 {
        if self.visited > 0 { self.connected as f64 / self.visited as f64 } else { -1.0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityKnowledgeBase {
    cells: Vec<KnowledgeCell>,
    edits: u64,
    expansions: u64,
}

impl ConnectivityKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Knowledge base with one cell per given position.
    pub fn from_positions(positions: impl IntoIterator<Item = Point>) -> Self {
        Self {
            cells: positions.into_iter().map(KnowledgeCell::new).collect(),
            ..Self::default()
        }
    }

    /// Start over with fresh cells, task nodes first, then parking nodes.
    pub fn initialize(&mut self, graph: &NavigationGraph) {
        let positions = [NodeKind::Task, NodeKind::Parking].iter().flat_map(|&kind| graph.nodes_of_kind(kind)).filter_map(|id| graph.position(id));
        *self = Self::from_positions(positions);
    }

    pub fn cells(&self) -> &[KnowledgeCell] {
        &self.cells
    }

    /// Number of registrations applied.
    pub fn edits(&self) -> u64 {
        self.edits
    }

    /// Number of gossiped snapshots merged.
    pub fn expansions(&self) -> u64 {
        self.expansions
    }

    pub fn reset(&mut self) {
        self.cells.clear();
        self.edits = 0;
        self.expansions = 0;
    }

    fn nearest_index(&self, position: &Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, cell) in self.cells.iter().enumerate() {
            let d = cell.position.distance2(position);
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Record one observation at `position`. No-op before initialization.
    pub fn register(&mut self, position: &Point, connected: bool) {
        if let Some(i) = self.nearest_index(position) {
            self.cells[i].register(connected);
            self.edits += 1;
        }
    }

    /// Connection probability of the nearest cell, `-1.0` if unknown.
    pub fn probability(&self, position: &Point) -> f64 {
        self.nearest_index(position).map_or(-1.0, |i| self.cells[i].probability())
    }

    /// Snapshot of a uniformly random cell.
    pub fn sample_for_exchange(&self, rng: &mut StdRng) -> Option<KnowledgeCell> {
        if self.cells.is_empty() {
            return None;
        }
        Some(self.cells[rng.gen_range(0..self.cells.len())])
    }

    /// Merge a gossiped snapshot into the nearest local cell.
    pub fn incorporate(&mut self, snapshot: &KnowledgeCell) {
        if let Some(i) = self.nearest_index(&snapshot.position) {
            self.cells[i].add(snapshot);
            self.expansions += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn three_of_four_connected_is_three_quarters() {
        let mut kb = ConnectivityKnowledgeBase::from_positions([Point::planar(0.0, 0.0)]);
        let here = Point::planar(1.0, 1.0);
        assert_eq!(kb.probability(&here), -1.0);
        kb.register(&here, true);
        kb.register(&here, true);
        kb.register(&here, true);
        kb.register(&here, false);
        assert_eq!(kb.probability(&here), 0.75);
        assert_eq!(kb.edits(), 4);
    }

    #[test]
    fn registrations_go_to_the_nearest_cell() {
        let mut kb = ConnectivityKnowledgeBase::from_positions([Point::planar(0.0, 0.0), Point::planar(10.0, 0.0)]);
        kb.register(&Point::planar(9.0, 0.0), false);
        assert_eq!(kb.probability(&Point::planar(0.0, 0.0)), -1.0);
        assert_eq!(kb.probability(&Point::planar(10.0, 0.0)), 0.0);
        // The first cell is reachable too.
        kb.register(&Point::planar(0.5, 0.0), true);
        assert_eq!(kb.probability(&Point::planar(0.0, 0.0)), 1.0);
    }

    #[test]
    fn uninitialized_base_is_inert() {
        let mut kb = ConnectivityKnowledgeBase::new();
        let mut rng = StdRng::seed_from_u64(1);
        kb.register(&Point::default(), true);
        assert_eq!(kb.probability(&Point::default()), -1.0);
        assert!(kb.sample_for_exchange(&mut rng).is_none());
        assert_eq!(kb.edits(), 0);
    }

    #[test]
    fn incorporate_adds_counts_cumulatively() {
        let mut kb = ConnectivityKnowledgeBase::from_positions([Point::planar(0.0, 0.0), Point::planar(10.0, 0.0)]);
        kb.register(&Point::planar(10.0, 0.0), true);
        let snapshot = KnowledgeCell {
            position: Point::planar(11.0, 0.0),
            visited: 3,
            connected: 0,
        };
        kb.incorporate(&snapshot);
        kb.incorporate(&snapshot);
        assert_eq!(kb.cells()[1].visited, 7);
        assert_eq!(kb.cells()[1].connected, 1);
        assert_eq!(kb.expansions(), 2);
    }

    #[test]
    fn repeated_exchange_saturates_instead_of_overflowing() {
        let here = Point::planar(0.0, 0.0);
        let mut a = ConnectivityKnowledgeBase::from_positions([here]);
        let mut b = ConnectivityKnowledgeBase::from_positions([here]);
        a.register(&here, true);
        a.register(&here, false);

        for _ in 0..200 {
            b.incorporate(&a.cells()[0]);
            a.incorporate(&b.cells()[0]);
        }

        for kb in [&a, &b] {
            let cell = kb.cells()[0];
            assert_eq!(cell.visited, u64::MAX);
            assert!(cell.connected <= cell.visited);
            let p = kb.probability(&here);
            assert!((0.0..=1.0).contains(&p), "{}", p);
        }
        assert_eq!(a.expansions(), 200);
    }

    #[test]
    fn initialize_covers_task_and_parking_nodes() {
        let mut graph = NavigationGraph::new();
        graph.add_node(Point::planar(0.0, 0.0), NodeKind::Standard);
        graph.add_node(Point::planar(5.0, 0.0), NodeKind::Parking);
        graph.add_node(Point::planar(9.0, 0.0), NodeKind::Task);
        let mut kb = ConnectivityKnowledgeBase::new();
        kb.initialize(&graph);
        let positions: Vec<Point> = kb.cells().iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![Point::planar(9.0, 0.0), Point::planar(5.0, 0.0)]);

        let mut rng = StdRng::seed_from_u64(7);
        let sample = kb.sample_for_exchange(&mut rng).unwrap();
        assert!(positions.contains(&sample.position));
    }
}
