//! Relay chain search.
//!
//! Finds a sequence of waypoints, drawn from a fixed candidate pool (the
//! parking nodes of the floor plan), so that every hop of
//! `source -> waypoints -> destination` is shorter than the radio range.
//!
//! The search is a bounded heuristic:
//! 1. Rank candidates by detour cost `d(s,c) + d(c,t) - d(s,t)`.
//! 2. Take the best `min_hops + margin` of them and chain them greedily by
//!    nearest neighbour, starting at the source.
//! 3. Validate the chain; on success drop redundant waypoints and return it.
//! 4. Otherwise widen the margin until it reaches a fraction of the pool,
//!    then make one last attempt with the widest chain.
//!
//! An empty chain means no relay is needed. A failed search returns
//! [`PlannerError::NoRoute`].

use std::collections::HashSet;
use std::fmt;

use log::debug;

use super::graph::{NavigationGraph, NodeId, NodeKind};
use super::transmission::MAX_RANGE;
use super::types::Point;

/// Largest fraction of the candidate pool a search may grow to.
pub const RELAY_SEARCH_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// No candidate chain keeps every hop within range.
    NoRoute,
    /// No working access point to anchor the chain at.
    NoAccessPoint,
    UnknownDestination(NodeId),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::NoRoute => write!(f, "No feasible relay chain found"),
            PlannerError::NoAccessPoint => write!(f, "No working access point available"),
            PlannerError::UnknownDestination(id) => write!(f, "Relay destination {} is not in the graph", id),
        }
    }
}

impl std::error::Error for PlannerError {}

#[derive(Debug, Clone)]
pub struct RelayPlanner {
    candidates: Vec<Point>,
    max_range: f64,
    search_factor: f64,
}

impl Default for RelayPlanner {
    fn default() -> Self {
        Self::new(Vec::new(), MAX_RANGE, RELAY_SEARCH_FACTOR)
    }
}

impl RelayPlanner {
    pub fn new(candidates: Vec<Point>, max_range: f64, search_factor: f64) -> Self {
        Self {
            candidates,
            max_range,
            search_factor,
        }
    }

    /// Planner whose candidate pool is every parking node of `graph`.
    pub fn from_graph(graph: &NavigationGraph, max_range: f64, search_factor: f64) -> Self {
        let candidates = graph.nodes_of_kind(NodeKind::Parking).into_iter().filter_map(|id| graph.position(id)).collect();
        Self::new(candidates, max_range, search_factor)
    }

    pub fn candidates(&self) -> &[Point] {
        &self.candidates
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Waypoint chain from `source` to `destination`, endpoints excluded.
    pub fn search(&self, source: &Point, destination: &Point) -> Result<Vec<Point>, PlannerError> {
        let direct = source.distance(destination);
        if direct < self.max_range {
            return Ok(Vec::new());
        }

        let min_hops = (direct / self.max_range).ceil() as usize;
        let ranked = self.rank_by_detour(source, destination);
        let bound = self.candidates.len() as f64 * self.search_factor;

        let mut margin = 0;
        loop {
            let take = (min_hops + margin).min(ranked.len());
            let chain = chain_nearest_neighbour(source, ranked[..take].to_vec());

            if self.is_valid(source, &chain, destination) {
                debug!("Relay chain found with {} candidates (margin {})", take, margin);
                return Ok(self.optimize(source, chain, destination));
            }

            if ((min_hops + margin) as f64) < bound && take < ranked.len() {
                margin += 1;
                continue;
            }

            // Last attempt: dropping waypoints can still repair a chain whose
            // invalid hop sits next to a redundant waypoint.
            let chain = self.optimize(source, chain, destination);
            if self.is_valid(source, &chain, destination) {
                return Ok(chain);
            }
            debug!("Relay search exhausted after margin {}", margin);
            return Err(PlannerError::NoRoute);
        }
    }

    /// Candidates ordered by ascending detour cost. Ties keep pool order.
    fn rank_by_detour(&self, source: &Point, destination: &Point) -> Vec<Point> {
        let direct = source.distance(destination);
        let mut scored: Vec<(f64, Point)> = self
            .candidates
            .iter()
            .map(|c| {
                let cost = if c == source || c == destination { f64::INFINITY } else { source.distance(c) + c.distance(destination) - direct };
                (cost, *c)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().map(|(_, c)| c).collect()
    }

    /// Every hop of `[source] + chain + [destination]` is shorter than the range.
    pub fn is_valid(&self, source: &Point, chain: &[Point], destination: &Point) -> bool {
        let mut previous = source;
        for waypoint in chain.iter().chain(std::iter::once(destination)) {
            if previous.distance(waypoint) >= self.max_range {
                return false;
            }
            previous = waypoint;
        }
        true
    }

    /// Drop interior waypoints whose neighbours reach each other directly,
    /// until no more can be removed.
    fn optimize(&self, source: &Point, chain: Vec<Point>, destination: &Point) -> Vec<Point> {
        let mut full = Vec::with_capacity(chain.len() + 2);
        full.push(*source);
        full.extend(chain);
        full.push(*destination);

        while let Some(i) = (1..full.len() - 1).find(|&i| full[i - 1].distance(&full[i + 1]) < self.max_range) {
            full.remove(i);
        }

        full[1..full.len() - 1].to_vec()
    }

    /// Relay chain from the closest working access point to `destination`,
    /// with each waypoint snapped to its nearest graph node.
    ///
    /// # Parameters
    ///
    /// * `graph` - Navigation graph used to snap waypoints
    /// * `access_points` - Positions of the working access points
    /// * `destination` - Node that needs coverage
    ///
    /// # Returns
    ///
    /// Snapped waypoints in chain order; a node snapped to twice appears once.
    pub fn assistance_route(&self, graph: &NavigationGraph, access_points: &[Point], destination: NodeId) -> Result<Vec<NodeId>, PlannerError> {
        let target = graph.position(destination).ok_or(PlannerError::UnknownDestination(destination))?;

        let mut closest: Option<(Point, f64)> = None;
        for ap in access_points {
            let d = ap.distance(&target);
            if closest.is_none_or(|(_, best)| d < best) {
                closest = Some((*ap, d));
            }
        }
        let (source, _) = closest.ok_or(PlannerError::NoAccessPoint)?;

        let chain = self.search(&source, &target)?;
        let mut seen = HashSet::new();
        let route = chain.iter().filter_map(|p| graph.nearest_node(p)).filter(|id| seen.insert(*id)).collect();
        Ok(route)
    }
}

/// Reorder `pool` by repeatedly picking the point nearest the chain's end.
fn chain_nearest_neighbour(start: &Point, mut pool: Vec<Point>) -> Vec<Point> {
    let mut chain = Vec::with_capacity(pool.len());
    let mut frontier = *start;
    while !pool.is_empty() {
        let mut best = 0;
        for i in 1..pool.len() {
            if pool[i].distance2(&frontier) < pool[best].distance2(&frontier) {
                best = i;
            }
        }
        frontier = pool.remove(best);
        chain.push(frontier);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::planar(x, y)
    }

    #[test]
    fn short_distance_needs_no_relay() {
        let planner = RelayPlanner::new(vec![p(5.0, 0.0)], MAX_RANGE, RELAY_SEARCH_FACTOR);
        assert_eq!(planner.search(&p(0.0, 0.0), &p(39.9, 0.0)), Ok(Vec::new()));
    }

    #[test]
    fn midpoint_waypoint_bridges_fifty_units() {
        let planner = RelayPlanner::new(vec![p(25.0, 0.0)], MAX_RANGE, RELAY_SEARCH_FACTOR);
        assert_eq!(planner.search(&p(0.0, 0.0), &p(50.0, 0.0)), Ok(vec![p(25.0, 0.0)]));
    }

    #[test]
    fn redundant_waypoints_are_dropped() {
        let candidates = vec![p(20.0, 0.0), p(30.0, 0.0), p(40.0, 1.0), p(60.0, 0.0), p(0.0, 90.0), p(90.0, 90.0)];
        let planner = RelayPlanner::new(candidates, MAX_RANGE, RELAY_SEARCH_FACTOR);
        let source = p(0.0, 0.0);
        let destination = p(80.0, 0.0);
        let chain = planner.search(&source, &destination).unwrap();
        assert!(planner.is_valid(&source, &chain, &destination));
        assert!(chain.len() <= 2, "chain was not optimized: {:?}", chain);
        assert!(!chain.contains(&p(0.0, 90.0)));
    }

    #[test]
    fn every_hop_is_in_range_on_a_grid() {
        let mut candidates = Vec::new();
        for x in 0..8 {
            for y in 0..4 {
                candidates.push(p(x as f64 * 20.0, y as f64 * 20.0));
            }
        }
        let planner = RelayPlanner::new(candidates, MAX_RANGE, RELAY_SEARCH_FACTOR);
        let pairs = [(p(0.0, 0.0), p(140.0, 60.0)), (p(5.0, 55.0), p(135.0, 5.0)), (p(0.0, 20.0), p(100.0, 20.0))];
        for (source, destination) in pairs {
            let chain = planner.search(&source, &destination).unwrap();
            assert!(!chain.is_empty());
            assert!(planner.is_valid(&source, &chain, &destination));
        }
    }

    #[test]
    fn unreachable_destination_is_no_route() {
        let planner = RelayPlanner::new(vec![p(10.0, 0.0), p(20.0, 0.0)], MAX_RANGE, RELAY_SEARCH_FACTOR);
        assert_eq!(planner.search(&p(0.0, 0.0), &p(200.0, 0.0)), Err(PlannerError::NoRoute));
        assert_eq!(RelayPlanner::default().search(&p(0.0, 0.0), &p(50.0, 0.0)), Err(PlannerError::NoRoute));
    }

    #[test]
    fn candidates_on_the_endpoints_rank_last() {
        let planner = RelayPlanner::new(vec![p(0.0, 0.0), p(50.0, 0.0), p(25.0, 5.0)], MAX_RANGE, RELAY_SEARCH_FACTOR);
        let ranked = planner.rank_by_detour(&p(0.0, 0.0), &p(50.0, 0.0));
        assert_eq!(ranked[0], p(25.0, 5.0));
    }

    #[test]
    fn assistance_route_starts_at_closest_access_point() {
        let mut graph = NavigationGraph::new();
        let _near_ap = graph.add_node(p(0.0, 0.0), NodeKind::Standard);
        let relay = graph.add_node(p(30.0, 0.0), NodeKind::Parking);
        let destination = graph.add_node(p(60.0, 0.0), NodeKind::Task);
        let planner = RelayPlanner::from_graph(&graph, MAX_RANGE, RELAY_SEARCH_FACTOR);

        let route = planner.assistance_route(&graph, &[p(-100.0, 0.0), p(0.0, 0.0)], destination).unwrap();
        assert_eq!(route, vec![relay]);
        assert_eq!(planner.assistance_route(&graph, &[], destination), Err(PlannerError::NoAccessPoint));
        assert_eq!(planner.assistance_route(&graph, &[p(55.0, 0.0)], destination), Ok(Vec::new()));
    }
}
