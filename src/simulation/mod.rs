//! Fleet relay simulation core.
//!
//! A fleet of mobile nodes drives over a navigation graph, talks to fixed
//! access points over a range-limited radio and, when a destination is
//! likely out of coverage, recruits idle peers as relays through a short
//! auction.
//!
//! ## Module Organization
//!
//! - `types`: Points, obstacles and message addressing
//! - `geometry`: Segment/obstacle intersection and the occlusion query
//! - `graph`: Navigation graph and shortest paths
//! - `transmission`: Reachability model and broadcast medium
//! - `message`: Message kinds and the shared hop budget
//! - `knowledge`: Per-node connectivity statistics
//! - `relay_planner`: Relay chain search between two points
//! - `auction`: Bid collection for relay positions
//! - `timer`: Deadline queue for bid windows
//! - `agent`: Mobile node behaviour
//! - `access_point`: Fixed uplink nodes
//! - `dispatcher`: Task assignment and fleet metrics
//! - `result_log`: Semicolon-delimited run log
//! - `network`: The simulation world and its tick loop

pub mod access_point;
pub mod agent;
pub mod auction;
pub mod dispatcher;
pub mod geometry;
pub mod graph;
pub mod knowledge;
pub mod message;
pub mod network;
pub mod relay_planner;
pub mod result_log;
pub mod timer;
pub mod transmission;
pub mod types;

pub use network::Simulation;

pub use types::{Obstacle, Point};
