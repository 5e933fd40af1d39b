//! Type definitions shared across the simulation.
//!
//! Contains the spatial primitives (points, obstacle footprints) and the
//! addressing scheme used by the message protocol.

use serde::{Deserialize, Serialize};

/// Address of a mobile node. Valid addresses start at 1.
pub type AgentAddress = u32;

/// Position in world units.
///
/// Obstacles and the floor plan live in the x/y plane; `z` is carried along
/// for completeness but never affects occlusion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the floor plane (`z = 0`).
    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Squared Euclidean distance, for comparisons that do not need the root.
    pub fn distance2(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance2(other).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }

    /// Move towards `target` by at most `max_step`, never overshooting it.
    pub fn step_towards(&self, target: &Point, max_step: f64) -> Point {
        let distance = self.distance(target);
        if distance <= max_step || distance == 0.0 {
            return *target;
        }
        let factor = max_step / distance;
        Point {
            x: self.x + (target.x - self.x) * factor,
            y: self.y + (target.y - self.y) * factor,
            z: self.z + (target.z - self.z) * factor,
        }
    }
}

/// Rectangle footprint given by two opposite corners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectPos {
    #[serde(rename = "top-left-position")]
    pub top_left: Point,
    #[serde(rename = "bottom-right-position")]
    pub bottom_right: Point,
}

/// Circle footprint defined by its center.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CirclePos {
    #[serde(rename = "center_position")]
    pub center: Point,
    pub radius: f64,
}

/// Static obstacle on the factory floor, as placed by the scene generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Obstacle {
    #[serde(rename = "rectangle")]
    Rectangle {
        #[serde(flatten)]
        position: RectPos,
    },
    #[serde(rename = "circle")]
    Circle {
        #[serde(flatten)]
        position: CirclePos,
    },
}

/// Message recipient: nobody in particular, every node, or one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Unaddressed,
    All,
    Node(AgentAddress),
}
