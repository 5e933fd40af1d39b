//! Range-plus-obstruction radio model and the broadcast medium.
//!
//! A link exists when both ends are distinct points at most `max_range`
//! apart and the straight segment between them crosses no more than
//! `obstruction_tolerance` obstacles. There is no signal strength, airtime
//! or collision modelling: delivery is all-or-nothing and instantaneous.

use super::geometry::OcclusionQuery;
use super::types::Point;

/// Maximum link distance in world units.
pub const MAX_RANGE: f64 = 40.0;

/// Maximum number of obstacles a link may cross.
pub const OBSTRUCTION_TOLERANCE: usize = 2;

pub struct TransmissionModel {
    max_range: f64,
    obstruction_tolerance: usize,
    occlusion: Box<dyn OcclusionQuery>,
}

impl TransmissionModel {
    pub fn new(max_range: f64, obstruction_tolerance: usize, occlusion: Box<dyn OcclusionQuery>) -> Self {
        Self {
            max_range,
            obstruction_tolerance,
            occlusion,
        }
    }

    /// Model with the default range and tolerance.
    pub fn with_occlusion(occlusion: Box<dyn OcclusionQuery>) -> Self {
        Self::new(MAX_RANGE, OBSTRUCTION_TOLERANCE, occlusion)
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Link test between two positions.
    ///
    /// # Returns
    ///
    /// `false` for identical points, otherwise the range and obstruction test.
    pub fn can_communicate(&self, p1: &Point, p2: &Point) -> bool {
        if p1 == p2 {
            return false;
        }
        // Cheap range check first; the occlusion query walks every obstacle.
        if p1.distance2(p2) > self.max_range * self.max_range {
            return false;
        }
        self.occlusion.obstruction_count(p1, p2) <= self.obstruction_tolerance
    }
}

/// Identity of a registered receiver on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverId {
    /// Index into the agent roster.
    Agent(usize),
    /// Index into the access point roster.
    AccessPoint(usize),
}

/// Broadcast medium: resolves which receivers hear a transmission.
pub struct Medium {
    model: TransmissionModel,
    transmissions: u64,
    deliveries: u64,
}

impl Medium {
    pub fn new(model: TransmissionModel) -> Self {
        Self {
            model,
            transmissions: 0,
            deliveries: 0,
        }
    }

    pub fn model(&self) -> &TransmissionModel {
        &self.model
    }

    /// Receivers within link reach of `origin`, in roster order.
    ///
    /// `roster` should list agents in registration order followed by access
    /// points. The sender is skipped implicitly since `p ≠ p` never holds.
    ///
    /// # Parameters
    ///
    /// * `origin` - Position the message is transmitted from
    /// * `roster` - Every registered receiver with its current position
    pub fn broadcast<I>(&mut self, origin: &Point, roster: I) -> Vec<ReceiverId>
    where
        I: IntoIterator<Item = (ReceiverId, Point)>,
    {
        self.transmissions += 1;
        let targets: Vec<ReceiverId> = roster.into_iter().filter(|(_, position)| self.model.can_communicate(origin, position)).map(|(id, _)| id).collect();
        self.deliveries += targets.len() as u64;
        targets
    }

    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }

    pub fn deliveries(&self) -> u64 {
        self.deliveries
    }

    pub fn reset_counters(&mut self) {
        self.transmissions = 0;
        self.deliveries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::{ObstacleField, OpenField};
    use crate::simulation::types::{Obstacle, RectPos};

    fn wall(x: f64) -> Obstacle {
        Obstacle::Rectangle {
            position: RectPos {
                top_left: Point::planar(x, -5.0),
                bottom_right: Point::planar(x + 0.5, 5.0),
            },
        }
    }

    #[test]
    fn identical_points_never_communicate() {
        let model = TransmissionModel::with_occlusion(Box::new(OpenField));
        for p in [Point::planar(0.0, 0.0), Point::new(3.0, -7.5, 1.0)] {
            assert!(!model.can_communicate(&p, &p));
        }
    }

    #[test]
    fn range_limit_is_inclusive() {
        let model = TransmissionModel::with_occlusion(Box::new(OpenField));
        let a = Point::planar(0.0, 0.0);
        assert!(model.can_communicate(&a, &Point::planar(40.0, 0.0)));
        assert!(!model.can_communicate(&a, &Point::planar(40.01, 0.0)));
    }

    #[test]
    fn fifty_units_apart_is_out_of_range() {
        let model = TransmissionModel::with_occlusion(Box::new(OpenField));
        let a = Point::planar(0.0, 0.0);
        let b = Point::planar(50.0, 0.0);
        assert!(!model.can_communicate(&a, &b));
        let mid = a.midpoint(&b);
        assert!(model.can_communicate(&a, &mid));
        assert!(model.can_communicate(&mid, &b));
    }

    #[test]
    fn obstruction_tolerance_allows_two_walls() {
        let a = Point::planar(0.0, 0.0);
        let b = Point::planar(30.0, 0.0);
        let two = TransmissionModel::with_occlusion(Box::new(ObstacleField::new(vec![wall(5.0), wall(10.0)])));
        assert!(two.can_communicate(&a, &b));
        let three = TransmissionModel::with_occlusion(Box::new(ObstacleField::new(vec![wall(5.0), wall(10.0), wall(15.0)])));
        assert!(!three.can_communicate(&a, &b));
        assert_eq!(three.can_communicate(&a, &b), three.can_communicate(&b, &a));
    }

    #[test]
    fn can_communicate_is_symmetric() {
        let model = TransmissionModel::with_occlusion(Box::new(ObstacleField::new(vec![wall(5.0), wall(10.0), wall(15.0)])));
        let points = [Point::planar(0.0, 0.0), Point::planar(20.0, 0.0), Point::planar(8.0, 30.0), Point::planar(0.0, 45.0)];
        for a in &points {
            for b in &points {
                assert_eq!(model.can_communicate(a, b), model.can_communicate(b, a));
            }
        }
    }

    #[test]
    fn broadcast_returns_reachable_receivers_in_roster_order() {
        let mut medium = Medium::new(TransmissionModel::with_occlusion(Box::new(OpenField)));
        let origin = Point::planar(0.0, 0.0);
        let roster = vec![
            (ReceiverId::Agent(0), origin),
            (ReceiverId::Agent(1), Point::planar(10.0, 0.0)),
            (ReceiverId::Agent(2), Point::planar(100.0, 0.0)),
            (ReceiverId::AccessPoint(0), Point::planar(0.0, 20.0)),
        ];
        let targets = medium.broadcast(&origin, roster);
        assert_eq!(targets, vec![ReceiverId::Agent(1), ReceiverId::AccessPoint(0)]);
        assert_eq!(medium.transmissions(), 1);
        assert_eq!(medium.deliveries(), 2);
    }
}
