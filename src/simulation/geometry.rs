//! Occlusion queries for the transmission model.
//!
//! Contains helper functions for:
//! - Point-in-shape tests (rectangles, circles)
//! - Segment-shape intersection tests
//! - Segment-segment intersection with collinear handling
//! - Counting how many obstacles a straight link crosses
//!
//! All tests run on the floor plane (x/y); the height coordinate is ignored.

use super::types::{CirclePos, Obstacle, Point, RectPos};

/// Answers "how many obstacles lie between these two points".
///
/// The transmission model only depends on this trait, so the scene geometry
/// can be swapped out (or mocked in tests) without touching the radio logic.
pub trait OcclusionQuery {
    fn obstruction_count(&self, from: &Point, to: &Point) -> usize;
}

/// Obstacle set loaded from the scene.
#[derive(Debug, Clone, Default)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
}

impl ObstacleField {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

impl OcclusionQuery for ObstacleField {
    fn obstruction_count(&self, from: &Point, to: &Point) -> usize {
        count_intersections(from, to, &self.obstacles)
    }
}

/// A field without obstacles. Every link has a clear line of sight.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl OcclusionQuery for OpenField {
    fn obstruction_count(&self, _from: &Point, _to: &Point) -> usize {
        0
    }
}

/// Count the obstacles touched by the straight segment `point1`–`point2`.
///
/// A degenerate segment (both ends equal on the floor plane) counts the
/// obstacles containing that point.
pub fn count_intersections(point1: &Point, point2: &Point, obstacles: &[Obstacle]) -> usize {
    let degenerate = point1.x == point2.x && point1.y == point2.y;

    obstacles
        .iter()
        .filter(|obs| match obs {
            Obstacle::Rectangle { position } => {
                if degenerate {
                    point_in_rect(point1, position)
                } else {
                    segment_intersects_rect(point1, point2, position)
                }
            }
            Obstacle::Circle { position } => {
                if degenerate {
                    point_in_circle(point1, position)
                } else {
                    segment_intersects_circle(point1, point2, position)
                }
            }
        })
        .count()
}

/// Normalize rectangle corners to (left,right,top,bottom) tuple.
fn rect_bounds(rect: &RectPos) -> (f64, f64, f64, f64) {
    let left = rect.top_left.x.min(rect.bottom_right.x);
    let right = rect.top_left.x.max(rect.bottom_right.x);
    let top = rect.top_left.y.min(rect.bottom_right.y);
    let bottom = rect.top_left.y.max(rect.bottom_right.y);
    (left, right, top, bottom)
}

/// Inclusive point-in-rectangle test.
pub fn point_in_rect(p: &Point, rect: &RectPos) -> bool {
    let (left, right, top, bottom) = rect_bounds(rect);
    p.x >= left && p.x <= right && p.y >= top && p.y <= bottom
}

/// Inclusive point-in-circle test.
pub fn point_in_circle(p: &Point, circle: &CirclePos) -> bool {
    let dx = p.x - circle.center.x;
    let dy = p.y - circle.center.y;
    dx * dx + dy * dy <= circle.radius * circle.radius
}

fn segment_intersects_rect(p1: &Point, p2: &Point, rect: &RectPos) -> bool {
    if point_in_rect(p1, rect) || point_in_rect(p2, rect) {
        return true;
    }

    let (left, right, top, bottom) = rect_bounds(rect);
    let lt = Point::planar(left, top);
    let rt = Point::planar(right, top);
    let rb = Point::planar(right, bottom);
    let lb = Point::planar(left, bottom);

    segments_intersect(p1, p2, &lt, &rt) || segments_intersect(p1, p2, &rt, &rb) || segments_intersect(p1, p2, &rb, &lb) || segments_intersect(p1, p2, &lb, &lt)
}

/// Distance from the circle center to the segment, via the clamped projection parameter.
fn segment_intersects_circle(p1: &Point, p2: &Point, circle: &CirclePos) -> bool {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return point_in_circle(p1, circle);
    }
    let t = ((circle.center.x - p1.x) * dx + (circle.center.y - p1.y) * dy) / len2;
    let t = t.clamp(0.0, 1.0);
    let closest = Point::planar(p1.x + t * dx, p1.y + t * dy);
    point_in_circle(&closest, circle)
}

/// Orientation of ordered triplet (a,b,c): 1 clockwise, -1 counter-clockwise, 0 collinear.
fn orientation(a: &Point, b: &Point, c: &Point) -> i32 {
    let val = (b.y - a.y) * (c.x - b.x) - (b.x - a.x) * (c.y - b.y);
    if val > 0.0 {
        1
    } else if val < 0.0 {
        -1
    } else {
        0
    }
}

/// True if `b` lies within the bounding box of segment `a`–`c` (collinearity assumed).
fn on_segment(a: &Point, b: &Point, c: &Point) -> bool {
    b.x >= a.x.min(c.x) && b.x <= a.x.max(c.x) && b.y >= a.y.min(c.y) && b.y <= a.y.max(c.y)
}

/// Segment–segment intersection including endpoint touching and collinear overlap.
pub fn segments_intersect(p1: &Point, q1: &Point, p2: &Point, q2: &Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(p1, p2, q1)) || (o2 == 0 && on_segment(p1, q2, q1)) || (o3 == 0 && on_segment(p2, p1, q2)) || (o4 == 0 && on_segment(p2, q1, q2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::planar(x, y)
    }

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Obstacle {
        Obstacle::Rectangle {
            position: RectPos {
                top_left: p(x1, y1),
                bottom_right: p(x2, y2),
            },
        }
    }

    fn circle(x: f64, y: f64, radius: f64) -> Obstacle {
        Obstacle::Circle {
            position: CirclePos { center: p(x, y), radius },
        }
    }

    #[test]
    fn counts_every_obstacle_on_the_segment() {
        let field = ObstacleField::new(vec![rect(5.0, -1.0, 6.0, 1.0), rect(10.0, -1.0, 11.0, 1.0), circle(15.0, 0.0, 1.0), circle(15.0, 20.0, 1.0)]);
        assert_eq!(field.obstruction_count(&p(0.0, 0.0), &p(20.0, 0.0)), 3);
        assert_eq!(field.obstruction_count(&p(0.0, 0.0), &p(7.0, 0.0)), 1);
        assert_eq!(field.obstruction_count(&p(0.0, 5.0), &p(20.0, 5.0)), 0);
    }

    #[test]
    fn count_is_symmetric() {
        let field = ObstacleField::new(vec![rect(5.0, -1.0, 6.0, 1.0), circle(12.0, 3.0, 2.5)]);
        let a = p(0.0, 0.0);
        let b = p(20.0, 4.0);
        assert_eq!(field.obstruction_count(&a, &b), field.obstruction_count(&b, &a));
    }

    #[test]
    fn height_is_ignored() {
        let field = ObstacleField::new(vec![rect(5.0, -1.0, 6.0, 1.0)]);
        assert_eq!(field.obstruction_count(&Point::new(0.0, 0.0, 3.0), &Point::new(10.0, 0.0, 8.0)), 1);
    }

    #[test]
    fn degenerate_segment_counts_containing_obstacles() {
        let obstacles = vec![rect(0.0, 0.0, 10.0, 10.0), circle(5.0, 5.0, 1.0)];
        assert_eq!(count_intersections(&p(5.0, 5.0), &p(5.0, 5.0), &obstacles), 2);
        assert_eq!(count_intersections(&p(20.0, 20.0), &p(20.0, 20.0), &obstacles), 0);
    }

    #[test]
    fn segments_intersect_basic_cases() {
        assert!(segments_intersect(&p(0.0, 0.0), &p(10.0, 10.0), &p(0.0, 10.0), &p(10.0, 0.0)));
        assert!(segments_intersect(&p(0.0, 0.0), &p(10.0, 0.0), &p(5.0, 0.0), &p(15.0, 0.0)));
        assert!(!segments_intersect(&p(0.0, 0.0), &p(1.0, 1.0), &p(2.0, 2.0), &p(3.0, 3.0)));
    }

    #[test]
    fn open_field_never_obstructs() {
        assert_eq!(OpenField.obstruction_count(&p(0.0, 0.0), &p(100.0, 100.0)), 0);
    }
}
