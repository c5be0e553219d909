// src/services/geometry.rs

use serde::{Deserialize, Serialize};

/// A point in normalized image space, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Ray-casting parity test with a ray toward +x.
///
/// An edge is crossed only when exactly one of its endpoints lies strictly above
/// `point.y`, and the crossing lies strictly to the right of `point.x`. This makes
/// the boundary half-open: for an axis-aligned rectangle the minimum-x and
/// minimum-y edges are inside, the maximum-x and maximum-y edges are outside, and
/// shared vertices are never counted twice.
///
/// `polygon` must have at least 3 vertices; callers check polygon mode first.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    debug_assert!(polygon.len() >= 3, "point_in_polygon needs at least 3 vertices");

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let cross_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
