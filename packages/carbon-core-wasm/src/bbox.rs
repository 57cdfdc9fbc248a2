// Bounding-box prefilter for the centroid containment test
use geo::BoundingRect;
use geo_types::{LineString, Rect};

use crate::models::Point;

// Bounds of a ring, or None for an empty ring
pub fn ring_bounds(ring: &[Point]) -> Option<Rect<f64>> {
    LineString::from(ring.to_vec()).bounding_rect()
}

// Function to check if a point is inside a bounding box (edges inclusive)
pub fn point_in_bounds(point: Point, bounds: &Rect<f64>) -> bool {
    let min = bounds.min();
    let max = bounds.max();
    point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
}
