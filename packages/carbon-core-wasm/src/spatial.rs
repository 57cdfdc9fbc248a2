//! Point-in-polygon containment and the vertex-average centroid used to
//! decide which parcels belong to a drawn polygon.

use crate::models::Point;

/// Even-odd ray casting test.
///
/// A horizontal ray from `point` is tested against every edge
/// `(polygon[i], polygon[j])` with `j = i - 1 (mod n)`; each crossing toggles
/// the result. The test does not depend on winding order, and a repeated
/// closing vertex only adds a zero-length edge that never crosses.
///
/// Points lying exactly on an edge or vertex have no defined classification.
pub fn contains(point: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];

        let intersect = ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x);

        if intersect {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Arithmetic mean of the ring's vertices.
///
/// This is not the area-weighted centroid: concave or unevenly sampled rings
/// get a centroid pulled toward their densest vertices. Parcel inclusion
/// depends on this exact approximation, so it must not be swapped for
/// `geo::Centroid`. A closing vertex, when present, is averaged like any
/// other vertex. Returns `None` for an empty ring.
pub fn centroid(ring: &[Point]) -> Option<Point> {
    if ring.is_empty() {
        return None;
    }

    let (sum_x, sum_y) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
    let count = ring.len() as f64;

    Some(Point {
        x: sum_x / count,
        y: sum_y / count,
    })
}
