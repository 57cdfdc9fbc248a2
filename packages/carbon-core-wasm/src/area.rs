use geo::Area;
use geo_types::{LineString, Polygon};

use crate::models::DrawnPolygon;

/// Planar shoelace area of the drawn ring, scaled from squared degrees to
/// square metres by `meters_per_degree²`.
///
/// This is the small-angle equirectangular estimate that existing reports
/// were produced with; it is only accurate near the equator and for small
/// polygons. Returns 0 for fewer than three vertices.
pub fn estimate_area(polygon: &DrawnPolygon, meters_per_degree: f64) -> f64 {
    if !polygon.is_measurable() {
        return 0.0;
    }

    // geo closes the exterior ring, so open and closed input agree
    let ring = LineString::from(polygon.vertices().to_vec());
    let squared_degrees = Polygon::new(ring, vec![]).unsigned_area();

    squared_degrees * meters_per_degree * meters_per_degree
}
