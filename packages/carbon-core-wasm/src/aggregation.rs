use crate::bbox::{point_in_bounds, ring_bounds};
use crate::console_log;
use crate::models::{AggregationResult, DrawnPolygon};
use crate::parcels::FeatureCollection;
use crate::spatial::{centroid, contains};

/// Sum the carbon-stock attributes of every parcel whose vertex-average
/// centroid lies inside `polygon`.
///
/// Parcels without a usable ring or without both numeric attributes are
/// skipped silently. A polygon with fewer than three vertices yields the
/// empty result.
pub fn aggregate(polygon: &DrawnPolygon, features: &FeatureCollection) -> AggregationResult {
    let mut result = AggregationResult::default();
    if !polygon.is_measurable() {
        return result;
    }

    let vertices = polygon.vertices();
    let bounds = match ring_bounds(vertices) {
        Some(bounds) => bounds,
        None => return result,
    };

    for feature in features.features() {
        let ring = match feature.ring.as_deref() {
            Some(ring) => ring,
            None => continue,
        };
        let center = match centroid(ring) {
            Some(center) => center,
            None => continue,
        };

        // Ray casting can only report inside within the polygon's bounds
        if !point_in_bounds(center, &bounds) || !contains(center, vertices) {
            continue;
        }

        if let Some((earlier, later)) = feature.stocks() {
            result.sum_earlier_stock += earlier;
            result.sum_later_stock += later;
            result.included_feature_count += 1;
        }
    }

    console_log!(
        "Aggregated {} of {} parcels (earlier stock {}, later stock {})",
        result.included_feature_count,
        features.len(),
        result.sum_earlier_stock,
        result.sum_later_stock
    );

    result
}
