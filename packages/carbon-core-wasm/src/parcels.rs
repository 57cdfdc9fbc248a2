use geo_types::Coord;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{LoadError, LoadResult};
use crate::models::Point;

/// Names of the two carbon-stock attributes read from each parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    pub earlier_stock_field: String,
    pub later_stock_field: String,
}

/// One land-parcel record.
///
/// Only the first ring of the first sub-polygon is kept; holes and further
/// sub-polygons are ignored. `ring` is `None` when the geometry does not have
/// the expected nesting, which excludes the parcel from aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelFeature {
    pub ring: Option<Vec<Point>>,
    pub earlier_stock: Option<f64>,
    pub later_stock: Option<f64>,
}

impl ParcelFeature {
    /// Both stock observations, when the parcel carries numeric values for each.
    pub fn stocks(&self) -> Option<(f64, f64)> {
        Some((self.earlier_stock?, self.later_stock?))
    }
}

/// Immutable set of parcels loaded once per session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    features: Vec<ParcelFeature>,
}

// Top-level document shape; individual features are read leniently
#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    features: Vec<Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<ParcelFeature>) -> Self {
        FeatureCollection { features }
    }

    pub fn features(&self) -> &[ParcelFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Parse a GeoJSON feature collection document.
    ///
    /// The document itself must be well formed; malformed individual
    /// features are kept without a ring rather than rejected.
    pub fn from_geojson_str(json: &str, schema: &AttributeSchema) -> LoadResult<Self> {
        let raw: RawCollection =
            serde_json::from_str(json).map_err(|e| LoadError::Parse(e.to_string()))?;

        if let Some(kind) = raw.kind.as_deref() {
            if kind != "FeatureCollection" {
                return Err(LoadError::InvalidStructure(format!(
                    "expected type 'FeatureCollection', found '{}'",
                    kind
                )));
            }
        }

        let features = raw
            .features
            .iter()
            .map(|feature| parse_feature(feature, schema))
            .collect();

        Ok(FeatureCollection { features })
    }
}

fn parse_feature(feature: &Value, schema: &AttributeSchema) -> ParcelFeature {
    let ring = feature
        .pointer("/geometry/coordinates/0/0")
        .and_then(parse_ring);

    let properties = feature.get("properties");
    let numeric = |field: &str| properties.and_then(|p| p.get(field)).and_then(Value::as_f64);

    ParcelFeature {
        ring,
        earlier_stock: numeric(&schema.earlier_stock_field),
        later_stock: numeric(&schema.later_stock_field),
    }
}

// A ring is an array of [x, y, ...] positions; one bad position voids the ring
fn parse_ring(value: &Value) -> Option<Vec<Point>> {
    let positions = value.as_array()?;
    if positions.is_empty() {
        return None;
    }

    positions
        .iter()
        .map(|position| {
            let pair = position.as_array()?;
            let x = pair.first()?.as_f64()?;
            let y = pair.get(1)?.as_f64()?;
            Some(Coord { x, y })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> AttributeSchema {
        AttributeSchema {
            earlier_stock_field: "total_carbon_2017_sum".to_string(),
            later_stock_field: "total_carbon_2024_sum".to_string(),
        }
    }

    #[test]
    fn reads_first_ring_of_first_polygon() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [
                            [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]],
                            [[0.2, 0.2], [0.2, 0.3], [0.3, 0.3], [0.2, 0.2]]
                        ],
                        [[[5.0, 5.0], [5.0, 6.0], [6.0, 6.0], [5.0, 5.0]]]
                    ]
                },
                "properties": {"total_carbon_2017_sum": 100.0, "total_carbon_2024_sum": 170}
            }]
        });

        let collection = FeatureCollection::from_geojson_str(&doc.to_string(), &schema()).expect("valid");
        assert_eq!(collection.len(), 1);
        let feature = &collection.features()[0];
        assert_eq!(feature.ring.as_ref().map(Vec::len), Some(4));
        assert_eq!(feature.stocks(), Some((100.0, 170.0)));
    }

    #[test]
    fn malformed_geometries_are_kept_without_ring() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {"geometry": null, "properties": {}},
                {"geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]}},
                {"geometry": {"coordinates": [[[[0.0, 0.0], ["a", 1.0], [1.0, 1.0]]]]}},
                {"geometry": {"coordinates": [[[]]]}},
                "not a feature"
            ]
        });

        let collection = FeatureCollection::from_geojson_str(&doc.to_string(), &schema()).expect("valid");
        assert_eq!(collection.len(), 5);
        assert!(collection.features().iter().all(|f| f.ring.is_none()));
    }

    #[test]
    fn non_numeric_attributes_are_absent() {
        let doc = json!({
            "features": [{
                "geometry": {"coordinates": [[[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]]]},
                "properties": {"total_carbon_2017_sum": "100", "total_carbon_2024_sum": 170}
            }]
        });

        let collection = FeatureCollection::from_geojson_str(&doc.to_string(), &schema()).expect("valid");
        let feature = &collection.features()[0];
        assert_eq!(feature.earlier_stock, None);
        assert_eq!(feature.later_stock, Some(170.0));
        assert_eq!(feature.stocks(), None);
    }

    #[test]
    fn rejects_documents_without_features() {
        let err = FeatureCollection::from_geojson_str(r#"{"type": "FeatureCollection"}"#, &schema())
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn rejects_other_geojson_types() {
        let err = FeatureCollection::from_geojson_str(r#"{"type": "Feature", "features": []}"#, &schema())
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidStructure(_)));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = FeatureCollection::from_geojson_str("<html>404</html>", &schema()).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }
}
