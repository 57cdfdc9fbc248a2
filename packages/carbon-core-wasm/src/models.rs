// This is the models module containing shared data structures
use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// A `(longitude, latitude)` pair in unprojected geographic coordinates.
pub type Point = Coord<f64>;

/// The polygon a user finished drawing, as an ordered ring of vertices.
///
/// The ring may be given closed (first vertex repeated at the end) or open;
/// every consumer treats both forms identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct DrawnPolygon {
    vertices: Vec<Point>,
}

impl DrawnPolygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        DrawnPolygon { vertices }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn is_closed(&self) -> bool {
        self.vertices.len() > 1 && self.vertices.first() == self.vertices.last()
    }

    /// Number of vertices, not counting a repeated closing vertex.
    pub fn vertex_count(&self) -> usize {
        if self.is_closed() {
            self.vertices.len() - 1
        } else {
            self.vertices.len()
        }
    }

    /// Vertices left after collapsing consecutive repeats, including a
    /// repeat across the closing edge.
    pub fn distinct_vertex_count(&self) -> usize {
        let open = &self.vertices[..self.vertex_count()];
        let mut count = open.windows(2).filter(|pair| pair[0] != pair[1]).count();
        if !open.is_empty() {
            count += 1;
        }
        if count > 1 && open.first() == open.last() {
            count -= 1;
        }
        count
    }

    /// Fewer than three distinct vertices cannot enclose anything.
    pub fn is_measurable(&self) -> bool {
        self.distinct_vertex_count() >= 3
    }

    /// The ring with its first vertex appended when it is not already closed.
    pub fn closed_ring(&self) -> Vec<Point> {
        let mut ring = self.vertices.clone();
        if let Some(first) = ring.first().copied() {
            if !self.is_closed() {
                ring.push(first);
            }
        }
        ring
    }
}

impl From<Vec<[f64; 2]>> for DrawnPolygon {
    fn from(points: Vec<[f64; 2]>) -> Self {
        DrawnPolygon::new(points.into_iter().map(|[x, y]| Coord { x, y }).collect())
    }
}

impl From<DrawnPolygon> for Vec<[f64; 2]> {
    fn from(polygon: DrawnPolygon) -> Self {
        polygon.vertices.into_iter().map(|c| [c.x, c.y]).collect()
    }
}

/// Sums of the two carbon-stock attributes over the parcels whose centroid
/// falls inside a drawn polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub sum_earlier_stock: f64,
    pub sum_later_stock: f64,
    pub included_feature_count: usize,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.included_feature_count == 0
    }
}

/// The six figures shown to the user for one finalized polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonMetrics {
    /// Square metres.
    pub area: f64,
    /// Baseline stock, tCO₂e.
    pub carbon_stocks: f64,
    pub forest_growth: f64,
    pub leakage: f64,
    pub net_sequestration: f64,
    /// Monetary value of the net sequestration.
    pub marketable_credits: f64,
}

/// Which branch of the derivation produced a set of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricsBasis {
    FeatureSums,
    AreaFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub metrics: CarbonMetrics,
    pub basis: MetricsBasis,
    pub aggregation: AggregationResult,
}
