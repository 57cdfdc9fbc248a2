use serde_json::{json, Value};

use crate::layers::{MetricLayer, MetricLayerId, MetricLayerSet};
use crate::models::{CarbonMetrics, DrawnPolygon};

/// GeoJSON FeatureCollection with one copy of the drawn polygon per visible
/// metric layer, ordered bottom to top. Empty when the polygon cannot be
/// measured.
pub fn metric_overlay(polygon: &DrawnPolygon, metrics: &CarbonMetrics, layers: &MetricLayerSet) -> Value {
    let mut features = Vec::new();

    if polygon.is_measurable() {
        let ring: Vec<[f64; 2]> = polygon.closed_ring().iter().map(|c| [c.x, c.y]).collect();

        let mut visible: Vec<&MetricLayer> = layers.layers().iter().filter(|l| l.visible).collect();
        visible.sort_by_key(|l| l.id.order());

        for layer in visible {
            features.push(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [ring],
                },
                "properties": {
                    "id": layer.id,
                    "metric": layer.name,
                    "value": metric_label(layer.id, metrics),
                    "color": layer.color,
                    "order": layer.id.order(),
                },
            }));
        }
    }

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Display label for one metric, e.g. `1,234m²` or `Rp. 864,000`.
pub fn metric_label(id: MetricLayerId, metrics: &CarbonMetrics) -> String {
    let value = format_grouped(id.value(metrics));
    match id {
        MetricLayerId::AreaCoverage => format!("{}m²", value),
        MetricLayerId::MarketableCredits => format!("Rp. {}", value),
        _ => format!("{} tCO₂e", value),
    }
}

/// Thousands-grouped decimal with at most three fraction digits.
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let text = format!("{:.3}", value.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some(parts) => parts,
        None => (text.as_str(), ""),
    };
    let frac_part = frac_part.trim_end_matches('0');

    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::with_capacity(text.len() + digits.len() / 3 + 1);
    if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) {
        out.push('-');
    }
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
