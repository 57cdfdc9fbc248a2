use std::rc::Rc;

use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

// Create a console module for logging
pub mod console;
pub mod errors;
pub mod config;
pub mod models;
mod bbox;
pub mod spatial;
pub mod area;
pub mod parcels;
pub mod feature_index;
pub mod aggregation;
pub mod metrics;
pub mod engine;
pub mod events;
pub mod layers;
pub mod overlay;
pub mod session;


use config::EngineConfig;
use feature_index::HttpFeatureSource;
use layers::{MetricLayerId, ParcelLayerId};
use models::{DrawnPolygon, Point};
use session::{ComputeOutcome, Session};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => (crate::console::warn(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => (crate::console::error(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("Carbon metrics module initialized");
    });
}

// Plain objects rather than JS Maps for serde_json values
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

fn parse_polygon(polygon: JsValue) -> Result<DrawnPolygon, JsValue> {
    serde_wasm_bindgen::from_value(polygon)
        .map_err(|e| JsValue::from_str(&format!("Invalid polygon, expected [[x, y], ...]: {}", e)))
}

// Accepts a plain object or a JSON string
fn parse_config(config: JsValue) -> Result<EngineConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(EngineConfig::default());
    }
    let json = match config.as_string() {
        Some(json) => json,
        None => js_sys::JSON::stringify(&config)
            .map(String::from)
            .map_err(|e| JsValue::from_str(&format!("Invalid engine config: {:?}", e)))?,
    };
    Ok(EngineConfig::from_json(&json)?)
}

/// Planar area of a drawn polygon in square meters.
#[wasm_bindgen]
pub fn calculate_area(polygon: JsValue, meters_per_degree: Option<f64>) -> Result<f64, JsValue> {
    let polygon = parse_polygon(polygon)?;
    let scale = meters_per_degree.unwrap_or(config::DEFAULT_METERS_PER_DEGREE);
    Ok(area::estimate_area(&polygon, scale))
}

#[wasm_bindgen]
pub fn point_in_polygon(x: f64, y: f64, polygon: JsValue) -> Result<bool, JsValue> {
    let polygon = parse_polygon(polygon)?;
    Ok(spatial::contains(Point { x, y }, polygon.vertices()))
}

/// Metrics report for a polygon against an already fetched parcel document.
/// Resolves to `null` for polygons with fewer than three vertices.
#[wasm_bindgen]
pub fn compute_metrics_from_geojson(
    polygon: JsValue,
    geojson: &str,
    config: JsValue,
) -> Result<JsValue, JsValue> {
    let polygon = parse_polygon(polygon)?;
    let config = parse_config(config)?;
    if !polygon.is_measurable() {
        return Ok(JsValue::NULL);
    }

    let schema = parcels::AttributeSchema::from(&config);
    let collection = parcels::FeatureCollection::from_geojson_str(geojson, &schema)?;
    let report = engine::compute_with(&polygon, &collection, &config);
    to_js(&report)
}

/// Browser handle for one map's metric session.
#[wasm_bindgen]
pub struct CarbonSession {
    inner: Rc<Session<HttpFeatureSource>>,
}

#[wasm_bindgen]
impl CarbonSession {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<CarbonSession, JsValue> {
        let config = parse_config(config)?;
        let source = HttpFeatureSource::new(config.resource_url.clone());
        Ok(CarbonSession {
            inner: Rc::new(Session::new(source, config)),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.inner.id().to_string()
    }

    /// Resolves to the new metrics, or `null` when the polygon has fewer than
    /// three vertices or a newer request replaced this one. Rejects when the
    /// parcel dataset cannot be loaded.
    pub fn compute_metrics(&self, polygon: JsValue) -> Promise {
        let session = Rc::clone(&self.inner);
        future_to_promise(async move {
            let polygon = parse_polygon(polygon)?;
            match session.compute_metrics(polygon).await? {
                ComputeOutcome::Applied(report) => to_js(&report.metrics),
                ComputeOutcome::InsufficientGeometry | ComputeOutcome::Superseded => Ok(JsValue::NULL),
            }
        })
    }

    pub fn clear_drawings(&self) {
        self.inner.clear();
    }

    pub fn current_metrics(&self) -> Result<JsValue, JsValue> {
        match self.inner.current_report() {
            Some(report) => to_js(&report.metrics),
            None => Ok(JsValue::NULL),
        }
    }

    pub fn current_report(&self) -> Result<JsValue, JsValue> {
        match self.inner.current_report() {
            Some(report) => to_js(&report),
            None => Ok(JsValue::NULL),
        }
    }

    /// Register `callback(event)`; returns an id for `unsubscribe`.
    pub fn subscribe(&self, callback: js_sys::Function) -> u32 {
        self.inner.subscribe(move |event| {
            let payload = match to_js(event) {
                Ok(payload) => payload,
                Err(e) => {
                    console_error!("Could not serialize session event: {:?}", e);
                    return;
                }
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                console_error!("Session listener threw: {:?}", e);
            }
        })
    }

    pub fn unsubscribe(&self, id: u32) -> bool {
        self.inner.unsubscribe(id)
    }

    pub fn toggle_metric_layer(&self, id: &str) -> Result<bool, JsValue> {
        let id: MetricLayerId = id.parse().map_err(|e: String| JsValue::from_str(&e))?;
        Ok(self.inner.toggle_metric_layer(id))
    }

    pub fn set_all_metric_layers(&self, visible: bool) {
        self.inner.set_all_metric_layers(visible);
    }

    pub fn metric_layers(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.metric_layers())
    }

    /// GeoJSON overlay of the current metrics, `null` when none are shown.
    pub fn metric_overlay(&self) -> Result<JsValue, JsValue> {
        match self.inner.metric_overlay() {
            Some(overlay) => to_js(&overlay),
            None => Ok(JsValue::NULL),
        }
    }

    /// Resolves to one `[r, g, b, a]` per parcel for a choropleth layer.
    pub fn parcel_colors(&self, layer: &str) -> Result<Promise, JsValue> {
        let layer: ParcelLayerId = layer.parse().map_err(|e: String| JsValue::from_str(&e))?;
        let session = Rc::clone(&self.inner);
        Ok(future_to_promise(async move {
            let colors = session.parcel_colors(layer).await?;
            to_js(&colors)
        }))
    }
}
