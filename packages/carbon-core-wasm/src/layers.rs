use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::metrics::SequestrationChain;
use crate::models::CarbonMetrics;
use crate::parcels::{FeatureCollection, ParcelFeature};

pub type Rgba = [u8; 4];

// Overlay layers drawn over the finished polygon, one per reported metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricLayerId {
    AreaCoverage,
    CarbonStock,
    ForestGrowth,
    Leakage,
    NetSequestration,
    MarketableCredits,
}

impl MetricLayerId {
    pub const ALL: [MetricLayerId; 6] = [
        MetricLayerId::AreaCoverage,
        MetricLayerId::CarbonStock,
        MetricLayerId::ForestGrowth,
        MetricLayerId::Leakage,
        MetricLayerId::NetSequestration,
        MetricLayerId::MarketableCredits,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricLayerId::AreaCoverage => "Area Coverage",
            MetricLayerId::CarbonStock => "Carbon Stock Baseline",
            MetricLayerId::ForestGrowth => "Forest Growth",
            MetricLayerId::Leakage => "Leakage Risk",
            MetricLayerId::NetSequestration => "Net Sequestration",
            MetricLayerId::MarketableCredits => "Marketable Credits",
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            MetricLayerId::AreaCoverage => [0, 128, 255, 150],
            MetricLayerId::CarbonStock => [0, 200, 0, 130],
            MetricLayerId::ForestGrowth => [0, 255, 0, 110],
            MetricLayerId::Leakage => [255, 100, 0, 110],
            MetricLayerId::NetSequestration => [50, 200, 150, 120],
            MetricLayerId::MarketableCredits => [120, 80, 200, 140],
        }
    }

    // Stacking order, bottom first
    pub fn order(self) -> u8 {
        match self {
            MetricLayerId::AreaCoverage => 1,
            MetricLayerId::CarbonStock => 2,
            MetricLayerId::ForestGrowth => 3,
            MetricLayerId::Leakage => 4,
            MetricLayerId::NetSequestration => 5,
            MetricLayerId::MarketableCredits => 6,
        }
    }

    pub fn value(self, metrics: &CarbonMetrics) -> f64 {
        match self {
            MetricLayerId::AreaCoverage => metrics.area,
            MetricLayerId::CarbonStock => metrics.carbon_stocks,
            MetricLayerId::ForestGrowth => metrics.forest_growth,
            MetricLayerId::Leakage => metrics.leakage,
            MetricLayerId::NetSequestration => metrics.net_sequestration,
            MetricLayerId::MarketableCredits => metrics.marketable_credits,
        }
    }
}

impl FromStr for MetricLayerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "areaCoverage" => Ok(MetricLayerId::AreaCoverage),
            "carbonStock" => Ok(MetricLayerId::CarbonStock),
            "forestGrowth" => Ok(MetricLayerId::ForestGrowth),
            "leakage" => Ok(MetricLayerId::Leakage),
            "netSequestration" => Ok(MetricLayerId::NetSequestration),
            "marketableCredits" => Ok(MetricLayerId::MarketableCredits),
            other => Err(format!("Unknown metric layer '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricLayer {
    pub id: MetricLayerId,
    pub name: &'static str,
    pub color: Rgba,
    pub visible: bool,
}

/// Visibility state of the metric overlay layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricLayerSet {
    layers: Vec<MetricLayer>,
}

impl Default for MetricLayerSet {
    fn default() -> Self {
        MetricLayerSet {
            layers: MetricLayerId::ALL
                .iter()
                .map(|&id| MetricLayer {
                    id,
                    name: id.name(),
                    color: id.color(),
                    visible: true,
                })
                .collect(),
        }
    }
}

impl MetricLayerSet {
    pub fn layers(&self) -> &[MetricLayer] {
        &self.layers
    }

    /// Flip one layer; returns its new visibility.
    pub fn toggle(&mut self, id: MetricLayerId) -> bool {
        let mut visible = false;
        for layer in self.layers.iter_mut().filter(|l| l.id == id) {
            layer.visible = !layer.visible;
            visible = layer.visible;
        }
        visible
    }

    pub fn set_all(&mut self, visible: bool) {
        for layer in &mut self.layers {
            layer.visible = visible;
        }
    }

    pub fn is_visible(&self, id: MetricLayerId) -> bool {
        self.layers.iter().any(|l| l.id == id && l.visible)
    }

    pub fn any_visible(&self) -> bool {
        self.layers.iter().any(|l| l.visible)
    }
}

// Choropleth layers colouring every parcel of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParcelLayerId {
    #[serde(rename = "carbon-2017")]
    EarlierStock,
    #[serde(rename = "carbon-2024")]
    LaterStock,
    #[serde(rename = "growth")]
    Growth,
    #[serde(rename = "leakage")]
    Leakage,
    #[serde(rename = "net-seq")]
    NetSequestration,
    #[serde(rename = "marketable")]
    Marketable,
}

// Ramp saturation points
const MAX_STOCK: f64 = 2_000_000.0;
const MAX_GROWTH: f64 = 100_000.0;
const MAX_LEAKAGE: f64 = 10_000.0;
const MAX_NET_SEQUESTRATION: f64 = 5_000.0;
const MAX_CREDITS: f64 = 100_000.0;
const PARCEL_ALPHA: u8 = 150;

impl FromStr for ParcelLayerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carbon-2017" => Ok(ParcelLayerId::EarlierStock),
            "carbon-2024" => Ok(ParcelLayerId::LaterStock),
            "growth" => Ok(ParcelLayerId::Growth),
            "leakage" => Ok(ParcelLayerId::Leakage),
            "net-seq" => Ok(ParcelLayerId::NetSequestration),
            "marketable" => Ok(ParcelLayerId::Marketable),
            other => Err(format!("Unknown parcel layer '{}'", other)),
        }
    }
}

impl ParcelLayerId {
    /// Per-parcel value shown by this layer. Missing stocks count as zero.
    pub fn parcel_value(self, feature: &ParcelFeature, config: &EngineConfig) -> f64 {
        let earlier = feature.earlier_stock.unwrap_or(0.0);
        let later = feature.later_stock.unwrap_or(0.0);
        let chain = || SequestrationChain::from_stocks(earlier, later, config);

        match self {
            ParcelLayerId::EarlierStock => earlier,
            ParcelLayerId::LaterStock => later,
            ParcelLayerId::Growth => chain().forest_growth,
            ParcelLayerId::Leakage => chain().leakage,
            ParcelLayerId::NetSequestration => chain().net_sequestration,
            ParcelLayerId::Marketable => chain().marketable_credits,
        }
    }

    pub fn fill_color(self, value: f64) -> Rgba {
        match self {
            ParcelLayerId::EarlierStock | ParcelLayerId::LaterStock => {
                let i = intensity(value, MAX_STOCK);
                [0, channel(100.0, 155.0, i), 0, PARCEL_ALPHA]
            }
            // Green for growth, blue for loss
            ParcelLayerId::Growth => {
                let i = intensity(value.abs(), MAX_GROWTH);
                if value > 0.0 {
                    [0, channel(150.0, 105.0, i), 0, PARCEL_ALPHA]
                } else {
                    [0, 0, channel(150.0, 105.0, i), PARCEL_ALPHA]
                }
            }
            ParcelLayerId::Leakage => {
                let i = intensity(value.abs(), MAX_LEAKAGE);
                [channel(150.0, 105.0, i), 0, 0, PARCEL_ALPHA]
            }
            ParcelLayerId::NetSequestration => {
                let i = intensity(value.abs(), MAX_NET_SEQUESTRATION);
                let c = channel(100.0, 155.0, i);
                [0, c, c, PARCEL_ALPHA]
            }
            ParcelLayerId::Marketable => {
                let i = intensity(value.abs(), MAX_CREDITS);
                [channel(100.0, 155.0, i), 0, channel(150.0, 105.0, i), PARCEL_ALPHA]
            }
        }
    }

    /// Fill colour of every parcel, in collection order.
    pub fn parcel_colors(self, collection: &FeatureCollection, config: &EngineConfig) -> Vec<Rgba> {
        collection
            .features()
            .iter()
            .map(|feature| self.fill_color(self.parcel_value(feature, config)))
            .collect()
    }
}

fn intensity(value: f64, saturation: f64) -> f64 {
    (value / saturation).clamp(0.0, 1.0)
}

fn channel(base: f64, span: f64, intensity: f64) -> u8 {
    (base + intensity * span + 0.5).floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stocks(earlier: f64, later: f64) -> ParcelFeature {
        ParcelFeature {
            ring: None,
            earlier_stock: Some(earlier),
            later_stock: Some(later),
        }
    }

    #[test]
    fn default_set_shows_all_six_layers_in_order() {
        let set = MetricLayerSet::default();
        assert_eq!(set.layers().len(), 6);
        assert!(set.layers().iter().all(|l| l.visible));
        let orders: Vec<u8> = set.layers().iter().map(|l| l.id.order()).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn toggle_and_set_all() {
        let mut set = MetricLayerSet::default();
        assert!(!set.toggle(MetricLayerId::Leakage));
        assert!(!set.is_visible(MetricLayerId::Leakage));
        assert!(set.is_visible(MetricLayerId::CarbonStock));
        assert!(set.toggle(MetricLayerId::Leakage));

        set.set_all(false);
        assert!(!set.any_visible());
        set.set_all(true);
        assert!(set.is_visible(MetricLayerId::MarketableCredits));
    }

    #[test]
    fn layer_ids_parse_from_js_names() {
        assert_eq!("netSequestration".parse(), Ok(MetricLayerId::NetSequestration));
        assert!("bogus".parse::<MetricLayerId>().is_err());
        assert_eq!("net-seq".parse(), Ok(ParcelLayerId::NetSequestration));
        assert_eq!(
            serde_json::to_value(ParcelLayerId::EarlierStock).expect("serializable"),
            "carbon-2017"
        );
    }

    #[test]
    fn parcel_values_use_engine_formulas() {
        let config = EngineConfig::default();
        let parcel = stocks(100.0, 170.0);
        assert_eq!(ParcelLayerId::Growth.parcel_value(&parcel, &config), 10.0);
        assert_eq!(ParcelLayerId::Leakage.parcel_value(&parcel, &config), 1.0);
        assert_eq!(ParcelLayerId::NetSequestration.parcel_value(&parcel, &config), 9.0);
        assert_eq!(ParcelLayerId::Marketable.parcel_value(&parcel, &config), 864000.0);

        let missing = ParcelFeature {
            ring: None,
            earlier_stock: None,
            later_stock: Some(70.0),
        };
        assert_eq!(ParcelLayerId::Growth.parcel_value(&missing, &config), 10.0);
    }

    #[test]
    fn ramps_saturate_and_switch_hue_on_loss() {
        assert_eq!(ParcelLayerId::EarlierStock.fill_color(0.0), [0, 100, 0, 150]);
        assert_eq!(ParcelLayerId::EarlierStock.fill_color(5_000_000.0), [0, 255, 0, 150]);
        assert_eq!(ParcelLayerId::Growth.fill_color(50_000.0), [0, 203, 0, 150]);
        assert_eq!(ParcelLayerId::Growth.fill_color(-100_000.0), [0, 0, 255, 150]);
        assert_eq!(ParcelLayerId::Marketable.fill_color(0.0), [100, 0, 150, 150]);
    }

    #[test]
    fn parcel_colors_follow_collection_order() {
        let collection = FeatureCollection::new(vec![stocks(0.0, 0.0), stocks(0.0, 2_000_000.0)]);
        let colors = ParcelLayerId::LaterStock.parcel_colors(&collection, &EngineConfig::default());
        assert_eq!(colors, vec![[0, 100, 0, 150], [0, 255, 0, 150]]);
    }
}
