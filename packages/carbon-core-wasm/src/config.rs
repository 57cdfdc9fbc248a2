use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// Defaults reproduce the figures already published in existing reports
pub const DEFAULT_RESOURCE_URL: &str = "/15_carbon_lulc_joined.geojson";
pub const DEFAULT_EARLIER_STOCK_FIELD: &str = "total_carbon_2017_sum";
pub const DEFAULT_LATER_STOCK_FIELD: &str = "total_carbon_2024_sum";
// Years between the two stock observations
pub const DEFAULT_GROWTH_SPAN_YEARS: f64 = 7.0;
pub const DEFAULT_LEAKAGE_RATE: f64 = 0.1;
// Rupiah per marketable credit
pub const DEFAULT_CREDIT_PRICE: f64 = 96000.0;
// Equatorial metres per degree, used for the equirectangular area estimate
pub const DEFAULT_METERS_PER_DEGREE: f64 = 111319.9;

/// How the six derived metrics are rounded before they leave the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RoundingPolicy {
    /// Round half toward positive infinity, matching `Math.round`.
    #[default]
    Nearest,
    /// Keep full floating point precision (preview rendering).
    Preserve,
}

impl RoundingPolicy {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            RoundingPolicy::Nearest => {
                let floor = value.floor();
                if value - floor >= 0.5 {
                    floor + 1.0
                } else {
                    floor
                }
            }
            RoundingPolicy::Preserve => value,
        }
    }
}

/// Metric source used when no parcel centroid falls inside the drawn polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FallbackPolicy {
    /// Scale the polygon area by the `fallbackRatios`.
    #[default]
    AreaHeuristic,
    /// Report the polygon area and derive everything else from zero sums.
    ZeroStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FallbackRatios {
    pub carbon_stock_per_m2: f64,
    pub growth_per_m2: f64,
    pub leakage_per_m2: f64,
}

impl Default for FallbackRatios {
    fn default() -> Self {
        FallbackRatios {
            carbon_stock_per_m2: 0.075,
            growth_per_m2: 0.15,
            leakage_per_m2: 0.1,
        }
    }
}

/// Engine configuration as passed from JavaScript. Every field is optional
/// on the JS side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub resource_url: String,
    pub earlier_stock_field: String,
    pub later_stock_field: String,
    pub growth_span_years: f64,
    pub leakage_rate: f64,
    pub credit_price: f64,
    pub meters_per_degree: f64,
    pub rounding: RoundingPolicy,
    pub fallback: FallbackPolicy,
    pub fallback_ratios: FallbackRatios,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            resource_url: DEFAULT_RESOURCE_URL.to_string(),
            earlier_stock_field: DEFAULT_EARLIER_STOCK_FIELD.to_string(),
            later_stock_field: DEFAULT_LATER_STOCK_FIELD.to_string(),
            growth_span_years: DEFAULT_GROWTH_SPAN_YEARS,
            leakage_rate: DEFAULT_LEAKAGE_RATE,
            credit_price: DEFAULT_CREDIT_PRICE,
            meters_per_degree: DEFAULT_METERS_PER_DEGREE,
            rounding: RoundingPolicy::default(),
            fallback: FallbackPolicy::default(),
            fallback_ratios: FallbackRatios::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document, then validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource_url.trim().is_empty() {
            return Err(invalid("resourceUrl", "must not be empty"));
        }
        if self.earlier_stock_field.is_empty() || self.later_stock_field.is_empty() {
            return Err(invalid("stockField", "attribute names must not be empty"));
        }
        if !(self.growth_span_years.is_finite() && self.growth_span_years > 0.0) {
            return Err(invalid(
                "growthSpanYears",
                format!("must be a positive number, got {}", self.growth_span_years),
            ));
        }
        if !(0.0..=1.0).contains(&self.leakage_rate) {
            return Err(invalid(
                "leakageRate",
                format!("must lie within [0, 1], got {}", self.leakage_rate),
            ));
        }
        if !(self.credit_price.is_finite() && self.credit_price >= 0.0) {
            return Err(invalid(
                "creditPrice",
                format!("must be a non-negative number, got {}", self.credit_price),
            ));
        }
        if !(self.meters_per_degree.is_finite() && self.meters_per_degree > 0.0) {
            return Err(invalid(
                "metersPerDegree",
                format!("must be a positive number, got {}", self.meters_per_degree),
            ));
        }
        let ratios = &self.fallback_ratios;
        for value in [ratios.carbon_stock_per_m2, ratios.growth_per_m2, ratios.leakage_per_m2] {
            if !value.is_finite() {
                return Err(invalid("fallbackRatios", "ratios must be finite"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.into(),
    }
}
