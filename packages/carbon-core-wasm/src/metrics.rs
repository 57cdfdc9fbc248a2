//! Conversion of aggregated carbon-stock sums into the reported metrics.
//!
//! Growth is the stock change spread over the observation span, leakage is a
//! fixed share of growth, net sequestration is the remainder, and only a
//! positive net sequestration is worth marketable credits.

use crate::area::estimate_area;
use crate::config::{EngineConfig, FallbackPolicy};
use crate::console_warn;
use crate::models::{AggregationResult, CarbonMetrics, DrawnPolygon, MetricsBasis, MetricsReport};

/// Flow figures derived from a stock change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequestrationChain {
    pub forest_growth: f64,
    pub leakage: f64,
    pub net_sequestration: f64,
    pub marketable_credits: f64,
}

impl SequestrationChain {
    pub fn from_growth(forest_growth: f64, config: &EngineConfig) -> Self {
        let leakage = forest_growth * config.leakage_rate;
        let net_sequestration = forest_growth - leakage;
        SequestrationChain {
            forest_growth,
            leakage,
            net_sequestration,
            marketable_credits: credits_for(net_sequestration, config),
        }
    }

    pub fn from_stocks(earlier: f64, later: f64, config: &EngineConfig) -> Self {
        Self::from_growth((later - earlier) / config.growth_span_years, config)
    }
}

/// Value of a net sequestration; nothing is creditable unless it is positive.
pub fn credits_for(net_sequestration: f64, config: &EngineConfig) -> f64 {
    if net_sequestration > 0.0 {
        net_sequestration * config.credit_price
    } else {
        0.0
    }
}

/// Metrics from the aggregated attribute sums. Total: always produces a
/// value, all zero for an empty aggregation over a degenerate polygon.
pub fn derive_metrics(
    aggregation: &AggregationResult,
    polygon: &DrawnPolygon,
    config: &EngineConfig,
) -> CarbonMetrics {
    let chain = SequestrationChain::from_stocks(
        aggregation.sum_earlier_stock,
        aggregation.sum_later_stock,
        config,
    );

    round_metrics(
        CarbonMetrics {
            area: estimate_area(polygon, config.meters_per_degree),
            carbon_stocks: aggregation.sum_earlier_stock,
            forest_growth: chain.forest_growth,
            leakage: chain.leakage,
            net_sequestration: chain.net_sequestration,
            marketable_credits: chain.marketable_credits,
        },
        config,
    )
}

/// Metrics estimated from the polygon area alone, for polygons that contain
/// no parcel centroid.
pub fn fallback_metrics(polygon: &DrawnPolygon, config: &EngineConfig) -> CarbonMetrics {
    match config.fallback {
        FallbackPolicy::ZeroStock => derive_metrics(&AggregationResult::default(), polygon, config),
        FallbackPolicy::AreaHeuristic => {
            let area = estimate_area(polygon, config.meters_per_degree);
            let ratios = &config.fallback_ratios;
            let round = |v: f64| config.rounding.apply(v);

            // Net and credits derive from the rounded growth and leakage so the
            // displayed figures stay consistent with each other
            let forest_growth = round(area * ratios.growth_per_m2);
            let leakage = round(area * ratios.leakage_per_m2);
            let net_sequestration = forest_growth - leakage;

            CarbonMetrics {
                area: round(area),
                carbon_stocks: round(area * ratios.carbon_stock_per_m2),
                forest_growth,
                leakage,
                net_sequestration,
                marketable_credits: round(credits_for(net_sequestration, config)),
            }
        }
    }
}

/// Pick the derivation branch for an aggregation and label the result.
pub fn derive_report(
    aggregation: AggregationResult,
    polygon: &DrawnPolygon,
    config: &EngineConfig,
) -> MetricsReport {
    if aggregation.is_empty() {
        console_warn!("No parcel features found in the drawn area, using area fallback");
        return MetricsReport {
            metrics: fallback_metrics(polygon, config),
            basis: MetricsBasis::AreaFallback,
            aggregation,
        };
    }

    MetricsReport {
        metrics: derive_metrics(&aggregation, polygon, config),
        basis: MetricsBasis::FeatureSums,
        aggregation,
    }
}

// The same policy is applied to every field
fn round_metrics(metrics: CarbonMetrics, config: &EngineConfig) -> CarbonMetrics {
    let round = |v: f64| config.rounding.apply(v);
    CarbonMetrics {
        area: round(metrics.area),
        carbon_stocks: round(metrics.carbon_stocks),
        forest_growth: round(metrics.forest_growth),
        leakage: round(metrics.leakage),
        net_sequestration: round(metrics.net_sequestration),
        marketable_credits: round(metrics.marketable_credits),
    }
}
