use crate::aggregation::aggregate;
use crate::config::EngineConfig;
use crate::errors::LoadResult;
use crate::feature_index::{FeatureIndex, FeatureSource};
use crate::metrics::derive_report;
use crate::models::{DrawnPolygon, MetricsReport};
use crate::parcels::{AttributeSchema, FeatureCollection};

impl From<&EngineConfig> for AttributeSchema {
    fn from(config: &EngineConfig) -> Self {
        AttributeSchema {
            earlier_stock_field: config.earlier_stock_field.clone(),
            later_stock_field: config.later_stock_field.clone(),
        }
    }
}

/// Loader, spatial join and derivation wired together for one dataset.
pub struct MetricsEngine<S> {
    index: FeatureIndex<S>,
    config: EngineConfig,
}

impl<S: FeatureSource> MetricsEngine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let schema = AttributeSchema::from(&config);
        MetricsEngine {
            index: FeatureIndex::new(source, schema),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &FeatureIndex<S> {
        &self.index
    }

    /// Load (or reuse) the parcel collection and compute the report.
    pub async fn compute(&self, polygon: &DrawnPolygon) -> LoadResult<MetricsReport> {
        let collection = self.index.load().await?;
        Ok(compute_with(polygon, &collection, &self.config))
    }
}

/// Synchronous variant for callers that already hold the collection.
pub fn compute_with(
    polygon: &DrawnPolygon,
    collection: &FeatureCollection,
    config: &EngineConfig,
) -> MetricsReport {
    let aggregation = aggregate(polygon, collection);
    derive_report(aggregation, polygon, config)
}
