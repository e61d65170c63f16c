// Bundled configuration for all engine algorithms

use crate::core::aggregator::AggregatorConfig;
use crate::core::clustering::KMeansConfig;
use crate::core::error::EngineError;
use crate::core::greedy::GreedyConfig;
use crate::core::search::SearchOptions;
use crate::core::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Every algorithm's settings in one place.
///
/// Missing sections and fields fall back to their defaults, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub greedy: GreedyConfig,
    pub kmeans: KMeansConfig,
    pub search: SearchOptions,
    pub aggregator: AggregatorConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.greedy.validate()?;
        self.kmeans.validate()?;
        if self.search.top_k == 0 {
            return Err(EngineError::InvalidTopK);
        }
        self.aggregator.validate()
    }
}
