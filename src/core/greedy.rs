// Quality-bounded greedy clustering over perceptual descriptors

use crate::core::error::EngineError;
use crate::core::similarity::{mean_pairwise_distance, perceptual_distance_with, DistanceFormula};
use crate::core::types::{Cluster, ClusterCollection, Item, Orientation, PerceptualDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Configuration for greedy clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    /// Members per candidate cluster, including the seed item
    pub max_cluster_size: usize,
    /// Candidates with mean pairwise distance above this are rejected
    pub quality_threshold: f32,
    /// Maximum clusters per orientation
    pub max_clusters: usize,
    /// Minimum distance between the first members of two clusters
    pub min_cluster_distance: f32,
    pub formula: DistanceFormula,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        GreedyConfig {
            max_cluster_size: 5,
            quality_threshold: 0.03,
            max_clusters: 20,
            min_cluster_distance: 0.1,
            formula: DistanceFormula::Weighted,
        }
    }
}

impl GreedyConfig {
    pub fn new(max_cluster_size: usize, max_clusters: usize) -> Self {
        GreedyConfig {
            max_cluster_size,
            max_clusters,
            ..Default::default()
        }
    }

    pub fn with_quality_threshold(mut self, threshold: f32) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_min_cluster_distance(mut self, distance: f32) -> Self {
        self.min_cluster_distance = distance;
        self
    }

    pub fn with_formula(mut self, formula: DistanceFormula) -> Self {
        self.formula = formula;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_cluster_size == 0 {
            return Err(EngineError::InvalidConfig(
                "max_cluster_size must be greater than 0".to_string(),
            ));
        }
        if !self.quality_threshold.is_finite() || !self.min_cluster_distance.is_finite() {
            return Err(EngineError::InvalidConfig(
                "thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seed item plus its nearest neighbours
struct Candidate {
    members: Vec<usize>,
    quality: f32,
}

/// Cluster one orientation of the catalog by perceptual similarity.
///
/// Items of other orientations and items without a descriptor are
/// skipped. Each remaining item proposes its `max_cluster_size` nearest
/// neighbours (itself included) as a candidate; candidates are accepted
/// best-quality first until the cap is reached, skipping any that exceed
/// the quality threshold, repeat an accepted membership, or start too
/// close to an accepted cluster.
pub fn greedy_clusters(
    items: &[Item],
    orientation: Orientation,
    config: &GreedyConfig,
) -> Result<Vec<Cluster>, EngineError> {
    config.validate()?;

    let mut seen = HashSet::new();
    let pool: Vec<(u64, &PerceptualDescriptor)> = items
        .iter()
        .filter(|item| item.orientation == orientation)
        .filter_map(|item| item.descriptor.as_ref().map(|d| (item.id, d)))
        .filter(|(id, _)| seen.insert(*id))
        .collect();

    debug!(
        orientation = %orientation,
        eligible = pool.len(),
        "greedy clustering"
    );

    if pool.is_empty() {
        return Ok(Vec::new());
    }

    let mut candidates: Vec<Candidate> = (0..pool.len())
        .map(|seed| build_candidate(&pool, seed, config))
        .collect();

    // Stable: equal quality keeps catalog order
    candidates.sort_by(|a, b| a.quality.total_cmp(&b.quality));

    let mut accepted: Vec<Cluster> = Vec::new();
    for candidate in candidates {
        if accepted.len() >= config.max_clusters {
            break;
        }
        if candidate.quality > config.quality_threshold {
            continue;
        }

        let cluster = Cluster::new(
            candidate.members.iter().map(|&i| pool[i].0).collect(),
            candidate.quality,
        );
        if accepted.iter().any(|c| c.same_members(&cluster)) {
            continue;
        }

        let center = pool[candidate.members[0]].1;
        let too_close = accepted.iter().any(|existing| {
            existing
                .center()
                .and_then(|id| pool.iter().find(|(pid, _)| *pid == id))
                .map(|(_, d)| perceptual_distance_with(center, d, config.formula))
                .is_some_and(|distance| distance < config.min_cluster_distance)
        });
        if too_close {
            continue;
        }

        accepted.push(cluster);
    }

    accepted.sort_by(|a, b| a.quality.total_cmp(&b.quality));
    info!(
        orientation = %orientation,
        clusters = accepted.len(),
        "greedy clustering complete"
    );
    Ok(accepted)
}

fn build_candidate(
    pool: &[(u64, &PerceptualDescriptor)],
    seed: usize,
    config: &GreedyConfig,
) -> Candidate {
    let origin = pool[seed].1;
    let mut by_distance: Vec<(usize, f32)> = pool
        .iter()
        .enumerate()
        .map(|(i, (_, d))| (i, perceptual_distance_with(origin, d, config.formula)))
        .collect();
    by_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
    by_distance.truncate(config.max_cluster_size);

    let members: Vec<usize> = by_distance.into_iter().map(|(i, _)| i).collect();
    let descriptors: Vec<&PerceptualDescriptor> = members.iter().map(|&i| pool[i].1).collect();
    let quality = mean_pairwise_distance(&descriptors, config.formula);

    Candidate { members, quality }
}

/// Run greedy clustering for portrait and landscape items separately
pub fn cluster_by_orientation(
    items: &[Item],
    config: &GreedyConfig,
) -> Result<ClusterCollection, EngineError> {
    Ok(ClusterCollection {
        portrait: greedy_clusters(items, Orientation::Portrait, config)?,
        landscape: greedy_clusters(items, Orientation::Landscape, config)?,
    })
}

/// Whether `cluster` starts far enough from every cluster already in one
/// list of `collection`.
///
/// Centers are first members looked up in `items`; pairs where either
/// center lacks a descriptor are not compared.
pub fn is_spaced_from(
    collection: &ClusterCollection,
    orientation: Orientation,
    cluster: &Cluster,
    items: &[Item],
    config: &GreedyConfig,
) -> bool {
    let descriptor_of = |id: u64| {
        items
            .iter()
            .find(|item| item.id == id)
            .and_then(|item| item.descriptor.as_ref())
    };
    let Some(center) = cluster.center().and_then(descriptor_of) else {
        return true;
    };

    collection.get(orientation).iter().all(|existing| {
        existing
            .center()
            .and_then(descriptor_of)
            .map(|d| perceptual_distance_with(center, d, config.formula))
            .map_or(true, |distance| distance >= config.min_cluster_distance)
    })
}
