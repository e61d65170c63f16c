// K-means clustering over semantic embeddings

use crate::core::error::EngineError;
use crate::core::similarity::cosine_similarity;
use crate::core::types::{Cluster, Item, Orientation};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Configuration for embedding k-means clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Upper bound on the number of clusters
    pub max_clusters: usize,
    /// Members kept per cluster, best-matching first
    pub max_cluster_size: usize,
    /// Fixed number of assign/update rounds
    pub iterations: usize,
    /// Leave out items flagged as containing people
    pub exclude_humans: bool,
    /// Seed for centroid selection; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        KMeansConfig {
            max_clusters: 20,
            max_cluster_size: 5,
            iterations: 5,
            exclude_humans: true,
            seed: None,
        }
    }
}

impl KMeansConfig {
    pub fn new(max_clusters: usize, max_cluster_size: usize) -> Self {
        KMeansConfig {
            max_clusters,
            max_cluster_size,
            ..Default::default()
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_exclude_humans(mut self, exclude: bool) -> Self {
        self.exclude_humans = exclude;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_clusters == 0 {
            return Err(EngineError::InvalidConfig(
                "max_clusters must be greater than 0".to_string(),
            ));
        }
        if self.max_cluster_size == 0 {
            return Err(EngineError::InvalidConfig(
                "max_cluster_size must be greater than 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(EngineError::InvalidConfig(
                "iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cluster with an RNG built from `config.seed` (or entropy when unset)
pub fn kmeans_clusters(
    items: &[Item],
    orientation: Orientation,
    config: &KMeansConfig,
) -> Result<Vec<Cluster>, EngineError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    kmeans_clusters_with_rng(items, orientation, config, &mut rng)
}

/// Cluster one orientation of the catalog by embedding similarity.
///
/// Centroids are seeded from a random shuffle of the eligible items and
/// refined for a fixed number of rounds. Quality is one minus the mean
/// cosine similarity of members to their centroid.
pub fn kmeans_clusters_with_rng<R: Rng + ?Sized>(
    items: &[Item],
    orientation: Orientation,
    config: &KMeansConfig,
    rng: &mut R,
) -> Result<Vec<Cluster>, EngineError> {
    config.validate()?;

    let pool = eligible_embeddings(items, orientation, config.exclude_humans);
    let n = pool.len();
    debug!(orientation = %orientation, eligible = n, "k-means clustering");

    if n == 0 {
        return Ok(Vec::new());
    }
    if n <= config.max_cluster_size {
        let ids = pool.iter().map(|(id, _)| *id).collect();
        return Ok(vec![Cluster::new(ids, 0.0)]);
    }

    let k = config.max_clusters.min(n / 2);
    let dim = pool[0].1.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let mut centroids: Vec<Vec<f32>> = order.iter().take(k).map(|&i| pool[i].1.to_vec()).collect();
    let mut assignments = vec![0usize; n];

    for _ in 0..config.iterations {
        // Assignment step: highest cosine similarity, first centroid wins ties
        for (i, (_, emb)) in pool.iter().enumerate() {
            let mut best_cluster = 0;
            let mut best_sim = f32::NEG_INFINITY;

            for (c, centroid) in centroids.iter().enumerate() {
                let sim = cosine_similarity(emb, centroid);
                if sim > best_sim {
                    best_sim = sim;
                    best_cluster = c;
                }
            }

            assignments[i] = best_cluster;
        }

        // Update step: empty clusters keep their previous centroid
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let mut sum = vec![0.0f32; dim];
            let mut count = 0usize;
            for ((_, emb), _) in pool.iter().zip(assignments.iter()).filter(|(_, a)| **a == c) {
                for (acc, val) in sum.iter_mut().zip(emb.iter()) {
                    *acc += val;
                }
                count += 1;
            }

            if count > 0 {
                let len = count as f32;
                *centroid = sum.into_iter().map(|v| v / len).collect();
            }
        }
    }

    let mut clusters: Vec<Cluster> = cluster_members(&assignments, k)
        .into_iter()
        .zip(centroids.iter())
        .filter(|(members, _)| !members.is_empty())
        .map(|(members, centroid)| {
            let mut ranked: Vec<(u64, f32)> = members
                .iter()
                .map(|&i| (pool[i].0, cosine_similarity(pool[i].1, centroid)))
                .collect();
            let mean = ranked.iter().map(|(_, s)| s).sum::<f32>() / ranked.len() as f32;
            let quality = (1.0 - mean).max(0.0);

            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            ranked.truncate(config.max_cluster_size);
            Cluster::new(ranked.into_iter().map(|(id, _)| id).collect(), quality)
        })
        .collect();

    clusters.sort_by(|a, b| a.quality.total_cmp(&b.quality));
    info!(
        orientation = %orientation,
        requested = k,
        clusters = clusters.len(),
        "k-means clustering complete"
    );
    Ok(clusters)
}

/// Items of one orientation that carry a usable embedding.
///
/// The first embedding fixes the dimensionality; later items that
/// disagree are left out. Repeated ids keep their first occurrence.
fn eligible_embeddings(
    items: &[Item],
    orientation: Orientation,
    exclude_humans: bool,
) -> Vec<(u64, &[f32])> {
    let mut seen = HashSet::new();
    let mut dim: Option<usize> = None;
    let mut pool = Vec::new();

    for item in items {
        if item.orientation != orientation || (exclude_humans && item.is_human()) {
            continue;
        }
        let Some(embedding) = item.embedding.as_deref() else {
            continue;
        };
        if embedding.is_empty() || !seen.insert(item.id) {
            continue;
        }
        let expected = *dim.get_or_insert(embedding.len());
        if embedding.len() != expected {
            warn!(
                item = item.id,
                dimension = embedding.len(),
                expected,
                "skipping item with mismatched embedding dimension"
            );
            continue;
        }
        pool.push((item.id, embedding));
    }

    pool
}

/// Get indices of members for each cluster
pub fn cluster_members(assignments: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); k];
    for (i, &a) in assignments.iter().enumerate() {
        if a < k {
            members[a].push(i);
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, embedding: Vec<f32>) -> Item {
        Item::new(id, Orientation::Portrait).with_embedding(embedding)
    }

    #[test]
    fn test_kmeans_empty() {
        let config = KMeansConfig::default().with_seed(1);
        let result = kmeans_clusters(&[], Orientation::Portrait, &config).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_small_input_single_cluster() {
        let items = vec![item(1, vec![1.0, 0.0]), item(2, vec![0.0, 1.0])];
        let config = KMeansConfig::new(4, 5).with_seed(7);
        let result = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].item_ids, vec![1, 2]);
        assert_eq!(result[0].quality, 0.0);
    }

    #[test]
    fn test_two_directions_split() {
        let mut items: Vec<Item> = (1..=4).map(|id| item(id, vec![1.0, 0.01 * id as f32])).collect();
        items.extend((5..=8).map(|id| item(id, vec![0.01 * id as f32, 1.0])));
        let config = KMeansConfig::new(2, 4).with_seed(42).with_iterations(5);
        let result = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();

        assert!(!result.is_empty());
        for cluster in &result {
            assert!(cluster.len() <= 4);
            assert!(cluster.quality >= 0.0);
        }
        for pair in result.windows(2) {
            assert!(pair[0].quality <= pair[1].quality);
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let items: Vec<Item> = (0..12)
            .map(|i| {
                let angle = i as f32 * 0.5;
                item(i, vec![angle.cos(), angle.sin(), 0.3])
            })
            .collect();
        let config = KMeansConfig::new(3, 3).with_seed(99);
        let a = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();
        let b = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filters_humans_and_mismatched_dimensions() {
        let items = vec![
            item(1, vec![1.0, 0.0]),
            item(2, vec![1.0, 0.0]).with_human(true),
            item(3, vec![1.0, 0.0, 0.0]),
            Item::new(4, Orientation::Landscape).with_embedding(vec![1.0, 0.0]),
            Item::new(5, Orientation::Portrait),
        ];
        let config = KMeansConfig::default().with_seed(3);
        let result = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].item_ids, vec![1]);

        let keep_humans = config.with_exclude_humans(false);
        let result = kmeans_clusters(&items, Orientation::Portrait, &keep_humans).unwrap();
        assert_eq!(result[0].item_ids, vec![1, 2]);
    }

    #[test]
    fn test_empty_clusters_dropped() {
        // Only two distinct directions for three centroids, so at least one
        // centroid is seeded as a duplicate and never wins an item
        let mut items: Vec<Item> = (1..=4).map(|id| item(id, vec![1.0, 0.0])).collect();
        items.extend((5..=6).map(|id| item(id, vec![0.0, 1.0])));

        for seed in 0..20 {
            let config = KMeansConfig::new(3, 2).with_seed(seed).with_iterations(3);
            let result = kmeans_clusters(&items, Orientation::Portrait, &config).unwrap();
            assert_eq!(result.len(), 2, "seed {}", seed);
            for cluster in &result {
                assert!(!cluster.is_empty());
                assert!(cluster.quality.abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = KMeansConfig::new(0, 5);
        assert!(matches!(
            kmeans_clusters(&[], Orientation::Portrait, &config),
            Err(EngineError::InvalidConfig(_))
        ));
        let config = KMeansConfig::default().with_iterations(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cluster_members() {
        let assignments = vec![0, 1, 0, 2, 1, 0];
        let members = cluster_members(&assignments, 3);
        assert_eq!(members[0], vec![0, 2, 5]);
        assert_eq!(members[1], vec![1, 4]);
        assert_eq!(members[2], vec![3]);
    }
}
