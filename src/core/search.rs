// Semantic search over catalog embeddings

use crate::core::error::EngineError;
use crate::core::similarity::cosine_similarity;
use crate::core::types::{Cluster, Item, Orientation, QueryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Options for a single semantic search pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Maximum number of results returned
    pub top_k: usize,
    /// Skip items flagged as containing people
    pub filter_humans: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            top_k: 20,
            filter_humans: true,
        }
    }
}

impl SearchOptions {
    pub fn new(top_k: usize) -> Self {
        SearchOptions {
            top_k,
            ..Default::default()
        }
    }

    pub fn with_filter_humans(mut self, filter: bool) -> Self {
        self.filter_humans = filter;
        self
    }
}

/// Rank the catalog against a query embedding.
///
/// Items without an embedding are skipped. Results are sorted by cosine
/// similarity, highest first, with ties kept in catalog order.
pub fn semantic_search(
    items: &[Item],
    query: &[f32],
    options: &SearchOptions,
) -> Result<Vec<QueryResult>, EngineError> {
    if options.top_k == 0 {
        return Err(EngineError::InvalidTopK);
    }

    let mut results: Vec<QueryResult> = items
        .iter()
        .filter(|item| !(options.filter_humans && item.is_human()))
        .filter_map(|item| {
            item.embedding
                .as_deref()
                .map(|emb| QueryResult::new(item.id, cosine_similarity(query, emb)))
        })
        .collect();

    debug!(scored = results.len(), top_k = options.top_k, "semantic search");

    // Sort by similarity descending
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(options.top_k);
    Ok(results)
}

/// Keep only results whose catalog item has the given orientation
pub fn filter_by_orientation(
    results: Vec<QueryResult>,
    items: &[Item],
    orientation: Orientation,
) -> Vec<QueryResult> {
    let orientations: HashMap<u64, Orientation> =
        items.iter().map(|item| (item.id, item.orientation)).collect();
    results
        .into_iter()
        .filter(|r| orientations.get(&r.item_id) == Some(&orientation))
        .collect()
}

/// Build a cluster straight from a search.
///
/// Takes the best `max_videos` results of the given orientation; quality
/// is one minus their mean similarity. Returns `None` when nothing matches.
pub fn search_cluster(
    items: &[Item],
    query: &[f32],
    orientation: Orientation,
    max_videos: usize,
    theme: Option<&str>,
    options: &SearchOptions,
) -> Result<Option<Cluster>, EngineError> {
    if max_videos == 0 {
        return Err(EngineError::InvalidMaxVideos);
    }

    let results = semantic_search(items, query, options)?;
    let mut matching = filter_by_orientation(results, items, orientation);
    matching.truncate(max_videos);

    if matching.is_empty() {
        return Ok(None);
    }

    let avg = matching.iter().map(|r| r.similarity).sum::<f32>() / matching.len() as f32;
    let mut cluster = Cluster::new(matching.iter().map(|r| r.item_id).collect(), 1.0 - avg);
    if let Some(theme) = theme {
        cluster = cluster.with_theme(theme);
    }
    Ok(Some(cluster))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Item> {
        vec![
            Item::new(1, Orientation::Portrait).with_embedding(vec![1.0, 0.0]),
            Item::new(2, Orientation::Landscape).with_embedding(vec![0.0, 1.0]),
            Item::new(3, Orientation::Landscape).with_embedding(vec![1.0, 0.0]),
            Item::new(4, Orientation::Portrait),
            Item::new(5, Orientation::Portrait)
                .with_embedding(vec![1.0, 0.1])
                .with_human(true),
        ]
    }

    #[test]
    fn test_ranks_by_similarity() {
        let results = semantic_search(&catalog(), &[1.0, 0.0], &SearchOptions::new(10)).unwrap();
        let ids: Vec<u64> = results.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert!(results[2].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_human_filter_toggle() {
        let options = SearchOptions::new(10).with_filter_humans(false);
        let results = semantic_search(&catalog(), &[1.0, 0.0], &options).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[2].item_id, 5);
    }

    #[test]
    fn test_top_k_truncates() {
        let results = semantic_search(&catalog(), &[1.0, 0.0], &SearchOptions::new(1)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item_id, 1);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let result = semantic_search(&catalog(), &[1.0, 0.0], &SearchOptions::new(0));
        assert!(matches!(result, Err(EngineError::InvalidTopK)));
    }

    #[test]
    fn test_mismatched_query_scores_zero() {
        let results = semantic_search(&catalog(), &[1.0, 0.0, 0.0], &SearchOptions::new(10)).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.similarity == 0.0));
    }

    #[test]
    fn test_search_cluster() {
        let cluster = search_cluster(
            &catalog(),
            &[1.0, 0.0],
            Orientation::Landscape,
            5,
            Some("open sky"),
            &SearchOptions::default(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(cluster.item_ids, vec![3, 2]);
        assert!((cluster.quality - 0.5).abs() < 1e-6);
        assert_eq!(cluster.theme.as_deref(), Some("open sky"));
    }

    #[test]
    fn test_search_cluster_no_match() {
        let items = vec![Item::new(1, Orientation::Portrait).with_embedding(vec![1.0])];
        let cluster = search_cluster(
            &items,
            &[1.0],
            Orientation::Landscape,
            5,
            None,
            &SearchOptions::default(),
        )
        .unwrap();
        assert!(cluster.is_none());

        let invalid = search_cluster(&items, &[1.0], Orientation::Portrait, 0, None, &SearchOptions::default());
        assert!(matches!(invalid, Err(EngineError::InvalidMaxVideos)));
    }
}
