// Multi-prompt search with perceptual re-ranking

use crate::core::embeddings::QueryEmbedder;
use crate::core::error::EngineError;
use crate::core::search::{filter_by_orientation, semantic_search, SearchOptions};
use crate::core::similarity::{brightness_distance, normalized_color_distance};
use crate::core::types::{Cluster, Item, Orientation, PerceptualDescriptor, QueryResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Configuration for corroborated, color-aware search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Semantic similarity a result must reach in any pass
    pub min_similarity: f32,
    pub primary_top_k: usize,
    pub related_top_k: usize,
    pub filter_humans: bool,
    /// Passes an item must clear to count as corroborated
    pub min_passes: usize,
    /// Corroborated items required before the candidate set is narrowed
    pub min_corroborated: usize,
    /// Candidates required before perceptual blending applies
    pub min_blend_candidates: usize,
    pub semantic_weight: f32,
    pub color_weight: f32,
    pub brightness_weight: f32,
    /// Results kept after re-ranking
    pub max_videos: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            min_similarity: 0.75,
            primary_top_k: 50,
            related_top_k: 30,
            filter_humans: true,
            min_passes: 2,
            min_corroborated: 3,
            min_blend_candidates: 2,
            semantic_weight: 0.6,
            color_weight: 0.3,
            brightness_weight: 0.1,
            max_videos: 5,
        }
    }
}

impl AggregatorConfig {
    pub fn new(max_videos: usize, min_similarity: f32) -> Self {
        AggregatorConfig {
            max_videos,
            min_similarity,
            ..Default::default()
        }
    }

    pub fn with_weights(mut self, semantic: f32, color: f32, brightness: f32) -> Self {
        self.semantic_weight = semantic;
        self.color_weight = color;
        self.brightness_weight = brightness;
        self
    }

    pub fn with_corroboration(mut self, min_passes: usize, min_corroborated: usize) -> Self {
        self.min_passes = min_passes;
        self.min_corroborated = min_corroborated;
        self
    }

    pub fn with_filter_humans(mut self, filter: bool) -> Self {
        self.filter_humans = filter;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_videos == 0 {
            return Err(EngineError::InvalidMaxVideos);
        }
        if self.primary_top_k == 0 || self.related_top_k == 0 {
            return Err(EngineError::InvalidTopK);
        }
        let weights = [self.semantic_weight, self.color_weight, self.brightness_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::InvalidConfig(
                "blend weights must be finite and non-negative".to_string(),
            ));
        }
        if !self.min_similarity.is_finite() {
            return Err(EngineError::InvalidConfig(
                "min_similarity must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn pass_options(&self, top_k: usize) -> SearchOptions {
        SearchOptions::new(top_k).with_filter_humans(self.filter_humans)
    }
}

/// Outcome of a corroborated search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedSearchOutcome {
    /// Final ranking, best combined score first
    pub results: Vec<QueryResult>,
    /// Primary results at or above the similarity threshold
    pub above_threshold: usize,
    /// Whether related prompts narrowed the candidate set
    pub corroborated: bool,
    /// Item used as the color and brightness reference, if blending ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<u64>,
}

impl EnhancedSearchOutcome {
    /// Group the ranked results into a cluster; quality is one minus the
    /// mean combined score. `None` when there are no results.
    pub fn to_cluster(&self, theme: Option<&str>) -> Option<Cluster> {
        if self.results.is_empty() {
            return None;
        }
        let mean = self.results.iter().map(|r| r.rank_score()).sum::<f32>() / self.results.len() as f32;
        let cluster = Cluster::new(self.results.iter().map(|r| r.item_id).collect(), 1.0 - mean);
        Some(match theme {
            Some(theme) => cluster.with_theme(theme),
            None => cluster,
        })
    }
}

/// Blend semantic similarity with color and brightness closeness to a
/// reference item. Falls back to the semantic score when either side has
/// no descriptor.
pub fn combined_score(
    semantic: f32,
    candidate: Option<&PerceptualDescriptor>,
    reference: Option<&PerceptualDescriptor>,
    config: &AggregatorConfig,
) -> f32 {
    let (Some(candidate), Some(reference)) = (candidate, reference) else {
        return semantic;
    };

    let color_similarity =
        1.0 - normalized_color_distance(&candidate.dominant_color, &reference.dominant_color);
    let brightness_similarity = 1.0 - brightness_distance(candidate.brightness, reference.brightness);

    config.semantic_weight * semantic
        + config.color_weight * color_similarity
        + config.brightness_weight * brightness_similarity
}

/// Search with a primary query, corroborate with related queries, then
/// re-rank survivors by visual harmony with the best semantic match.
///
/// Related passes only narrow the set when enough items clear the
/// threshold in several passes; otherwise the primary results stand.
pub fn enhanced_search(
    items: &[Item],
    primary: &[f32],
    related: &[Vec<f32>],
    orientation: Orientation,
    config: &AggregatorConfig,
) -> Result<EnhancedSearchOutcome, EngineError> {
    config.validate()?;

    let primary_results: Vec<QueryResult> =
        semantic_search(items, primary, &config.pass_options(config.primary_top_k))?
            .into_iter()
            .filter(|r| r.similarity >= config.min_similarity)
            .collect();
    let above_threshold = primary_results.len();
    info!(
        above_threshold,
        min_similarity = config.min_similarity,
        "primary search pass"
    );

    if primary_results.is_empty() {
        return Ok(EnhancedSearchOutcome::default());
    }

    let mut passes: HashMap<u64, usize> = primary_results.iter().map(|r| (r.item_id, 1)).collect();
    for query in related {
        let hits = semantic_search(items, query, &config.pass_options(config.related_top_k))?;
        for hit in hits.iter().filter(|r| r.similarity >= config.min_similarity) {
            if let Some(count) = passes.get_mut(&hit.item_id) {
                *count += 1;
            }
        }
    }

    let corroborated_ids: HashSet<u64> = passes
        .into_iter()
        .filter(|(_, count)| *count >= config.min_passes)
        .map(|(id, _)| id)
        .collect();

    let corroborated = !related.is_empty() && corroborated_ids.len() >= config.min_corroborated;
    let candidates: Vec<QueryResult> = if corroborated {
        debug!(count = corroborated_ids.len(), "narrowing to corroborated items");
        primary_results
            .into_iter()
            .filter(|r| corroborated_ids.contains(&r.item_id))
            .collect()
    } else {
        if !related.is_empty() {
            debug!(
                count = corroborated_ids.len(),
                "too few corroborated items, keeping primary results"
            );
        }
        primary_results
    };

    let candidates = filter_by_orientation(candidates, items, orientation);
    if candidates.is_empty() {
        return Ok(EnhancedSearchOutcome {
            above_threshold,
            corroborated,
            ..Default::default()
        });
    }

    let descriptors: HashMap<u64, &PerceptualDescriptor> = items
        .iter()
        .filter_map(|item| item.descriptor.as_ref().map(|d| (item.id, d)))
        .collect();

    let reference = if candidates.len() >= config.min_blend_candidates {
        candidates.first().map(|r| r.item_id)
    } else {
        None
    };
    let reference_descriptor = reference.and_then(|id| descriptors.get(&id).copied());

    let mut results: Vec<QueryResult> = candidates
        .into_iter()
        .map(|r| {
            let combined = match reference {
                Some(_) => combined_score(
                    r.similarity,
                    descriptors.get(&r.item_id).copied(),
                    reference_descriptor,
                    config,
                ),
                None => r.similarity,
            };
            let semantic = r.similarity;
            r.with_blend(semantic, combined)
        })
        .collect();

    results.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
    results.truncate(config.max_videos);

    info!(
        orientation = %orientation,
        results = results.len(),
        corroborated,
        "enhanced search complete"
    );
    Ok(EnhancedSearchOutcome {
        results,
        above_threshold,
        corroborated,
        reference,
    })
}

/// Embed the query text, then run [`enhanced_search`].
///
/// A failure to embed the primary query is returned; a related query
/// that cannot be embedded is skipped.
pub fn enhanced_search_text<E: QueryEmbedder + ?Sized>(
    embedder: &E,
    items: &[Item],
    primary: &str,
    related: &[String],
    orientation: Orientation,
    config: &AggregatorConfig,
) -> Result<EnhancedSearchOutcome, EngineError> {
    config.validate()?;

    let primary_embedding = embedder.embed_query(primary)?;
    let related_embeddings: Vec<Vec<f32>> = related
        .iter()
        .filter(|text| !text.trim().is_empty())
        .filter_map(|text| match embedder.embed_query(text) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(query = %text, error = %e, "skipping related query");
                None
            }
        })
        .collect();

    enhanced_search(items, &primary_embedding, &related_embeddings, orientation, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embeddings::PrecomputedEmbedder;

    fn item(id: u64, embedding: Vec<f32>, brightness: f32, color: [f32; 3]) -> Item {
        Item::new(id, Orientation::Portrait)
            .with_embedding(embedding)
            .with_descriptor(brightness, color)
    }

    #[test]
    fn test_combined_score_weights() {
        let config = AggregatorConfig::default();
        let a = PerceptualDescriptor::new(0.5, [0.0, 0.0, 0.0]);
        let b = PerceptualDescriptor::new(0.5, [0.0, 0.0, 0.0]);
        assert!((combined_score(0.5, Some(&a), Some(&b), &config) - 0.7).abs() < 1e-6);

        let far = PerceptualDescriptor::new(1.0, [255.0, 255.0, 255.0]);
        let dark = PerceptualDescriptor::new(0.0, [0.0, 0.0, 0.0]);
        assert!((combined_score(1.0, Some(&far), Some(&dark), &config) - 0.6).abs() < 1e-4);

        assert_eq!(combined_score(0.42, None, Some(&a), &config), 0.42);
    }

    #[test]
    fn test_empty_when_nothing_clears_threshold() {
        let items = vec![item(1, vec![0.0, 1.0], 0.5, [0.0, 0.0, 0.0])];
        let outcome =
            enhanced_search(&items, &[1.0, 0.0], &[], Orientation::Portrait, &AggregatorConfig::default())
                .unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.above_threshold, 0);
        assert!(outcome.to_cluster(None).is_none());
    }

    #[test]
    fn test_color_reranks_semantic_matches() {
        // Item 3 is slightly less semantic than 2 but matches the reference color
        let items = vec![
            item(1, vec![1.0, 0.0], 0.2, [20.0, 60.0, 20.0]),
            item(2, vec![1.0, 0.2], 0.9, [250.0, 250.0, 250.0]),
            item(3, vec![1.0, 0.3], 0.2, [20.0, 60.0, 20.0]),
        ];
        let config = AggregatorConfig::new(5, 0.9);
        let outcome = enhanced_search(&items, &[1.0, 0.0], &[], Orientation::Portrait, &config).unwrap();

        let ids: Vec<u64> = outcome.results.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(outcome.reference, Some(1));
        assert!(!outcome.corroborated);
        for r in &outcome.results {
            assert_eq!(r.semantic_score, Some(r.similarity));
        }
    }

    #[test]
    fn test_single_candidate_skips_blend() {
        let items = vec![item(1, vec![1.0, 0.1], 0.1, [200.0, 0.0, 0.0])];
        let config = AggregatorConfig::new(5, 0.5);
        let outcome = enhanced_search(&items, &[1.0, 0.0], &[], Orientation::Portrait, &config).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.reference, None);
        let r = &outcome.results[0];
        assert_eq!(r.combined_score, Some(r.similarity));
    }

    #[test]
    fn test_corroboration_narrows_candidates() {
        let same = [100.0, 100.0, 100.0];
        let items = vec![
            item(1, vec![1.0, 0.0, 0.0], 0.5, same),
            item(2, vec![1.0, 0.3, 0.0], 0.5, same),
            item(3, vec![1.0, 0.0, 0.3], 0.5, same),
            item(4, vec![1.0, 0.2, 0.2], 0.5, same),
            item(5, vec![1.0, -0.3, 0.0], 0.5, same),
        ];
        let config = AggregatorConfig::new(10, 0.9);
        // Related query clears the threshold for every item except 5
        let related = vec![vec![1.0, 0.2, 0.2]];
        let outcome =
            enhanced_search(&items, &[1.0, 0.0, 0.0], &related, Orientation::Portrait, &config).unwrap();

        assert!(outcome.corroborated);
        assert_eq!(outcome.above_threshold, 5);
        let mut ids: Vec<u64> = outcome.results.iter().map(|r| r.item_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_corroboration_falls_back_when_too_few() {
        let same = [100.0, 100.0, 100.0];
        let items = vec![
            item(1, vec![1.0, 0.0], 0.5, same),
            item(2, vec![1.0, 0.2], 0.5, same),
            item(3, vec![1.0, -0.2], 0.5, same),
        ];
        let config = AggregatorConfig::new(10, 0.9);
        // Related query corroborates none of them
        let related = vec![vec![0.5, 1.0]];
        let outcome = enhanced_search(&items, &[1.0, 0.0], &related, Orientation::Portrait, &config).unwrap();
        assert!(!outcome.corroborated);
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_orientation_and_max_videos() {
        let mut items: Vec<Item> = (1..=4)
            .map(|id| item(id, vec![1.0, 0.05 * id as f32], 0.5, [0.0, 0.0, 0.0]))
            .collect();
        items.push(
            Item::new(9, Orientation::Landscape)
                .with_embedding(vec![1.0, 0.0])
                .with_descriptor(0.5, [0.0, 0.0, 0.0]),
        );
        let config = AggregatorConfig::new(2, 0.5);
        let outcome = enhanced_search(&items, &[1.0, 0.0], &[], Orientation::Portrait, &config).unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.item_id != 9));

        let cluster = outcome.to_cluster(Some("calm sea")).unwrap();
        assert_eq!(cluster.item_ids, vec![1, 2]);
        assert_eq!(cluster.theme.as_deref(), Some("calm sea"));
    }

    #[test]
    fn test_invalid_config() {
        let config = AggregatorConfig::new(0, 0.5);
        assert!(matches!(
            enhanced_search(&[], &[1.0], &[], Orientation::Portrait, &config),
            Err(EngineError::InvalidMaxVideos)
        ));
        let config = AggregatorConfig::default().with_weights(0.6, -0.3, 0.1);
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_text_queries_skip_unknown_related() {
        let items = vec![
            item(1, vec![1.0, 0.0], 0.5, [0.0, 0.0, 0.0]),
            item(2, vec![1.0, 0.1], 0.5, [0.0, 0.0, 0.0]),
        ];
        let embedder = PrecomputedEmbedder::new().with_query("foggy forest", vec![1.0, 0.0]);
        let related = vec!["misty woods".to_string()];
        let config = AggregatorConfig::new(5, 0.5);
        let outcome = enhanced_search_text(
            &embedder,
            &items,
            "foggy forest",
            &related,
            Orientation::Portrait,
            &config,
        )
        .unwrap();
        assert_eq!(outcome.results.len(), 2);

        let missing = enhanced_search_text(&embedder, &items, "desert", &[], Orientation::Portrait, &config);
        assert!(matches!(missing, Err(EngineError::Embedding(_))));
    }
}
