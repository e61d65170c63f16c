// Montage Engine Library
// Groups stock footage into visually coherent clusters and ranks it against
// text queries using precomputed color descriptors and CLIP embeddings.

pub mod core;

// Re-export core functionality for external use
pub use self::core::{
    // Data model
    Cluster, ClusterCollection, Item, Orientation, PerceptualDescriptor, QueryResult,
    EngineError,
    // Metrics
    cosine_similarity, embedding_similarity, perceptual_distance, perceptual_distance_with,
    normalized_color_distance, brightness_distance, euclidean_distance,
    mean_pairwise_distance, average_embeddings, human_from_frames, validate_catalog,
    DistanceFormula, ValidationResult, HUMAN_FRAME_RATIO, MAX_RGB_DISTANCE,
    // Clustering
    greedy_clusters, cluster_by_orientation, is_spaced_from, GreedyConfig,
    kmeans_clusters, kmeans_clusters_with_rng, KMeansConfig,
    // Search
    semantic_search, search_cluster, filter_by_orientation, SearchOptions,
    enhanced_search, enhanced_search_text, combined_score,
    AggregatorConfig, EnhancedSearchOutcome,
    // Collaborators
    EngineConfig, QueryEmbedder, PrecomputedEmbedder, EmbeddingError,
    ClusterStore, JsonClusterStore, MemoryClusterStore, StoreError,
    append_to_store, load_catalog, save_catalog,
};

#[cfg(feature = "fastembed")]
pub use self::core::FastEmbedder;
