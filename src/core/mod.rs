// Core clustering and retrieval functionality shared by the library and CLI

pub mod aggregator;
pub mod clustering;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod greedy;
pub mod search;
pub mod similarity;
pub mod store;
pub mod types;

// Re-export error types
pub use error::EngineError;

// Re-export data model
pub use types::{Cluster, ClusterCollection, Item, Orientation, PerceptualDescriptor, QueryResult};

// Re-export metric functions
pub use similarity::{
    average_embeddings, brightness_distance, cosine_similarity, embedding_similarity,
    euclidean_distance, human_from_frames, mean_pairwise_distance, normalized_color_distance,
    perceptual_distance, perceptual_distance_with, validate_catalog, DistanceFormula,
    ValidationResult, HUMAN_FRAME_RATIO, MAX_RGB_DISTANCE,
};

// Re-export clustering
pub use clustering::{kmeans_clusters, kmeans_clusters_with_rng, KMeansConfig};
pub use greedy::{cluster_by_orientation, greedy_clusters, is_spaced_from, GreedyConfig};

// Re-export search and aggregation
pub use aggregator::{
    combined_score, enhanced_search, enhanced_search_text, AggregatorConfig, EnhancedSearchOutcome,
};
pub use search::{filter_by_orientation, search_cluster, semantic_search, SearchOptions};

// Re-export collaborators
pub use config::EngineConfig;
#[cfg(feature = "fastembed")]
pub use embeddings::FastEmbedder;
pub use embeddings::{EmbeddingError, PrecomputedEmbedder, QueryEmbedder};
pub use store::{
    append_to_store, load_catalog, save_catalog, ClusterStore, JsonClusterStore,
    MemoryClusterStore, StoreError,
};
