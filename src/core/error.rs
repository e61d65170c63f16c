// Error types for the clustering and retrieval engine

use crate::core::embeddings::EmbeddingError;
use thiserror::Error;

/// Errors raised for invalid caller input.
///
/// Missing descriptors, missing embeddings and empty results are not
/// errors; they resolve to neutral values or empty collections.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid orientation: '{0}' (expected 'portrait' or 'landscape')")]
    InvalidOrientation(String),

    #[error("Invalid top_k: must be greater than 0")]
    InvalidTopK,

    #[error("Invalid max_videos: must be greater than 0")]
    InvalidMaxVideos,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cluster with identical members already exists")]
    DuplicateCluster,

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}
