// Query embedding collaborators

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur while embedding query text
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize model: {0}")]
    ModelInitError(String),

    #[error("Failed to generate embeddings: {0}")]
    EmbeddingFailed(String),

    #[error("Model lock error: {0}")]
    LockError(String),

    #[error("Empty input: no query text provided")]
    EmptyInput,

    #[error("No embedding available for query: '{0}'")]
    UnknownQuery(String),
}

/// Turns query text into a vector in the same space as catalog embeddings
pub trait QueryEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Lookup table of query embeddings computed ahead of time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecomputedEmbedder {
    queries: HashMap<String, Vec<f32>>,
}

impl PrecomputedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.queries.insert(text.into(), embedding);
        self
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl QueryEmbedder for PrecomputedEmbedder {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = text.trim();
        if key.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        self.queries
            .get(key)
            .cloned()
            .ok_or_else(|| EmbeddingError::UnknownQuery(key.to_string()))
    }
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use super::{EmbeddingError, QueryEmbedder};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Embeds query text with a local CLIP text model.
    ///
    /// The model is loaded on first use and cached for later queries.
    pub struct FastEmbedder {
        model: Mutex<Option<TextEmbedding>>,
        kind: EmbeddingModel,
        show_progress: bool,
    }

    impl FastEmbedder {
        /// CLIP ViT-B/32 text tower, matching CLIP image embeddings
        pub fn new() -> Self {
            Self::with_model(EmbeddingModel::ClipVitB32)
        }

        pub fn with_model(kind: EmbeddingModel) -> Self {
            FastEmbedder {
                model: Mutex::new(None),
                kind,
                show_progress: false,
            }
        }

        /// Create with download progress enabled
        pub fn with_progress(mut self, show: bool) -> Self {
            self.show_progress = show;
            self
        }
    }

    impl Default for FastEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl QueryEmbedder for FastEmbedder {
        fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.trim().is_empty() {
                return Err(EmbeddingError::EmptyInput);
            }

            let mut guard = self
                .model
                .lock()
                .map_err(|e| EmbeddingError::LockError(e.to_string()))?;

            if guard.is_none() {
                let model = TextEmbedding::try_new(
                    InitOptions::new(self.kind.clone())
                        .with_show_download_progress(self.show_progress),
                )
                .map_err(|e| EmbeddingError::ModelInitError(e.to_string()))?;
                *guard = Some(model);
            }

            let model = guard
                .as_mut()
                .ok_or_else(|| EmbeddingError::ModelInitError("Model not found in cache".to_string()))?;

            model
                .embed(vec![text.to_string()], None)
                .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding generated".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precomputed_lookup() {
        let embedder = PrecomputedEmbedder::new().with_query("forest fog", vec![1.0, 0.0]);
        assert_eq!(embedder.embed_query("forest fog").unwrap(), vec![1.0, 0.0]);
        assert_eq!(embedder.embed_query("  forest fog ").unwrap(), vec![1.0, 0.0]);
        assert_eq!(embedder.len(), 1);
    }

    #[test]
    fn test_unknown_and_empty_queries() {
        let embedder = PrecomputedEmbedder::new();
        assert!(matches!(
            embedder.embed_query("desert"),
            Err(EmbeddingError::UnknownQuery(_))
        ));
        assert!(matches!(embedder.embed_query("   "), Err(EmbeddingError::EmptyInput)));
    }

    #[test]
    fn test_precomputed_from_json() {
        let embedder: PrecomputedEmbedder =
            serde_json::from_str(r#"{"night city": [0.5, 0.5]}"#).unwrap();
        assert_eq!(embedder.embed_query("night city").unwrap(), vec![0.5, 0.5]);
    }
}
