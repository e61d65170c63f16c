// Load/save adapters for cluster collections and catalogs

use crate::core::error::EngineError;
use crate::core::types::{Cluster, ClusterCollection, Item, Orientation};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Opaque persistence for a cluster collection
pub trait ClusterStore {
    fn load(&self) -> Result<ClusterCollection, StoreError>;
    fn save(&self, collection: &ClusterCollection) -> Result<(), StoreError>;
}

/// Cluster collection kept in a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonClusterStore {
    path: PathBuf,
}

impl JsonClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonClusterStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClusterStore for JsonClusterStore {
    /// A missing file loads as an empty collection
    fn load(&self) -> Result<ClusterCollection, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no cluster file, starting empty");
            return Ok(ClusterCollection::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, collection: &ClusterCollection) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(collection)?)?;
        info!(
            path = %self.path.display(),
            portrait = collection.portrait.len(),
            landscape = collection.landscape.len(),
            "saved clusters"
        );
        Ok(())
    }
}

/// In-process store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryClusterStore {
    collection: Mutex<ClusterCollection>,
}

impl MemoryClusterStore {
    pub fn new(collection: ClusterCollection) -> Self {
        MemoryClusterStore {
            collection: Mutex::new(collection),
        }
    }
}

impl ClusterStore for MemoryClusterStore {
    fn load(&self) -> Result<ClusterCollection, StoreError> {
        self.collection
            .lock()
            .map(|c| c.clone())
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn save(&self, collection: &ClusterCollection) -> Result<(), StoreError> {
        let mut guard = self
            .collection
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        *guard = collection.clone();
        Ok(())
    }
}

/// Load the collection, add one cluster, save it back.
///
/// Returns the index the cluster landed at within its orientation list.
pub fn append_to_store<S: ClusterStore + ?Sized>(
    store: &S,
    orientation: Orientation,
    cluster: Cluster,
) -> Result<usize, StoreError> {
    let current = store.load()?;
    let (updated, index) = current.with_cluster(orientation, cluster)?;
    store.save(&updated)?;
    Ok(index)
}

/// Read a catalog written as a JSON array of items
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<Item>, StoreError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_catalog(path: impl AsRef<Path>, items: &[Item]) -> Result<(), StoreError> {
    fs::write(path, serde_json::to_string_pretty(items)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_append() {
        let store = MemoryClusterStore::default();
        let index = append_to_store(&store, Orientation::Portrait, Cluster::new(vec![1, 2], 0.3)).unwrap();
        assert_eq!(index, 0);
        let index = append_to_store(&store, Orientation::Portrait, Cluster::new(vec![3], 0.1)).unwrap();
        assert_eq!(index, 0);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.portrait.len(), 2);
        assert_eq!(loaded.portrait[0].item_ids, vec![3]);
    }

    #[test]
    fn test_duplicate_append_leaves_store_unchanged() {
        let store = MemoryClusterStore::default();
        append_to_store(&store, Orientation::Landscape, Cluster::new(vec![1, 2], 0.3)).unwrap();
        let result = append_to_store(&store, Orientation::Landscape, Cluster::new(vec![2, 1], 0.1));
        assert!(matches!(result, Err(StoreError::Engine(EngineError::DuplicateCluster))));
        assert_eq!(store.load().unwrap().landscape.len(), 1);
    }
}
