// Data model shared across clustering, search and persistence

use crate::core::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Catalog Types
// ============================================================================

/// Portrait or landscape classification of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Both orientations, portrait first
    pub const ALL: [Orientation; 2] = [Orientation::Portrait, Orientation::Landscape];

    /// Classify from pixel dimensions; square frames count as portrait
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(EngineError::InvalidOrientation(s.to_string())),
        }
    }
}

/// Brightness and dominant color summary of an item's appearance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerceptualDescriptor {
    /// Mean brightness in [0, 1]
    pub brightness: f32,
    /// Dominant RGB color, each channel in [0, 255]
    pub dominant_color: [f32; 3],
}

impl PerceptualDescriptor {
    pub fn new(brightness: f32, dominant_color: [f32; 3]) -> Self {
        PerceptualDescriptor {
            brightness,
            dominant_color,
        }
    }

    /// Combine per-frame descriptors into one item descriptor.
    ///
    /// Brightness is the plain mean; each color channel is the mean rounded
    /// to the nearest integer. Returns `None` when no frames are given.
    pub fn average(frames: &[PerceptualDescriptor]) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }

        let n = frames.len() as f32;
        let brightness = frames.iter().map(|f| f.brightness).sum::<f32>() / n;
        let mut color = [0.0f32; 3];
        for frame in frames {
            for (acc, c) in color.iter_mut().zip(frame.dominant_color.iter()) {
                *acc += c;
            }
        }
        for c in color.iter_mut() {
            *c = (*c / n).round();
        }

        Some(PerceptualDescriptor::new(brightness, color))
    }
}

/// A catalog entry as produced by the external analysis step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable catalog identifier
    pub id: u64,
    pub orientation: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<PerceptualDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Whether a person was detected in the footage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_human: Option<bool>,
}

impl Item {
    pub fn new(id: u64, orientation: Orientation) -> Self {
        Item {
            id,
            orientation,
            descriptor: None,
            embedding: None,
            has_human: None,
        }
    }

    pub fn with_descriptor(mut self, brightness: f32, dominant_color: [f32; 3]) -> Self {
        self.descriptor = Some(PerceptualDescriptor::new(brightness, dominant_color));
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_human(mut self, has_human: bool) -> Self {
        self.has_human = Some(has_human);
        self
    }

    /// True only when a person was positively detected
    pub fn is_human(&self) -> bool {
        self.has_human == Some(true)
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// A group of item identifiers with a lower-is-better quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Member ids in ranking order
    pub item_ids: Vec<u64>,
    pub quality: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Cluster {
    pub fn new(item_ids: Vec<u64>, quality: f32) -> Self {
        Cluster {
            item_ids,
            quality,
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    /// Order-independent membership comparison
    pub fn same_members(&self, other: &Cluster) -> bool {
        if self.item_ids.len() != other.item_ids.len() {
            return false;
        }
        let mut a = self.item_ids.clone();
        let mut b = other.item_ids.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    /// Cluster "center" used for inter-cluster spacing: its first member
    pub fn center(&self) -> Option<u64> {
        self.item_ids.first().copied()
    }
}

/// Cluster lists keyed by orientation, each sorted best-first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterCollection {
    #[serde(default)]
    pub portrait: Vec<Cluster>,
    #[serde(default)]
    pub landscape: Vec<Cluster>,
}

impl ClusterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, orientation: Orientation) -> &[Cluster] {
        match orientation {
            Orientation::Portrait => &self.portrait,
            Orientation::Landscape => &self.landscape,
        }
    }

    fn list_mut(&mut self, orientation: Orientation) -> &mut Vec<Cluster> {
        match orientation {
            Orientation::Portrait => &mut self.portrait,
            Orientation::Landscape => &mut self.landscape,
        }
    }

    /// Look up a single cluster by its position in one list
    pub fn cluster(&self, orientation: Orientation, index: usize) -> Option<&Cluster> {
        self.get(orientation).get(index)
    }

    pub fn total(&self) -> usize {
        self.portrait.len() + self.landscape.len()
    }

    /// Return a copy of this collection with `cluster` added to one list.
    ///
    /// The cluster lands at its quality-sorted position, after any existing
    /// clusters of equal quality. The returned index is that position.
    pub fn with_cluster(
        &self,
        orientation: Orientation,
        cluster: Cluster,
    ) -> Result<(ClusterCollection, usize), EngineError> {
        if cluster.is_empty() {
            return Err(EngineError::InvalidConfig(
                "cannot add an empty cluster".to_string(),
            ));
        }
        if !cluster.quality.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "cluster quality must be finite, got {}",
                cluster.quality
            )));
        }
        let mut seen = HashSet::with_capacity(cluster.len());
        if !cluster.item_ids.iter().all(|id| seen.insert(*id)) {
            return Err(EngineError::InvalidConfig(
                "cluster contains duplicate item ids".to_string(),
            ));
        }
        if self.get(orientation).iter().any(|c| c.same_members(&cluster)) {
            return Err(EngineError::DuplicateCluster);
        }

        let mut next = self.clone();
        let list = next.list_mut(orientation);
        let index = list.partition_point(|c| c.quality <= cluster.quality);
        list.insert(index, cluster);
        Ok((next, index))
    }
}

/// One ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub item_id: u64,
    /// Higher is a better match
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_score: Option<f32>,
}

impl QueryResult {
    pub fn new(item_id: u64, similarity: f32) -> Self {
        QueryResult {
            item_id,
            similarity,
            semantic_score: None,
            combined_score: None,
        }
    }

    /// Attach the decomposed scores from perceptual blending
    pub fn with_blend(mut self, semantic_score: f32, combined_score: f32) -> Self {
        self.semantic_score = Some(semantic_score);
        self.combined_score = Some(combined_score);
        self
    }

    /// Score used for final ranking: combined when blended, else similarity
    pub fn rank_score(&self) -> f32 {
        self.combined_score.unwrap_or(self.similarity)
    }
}
