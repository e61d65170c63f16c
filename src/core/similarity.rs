// Distance and similarity functions for descriptors and embeddings

use crate::core::types::{Item, PerceptualDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest possible RGB Euclidean distance, sqrt(255^2 * 3)
pub const MAX_RGB_DISTANCE: f32 = 441.67;

/// Weight of the color term in the weighted perceptual distance
pub const COLOR_WEIGHT: f32 = 0.7;

/// Weight of the brightness term in the weighted perceptual distance
pub const BRIGHTNESS_WEIGHT: f32 = 0.3;

/// Compute cosine similarity between two vectors
/// Returns a value between -1 and 1, where 1 means identical direction.
/// Mismatched lengths, empty vectors, zero-norm vectors and non-finite
/// components give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot = dot_product(a, b);
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (mag_a * mag_b);
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Cosine similarity where either side may be missing (missing gives 0)
pub fn embedding_similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> f32 {
    match (a, b) {
        (Some(a), Some(b)) => cosine_similarity(a, b),
        _ => 0.0,
    }
}

/// Compute dot product between two vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute magnitude (L2 norm) of a vector
pub fn magnitude(vec: &[f32]) -> f32 {
    vec.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute Euclidean distance between two vectors
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Perceptual distance
// ============================================================================

/// How color and brightness differences combine into one distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceFormula {
    /// `0.7 * euclid(rgb / 255) + 0.3 * |brightness delta|`
    #[default]
    Weighted,
    /// `euclid(rgb) + |brightness delta|`, colors left in [0, 255]
    Raw,
}

/// Perceptual distance using the default weighted formula
pub fn perceptual_distance(a: &PerceptualDescriptor, b: &PerceptualDescriptor) -> f32 {
    perceptual_distance_with(a, b, DistanceFormula::Weighted)
}

/// Perceptual distance with an explicit formula
pub fn perceptual_distance_with(
    a: &PerceptualDescriptor,
    b: &PerceptualDescriptor,
    formula: DistanceFormula,
) -> f32 {
    let brightness_diff = brightness_distance(a.brightness, b.brightness);
    match formula {
        DistanceFormula::Weighted => {
            let ca = a.dominant_color.map(|c| c / 255.0);
            let cb = b.dominant_color.map(|c| c / 255.0);
            COLOR_WEIGHT * euclidean_distance(&ca, &cb) + BRIGHTNESS_WEIGHT * brightness_diff
        }
        DistanceFormula::Raw => {
            euclidean_distance(&a.dominant_color, &b.dominant_color) + brightness_diff
        }
    }
}

/// RGB distance scaled into [0, 1] by the largest possible distance
pub fn normalized_color_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    euclidean_distance(a, b) / MAX_RGB_DISTANCE
}

pub fn brightness_distance(a: f32, b: f32) -> f32 {
    (a - b).abs()
}

/// Mean distance over every unordered pair; 0 for fewer than two members
pub fn mean_pairwise_distance(
    descriptors: &[&PerceptualDescriptor],
    formula: DistanceFormula,
) -> f32 {
    let mut total = 0.0f32;
    let mut pairs = 0usize;
    for i in 0..descriptors.len() {
        for j in (i + 1)..descriptors.len() {
            total += perceptual_distance_with(descriptors[i], descriptors[j], formula);
            pairs += 1;
        }
    }

    if pairs == 0 {
        0.0
    } else {
        total / pairs as f32
    }
}

// ============================================================================
// Embedding aggregation
// ============================================================================

/// Component-wise mean of embeddings (e.g. one per sampled frame).
///
/// Frames whose length differs from the first are ignored.
pub fn average_embeddings(frames: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = frames.first()?.len();
    if dim == 0 {
        return None;
    }

    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for frame in frames.iter().filter(|f| f.len() == dim) {
        for (acc, v) in sum.iter_mut().zip(frame.iter()) {
            *acc += v;
        }
        count += 1;
    }

    let n = count as f32;
    Some(sum.into_iter().map(|v| v / n).collect())
}

/// Share of frames that must show a person before the item counts as human
pub const HUMAN_FRAME_RATIO: f32 = 0.4;

/// Whether more than `ratio` of the sampled frames contain a person
pub fn human_from_frames(frames: &[bool], ratio: f32) -> bool {
    if frames.is_empty() {
        return false;
    }
    let hits = frames.iter().filter(|&&h| h).count();
    hits as f32 / frames.len() as f32 > ratio
}

// ============================================================================
// Catalog validation
// ============================================================================

/// Outcome of checking a catalog for data problems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub count: usize,
    pub dimension: Option<usize>,
    pub issues: Vec<String>,
}

/// Validate a catalog for consistency.
///
/// The algorithms never depend on this passing; offending items are
/// excluded locally. This exists so callers can surface data problems.
pub fn validate_catalog(items: &[Item], expected_dim: Option<usize>) -> ValidationResult {
    let mut issues = Vec::new();

    if items.is_empty() {
        return ValidationResult {
            valid: false,
            count: 0,
            dimension: None,
            issues: vec!["Catalog is empty".to_string()],
        };
    }

    let dimension = expected_dim.or_else(|| {
        items
            .iter()
            .find_map(|item| item.embedding.as_ref().map(|e| e.len()))
    });

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            issues.push(format!("Item {} appears more than once", item.id));
        }

        if let Some(embedding) = &item.embedding {
            if let Some(expected) = dimension {
                if embedding.len() != expected {
                    issues.push(format!(
                        "Item {} embedding has dimension {} (expected {})",
                        item.id,
                        embedding.len(),
                        expected
                    ));
                }
            }
            if let Some(j) = embedding.iter().position(|v| !v.is_finite()) {
                issues.push(format!("Item {} embedding[{}] is not finite", item.id, j));
            }
        }

        if let Some(d) = &item.descriptor {
            if !(0.0..=1.0).contains(&d.brightness) {
                issues.push(format!(
                    "Item {} brightness {} is outside [0, 1]",
                    item.id, d.brightness
                ));
            }
            if d.dominant_color.iter().any(|c| !(0.0..=255.0).contains(c)) {
                issues.push(format!(
                    "Item {} dominant color {:?} is outside [0, 255]",
                    item.id, d.dominant_color
                ));
            }
        }
    }

    ValidationResult {
        valid: issues.is_empty(),
        count: items.len(),
        dimension,
        issues,
    }
}
