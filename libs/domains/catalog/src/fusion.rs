use crate::error::{CatalogError, CatalogResult};
use crate::models::Embedding;

pub const DEFAULT_IMAGE_WEIGHT: f32 = 0.6;
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.4;

/// Relative contribution of each modality to a hybrid query vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub image: f32,
    pub text: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_WEIGHT,
            text: DEFAULT_TEXT_WEIGHT,
        }
    }
}

impl FusionWeights {
    pub fn new(image: f32, text: f32) -> Self {
        Self { image, text }
    }
}

/// Weighted sum of an image and a text embedding, L2-normalised.
///
/// A sum with zero norm is returned as-is (the zero vector).
pub fn fuse(image: &Embedding, text: &Embedding, weights: FusionWeights) -> CatalogResult<Embedding> {
    if image.dimension() != text.dimension() {
        return Err(CatalogError::InvalidEmbeddingDimension {
            expected: image.dimension(),
            actual: text.dimension(),
        });
    }

    let mut combined: Vec<f32> = image
        .values()
        .iter()
        .zip(text.values())
        .map(|(i, t)| weights.image * i + weights.text * t)
        .collect();

    let norm = combined.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        combined.iter_mut().for_each(|v| *v /= norm);
    }

    Ok(Embedding::new(combined))
}
