//! Serving: run every persisted per-category model over one image and
//! report a confidence score per category.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use ndarray::{Array1, Axis};

use crate::classifier::OTHER_LABEL;
use crate::error::{PipelineError, Result};
use crate::features::encode_image;
use crate::registry::ModelRegistry;

/// Per-category confidence scores for one image, each in [0, 1].
#[derive(Debug)]
pub struct Prediction {
    scores: BTreeMap<String, f32>,
}

impl Prediction {
    pub fn scores(&self) -> &BTreeMap<String, f32> {
        &self.scores
    }

    /// The highest-scoring category.
    pub fn best(&self) -> Option<(&str, f32)> {
        self.scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, score)| (name.as_str(), *score))
    }

    /// Only the categories whose score reaches `threshold`.
    pub fn confident(&self, threshold: f32) -> BTreeMap<String, f32> {
        self.scores
            .iter()
            .filter(|(_, score)| **score >= threshold)
            .map(|(name, score)| (name.clone(), *score))
            .collect()
    }
}

#[derive(Debug)]
pub struct ImagePredictor {
    registry: ModelRegistry,
}

impl ImagePredictor {
    pub fn new(registry: ModelRegistry) -> Result<Self> {
        if registry.is_empty() {
            return Err(PipelineError::EmptyDataset(format!(
                "model registry at {}",
                registry.models_dir().display()
            )));
        }
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Runs every registered model over the image at `path`. Each model's
    /// confidence is the probability it assigns to its own category (the
    /// non-"other" column). The image is encoded once per distinct
    /// resolution found in the registry.
    pub fn predict(&self, path: &Path) -> Result<Prediction> {
        let mut encoded: HashMap<u32, Array1<f32>> = HashMap::new();
        let mut scores = BTreeMap::new();

        for artifact in self.registry.models() {
            if !encoded.contains_key(&artifact.resolution) {
                encoded.insert(artifact.resolution, encode_image(path, artifact.resolution)?);
            }
            let vector = &encoded[&artifact.resolution];

            if artifact.classifier.n_features() != vector.len() {
                return Err(PipelineError::IncompatibleModel {
                    category: artifact.category.clone(),
                    resolution: artifact.resolution,
                    model_len: artifact.classifier.n_features(),
                    input_len: vector.len(),
                });
            }

            let proba = artifact
                .classifier
                .predict_proba(vector.view().insert_axis(Axis(0)))?;
            let own_idx = artifact
                .classifier
                .classes()
                .iter()
                .position(|class| class != OTHER_LABEL)
                .ok_or_else(|| {
                    PipelineError::Other(format!(
                        "model for '{}' has no non-{OTHER_LABEL} class",
                        artifact.category
                    ))
                })?;
            scores.insert(artifact.category.clone(), proba[[0, own_idx]]);
        }

        Ok(Prediction { scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_filters_below_threshold() {
        let prediction = Prediction {
            scores: BTreeMap::from([
                ("pizza".to_string(), 0.9_f32),
                ("tiramisu".to_string(), 0.2),
            ]),
        };
        let confident = prediction.confident(0.8);
        assert_eq!(confident.len(), 1);
        assert!(confident.contains_key("pizza"));
        assert_eq!(prediction.best(), Some(("pizza", 0.9)));
    }
}
