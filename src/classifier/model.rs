//! The probabilistic classification primitive behind the training and
//! serving stages.
//!
//! `PrototypeClassifier` learns one prototype per class: the mean of the
//! class's L2-normalized feature vectors, shrunk toward the global mean by
//! the regularization parameter `c` and renormalized. Prediction scores an
//! input by cosine similarity against every prototype and calibrates the
//! scores into probabilities with a `gamma`-scaled softmax.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::utils::{normalize_vector, softmax};
use crate::config::TrainParams;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeClassifier {
    classes: Vec<String>,
    /// One row per class, aligned with `classes`.
    prototypes: Array2<f32>,
    gamma: f32,
}

impl PrototypeClassifier {
    /// Fits one prototype per distinct label. Labels pair positionally with
    /// the feature matrix rows.
    pub fn fit(features: &Array2<f32>, labels: &[String], params: TrainParams) -> Result<Self> {
        if features.nrows() == 0 {
            return Err(PipelineError::EmptyDataset("training matrix".into()));
        }
        if features.nrows() != labels.len() {
            return Err(PipelineError::Other(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        // Classes in sorted order; probability columns align with this.
        let mut sums: BTreeMap<&str, (Array1<f32>, usize)> = BTreeMap::new();
        let width = features.ncols();
        let mut global = Array1::<f32>::zeros(width);

        for (row, label) in features.axis_iter(Axis(0)).zip(labels) {
            let normalized = normalize_vector(row);
            global += &normalized;
            let entry = sums
                .entry(label.as_str())
                .or_insert_with(|| (Array1::zeros(width), 0));
            entry.0 += &normalized;
            entry.1 += 1;
        }
        global /= features.nrows() as f32;

        // Larger c regularizes less.
        let shrink = 1.0 / (1.0 + params.c);

        let classes: Vec<String> = sums.keys().map(|s| s.to_string()).collect();
        let mut prototypes = Array2::<f32>::zeros((classes.len(), width));
        for (i, (_, (sum, count))) in sums.iter().enumerate() {
            let mean = sum / *count as f32;
            let shrunk = &mean * (1.0 - shrink) + &global * shrink;
            prototypes.row_mut(i).assign(&normalize_vector(shrunk.view()));
        }

        Ok(Self {
            classes,
            prototypes,
            gamma: params.gamma,
        })
    }

    /// Ordered class labels; probability columns align with this list.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Feature width the model was trained at.
    pub fn n_features(&self) -> usize {
        self.prototypes.ncols()
    }

    /// Per-class probability rows for each input row. Rows sum to 1.
    pub fn predict_proba(&self, features: ArrayView2<f32>) -> Result<Array2<f32>> {
        if features.ncols() != self.n_features() {
            return Err(PipelineError::FeatureLengthMismatch {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }

        let mut proba = Array2::<f32>::zeros((features.nrows(), self.classes.len()));
        for (i, row) in features.axis_iter(Axis(0)).enumerate() {
            let normalized = normalize_vector(row);
            let scores: Vec<f32> = self
                .prototypes
                .axis_iter(Axis(0))
                .map(|prototype| prototype.dot(&normalized) * self.gamma)
                .collect();
            for (j, p) in softmax(&scores).into_iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    /// The most probable class label for each input row.
    pub fn predict(&self, features: ArrayView2<f32>) -> Result<Vec<String>> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                self.classes[best].clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_fit() -> PrototypeClassifier {
        let features = array![
            [1.0_f32, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.0, 0.0, 1.0],
            [0.1, 0.0, 0.9],
        ];
        let labels: Vec<String> =
            vec!["pizza".into(), "pizza".into(), "other".into(), "other".into()];
        PrototypeClassifier::fit(&features, &labels, TrainParams::default()).unwrap()
    }

    #[test]
    fn classes_are_sorted_and_complete() {
        let model = toy_fit();
        assert_eq!(model.classes(), ["other", "pizza"]);
    }

    #[test]
    fn probabilities_sum_to_one_and_favor_own_class() {
        let model = toy_fit();
        let proba = model
            .predict_proba(array![[1.0_f32, 0.0, 0.0]].view())
            .unwrap();
        let sum: f32 = proba.row(0).iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        let pizza_idx = model.classes().iter().position(|c| c == "pizza").unwrap();
        assert!(proba[[0, pizza_idx]] > 0.5);
    }

    #[test]
    fn predict_labels_match_training_structure() {
        let model = toy_fit();
        let labels = model
            .predict(array![[0.95_f32, 0.05, 0.0], [0.0, 0.05, 0.95]].view())
            .unwrap();
        assert_eq!(labels, vec!["pizza".to_string(), "other".to_string()]);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let model = toy_fit();
        let err = model
            .predict_proba(array![[1.0_f32, 0.0]].view())
            .unwrap_err();
        assert!(matches!(err, PipelineError::FeatureLengthMismatch { .. }));
    }

    #[test]
    fn empty_training_matrix_is_rejected() {
        let features = Array2::<f32>::zeros((0, 3));
        let err = PrototypeClassifier::fit(&features, &[], TrainParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset(_)));
    }

    #[test]
    fn model_round_trips_through_serde() {
        let model = toy_fit();
        let json = serde_json::to_string(&model).unwrap();
        let restored: PrototypeClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.classes(), model.classes());
        assert_eq!(restored.n_features(), model.n_features());
    }
}
