//! Per-category one-vs-rest training: every category gets its own binary
//! classifier separating it from the pooled images of all other
//! categories.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use ndarray::Axis;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::model::PrototypeClassifier;
use crate::config::{GridSearchSpec, PipelineConfig, TrainParams};
use crate::dataset::DatasetLayout;
use crate::error::{PipelineError, Result};
use crate::features::{load_labeled_dir, FeatureSet};
use crate::fsops;
use crate::registry;

/// Label assigned to every pooled negative sample.
pub const OTHER_LABEL: &str = "other";

/// A persisted classifier plus the encoding parameters it was trained
/// with. Written once; retraining produces a new artifact.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub category: String,
    /// Square resize resolution used for every training feature. Serving
    /// must encode at this exact resolution.
    pub resolution: u32,
    pub classifier: PrototypeClassifier,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<()> {
        log::info!("saving the model to {}", path.display());
        fs::write(path, serde_json::to_string(self)?)
            .map_err(|e| PipelineError::from_io(e, path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::from_io(e, path))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Feature length implied by the stored resolution.
    pub fn expected_len(&self) -> usize {
        (self.resolution * self.resolution * 3) as usize
    }
}

/// Held-out evaluation outcome for one category's model.
#[derive(Debug)]
pub struct EvalReport {
    pub category: String,
    pub total: usize,
    pub correct: usize,
    /// Predicted-label counts over the test set.
    pub histogram: BTreeMap<String, usize>,
}

impl EvalReport {
    pub fn accuracy_percent(&self) -> f64 {
        self.correct as f64 / self.total as f64 * 100.0
    }
}

pub struct Trainer<'a> {
    config: &'a PipelineConfig,
    layout: DatasetLayout,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            layout: DatasetLayout::new(config),
        }
    }

    /// Trains, persists, and evaluates one model per category. The models
    /// directory is reset once up front, so a full run always starts from
    /// a clean registry.
    pub fn train_all(&self) -> Result<Vec<EvalReport>> {
        fsops::reset_path(self.layout.models_dir())?;
        let mut reports = Vec::with_capacity(self.config.categories.len());
        for name in self.config.category_names() {
            reports.push(self.train_category(name)?);
        }
        Ok(reports)
    }

    /// Trains a single category without touching sibling artifacts.
    pub fn train_category(&self, category: &str) -> Result<EvalReport> {
        let set = self.load_training_set(category)?;

        if let Some(grid) = &self.config.grid_search {
            self.grid_search(category, grid, &set)?;
        }

        log::info!("running training algorithm for {category}");
        let start = Instant::now();
        let features = set.stack()?;
        let classifier = PrototypeClassifier::fit(&features, &set.labels, self.config.train)?;
        log::info!("training for {category} finished in {:.2?}", start.elapsed());

        let artifact = ModelArtifact {
            category: category.to_string(),
            resolution: self.config.feature_resolution,
            classifier,
        };
        fsops::create_path(self.layout.models_dir())?;
        artifact.save(&registry::artifact_path(self.layout.models_dir(), category))?;

        self.evaluate(&artifact)
    }

    /// The category's own training split labeled with its name, plus every
    /// other category's training split relabeled as the pooled negative
    /// class.
    fn load_training_set(&self, category: &str) -> Result<FeatureSet> {
        let resolution = self.config.feature_resolution;
        let mut set = load_labeled_dir(&self.layout.train_dir(category), category, resolution)?;
        for other in self.config.category_names().filter(|n| *n != category) {
            set.extend(load_labeled_dir(
                &self.layout.train_dir(other),
                OTHER_LABEL,
                resolution,
            )?);
        }
        Ok(set)
    }

    /// Evaluates each hyperparameter combination on an internal holdout of
    /// the pooled training data, in parallel. The best combination is
    /// reported through the log and returned, but never applied to the
    /// final fit; updating the configuration is a manual step.
    fn grid_search(
        &self,
        category: &str,
        grid: &GridSearchSpec,
        set: &FeatureSet,
    ) -> Result<TrainParams> {
        if set.len() < 5 {
            return Err(PipelineError::EmptyDataset(format!(
                "grid-search holdout for category {category}"
            )));
        }

        let mut indices: Vec<usize> = (0..set.len()).collect();
        indices.shuffle(&mut rand::thread_rng());
        let eval_len = (set.len() / 5).max(1);
        let (eval_idx, fit_idx) = indices.split_at(eval_len);

        let subset = |idx: &[usize]| {
            let mut fold = FeatureSet::new();
            for &i in idx {
                fold.push(set.vectors[i].clone(), set.labels[i].clone());
            }
            fold
        };
        let fit_fold = subset(fit_idx);
        let eval_fold = subset(eval_idx);
        let fit_matrix = fit_fold.stack()?;
        let eval_matrix = eval_fold.stack()?;

        let combos: Vec<TrainParams> = grid
            .c
            .iter()
            .flat_map(|&c| grid.gamma.iter().map(move |&gamma| TrainParams { c, gamma }))
            .collect();

        log::info!(
            "grid search for {category}: {} combinations over {} fit / {} eval samples",
            combos.len(),
            fit_fold.len(),
            eval_fold.len()
        );

        let scored: Vec<(TrainParams, f64)> = combos
            .par_iter()
            .map(|&params| {
                let model = PrototypeClassifier::fit(&fit_matrix, &fit_fold.labels, params)?;
                let predicted = model.predict(eval_matrix.view())?;
                let correct = predicted
                    .iter()
                    .zip(&eval_fold.labels)
                    .filter(|(a, b)| a == b)
                    .count();
                Ok((params, correct as f64 / eval_fold.len() as f64))
            })
            .collect::<Result<_>>()?;

        let best = scored
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(params, score)| {
                log::info!(
                    "best parameters for {category}: c={} gamma={} (holdout accuracy {:.1}%); \
                     update the configuration to apply them",
                    params.c,
                    params.gamma,
                    score * 100.0
                );
                params
            })
            .unwrap_or(self.config.train);
        Ok(best)
    }

    /// Point-wise prediction over the category's held-out test split.
    fn evaluate(&self, artifact: &ModelArtifact) -> Result<EvalReport> {
        let category = artifact.category.as_str();
        log::info!("starting model tests for {category}");

        let test = load_labeled_dir(
            &self.layout.test_dir(category),
            category,
            artifact.resolution,
        )?;
        if test.is_empty() {
            return Err(PipelineError::EmptyDataset(format!(
                "test set for category {category}"
            )));
        }

        let matrix = test.stack()?;
        let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
        let mut correct = 0;
        for (row, expected) in matrix.axis_iter(Axis(0)).zip(&test.labels) {
            let predicted = artifact
                .classifier
                .predict(row.insert_axis(Axis(0)))?
                .remove(0);
            if predicted == *expected {
                correct += 1;
            }
            *histogram.entry(predicted).or_insert(0) += 1;
        }

        let report = EvalReport {
            category: category.to_string(),
            total: test.len(),
            correct,
            histogram,
        };
        log::info!(
            "correct predictions for {category}: {:.0}%",
            report.accuracy_percent()
        );
        log::info!("prediction results for {category}: {:?}", report.histogram);
        Ok(report)
    }
}
