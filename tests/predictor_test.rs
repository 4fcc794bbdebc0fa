//! Serving-side coverage: registry loading and prediction contracts.

use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::Array2;
use tempfile::TempDir;

use palate::{
    registry::artifact_path, ImagePredictor, ModelArtifact, ModelRegistry, PipelineError,
    PrototypeClassifier, TrainParams, OTHER_LABEL,
};

/// A tiny binary model over `width`-element features.
fn toy_artifact(category: &str, resolution: u32, width: usize) -> ModelArtifact {
    let mut features = Array2::<f32>::zeros((2, width));
    features[[0, 0]] = 1.0;
    features[[1, width - 1]] = 1.0;
    let labels = vec![category.to_string(), OTHER_LABEL.to_string()];
    ModelArtifact {
        category: category.to_string(),
        resolution,
        classifier: PrototypeClassifier::fit(&features, &labels, TrainParams::default()).unwrap(),
    }
}

fn write_artifact(dir: &Path, artifact: &ModelArtifact) {
    artifact.save(&artifact_path(dir, &artifact.category)).unwrap();
}

#[test]
fn serving_encodes_to_the_model_resolution() {
    let dir = TempDir::new().unwrap();
    let resolution = 50u32;
    let width = (resolution * resolution * 3) as usize;
    write_artifact(dir.path(), &toy_artifact("pizza", resolution, width));

    // arbitrary source dimensions; the encoding is always 50*50*3
    let sample = dir.path().join("sample.png");
    RgbImage::from_pixel(123, 45, Rgb([250, 10, 10])).save(&sample).unwrap();

    let registry = ModelRegistry::load(dir.path()).unwrap();
    let prediction = ImagePredictor::new(registry).unwrap().predict(&sample).unwrap();

    let score = prediction.scores()["pizza"];
    assert!((0.0..=1.0).contains(&score));
}

#[test]
fn resolution_mismatch_is_an_incompatible_model_error() {
    let dir = TempDir::new().unwrap();
    // claims resolution 50 but was fitted over 10x10x3 features
    write_artifact(dir.path(), &toy_artifact("pizza", 50, 300));

    let sample = dir.path().join("sample.png");
    RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])).save(&sample).unwrap();

    let registry = ModelRegistry::load(dir.path()).unwrap();
    let err = ImagePredictor::new(registry).unwrap().predict(&sample).unwrap_err();
    match err {
        PipelineError::IncompatibleModel {
            category,
            resolution,
            model_len,
            input_len,
        } => {
            assert_eq!(category, "pizza");
            assert_eq!(resolution, 50);
            assert_eq!(model_len, 300);
            assert_eq!(input_len, 7500);
        }
        other => panic!("expected IncompatibleModel, got {other:?}"),
    }
}

#[test]
fn every_registered_category_is_scored() {
    let dir = TempDir::new().unwrap();
    let width = 12 * 12 * 3;
    for category in ["macarrones", "pizza", "tiramisu"] {
        write_artifact(dir.path(), &toy_artifact(category, 12, width));
    }

    let sample = dir.path().join("sample.png");
    RgbImage::from_pixel(20, 20, Rgb([128, 128, 128])).save(&sample).unwrap();

    let registry = ModelRegistry::load(dir.path()).unwrap();
    let prediction = ImagePredictor::new(registry).unwrap().predict(&sample).unwrap();
    assert_eq!(prediction.scores().len(), 3);
}

#[test]
fn empty_registry_is_rejected() {
    let dir = TempDir::new().unwrap();
    let registry = ModelRegistry::load(dir.path()).unwrap();
    let err = ImagePredictor::new(registry).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset(_)));
}
