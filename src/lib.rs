//! An end-to-end pipeline for building a food-image classifier: acquire
//! candidate images from keyword search, clean and deduplicate them, split
//! into train/test, train one binary classifier per category, and serve
//! per-category confidence scores.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use palate::{
//!     ContentHashAnalyzer, ImagePredictor, ModelRegistry, PipelineConfig, Trainer,
//! };
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//!
//! // Curate: clean + dedup the raw images, then split train/test
//! palate::dataset::curate(&config, &ContentHashAnalyzer)?;
//!
//! // Train one model per category and persist the artifacts
//! let reports = Trainer::new(&config).train_all()?;
//! for report in &reports {
//!     println!("{}: {:.0}%", report.category, report.accuracy_percent());
//! }
//!
//! // Serve: per-category confidence scores for a new image
//! let registry = ModelRegistry::load(&config.data_dir.join("models"))?;
//! let prediction = ImagePredictor::new(registry)?.predict(Path::new("dish.jpg"))?;
//! for (category, score) in prediction.scores() {
//!     println!("{category}: {score:.2}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Stages
//!
//! Each stage consumes the previous stage's output on disk:
//!
//! 1. [`dataset::Acquisition`] fills `raw/{category}` from keyword search.
//! 2. [`dataset::Cleaner`] rebuilds `processed/{category}`: copy, drop
//!    wrong extensions, renumber, remove duplicates and outliers.
//! 3. [`dataset::Splitter`] partitions each category into `train`/`test`.
//! 4. [`classifier::Trainer`] fits and persists one one-vs-rest model per
//!    category and evaluates it on the held-out split.
//! 5. [`predictor::ImagePredictor`] runs every persisted model over an
//!    incoming image.

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod fsops;
pub mod predictor;
pub mod registry;

pub use classifier::{EvalReport, ModelArtifact, PrototypeClassifier, Trainer, OTHER_LABEL};
pub use config::{CategorySpec, GridSearchSpec, PipelineConfig, TrainParams};
pub use dataset::{
    Acquisition, AnalysisReport, Cleaner, ContentHashAnalyzer, DatasetLayout, DedupAnalyzer,
    HttpImageFetcher, ImageFetcher, Splitter,
};
pub use error::{PipelineError, Result};
pub use features::{encode_image, load_labeled_dir, FeatureSet};
pub use predictor::{ImagePredictor, Prediction};
pub use registry::ModelRegistry;

pub fn init_logger() {
    env_logger::init();
}
