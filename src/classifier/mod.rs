//! One-vs-rest classifier training and the classification primitive.

mod model;
mod trainer;
mod utils;

pub use model::PrototypeClassifier;
pub use trainer::{EvalReport, ModelArtifact, Trainer, OTHER_LABEL};
