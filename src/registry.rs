//! Serving-side model registry: the set of persisted per-category
//! artifacts, enumerated from the models directory at load time.
//! Filesystem presence is the only metadata.

use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ModelArtifact;
use crate::error::{PipelineError, Result};

/// Suffix every persisted artifact filename carries.
pub const MODEL_SUFFIX: &str = "_model.json";

/// Artifact path for a category within a models directory.
pub fn artifact_path(models_dir: &Path, category: &str) -> PathBuf {
    models_dir.join(format!("{category}{MODEL_SUFFIX}"))
}

#[derive(Debug)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    artifacts: Vec<ModelArtifact>,
}

impl ModelRegistry {
    /// Loads every artifact found in `models_dir`. Files without the
    /// artifact suffix are ignored.
    pub fn load(models_dir: &Path) -> Result<Self> {
        if !models_dir.exists() {
            return Err(PipelineError::NotFound(models_dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(models_dir)
            .map_err(|e| PipelineError::from_io(e, models_dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MODEL_SUFFIX))
            })
            .collect();
        paths.sort();

        let mut artifacts = Vec::with_capacity(paths.len());
        for path in paths {
            let artifact = ModelArtifact::load(&path)?;
            log::info!(
                "loaded model for '{}' (resolution {})",
                artifact.category,
                artifact.resolution
            );
            artifacts.push(artifact);
        }

        Ok(Self {
            models_dir: models_dir.to_path_buf(),
            artifacts,
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn models(&self) -> &[ModelArtifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
