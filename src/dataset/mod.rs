//! Dataset curation stages: acquisition, cleaning, splitting.

use std::path::{Path, PathBuf};

pub mod acquire;
pub mod clean;
pub mod split;

pub use acquire::{Acquisition, HttpImageFetcher, ImageFetcher};
pub use clean::{AnalysisReport, Cleaner, ContentHashAnalyzer, DedupAnalyzer};
pub use split::{SplitSummary, Splitter};

use crate::config::PipelineConfig;
use crate::error::Result;

/// Owns the directory scheme of the dataset tree. Every stage resolves its
/// paths through this type so the layout contract lives in one place.
///
/// ```text
/// data/
///   raw/{category}/*
///   processed/{category}/*
///   processed/{category}/train/*
///   processed/{category}/test/*
///   analysis/{category}/*
///   models/{category}_model.json
/// ```
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    raw: PathBuf,
    processed: PathBuf,
    analysis: PathBuf,
    models: PathBuf,
    train_subdir: String,
    test_subdir: String,
}

impl DatasetLayout {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            raw: config.data_dir.join(&config.raw_subdir),
            processed: config.data_dir.join(&config.processed_subdir),
            analysis: config.data_dir.join(&config.analysis_subdir),
            models: config.data_dir.join(&config.models_subdir),
            train_subdir: config.train_subdir.clone(),
            test_subdir: config.test_subdir.clone(),
        }
    }

    pub fn raw_root(&self) -> &Path {
        &self.raw
    }

    pub fn processed_root(&self) -> &Path {
        &self.processed
    }

    pub fn models_dir(&self) -> &Path {
        &self.models
    }

    pub fn raw_dir(&self, category: &str) -> PathBuf {
        self.raw.join(category)
    }

    pub fn processed_dir(&self, category: &str) -> PathBuf {
        self.processed.join(category)
    }

    pub fn analysis_dir(&self, category: &str) -> PathBuf {
        self.analysis.join(category)
    }

    pub fn train_dir(&self, category: &str) -> PathBuf {
        self.processed.join(category).join(&self.train_subdir)
    }

    pub fn test_dir(&self, category: &str) -> PathBuf {
        self.processed.join(category).join(&self.test_subdir)
    }
}

/// Runs the combined curation variant: the full cleaning pipeline followed
/// by the train/test split.
pub fn curate<A: DedupAnalyzer>(config: &PipelineConfig, analyzer: &A) -> Result<()> {
    Cleaner::new(config, analyzer).clean_all()?;
    Splitter::new(config).split_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scopes_stages_per_category() {
        let config = PipelineConfig {
            data_dir: "/data".into(),
            ..Default::default()
        };
        let layout = DatasetLayout::new(&config);
        assert_eq!(layout.raw_dir("pizza"), PathBuf::from("/data/raw/pizza"));
        assert_eq!(
            layout.train_dir("pizza"),
            PathBuf::from("/data/processed/pizza/train")
        );
        assert_eq!(
            layout.test_dir("pizza"),
            PathBuf::from("/data/processed/pizza/test")
        );
        assert_eq!(layout.models_dir(), Path::new("/data/models"));
    }
}
