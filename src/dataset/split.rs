//! Train/test partitioning of the processed images.

use std::fs;

use rand::seq::SliceRandom;

use crate::config::PipelineConfig;
use crate::dataset::DatasetLayout;
use crate::error::{PipelineError, Result};
use crate::fsops;

/// Per-category outcome of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub training: usize,
    pub test: usize,
}

pub struct Splitter<'a> {
    config: &'a PipelineConfig,
    layout: DatasetLayout,
}

impl<'a> Splitter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            layout: DatasetLayout::new(config),
        }
    }

    pub fn split_all(&self) -> Result<()> {
        for name in self.config.category_names() {
            let summary = self.split_category(name)?;
            log::info!(
                "split {name}: {} training / {} test images",
                summary.training,
                summary.test
            );
        }
        Ok(())
    }

    /// Shuffles the category's processed images with a fresh unseeded
    /// permutation and moves them into the train/test subdirectories.
    ///
    /// Only files directly under the processed root are considered, so
    /// re-running after a split sees whatever is still unpartitioned,
    /// not the union of the previous train/test subsets.
    pub fn split_category(&self, category: &str) -> Result<SplitSummary> {
        let processed = self.layout.processed_dir(category);
        if !processed.exists() {
            return Err(PipelineError::NotFound(processed));
        }

        let train_dir = self.layout.train_dir(category);
        let test_dir = self.layout.test_dir(category);
        fsops::reset_path(&train_dir)?;
        fsops::reset_path(&test_dir)?;

        let mut files = fsops::list_files(&processed)?;
        files.shuffle(&mut rand::thread_rng());

        // Round half away from zero, so exact ties go to training.
        let take = (files.len() as f64 * self.config.split_ratio).round() as usize;

        for (i, file) in files.iter().enumerate() {
            let target_dir = if i < take { &train_dir } else { &test_dir };
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = target_dir.join(name);
            fs::rename(file, &target).map_err(|e| PipelineError::from_io(e, file))?;
        }

        Ok(SplitSummary {
            training: take,
            test: files.len() - take,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategorySpec;
    use std::collections::HashSet;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_with_processed(dir: &Path, count: usize) -> PipelineConfig {
        let config = PipelineConfig {
            data_dir: dir.to_path_buf(),
            categories: vec![CategorySpec::new("pizza", vec!["pizza"])],
            ..Default::default()
        };
        let processed = DatasetLayout::new(&config).processed_dir("pizza");
        fs::create_dir_all(&processed).unwrap();
        for i in 0..count {
            fs::write(processed.join(format!("pizza_{i}.jpg")), b"img").unwrap();
        }
        config
    }

    fn names_in(dir: &Path) -> HashSet<String> {
        fsops::list_files(dir)
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn twenty_images_at_ratio_095_split_19_to_1() {
        let dir = TempDir::new().unwrap();
        let config = config_with_processed(dir.path(), 20);
        let summary = Splitter::new(&config).split_category("pizza").unwrap();
        assert_eq!(summary, SplitSummary { training: 19, test: 1 });
    }

    #[test]
    fn split_is_disjoint_and_exhaustive() {
        let dir = TempDir::new().unwrap();
        let config = config_with_processed(dir.path(), 17);
        let layout = DatasetLayout::new(&config);

        let before = names_in(&layout.processed_dir("pizza"));
        Splitter::new(&config).split_category("pizza").unwrap();

        let train = names_in(&layout.train_dir("pizza"));
        let test = names_in(&layout.test_dir("pizza"));
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), before.len());
        let union: HashSet<_> = train.union(&test).cloned().collect();
        assert_eq!(union, before);

        // files were moved, not copied
        assert!(fsops::list_files(&layout.processed_dir("pizza")).unwrap().is_empty());
    }

    // Splitting again after a split reads the processed root only, which the
    // first split emptied. The second run therefore partitions nothing.
    #[test]
    fn resplit_sees_only_processed_root() {
        let dir = TempDir::new().unwrap();
        let config = config_with_processed(dir.path(), 10);
        let splitter = Splitter::new(&config);

        splitter.split_category("pizza").unwrap();
        let second = splitter.split_category("pizza").unwrap();
        assert_eq!(second, SplitSummary { training: 0, test: 0 });
    }

    #[test]
    fn missing_category_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            categories: vec![CategorySpec::new("pizza", vec!["pizza"])],
            ..Default::default()
        };
        let err = Splitter::new(&config).split_category("pizza").unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
