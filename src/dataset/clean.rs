//! Cleaning and dedup: turn the raw tree into a processed tree of uniform,
//! unique images.
//!
//! The steps are strictly ordered and each runs as a full pass over all
//! categories: copy, extension filter, rename, dedup/outlier removal.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PipelineConfig;
use crate::dataset::DatasetLayout;
use crate::error::{PipelineError, Result};
use crate::fsops;

/// Filenames flagged by the analysis pass, relative to the analyzed
/// directory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Files that are not usable images at all.
    pub invalid: Vec<String>,
    /// Near-duplicate or anomalous files to drop.
    pub outliers: Vec<String>,
}

impl AnalysisReport {
    pub fn flagged_count(&self) -> usize {
        self.invalid.len() + self.outliers.len()
    }
}

/// Duplicate/outlier detection over one directory of images.
pub trait DedupAnalyzer {
    fn analyze(&self, dir: &Path) -> Result<AnalysisReport>;
}

/// Default analyzer: flags files that fail image decoding as invalid and
/// exact byte-duplicates (beyond the first occurrence) as outliers.
pub struct ContentHashAnalyzer;

impl DedupAnalyzer for ContentHashAnalyzer {
    fn analyze(&self, dir: &Path) -> Result<AnalysisReport> {
        let mut files = fsops::list_files(dir)?;
        // Sort so the kept copy of a duplicate group is stable.
        files.sort();

        let probed: Vec<(String, bool, String)> = files
            .par_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .unwrap_or(OsStr::new(""))
                    .to_string_lossy()
                    .into_owned();
                let bytes = fs::read(path).map_err(|e| PipelineError::from_io(e, path))?;
                let decodable = image::load_from_memory(&bytes).is_ok();
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                let digest = format!("{:x}", hasher.finalize());
                Ok((name, decodable, digest))
            })
            .collect::<Result<_>>()?;

        let mut report = AnalysisReport::default();
        let mut seen = HashSet::new();
        for (name, decodable, digest) in probed {
            if !decodable {
                report.invalid.push(name);
                continue;
            }
            if !seen.insert(digest) {
                report.outliers.push(name);
            }
        }
        Ok(report)
    }
}

/// Runs the ordered cleaning passes over every category.
pub struct Cleaner<'a, A> {
    config: &'a PipelineConfig,
    layout: DatasetLayout,
    analyzer: &'a A,
}

impl<'a, A: DedupAnalyzer> Cleaner<'a, A> {
    pub fn new(config: &'a PipelineConfig, analyzer: &'a A) -> Self {
        Self {
            config,
            layout: DatasetLayout::new(config),
            analyzer,
        }
    }

    /// Step 1: recreate the processed tree from the raw tree. Destructive,
    /// not incremental.
    pub fn copy_raw(&self) -> Result<()> {
        fsops::reset_path(self.layout.processed_root())?;
        for name in self.config.category_names() {
            let target = self.layout.processed_dir(name);
            fsops::create_path(&target)?;
            fsops::copy_tree(&self.layout.raw_dir(name), &target)?;
        }
        Ok(())
    }

    /// Step 2: drop every processed file whose extension does not match the
    /// configured image extension.
    pub fn filter_extensions(&self) -> Result<()> {
        let expected = self.config.image_extension.as_str();
        for name in self.config.category_names() {
            log::info!("removing images with the wrong extension for {name}");
            let dir = self.layout.processed_dir(name);
            let wrong: Vec<_> = fsops::list_files(&dir)?
                .into_iter()
                .filter(|path| path.extension().and_then(OsStr::to_str) != Some(expected))
                .collect();
            let report = fsops::delete_files(wrong);
            if !report.all_ok() {
                log::warn!(
                    "{} wrong-extension files could not be removed for {name}",
                    report.failed.len()
                );
            }
        }
        Ok(())
    }

    /// Step 3: renumber every remaining file as `{category}_{index}.{ext}`,
    /// index starting at 0, in directory enumeration order.
    pub fn rename_files(&self) -> Result<()> {
        let ext = &self.config.image_extension;
        for name in self.config.category_names() {
            log::info!("renaming images for {name}");
            let dir = self.layout.processed_dir(name);
            let mut counter = 0usize;
            for file in fsops::list_files(&dir)? {
                let renamed = dir.join(format!("{name}_{counter}.{ext}"));
                fs::rename(&file, &renamed).map_err(|e| PipelineError::from_io(e, &file))?;
                counter += 1;
            }
            log::info!("renamed {counter} images for {name}");
        }
        Ok(())
    }

    /// Step 4: run the dedup analysis per category and delete every flagged
    /// file. Missing files are tolerated.
    pub fn remove_flagged(&self) -> Result<()> {
        for name in self.config.category_names() {
            log::info!("dedup analysis running for {name}");
            let dir = self.layout.processed_dir(name);
            let report = self.analyzer.analyze(&dir)?;

            if self.config.export_analysis {
                self.export_report(name, &report)?;
            }

            let flagged = report
                .invalid
                .iter()
                .chain(report.outliers.iter())
                .map(|file| dir.join(file))
                .collect::<Vec<_>>();
            let deletion = fsops::delete_files(flagged);
            log::info!(
                "removed {} of {} flagged images for {name} ({} invalid, {} outliers)",
                deletion.deleted,
                report.flagged_count(),
                report.invalid.len(),
                report.outliers.len()
            );
            if !deletion.all_ok() {
                log::warn!(
                    "{} flagged files could not be removed for {name}",
                    deletion.failed.len()
                );
            }
        }
        Ok(())
    }

    fn export_report(&self, category: &str, report: &AnalysisReport) -> Result<()> {
        let dir = self.layout.analysis_dir(category);
        fsops::create_path(&dir)?;
        let path = dir.join("report.json");
        fs::write(&path, serde_json::to_string_pretty(report)?)
            .map_err(|e| PipelineError::from_io(e, &path))?;
        Ok(())
    }

    /// Runs all four passes in order.
    pub fn clean_all(&self) -> Result<()> {
        self.copy_raw()?;
        self.filter_extensions()?;
        self.rename_files()?;
        self.remove_flagged()?;
        Ok(())
    }
}
