//! Filesystem contracts the pipeline stages rely on.
//!
//! Every helper returns a typed result; per-file failures in bulk
//! operations are accumulated rather than aborting the whole pass.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Creates a directory path if it does not exist.
pub fn create_path(path: &Path) -> Result<()> {
    if path.exists() {
        log::debug!("path {} already exists", path.display());
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PipelineError::from_io(e, path))?;
    log::debug!("created {}", path.display());
    Ok(())
}

/// Deletes a directory tree (if present) and recreates it empty.
pub fn reset_path(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| PipelineError::from_io(e, path))?;
        log::debug!("deleted {}", path.display());
    }
    fs::create_dir_all(path).map_err(|e| PipelineError::from_io(e, path))?;
    Ok(())
}

/// Recursively copies `src` into `dst`, returning the number of files
/// copied. Directory structure is recreated; existing files in `dst` are
/// overwritten.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    if !src.exists() {
        return Err(PipelineError::NotFound(src.to_path_buf()));
    }
    fs::create_dir_all(dst).map_err(|e| PipelineError::from_io(e, dst))?;

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| PipelineError::Other(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::Other(e.to_string()))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| PipelineError::from_io(e, &target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PipelineError::from_io(e, &target))?;
            copied += 1;
        }
    }
    log::info!("copied {copied} files from {} to {}", src.display(), dst.display());
    Ok(copied)
}

/// Outcome of a bulk delete. The operation never halts on the first
/// failure; callers inspect `all_ok` for the overall success indicator.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub deleted: usize,
    pub missing: usize,
    pub failed: Vec<PathBuf>,
}

impl DeleteReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes each named file, tolerating already-missing entries.
pub fn delete_files<I>(files: I) -> DeleteReport
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut report = DeleteReport::default();
    for file in files {
        if !file.exists() {
            log::debug!("file {} does not exist", file.display());
            report.missing += 1;
            continue;
        }
        match fs::remove_file(&file) {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                log::warn!("unable to delete {}: {e}", file.display());
                report.failed.push(file);
            }
        }
    }
    report
}

/// Lists the regular files directly under `dir`, skipping subdirectories.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::from_io(e, dir))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::from_io(e, dir))?;
        if entry.file_type().map_err(PipelineError::Io)?.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_path_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c");
        assert!(create_path(&path).is_ok());
        assert!(create_path(&path).is_ok());
        assert!(path.is_dir());
    }

    #[test]
    fn reset_path_empties_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stage");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("leftover.txt"), b"x").unwrap();

        reset_path(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(list_files(&path).unwrap().len(), 0);
    }

    #[test]
    fn copy_tree_recurses_and_counts() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("one.jpg"), b"1").unwrap();
        fs::write(src.join("nested/two.jpg"), b"2").unwrap();

        let dst = dir.path().join("dst");
        let copied = copy_tree(&src, &dst).unwrap();
        assert_eq!(copied, 2);
        assert!(dst.join("one.jpg").is_file());
        assert!(dst.join("nested/two.jpg").is_file());
    }

    #[test]
    fn copy_tree_missing_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = copy_tree(&dir.path().join("absent"), &dir.path().join("dst")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn delete_files_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("here.jpg");
        fs::write(&present, b"x").unwrap();
        let absent = dir.path().join("gone.jpg");

        let report = delete_files(vec![present.clone(), absent]);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.missing, 1);
        assert!(report.all_ok());
        assert!(!present.exists());
    }

    #[test]
    fn list_files_skips_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join("train")).unwrap();
        fs::write(dir.path().join("train/b.jpg"), b"x").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }
}
