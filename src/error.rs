use std::io;
use std::path::{Path, PathBuf};

/// Error type shared by every pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),
    #[error("path already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode image {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("insufficient data: {0} is empty")]
    EmptyDataset(String),
    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLengthMismatch { expected: usize, actual: usize },
    #[error(
        "model for '{category}' expects {model_len}-element features \
         but the image encoded at resolution {resolution} yields {input_len}"
    )]
    IncompatibleModel {
        category: String,
        resolution: u32,
        model_len: usize,
        input_len: usize,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Attaches the offending path to an I/O error, mapping the common
    /// kinds onto their typed variants.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_typed_variants() {
        let path = Path::new("/nonexistent/file");
        let err = PipelineError::from_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, PipelineError::NotFound(_)));

        let err = PipelineError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, PipelineError::PermissionDenied(_)));

        let err = PipelineError::from_io(io::Error::from(io::ErrorKind::TimedOut), path);
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
