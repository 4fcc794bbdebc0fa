//! Feature extraction: fixed-resolution pixel encodings of images, loaded
//! in parallel.

use std::path::Path;
use std::time::Instant;

use image::imageops::FilterType;
use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::fsops;

/// Number of images encoded per parallel work unit.
const CHUNK_SIZE: usize = 5;

/// Encodes one image: decode, resize exactly to `resolution` squared,
/// flatten to interleaved RGB intensities. The output length is always
/// `resolution * resolution * 3` regardless of the source dimensions.
pub fn encode_image(path: &Path, resolution: u32) -> Result<Array1<f32>> {
    let img = image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let resized = img.resize_exact(resolution, resolution, FilterType::Triangle);
    let pixels: Vec<f32> = resized.to_rgb8().into_raw().into_iter().map(f32::from).collect();
    Ok(Array1::from_vec(pixels))
}

/// Feature vectors paired with their labels. The pairing survives any
/// reordering, so parallel loaders may concatenate results in completion
/// order.
#[derive(Debug, Default)]
pub struct FeatureSet {
    pub vectors: Vec<Array1<f32>>,
    pub labels: Vec<String>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn push(&mut self, vector: Array1<f32>, label: String) {
        self.vectors.push(vector);
        self.labels.push(label);
    }

    pub fn extend(&mut self, other: FeatureSet) {
        self.vectors.extend(other.vectors);
        self.labels.extend(other.labels);
    }

    /// Stacks all vectors into one row-per-sample matrix, failing loudly if
    /// any vector length disagrees with the first.
    pub fn stack(&self) -> Result<Array2<f32>> {
        let Some(first) = self.vectors.first() else {
            return Err(PipelineError::EmptyDataset("feature set".into()));
        };
        let width = first.len();
        for vector in &self.vectors {
            if vector.len() != width {
                return Err(PipelineError::FeatureLengthMismatch {
                    expected: width,
                    actual: vector.len(),
                });
            }
        }
        let mut flat = Vec::with_capacity(self.vectors.len() * width);
        for vector in &self.vectors {
            flat.extend(vector.iter().copied());
        }
        Array2::from_shape_vec((self.vectors.len(), width), flat)
            .map_err(|e| PipelineError::Other(e.to_string()))
    }
}

/// Loads every regular file under `dir` as an image encoded at
/// `resolution`, labeled `label`. Files are encoded in parallel chunks;
/// a decode failure aborts the whole load.
pub fn load_labeled_dir(dir: &Path, label: &str, resolution: u32) -> Result<FeatureSet> {
    if !dir.exists() {
        return Err(PipelineError::NotFound(dir.to_path_buf()));
    }

    log::info!("importing images for label {label} from {}", dir.display());
    let start = Instant::now();

    let files = fsops::list_files(dir)?;
    let chunks: Vec<Vec<Array1<f32>>> = files
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| {
            chunk
                .iter()
                .map(|path| encode_image(path, resolution))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<_>>()?;

    let mut set = FeatureSet::new();
    for vector in chunks.into_iter().flatten() {
        set.push(vector, label.to_string());
    }

    log::info!(
        "imported {} images for label {label} in {:.2?}",
        set.len(),
        start.elapsed()
    );
    Ok(set)
}
