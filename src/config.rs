use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A classification label together with the search-keyword variants used to
/// acquire candidate images for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    /// The unique name of the category, also used as the class label.
    pub name: String,
    /// Ordered search-keyword variants. More variants mean more candidate
    /// images and organic retry coverage for failed fetches.
    pub keywords: Vec<String>,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, keywords: Vec<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Hyperparameters for the classifier primitive. These are the statically
/// configured values every final fit uses; grid-search results are reported
/// but never applied automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainParams {
    /// Regularization strength. Larger values regularize less.
    pub c: f32,
    /// Score scaling used when calibrating probabilities.
    pub gamma: f32,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self { c: 2.0, gamma: 4.0 }
    }
}

/// Cartesian hyperparameter grid evaluated by the optional search pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchSpec {
    pub c: Vec<f32>,
    pub gamma: Vec<f32>,
}

impl Default for GridSearchSpec {
    fn default() -> Self {
        Self {
            c: vec![0.5, 1.0, 2.0, 4.0, 8.0],
            gamma: vec![1.0, 2.0, 4.0, 8.0],
        }
    }
}

/// Pipeline-wide configuration, constructed once at process start and passed
/// by reference into every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the dataset tree.
    pub data_dir: PathBuf,
    pub raw_subdir: String,
    pub processed_subdir: String,
    pub analysis_subdir: String,
    pub models_subdir: String,
    pub train_subdir: String,
    pub test_subdir: String,
    pub categories: Vec<CategorySpec>,
    /// Target number of raw images per category; acquisition skips a
    /// category that already holds at least this many.
    pub images_per_category: usize,
    /// Expected image file extension; everything else is dropped by the
    /// cleaning stage.
    pub image_extension: String,
    /// Fraction of processed images assigned to the training split.
    pub split_ratio: f64,
    /// Maximum number of simultaneous fetch operations.
    pub fetch_concurrency: usize,
    /// Square resize resolution used for feature encoding. Models remember
    /// the resolution they were trained at; serving must match it.
    pub feature_resolution: u32,
    pub train: TrainParams,
    /// When set, a hyperparameter search runs before each category's final
    /// fit and reports (but does not apply) the best combination.
    pub grid_search: Option<GridSearchSpec>,
    /// Minimum confidence for a prediction to be considered trustworthy.
    pub confidence_threshold: f32,
    /// When set, the dedup analyzer writes its per-category report into the
    /// analysis directory.
    pub export_analysis: bool,
    /// Endpoint queried for candidate image URLs. Required by the `fetch`
    /// stage of the binary; library users may plug in their own fetcher.
    pub search_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            raw_subdir: "raw".into(),
            processed_subdir: "processed".into(),
            analysis_subdir: "analysis".into(),
            models_subdir: "models".into(),
            train_subdir: "train".into(),
            test_subdir: "test".into(),
            categories: builtin_categories(),
            images_per_category: 1500,
            image_extension: "jpg".into(),
            split_ratio: 0.95,
            fetch_concurrency: 5,
            feature_resolution: 50,
            train: TrainParams::default(),
            grid_search: None,
            confidence_threshold: 0.8,
            export_analysis: true,
            search_endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::from_io(e, path))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one category is required".into(),
            ));
        }
        for category in &self.categories {
            if category.keywords.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "category '{}' has no search keywords",
                    category.name
                )));
            }
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "split_ratio must be within (0, 1), got {}",
                self.split_ratio
            )));
        }
        if self.feature_resolution == 0 {
            return Err(PipelineError::InvalidConfig(
                "feature_resolution must be non-zero".into(),
            ));
        }
        if self.images_per_category == 0 {
            return Err(PipelineError::InvalidConfig(
                "images_per_category must be non-zero".into(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "fetch_concurrency must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }
}

/// Returns the default dataset directory path.
pub fn default_data_dir() -> PathBuf {
    // 1. Check environment variable
    if let Ok(path) = env::var("PALATE_DATA") {
        return PathBuf::from(path);
    }

    // 2. Use platform-specific data directory
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("palate");
    }

    // 3. If all else fails, use system temp directory (platform agnostic)
    env::temp_dir().join("palate")
}

/// The built-in category table the project started from: three food types
/// with a handful of keyword variants each.
fn builtin_categories() -> Vec<CategorySpec> {
    vec![
        CategorySpec::new(
            "macarrones",
            vec![
                "macarrones",
                "macarrones con queso",
                "macarrones con tomate",
                "macarrones al pesto",
                "macaroni",
                "macaroni and cheese",
            ],
        ),
        CategorySpec::new(
            "pizza",
            vec![
                "pizza",
                "pizza margarita",
                "pizza cuatro quesos",
                "pizza barbacoa",
                "pizza napolitana",
                "pizza vegetariana",
            ],
        ),
        CategorySpec::new(
            "tiramisu",
            vec![
                "tiramisu",
                "tiramisu casero",
                "tiramisu italiano",
                "tiramisu de chocolate",
                "tarta de tiramisu",
                "tiramisu mascarpone",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.categories.len(), 3);
        assert_eq!(config.feature_resolution, 50);
    }

    #[test]
    fn empty_categories_rejected() {
        let config = PipelineConfig {
            categories: vec![],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_ratio_rejected() {
        let config = PipelineConfig {
            split_ratio: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            split_ratio: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn keywordless_category_rejected() {
        let config = PipelineConfig {
            categories: vec![CategorySpec::new("empty", Vec::<String>::new())],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn data_dir_env_override() {
        env::set_var("PALATE_DATA", "/tmp/palate-test-data");
        let path = default_data_dir();
        assert_eq!(path, PathBuf::from("/tmp/palate-test-data"));
        env::remove_var("PALATE_DATA");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.categories.len(), config.categories.len());
        assert_eq!(parsed.split_ratio, config.split_ratio);
    }
}
