//! Image acquisition: fill each category's raw directory with candidate
//! images fetched by keyword.
//!
//! The search transport itself is pluggable via [`ImageFetcher`]; the
//! orchestrator only cares that files appear in the output directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{CategorySpec, PipelineConfig};
use crate::dataset::DatasetLayout;
use crate::error::{PipelineError, Result};
use crate::fsops;

/// A keyword-driven image source: writes up to `max_count` images for
/// `keyword` into `out_dir` and returns how many it wrote.
pub trait ImageFetcher: Send + Sync {
    fn fetch(
        &self,
        keyword: &str,
        out_dir: &Path,
        filename_prefix: &str,
        max_count: usize,
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// Default fetcher: asks a search endpoint for candidate image URLs and
/// downloads each one. The endpoint is expected to answer
/// `GET ?q=<keyword>&count=<n>` with a JSON array of URLs.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    endpoint: String,
    extension: String,
}

impl HttpImageFetcher {
    pub fn new(endpoint: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            extension: extension.into(),
        }
    }

    async fn image_urls(&self, keyword: &str, max_count: usize) -> Result<Vec<String>> {
        let count = max_count.to_string();
        let response = self
            .client
            .get(self.endpoint.as_str())
            .query(&[("q", keyword), ("count", count.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Vec<String>>().await?)
    }

    async fn download_one(&self, url: &str, target: &Path) -> Result<()> {
        log::debug!("downloading {url} to {}", target.display());
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tokio::fs::write(target, &bytes)
            .await
            .map_err(|e| PipelineError::from_io(e, target))?;
        Ok(())
    }
}

impl ImageFetcher for HttpImageFetcher {
    async fn fetch(
        &self,
        keyword: &str,
        out_dir: &Path,
        filename_prefix: &str,
        max_count: usize,
    ) -> Result<usize> {
        let urls = self.image_urls(keyword, max_count).await?;
        log::info!("{} candidate urls for keyword '{keyword}'", urls.len());

        let slug = slugify(keyword);
        let mut written = 0;
        for (i, url) in urls.iter().enumerate() {
            // Stop once the category directory has reached the target; other
            // keywords may have filled it in the meantime.
            if fsops::list_files(out_dir)?.len() >= max_count {
                break;
            }
            let filename = format!("{filename_prefix}{slug}_{i}.{}", self.extension);
            match self.download_one(url, &out_dir.join(filename)).await {
                Ok(()) => written += 1,
                Err(e) => log::warn!("skipping {url}: {e}"),
            }
        }
        Ok(written)
    }
}

fn slugify(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// Drives the fetchers across all categories and keywords, bounded by the
/// configured concurrency limit.
pub struct Acquisition<'a, F> {
    config: &'a PipelineConfig,
    layout: DatasetLayout,
    fetcher: Arc<F>,
}

impl<'a, F: ImageFetcher + 'static> Acquisition<'a, F> {
    pub fn new(config: &'a PipelineConfig, fetcher: Arc<F>) -> Self {
        Self {
            config,
            layout: DatasetLayout::new(config),
            fetcher,
        }
    }

    /// Fetches images for every category that has not yet reached its
    /// target count. Re-running on a filled dataset is a no-op.
    pub async fn run(&self) -> Result<()> {
        fsops::create_path(self.layout.raw_root())?;

        for category in &self.config.categories {
            let raw_dir = self.layout.raw_dir(&category.name);
            fsops::create_path(&raw_dir)?;

            let present = fsops::list_files(&raw_dir)?.len();
            if present >= self.config.images_per_category {
                log::info!(
                    "skipping {} because it already has {present} images",
                    category.name
                );
                continue;
            }

            log::info!("downloading images for {}", category.name);
            self.fetch_category(category, raw_dir).await;
            log::info!("downloading images for {} finished", category.name);
        }
        Ok(())
    }

    /// Spawns one fetch task per keyword; at most `fetch_concurrency` run
    /// at once. Individual keyword failures are logged and skipped, never
    /// fatal; keyword variety provides organic retry coverage.
    async fn fetch_category(&self, category: &CategorySpec, raw_dir: PathBuf) {
        let limiter = Arc::new(Semaphore::new(self.config.fetch_concurrency));
        let mut tasks: JoinSet<(String, Result<usize>)> = JoinSet::new();

        for keyword in &category.keywords {
            let limiter = Arc::clone(&limiter);
            let fetcher = Arc::clone(&self.fetcher);
            let keyword = keyword.clone();
            let dir = raw_dir.clone();
            let max_count = self.config.images_per_category;

            tasks.spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (keyword, Err(PipelineError::Other(e.to_string()))),
                };
                let outcome = fetcher.fetch(&keyword, &dir, "", max_count).await;
                (keyword, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((keyword, Ok(written))) => {
                    log::info!("keyword '{keyword}' contributed {written} images")
                }
                Ok((keyword, Err(e))) => log::warn!("fetch for keyword '{keyword}' failed: {e}"),
                Err(e) => log::warn!("fetch task aborted: {e}"),
            }
        }
    }
}
