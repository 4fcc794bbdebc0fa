use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;

use palate::{
    dataset, Acquisition, Cleaner, ContentHashAnalyzer, HttpImageFetcher, ImagePredictor,
    ModelRegistry, PipelineConfig, Splitter, Trainer,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON pipeline configuration; defaults to the built-in
    /// category table.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download candidate images for every category
    Fetch,
    /// Clean, dedup, and renumber the raw images
    Clean {
        /// Also split the cleaned images into train/test
        #[arg(long)]
        with_split: bool,
    },
    /// Split processed images into train/test subsets
    Split,
    /// Train one model per category and evaluate on the test split
    Train {
        /// Run a hyperparameter search before each final fit
        #[arg(long)]
        grid_search: bool,
    },
    /// Score an image against every trained model
    Predict { image: PathBuf },
    /// Run clean, split, and train in sequence
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Fetch => {
            let Some(endpoint) = config.search_endpoint.clone() else {
                bail!("no search_endpoint configured; set one in the configuration file");
            };
            let fetcher = Arc::new(HttpImageFetcher::new(endpoint, config.image_extension.clone()));
            Acquisition::new(&config, fetcher).run().await?;
        }
        Command::Clean { with_split } => {
            if with_split {
                dataset::curate(&config, &ContentHashAnalyzer)?;
            } else {
                Cleaner::new(&config, &ContentHashAnalyzer).clean_all()?;
            }
        }
        Command::Split => {
            Splitter::new(&config).split_all()?;
        }
        Command::Train { grid_search } => {
            if grid_search && config.grid_search.is_none() {
                config.grid_search = Some(Default::default());
            }
            let reports = Trainer::new(&config).train_all()?;
            for report in &reports {
                println!(
                    "{}: {:.0}% accuracy over {} test images",
                    report.category,
                    report.accuracy_percent(),
                    report.total
                );
            }
        }
        Command::Predict { image } => {
            let models_dir = config.data_dir.join(&config.models_subdir);
            let registry = ModelRegistry::load(&models_dir)?;
            info!("loaded {} models from {}", registry.len(), models_dir.display());

            let prediction = ImagePredictor::new(registry)?.predict(&image)?;

            let mut scores: Vec<_> = prediction
                .scores()
                .iter()
                .map(|(name, score)| (name.clone(), *score))
                .collect();
            scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            println!("\nResults:");
            println!("----------------------------------------------------");
            if let Some((best, score)) = prediction.best() {
                let marker = if score >= config.confidence_threshold {
                    ""
                } else {
                    " (below confidence threshold)"
                };
                println!("Predicted class: '{best}'{marker}");
            }
            println!("Confidence scores:");
            for (name, score) in scores {
                println!("    - '{name}': {score:.4}");
            }
        }
        Command::All => {
            dataset::curate(&config, &ContentHashAnalyzer)?;
            let reports = Trainer::new(&config).train_all()?;
            for report in &reports {
                println!(
                    "{}: {:.0}% accuracy over {} test images",
                    report.category,
                    report.accuracy_percent(),
                    report.total
                );
            }
        }
    }

    Ok(())
}
