use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mt_cli::{run_holdout, run_search, run_tunability, ExperimentConfig};

#[derive(Parser)]
#[command(name = "meta-tuner")]
#[command(about = "Random-search experiments and tunability analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validated random search on every dataset of the data directory
    Search {
        /// Path to the experiment configuration (JSON)
        config: PathBuf,
    },
    /// Random search scored on train/test pairs; stores the best configuration
    Holdout {
        /// Path to the experiment configuration (JSON)
        config: PathBuf,
    },
    /// Default configuration and per-dataset gains over saved results
    Tunability {
        /// Directory holding `name=<dataset>.json` results
        results_dir: PathBuf,
        /// Treat lower scores as better
        #[arg(long)]
        lowest_best: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search { config } => {
            tracing::info!("Starting search with config: {}", config.display());
            let config = ExperimentConfig::from_file(&config)?;
            let summary = run_search(&config)?;
            println!(
                "{} completed, {} skipped, {} failed",
                summary.completed.len(),
                summary.skipped.len(),
                summary.failed.len()
            );
        }
        Commands::Holdout { config } => {
            tracing::info!("Starting holdout search with config: {}", config.display());
            let config = ExperimentConfig::from_file(&config)?;
            let summary = run_holdout(&config)?;
            println!(
                "{} completed, {} skipped, {} failed",
                summary.completed.len(),
                summary.skipped.len(),
                summary.failed.len()
            );
        }
        Commands::Tunability {
            results_dir,
            lowest_best,
        } => {
            let report = run_tunability(&results_dir, lowest_best)?;
            println!("Default configuration: {}", serde_json::to_string(&report.default_hpo)?);
            for gain in &report.datasets {
                println!("  {}: {:.6}", gain.dataset, gain.gain);
            }
        }
    }

    Ok(())
}
