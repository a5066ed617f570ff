//! Hobart CLI binary.
//!
//! One subcommand per pipeline stage, plus `flow` to run the training
//! stages end to end.

mod integration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use hobart::data::calendar::market_close_date;
use hobart::data::files::RawLayout;
use hobart::features::window::month_start;
use hobart::{PipelineConfig, stages};
use indicatif::{ProgressBar, ProgressStyle};
use integration::download::{DownloadSummary, download, download_with_retry};
use std::path::PathBuf;
use std::process;
use std::time::Duration as StdDuration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: one-month stock return prediction pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON); defaults apply when the file is absent
    #[arg(long, global = true, default_value = "hobart.json")]
    config: PathBuf,

    /// Override the raw data directory
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Override the experiment tracking root
    #[arg(long, global = true)]
    tracking_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download prices, yields and sectors into the raw directory
    Download,

    /// Build the historical feature table
    Transform {
        /// Cap on usable data (default: first day of the current month)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Build production feature records for one anchor
    Latest {
        /// Anchor date, rounded down to its month start (default: first day
        /// of the current month)
        #[arg(long)]
        anchor: Option<NaiveDate>,
    },

    /// Split and vectorize the feature table
    Preprocess,

    /// Fit the baseline model
    Train,

    /// Run the hyperparameter search
    Tune {
        /// Number of trials
        #[arg(long)]
        max_evals: Option<usize>,
    },

    /// Retrain the best tuning runs and register the winner
    Register {
        /// Number of tuning runs retrained
        #[arg(long)]
        top_n: Option<usize>,

        /// Promote the registered version to production
        #[arg(long)]
        promote: bool,
    },

    /// Download, transform, preprocess, train, tune and register
    Flow {
        /// Reuse the raw directory instead of downloading
        #[arg(long)]
        skip_download: bool,

        /// Promote the registered version to production
        #[arg(long)]
        promote: bool,
    },

    /// Score production records and print predictions as JSON
    Predict {
        /// JSON records (default: the configured records path)
        records: Option<PathBuf>,
    },

    /// Score the historical feature table
    Backfill,

    /// Compute monthly drift metrics over the backfill
    Monitor,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(&cli.config)?;
    if let Some(raw_dir) = cli.raw_dir {
        config.raw_dir = raw_dir;
    }
    if let Some(tracking_root) = cli.tracking_root {
        config.tracking_root = tracking_root;
    }

    match cli.command {
        Commands::Download => {
            banner("DOWNLOAD");
            let pb = progress_bar();
            let summary = download(
                &config.download,
                &RawLayout::new(&config.raw_dir),
                Utc::now(),
                Some(&pb),
            )
            .await;
            finish_download(&pb, summary)?;
        }
        Commands::Transform { end } => {
            banner("FEATURE TABLE");
            let end = end.unwrap_or_else(current_month_start);
            let table = stages::transform(&config, end)?;
            println!("Rows: {}", table.len());
            println!("Months: {}", table.dates().len());
            println!("Written to {}", config.features_path.display());
        }
        Commands::Latest { anchor } => {
            banner("PRODUCTION RECORDS");
            let anchor = anchor.map_or_else(current_month_start, month_start);
            let table = stages::latest(&config, anchor)?;
            println!("Anchor: {anchor}");
            println!("Records: {}", table.len());
            println!("Written to {}", config.records_path.display());
        }
        Commands::Preprocess => {
            banner("PREPROCESS");
            let data = stages::preprocess(&config)?;
            println!(
                "Train/validation/test rows: {}/{}/{}",
                data.train.len(),
                data.validation.len(),
                data.test.len()
            );
            println!("Features: {}", data.vectorizer.n_features());
        }
        Commands::Train => {
            banner("BASELINE");
            let (run, rmse) = stages::train(&config)?;
            println!("Run: {run}");
            println!("Validation RMSE: {rmse:.6}");
        }
        Commands::Tune { max_evals } => {
            if let Some(max_evals) = max_evals {
                config.tune.max_evals = max_evals;
            }
            banner("HYPERPARAMETER SEARCH");
            let best = stages::tune(&config)?;
            println!("Best RMSE: {:.6}", best.loss);
            println!("Best params: {}", serde_json::to_string_pretty(&best.params)?);
        }
        Commands::Register { top_n, promote } => {
            if let Some(top_n) = top_n {
                config.register.top_n = top_n;
            }
            config.register.promote |= promote;
            banner("REGISTER");
            let version = stages::register(&config)?;
            println!("Model: {} v{}", version.name, version.version);
            println!("Run: {}", version.run_id);
            println!("Stage: {}", version.stage);
        }
        Commands::Flow {
            skip_download,
            promote,
        } => {
            config.register.promote |= promote;
            run_flow(&config, skip_download).await?;
        }
        Commands::Predict { records } => {
            let records = records.unwrap_or_else(|| config.records_path.clone());
            let predictions = stages::predict(&config, &records)?;
            println!("{}", serde_json::to_string_pretty(&predictions)?);
        }
        Commands::Backfill => {
            banner("BACKFILL");
            let scored = stages::backfill(&config)?;
            println!("Scored rows: {}", scored.len());
            println!("Written to {}", config.backfill_path.display());
        }
        Commands::Monitor => {
            banner("MONITORING");
            let metrics = stages::monitor(&config)?;
            println!(
                "{:<12} {:>10} {:>8} {:>9} {:>10} {:>10}",
                "Month", "Pred p", "Drifted", "Missing", "Median r", "Alpha out"
            );
            for m in &metrics {
                println!(
                    "{:<12} {:>10} {:>8} {:>8.2}% {:>10} {:>9.1}%",
                    m.timestamp.to_string(),
                    m.prediction_drift.map_or_else(|| "-".to_string(), |p| format!("{p:.4}")),
                    m.num_drifted_columns,
                    m.share_missing_values * 100.0,
                    m.median_return.map_or_else(|| "-".to_string(), |r| format!("{r:.4}")),
                    m.alpha_out_of_range_share * 100.0,
                );
            }
            println!("\nStored in {}", config.metrics_db.display());
        }
    }

    Ok(())
}

/// Download (with retries), then every training stage in order.
async fn run_flow(config: &PipelineConfig, skip_download: bool) -> Result<(), Box<dyn std::error::Error>> {
    banner("HOBART FLOW");

    if skip_download {
        println!("Skipping download, reusing {}", config.raw_dir.display());
    } else {
        let pb = progress_bar();
        let summary =
            download_with_retry(&config.download, &RawLayout::new(&config.raw_dir), Some(&pb)).await;
        finish_download(&pb, summary)?;
    }

    let table = stages::transform(config, current_month_start())?;
    println!("[1/5] Feature table: {} rows over {} months", table.len(), table.dates().len());

    let data = stages::preprocess(config)?;
    println!(
        "[2/5] Dataset: {}/{}/{} train/validation/test rows",
        data.train.len(),
        data.validation.len(),
        data.test.len()
    );

    let (run, rmse) = stages::train(config)?;
    println!("[3/5] Baseline run {run}: validation RMSE {rmse:.6}");

    let best = stages::tune(config)?;
    println!("[4/5] Search: best RMSE {:.6} over {} trials", best.loss, config.tune.max_evals);

    let version = stages::register(config)?;
    println!(
        "[5/5] Registered {} v{} ({}) from run {}",
        version.name, version.version, version.stage, version.run_id
    );
    Ok(())
}

fn banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(StdDuration::from_millis(100));
    pb
}

fn finish_download(
    pb: &ProgressBar,
    summary: Result<DownloadSummary, hobart::data::DataError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match summary {
        Ok(summary) => {
            pb.finish_with_message(format!(
                "Done! {} tickers, {} price rows",
                summary.tickers, summary.stock_rows
            ));
            println!("Range: {} to {}", summary.range.start, summary.range.end);
            if !summary.failed.is_empty() {
                println!("Failed tickers ({}): {}", summary.failed.len(), summary.failed.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(e.into())
        }
    }
}

/// First day of the month of the last final New York close.
fn current_month_start() -> NaiveDate {
    month_start(market_close_date(Utc::now()))
}
