//! CLI interface for deal-assess
//!
//! Provides subcommands for:
//! - `run`: Daily batch (assess, resolve, calibrate, weigh, review)
//! - `resolve`: Resolve open predictions only
//! - `calibrate`: Recompute calibration and signal weights
//! - `review`: Show the review queue for a date
//! - `export`: Write stored history to Parquet
//! - `status`: Show stored state
//! - `config`: Show configuration

mod calibrate;
mod export;
mod resolve;
mod review;
mod run;
mod status;

pub use calibrate::CalibrateArgs;
pub use export::ExportArgs;
pub use resolve::ResolveArgs;
pub use review::ReviewArgs;
pub use run::RunArgs;
pub use status::show_status;

use crate::config::Config;
use crate::store::JsonFileStore;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "deal-assess")]
#[command(about = "Daily merger-arbitrage deal assessment with prediction scoring")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daily batch
    Run(RunArgs),
    /// Resolve open predictions against today's context
    Resolve(ResolveArgs),
    /// Recompute calibration and signal weights
    Calibrate(CalibrateArgs),
    /// Show the review queue
    Review(ReviewArgs),
    /// Export history to Parquet
    Export(ExportArgs),
    /// Show stored state
    Status,
    /// Show configuration
    Config,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// `--date` or today (UTC)
pub(crate) fn date_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

pub(crate) async fn open_store(config: &Config) -> anyhow::Result<Arc<JsonFileStore>> {
    let store = JsonFileStore::open(&config.store.path).await?;
    Ok(Arc::new(store))
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
