//! Export command implementation

use super::{date_or_today, open_store};
use crate::config::Config;
use crate::export::{export_all, ParquetExporter};
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output directory for Parquet files
    #[arg(short, long, default_value = "./export")]
    pub output: PathBuf,

    /// Date stamped into file names, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl ExportArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let store = open_store(&config).await?;
        let exporter = ParquetExporter::new(&self.output);
        let written = export_all(store.as_ref(), &exporter, date_or_today(self.date)).await?;

        if written.is_empty() {
            println!("Nothing to export");
        }
        for path in written {
            println!("Wrote {}", path.display());
        }
        Ok(())
    }
}
