//! Resolve command implementation

use super::{date_or_today, open_store, print_json};
use crate::config::Config;
use crate::context::FileCollector;
use crate::pipeline::{gather_facts, ScoringPass};
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Resolution date, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl ResolveArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let date = date_or_today(self.date);
        let store = open_store(&config).await?;
        let collector = FileCollector::new(&config.collector.context_dir);

        let facts = gather_facts(&collector, store.as_ref(), date).await?;
        let report = ScoringPass::new(&config, store).resolve(facts, date).await?;
        print_json(&report)
    }
}
