//! Run command implementation

use super::{date_or_today, open_store, print_json, OutputFormat};
use crate::config::Config;
use crate::context::FileCollector;
use crate::pipeline::{DailyReport, DailyRun};
use crate::reasoner::AnthropicReasoner;
use chrono::NaiveDate;
use clap::Args;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Assessment date, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Deals to assess, defaults to the day's portfolio
    #[arg(long, value_delimiter = ',')]
    pub deals: Vec<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl RunArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let date = date_or_today(self.date);
        let store = open_store(&config).await?;
        let collector = Arc::new(FileCollector::new(&config.collector.context_dir));
        let reasoner = Arc::new(AnthropicReasoner::from_config(&config.reasoner)?);

        let run = DailyRun::new(config, collector, reasoner, store);

        let abort = run.abort_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current deal");
                abort.store(true, Ordering::SeqCst);
            }
        });

        let deals = (!self.deals.is_empty()).then(|| self.deals.clone());
        let report = run.run(date, deals).await?;

        match self.format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Table => print_report(&report),
        }
        Ok(())
    }
}

fn print_report(report: &DailyReport) {
    let s = &report.summary;
    println!("Daily run {}", s.date.map(|d| d.to_string()).unwrap_or_default());
    println!(
        "  Deals: {} total, {} assessed, {} failed{}",
        s.total,
        s.assessed,
        s.failed,
        if s.aborted { " (aborted)" } else { "" }
    );
    println!(
        "  Strategy: reuse={} delta={} full={} escalations={} (reuse rate {:.0}%)",
        s.reused,
        s.delta,
        s.full,
        s.escalations,
        s.reuse_rate() * 100.0
    );
    println!(
        "  Predictions: {} submitted, {} rejected, {} updates",
        s.predictions_submitted, s.predictions_rejected, s.updates_applied
    );
    for (source, count) in &s.resolutions {
        println!("  Resolved by {}: {}", source.as_str(), count);
    }
    for failure in &s.failures {
        println!("  FAILED {}: {}", failure.deal, failure.error);
    }
    for (source, weight) in &report.weights.weights {
        println!("  Weight {}: {:.3}", source, weight);
    }
    if !report.review_queue.is_empty() {
        println!("  Review queue:");
        for item in &report.review_queue {
            println!("    {:<8} {:>6.1}", item.deal, item.score);
        }
    }
}
