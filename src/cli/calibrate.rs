//! Calibrate command implementation

use super::{date_or_today, open_store, print_json, OutputFormat};
use crate::config::Config;
use crate::pipeline::ScoringPass;
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Snapshot date, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl CalibrateArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let date = date_or_today(self.date);
        let store = open_store(&config).await?;
        let pass = ScoringPass::new(&config, store);

        let snapshots = pass.calibrate(date).await?;
        let (weights, _) = pass.update_signal_weights(date).await?;

        if let OutputFormat::Json = self.format {
            return print_json(&(snapshots, weights));
        }

        println!("{:<24} {:>7} {:>8} {:>8} {:>7}", "scope", "n", "brier", "ece", "usable");
        for s in &snapshots {
            let fmt = |v: Option<f64>| v.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into());
            println!(
                "{:<24} {:>7} {:>8} {:>8} {:>7}",
                s.scope.to_string(),
                s.sample_count,
                fmt(s.brier_mean),
                fmt(s.ece),
                s.usable
            );
        }
        for (source, weight) in &weights.weights {
            println!("weight {:<16} {:.3}", source.to_string(), weight);
        }
        Ok(())
    }
}
