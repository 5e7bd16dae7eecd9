//! Review command implementation

use super::{date_or_today, open_store, print_json, OutputFormat};
use crate::config::Config;
use crate::pipeline::ScoringPass;
use crate::review::ReviewTrigger;
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Assessment date, defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl ReviewArgs {
    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let date = date_or_today(self.date);
        let store = open_store(&config).await?;
        let queue = ScoringPass::new(&config, store).review(date).await?;

        if let OutputFormat::Json = self.format {
            return print_json(&queue);
        }
        if queue.is_empty() {
            println!("Nothing to review for {date}");
            return Ok(());
        }
        for item in &queue {
            let reasons: Vec<String> = item.triggers.iter().map(describe).collect();
            println!("{:<8} {:>6.1}  {}", item.deal, item.score, reasons.join("; "));
        }
        Ok(())
    }
}

fn describe(trigger: &ReviewTrigger) -> String {
    match trigger {
        ReviewTrigger::Divergence { against, gap, .. } => {
            format!("diverges from {against} by {:.0}pp", gap * 100.0)
        }
        ReviewTrigger::Swing {
            probability_delta,
            grade_steps,
            ..
        } => match probability_delta {
            Some(d) => format!("swing {:+.0}pp, {grade_steps} grade step(s)", d * 100.0),
            None => format!("{grade_steps} grade step(s)"),
        },
        ReviewTrigger::PoorPredictions {
            mean_brier, count, ..
        } => format!("mean Brier {mean_brier:.3} over {count} prediction(s)"),
        ReviewTrigger::MilestoneCompleted { milestone_id, .. } => {
            format!("milestone {milestone_id} completed")
        }
    }
}
