//! Status command implementation

use super::open_store;
use crate::config::Config;
use crate::scoring::CalibrationScope;
use crate::store::{AssessmentStore, HistoryStore, PredictionStore};

pub async fn show_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let assessments = store.all_assessments().await?;
    let open = store.open_predictions(None).await?;
    let all = store.all_predictions().await?;
    let outcomes = store.outcomes().await?;

    println!("deal-assess status");
    println!("  Store: {}", store.path().display());
    println!(
        "  Assessments: {} (latest {})",
        assessments.len(),
        assessments
            .iter()
            .map(|a| a.date)
            .max()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("  Predictions: {} total, {} open", all.len(), open.len());
    println!("  Outcomes logged: {}", outcomes.len());

    match store.latest_calibration(CalibrationScope::Global).await? {
        Some(s) => println!(
            "  Calibration ({}): n={} brier={} ece={}",
            s.computed_on,
            s.sample_count,
            s.brier_mean.map(|b| format!("{b:.4}")).unwrap_or_else(|| "-".into()),
            s.ece.map(|e| format!("{e:.4}")).unwrap_or_else(|| "-".into())
        ),
        None => println!("  Calibration: none yet"),
    }
    Ok(())
}
