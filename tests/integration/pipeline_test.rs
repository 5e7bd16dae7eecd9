//! Daily pipeline scenarios over file-backed context and state

use crate::common::{day, snapshot, write_snapshot, ScriptedReasoner, MILESTONE_CALL, SHORT_DEADLINES};
use deal_assess::config::Config;
use deal_assess::context::{DealOutcome, FileCollector, MilestoneStatus, OutcomeKind};
use deal_assess::fingerprint::Strategy;
use deal_assess::pipeline::DailyRun;
use deal_assess::predictions::{PredictionStatus, PredictionType, ResolutionSource};
use deal_assess::store::{AssessmentStore, HistoryStore, JsonFileStore, PredictionStore};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    reasoner: Arc<ScriptedReasoner>,
    store: Arc<JsonFileStore>,
    run: DailyRun<FileCollector, ScriptedReasoner>,
}

async fn harness(replies: &[&str]) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.collector.context_dir = dir.path().join("context");
    config.store.path = dir.path().join("state.json");

    let store = Arc::new(JsonFileStore::open(&config.store.path).await.unwrap());
    let reasoner = Arc::new(ScriptedReasoner::new(replies));
    let collector = Arc::new(FileCollector::new(&config.collector.context_dir));
    let run = DailyRun::new(config, collector, reasoner.clone(), store.clone());
    Harness {
        dir,
        reasoner,
        store,
        run,
    }
}

impl Harness {
    fn context_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("context")
    }
}

#[tokio::test]
async fn test_small_probability_move_reuses_prior_judgment() {
    let h = harness(&[MILESTONE_CALL]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));
    let mut next = snapshot("ACME", day(3));
    next.implied_probability = Some(0.93);
    write_snapshot(&h.context_dir(), &next);

    h.run.run(day(2), None).await.unwrap();
    let report = h.run.run(day(3), None).await.unwrap();

    assert_eq!(h.reasoner.calls(), 1);
    assert_eq!(report.summary.reused, 1);
    let today = h.store.assessment("ACME", day(3)).await.unwrap().unwrap();
    assert_eq!(today.strategy, Strategy::Reuse);
    assert_eq!(today.judgment.summary, "HSR waiting period running, no second request expected");
}

#[tokio::test]
async fn test_milestone_completion_scores_prediction() {
    let h = harness(&[MILESTONE_CALL]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));
    let mut cleared = snapshot("ACME", day(3));
    cleared.milestones[0].status = MilestoneStatus::Completed;
    cleared.milestones[0].actual_date = Some(day(3));
    write_snapshot(&h.context_dir(), &cleared);

    h.run.run(day(2), None).await.unwrap();
    let report = h.run.run(day(3), None).await.unwrap();

    assert_eq!(report.summary.delta, 1);
    assert_eq!(report.summary.predictions_rejected, 1);
    assert_eq!(
        report.summary.resolutions.get(&ResolutionSource::Milestone),
        Some(&1)
    );
    let scored: Vec<_> = h
        .store
        .predictions_for("ACME")
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.status == PredictionStatus::ResolvedCorrect)
        .collect();
    assert_eq!(scored.len(), 1);
    assert_eq!(scored[0].created_on, day(2));
    let resolution = scored[0].resolution.as_ref().unwrap();
    assert_eq!(resolution.actual, Some(true));
    assert!((resolution.brier.unwrap() - 0.01).abs() < 1e-9);
}

#[tokio::test]
async fn test_overdue_predictions_expire() {
    let h = harness(&[SHORT_DEADLINES]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(4)));

    let first = h.run.run(day(2), None).await.unwrap();
    assert_eq!(first.summary.predictions_submitted, 2);

    let report = h.run.run(day(4), None).await.unwrap();
    assert_eq!(report.summary.reused, 1);
    assert_eq!(report.resolution.total_expired(), 1);
    assert_eq!(report.resolution.total_resolved(), 1);
    assert_eq!(
        report.summary.resolutions.get(&ResolutionSource::DeadlineExpiry),
        Some(&2)
    );

    let predictions = h.store.predictions_for("ACME").await.unwrap();
    let next_event = predictions
        .iter()
        .find(|p| p.prediction_type() == PredictionType::NextEvent)
        .unwrap();
    assert_eq!(next_event.status, PredictionStatus::Expired);
    assert!(next_event.resolution.as_ref().unwrap().brier.is_none());

    let closes = predictions
        .iter()
        .find(|p| p.prediction_type() == PredictionType::DealCloses)
        .unwrap();
    let resolution = closes.resolution.as_ref().unwrap();
    assert_eq!(resolution.actual, Some(false));
    assert!((resolution.brier.unwrap() - 0.09).abs() < 1e-9);
    assert!(h.store.open_predictions(Some("ACME")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_outcome_is_logged_and_feeds_signal_weights() {
    let h = harness(&[MILESTONE_CALL]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));
    let mut closed = snapshot("ACME", day(5));
    closed.outcome = Some(DealOutcome {
        kind: OutcomeKind::ClosedAtDeal,
        observed_on: day(5),
        final_price: Some(rust_decimal_macros::dec!(50)),
    });
    write_snapshot(&h.context_dir(), &closed);

    h.run.run(day(2), None).await.unwrap();
    let report = h.run.run(day(5), None).await.unwrap();

    let outcomes = h.store.outcomes().await.unwrap();
    assert_eq!(outcomes["ACME"].kind, OutcomeKind::ClosedAtDeal);
    let rows = h.store.latest_signal_accuracy().await.unwrap();
    assert!(rows.iter().any(|r| r.sample_count == 1));
    let total: f64 = report.weights.weights.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let h = harness(&[MILESTONE_CALL]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));
    h.run.run(day(2), None).await.unwrap();

    let reopened = JsonFileStore::open(h.dir.path().join("state.json"))
        .await
        .unwrap();
    assert!(reopened.assessment("ACME", day(2)).await.unwrap().is_some());
    assert_eq!(reopened.open_predictions(None).await.unwrap().len(), 1);
    assert_eq!(reopened.calibration_history().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_missing_context_fails_only_that_deal() {
    let h = harness(&[MILESTONE_CALL]).await;
    write_snapshot(&h.context_dir(), &snapshot("ACME", day(2)));

    let report = h
        .run
        .run(day(2), Some(vec!["ACME".to_string(), "GONE".to_string()]))
        .await
        .unwrap();
    assert_eq!(report.summary.assessed, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.failures[0].deal, "GONE");
}
