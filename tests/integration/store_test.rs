//! Store contract checks shared by both implementations

use crate::common::day;
use deal_assess::predictions::{
    Confidence, NewPrediction, PredictionKind, PredictionStatus, Resolution, ResolutionSource,
};
use deal_assess::store::{JsonFileStore, MemoryStore, PredictionStore, Store, StoreError};
use tempfile::TempDir;

fn new_prediction(deal: &str, probability: f64) -> NewPrediction {
    NewPrediction {
        deal: deal.to_string(),
        assessment_id: None,
        kind: PredictionKind::DealCloses,
        claim: "Closes by quarter end".to_string(),
        deadline: Some(day(31)),
        probability,
        confidence: Confidence::Medium,
        evidence: vec!["Outside date".to_string()],
    }
}

async fn check_supersede_and_cas(store: &dyn Store) {
    let first = new_prediction("ACME", 0.7).into_open(day(2));
    let second = new_prediction("ACME", 0.8).into_open(day(3));

    assert_eq!(store.supersede_and_insert(first.clone()).await.unwrap(), None);
    assert_eq!(
        store.supersede_and_insert(second.clone()).await.unwrap(),
        Some(first.id)
    );

    let open = store.open_predictions(Some("ACME")).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);
    let old = store.prediction(first.id).await.unwrap().unwrap();
    assert_eq!(old.status, PredictionStatus::Superseded);
    assert_eq!(old.superseded_by, Some(second.id));

    let resolution = Resolution::scored(0.8, true, ResolutionSource::Outcome, None, day(4));
    store
        .resolve(second.id, PredictionStatus::ResolvedCorrect, resolution.clone())
        .await
        .unwrap();
    let again = store
        .resolve(second.id, PredictionStatus::ResolvedCorrect, resolution)
        .await;
    assert!(matches!(again, Err(StoreError::Conflict { .. })));
}

#[tokio::test]
async fn test_memory_store_contract() {
    check_supersede_and_cas(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_json_file_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path().join("state.json"))
        .await
        .unwrap();
    check_supersede_and_cas(&store).await;

    let reopened = JsonFileStore::open(dir.path().join("state.json"))
        .await
        .unwrap();
    assert_eq!(reopened.predictions_for("ACME").await.unwrap().len(), 2);
}
