//! In-memory store

use super::{AssessmentStore, HistoryStore, PredictionStore, StoreError};
use crate::assessment::Assessment;
use crate::context::DealOutcome;
use crate::predictions::{Prediction, PredictionId, PredictionStatus, Resolution};
use crate::scoring::{CalibrationScope, CalibrationSnapshot, SignalAccuracy};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Complete store contents; also the on-disk document of the file store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    assessments: BTreeMap<String, BTreeMap<NaiveDate, Assessment>>,
    #[serde(default)]
    predictions: BTreeMap<PredictionId, Prediction>,
    #[serde(default)]
    calibration: Vec<CalibrationSnapshot>,
    #[serde(default)]
    signal_accuracy: Vec<SignalAccuracy>,
    #[serde(default)]
    outcomes: BTreeMap<String, DealOutcome>,
}

impl StoreState {
    fn newest_first(mut predictions: Vec<Prediction>) -> Vec<Prediction> {
        predictions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        predictions
    }

    fn transition(
        &mut self,
        id: PredictionId,
        status: PredictionStatus,
        resolution: Resolution,
    ) -> Result<(), StoreError> {
        let prediction = self
            .predictions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        if !prediction.status.is_open() {
            return Err(StoreError::Conflict {
                id,
                status: prediction.status,
            });
        }
        prediction.status = status;
        prediction.resolution = Some(resolution);
        Ok(())
    }
}

/// Store kept entirely in memory behind a tokio `RwLock`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: StoreState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the full contents
    pub(crate) async fn state(&self) -> StoreState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn upsert_assessment(&self, assessment: Assessment) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .assessments
            .entry(assessment.deal.clone())
            .or_default()
            .insert(assessment.date, assessment);
        Ok(())
    }

    async fn assessment(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .assessments
            .get(deal)
            .and_then(|by_date| by_date.get(&date))
            .cloned())
    }

    async fn latest_assessment_before(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .assessments
            .get(deal)
            .and_then(|by_date| by_date.range(..date).next_back())
            .map(|(_, a)| a.clone()))
    }

    async fn assessments_on(&self, date: NaiveDate) -> Result<Vec<Assessment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .assessments
            .values()
            .filter_map(|by_date| by_date.get(&date).cloned())
            .collect())
    }

    async fn all_assessments(&self) -> Result<Vec<Assessment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .assessments
            .values()
            .flat_map(|by_date| by_date.values().cloned())
            .collect())
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn supersede_and_insert(
        &self,
        prediction: Prediction,
    ) -> Result<Option<PredictionId>, StoreError> {
        let mut state = self.state.write().await;
        let prediction_type = prediction.prediction_type();

        let existing: Vec<PredictionId> = state
            .predictions
            .values()
            .filter(|p| {
                p.is_open() && p.deal == prediction.deal && p.prediction_type() == prediction_type
            })
            .map(|p| p.id)
            .collect();

        let mut superseded = None;
        for id in existing {
            if let Some(old) = state.predictions.get_mut(&id) {
                old.status = PredictionStatus::Superseded;
                old.superseded_by = Some(prediction.id);
                superseded = Some(id);
            }
        }
        state.predictions.insert(prediction.id, prediction);
        Ok(superseded)
    }

    async fn resolve(
        &self,
        id: PredictionId,
        status: PredictionStatus,
        resolution: Resolution,
    ) -> Result<(), StoreError> {
        self.state.write().await.transition(id, status, resolution)
    }

    async fn expire(&self, id: PredictionId, resolution: Resolution) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .transition(id, PredictionStatus::Expired, resolution)
    }

    async fn prediction(&self, id: PredictionId) -> Result<Option<Prediction>, StoreError> {
        Ok(self.state.read().await.predictions.get(&id).cloned())
    }

    async fn open_predictions(&self, deal: Option<&str>) -> Result<Vec<Prediction>, StoreError> {
        let state = self.state.read().await;
        let open = state
            .predictions
            .values()
            .filter(|p| p.is_open() && deal.map_or(true, |d| p.deal == d))
            .cloned()
            .collect();
        Ok(StoreState::newest_first(open))
    }

    async fn predictions_for(&self, deal: &str) -> Result<Vec<Prediction>, StoreError> {
        let state = self.state.read().await;
        let rows = state
            .predictions
            .values()
            .filter(|p| p.deal == deal)
            .cloned()
            .collect();
        Ok(StoreState::newest_first(rows))
    }

    async fn all_predictions(&self) -> Result<Vec<Prediction>, StoreError> {
        let state = self.state.read().await;
        Ok(StoreState::newest_first(
            state.predictions.values().cloned().collect(),
        ))
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_calibration(&self, snapshot: CalibrationSnapshot) -> Result<(), StoreError> {
        self.state.write().await.calibration.push(snapshot);
        Ok(())
    }

    async fn latest_calibration(
        &self,
        scope: CalibrationScope,
    ) -> Result<Option<CalibrationSnapshot>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .calibration
            .iter()
            .rev()
            .find(|s| s.scope == scope)
            .cloned())
    }

    async fn calibration_history(&self) -> Result<Vec<CalibrationSnapshot>, StoreError> {
        Ok(self.state.read().await.calibration.clone())
    }

    async fn append_signal_accuracy(&self, rows: Vec<SignalAccuracy>) -> Result<(), StoreError> {
        self.state.write().await.signal_accuracy.extend(rows);
        Ok(())
    }

    async fn latest_signal_accuracy(&self) -> Result<Vec<SignalAccuracy>, StoreError> {
        let state = self.state.read().await;
        let mut latest: BTreeMap<_, SignalAccuracy> = BTreeMap::new();
        // Appended in order, so later rows win
        for row in &state.signal_accuracy {
            latest.insert(row.source, row.clone());
        }
        Ok(latest.into_values().collect())
    }

    async fn record_outcome(&self, deal: &str, outcome: DealOutcome) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.outcomes.contains_key(deal) {
            return Ok(false);
        }
        state.outcomes.insert(deal.to_string(), outcome);
        Ok(true)
    }

    async fn outcomes(&self) -> Result<BTreeMap<String, DealOutcome>, StoreError> {
        Ok(self.state.read().await.outcomes.clone())
    }
}
