//! JSON file store
//!
//! Wraps a [`MemoryStore`] and rewrites one JSON document after every
//! mutation: serialize, write to a sibling temp file, then rename over the
//! target so a crash never leaves a half-written state file.

use super::memory::StoreState;
use super::{AssessmentStore, HistoryStore, MemoryStore, PredictionStore, StoreError};
use crate::assessment::Assessment;
use crate::context::DealOutcome;
use crate::predictions::{Prediction, PredictionId, PredictionStatus, Resolution};
use crate::scoring::{CalibrationScope, CalibrationSnapshot, SignalAccuracy};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Store persisted to a single JSON file
pub struct JsonFileStore {
    inner: MemoryStore,
    path: PathBuf,
    /// Serializes mutate-then-persist so the file never lags an older state
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<StoreState>(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = ?path, "No state file, starting empty");
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner: MemoryStore::from_state(state),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let state = self.inner.state().await;
        let content = serde_json::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::trace!(path = ?self.path, "Persisted store state");
        Ok(())
    }
}

#[async_trait]
impl AssessmentStore for JsonFileStore {
    async fn upsert_assessment(&self, assessment: Assessment) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.upsert_assessment(assessment).await?;
        self.persist().await
    }

    async fn assessment(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError> {
        self.inner.assessment(deal, date).await
    }

    async fn latest_assessment_before(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError> {
        self.inner.latest_assessment_before(deal, date).await
    }

    async fn assessments_on(&self, date: NaiveDate) -> Result<Vec<Assessment>, StoreError> {
        self.inner.assessments_on(date).await
    }

    async fn all_assessments(&self) -> Result<Vec<Assessment>, StoreError> {
        self.inner.all_assessments().await
    }
}

#[async_trait]
impl PredictionStore for JsonFileStore {
    async fn supersede_and_insert(
        &self,
        prediction: Prediction,
    ) -> Result<Option<PredictionId>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let superseded = self.inner.supersede_and_insert(prediction).await?;
        self.persist().await?;
        Ok(superseded)
    }

    async fn resolve(
        &self,
        id: PredictionId,
        status: PredictionStatus,
        resolution: Resolution,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.resolve(id, status, resolution).await?;
        self.persist().await
    }

    async fn expire(&self, id: PredictionId, resolution: Resolution) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.expire(id, resolution).await?;
        self.persist().await
    }

    async fn prediction(&self, id: PredictionId) -> Result<Option<Prediction>, StoreError> {
        self.inner.prediction(id).await
    }

    async fn open_predictions(&self, deal: Option<&str>) -> Result<Vec<Prediction>, StoreError> {
        self.inner.open_predictions(deal).await
    }

    async fn predictions_for(&self, deal: &str) -> Result<Vec<Prediction>, StoreError> {
        self.inner.predictions_for(deal).await
    }

    async fn all_predictions(&self) -> Result<Vec<Prediction>, StoreError> {
        self.inner.all_predictions().await
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn append_calibration(&self, snapshot: CalibrationSnapshot) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.append_calibration(snapshot).await?;
        self.persist().await
    }

    async fn latest_calibration(
        &self,
        scope: CalibrationScope,
    ) -> Result<Option<CalibrationSnapshot>, StoreError> {
        self.inner.latest_calibration(scope).await
    }

    async fn calibration_history(&self) -> Result<Vec<CalibrationSnapshot>, StoreError> {
        self.inner.calibration_history().await
    }

    async fn append_signal_accuracy(&self, rows: Vec<SignalAccuracy>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.inner.append_signal_accuracy(rows).await?;
        self.persist().await
    }

    async fn latest_signal_accuracy(&self) -> Result<Vec<SignalAccuracy>, StoreError> {
        self.inner.latest_signal_accuracy().await
    }

    async fn record_outcome(&self, deal: &str, outcome: DealOutcome) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let recorded = self.inner.record_outcome(deal, outcome).await?;
        if recorded {
            self.persist().await?;
        }
        Ok(recorded)
    }

    async fn outcomes(&self) -> Result<BTreeMap<String, DealOutcome>, StoreError> {
        self.inner.outcomes().await
    }
}
