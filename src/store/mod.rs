//! Durable record store
//!
//! Three narrow traits cover assessments, predictions and appended
//! history. [`MemoryStore`] implements all of them; [`JsonFileStore`]
//! persists the same state to one JSON document after every mutation.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::assessment::Assessment;
use crate::context::DealOutcome;
use crate::predictions::{Prediction, PredictionId, PredictionStatus, Resolution};
use crate::scoring::{CalibrationScope, CalibrationSnapshot, SignalAccuracy};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Prediction not found: {0}")]
    NotFound(PredictionId),
    /// Compare-and-set lost: the row is no longer open
    #[error("Prediction {id} is already {status:?}")]
    Conflict {
        id: PredictionId,
        status: PredictionStatus,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Assessments keyed by `(deal, date)`
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Insert or replace the assessment for its `(deal, date)`
    async fn upsert_assessment(&self, assessment: Assessment) -> Result<(), StoreError>;

    async fn assessment(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError>;

    /// Most recent assessment strictly before `date`
    async fn latest_assessment_before(
        &self,
        deal: &str,
        date: NaiveDate,
    ) -> Result<Option<Assessment>, StoreError>;

    async fn assessments_on(&self, date: NaiveDate) -> Result<Vec<Assessment>, StoreError>;

    /// Every assessment, ordered by deal then date
    async fn all_assessments(&self) -> Result<Vec<Assessment>, StoreError>;
}

/// Prediction rows and their lifecycle transitions
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Supersede the open prediction of the same `(deal, type)`, if any,
    /// and insert `prediction` as open. One critical section. Returns the
    /// id of the superseded row.
    async fn supersede_and_insert(
        &self,
        prediction: Prediction,
    ) -> Result<Option<PredictionId>, StoreError>;

    /// Open -> resolved, compare-and-set
    async fn resolve(
        &self,
        id: PredictionId,
        status: PredictionStatus,
        resolution: Resolution,
    ) -> Result<(), StoreError>;

    /// Open -> expired without a score, compare-and-set
    async fn expire(&self, id: PredictionId, resolution: Resolution) -> Result<(), StoreError>;

    async fn prediction(&self, id: PredictionId) -> Result<Option<Prediction>, StoreError>;

    /// Open predictions, optionally for one deal, newest first
    async fn open_predictions(&self, deal: Option<&str>) -> Result<Vec<Prediction>, StoreError>;

    async fn predictions_for(&self, deal: &str) -> Result<Vec<Prediction>, StoreError>;

    async fn all_predictions(&self) -> Result<Vec<Prediction>, StoreError>;
}

/// Append-only calibration and signal history, plus the outcome log
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_calibration(&self, snapshot: CalibrationSnapshot) -> Result<(), StoreError>;

    async fn latest_calibration(
        &self,
        scope: CalibrationScope,
    ) -> Result<Option<CalibrationSnapshot>, StoreError>;

    async fn calibration_history(&self) -> Result<Vec<CalibrationSnapshot>, StoreError>;

    async fn append_signal_accuracy(&self, rows: Vec<SignalAccuracy>) -> Result<(), StoreError>;

    /// Most recent row per source
    async fn latest_signal_accuracy(&self) -> Result<Vec<SignalAccuracy>, StoreError>;

    /// Record a deal outcome. Returns false when one was already logged.
    async fn record_outcome(&self, deal: &str, outcome: DealOutcome) -> Result<bool, StoreError>;

    async fn outcomes(&self) -> Result<BTreeMap<String, DealOutcome>, StoreError>;
}

/// Everything the daily run needs from persistence
pub trait Store: AssessmentStore + PredictionStore + HistoryStore {}

impl<T: AssessmentStore + PredictionStore + HistoryStore> Store for T {}
