//! Falsifiable predictions: registry, resolution and lifecycle types

mod registry;
mod resolution;
mod types;

pub use registry::PredictionRegistry;
pub use resolution::{ResolutionEngine, ResolutionFacts, ResolutionReport, Verdict};
pub use types::{
    Confidence, NewPrediction, Prediction, PredictionId, PredictionKind, PredictionStatus,
    PredictionType, PredictionUpdate, Resolution, ResolutionSource, SpreadDirection,
};

use crate::store::StoreError;
use thiserror::Error;

/// Prediction errors
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Rejected at the registry; only this prediction is dropped
    #[error("Invalid prediction for {deal}: {reason}")]
    Invalid { deal: String, reason: String },
    #[error("No open {prediction_type} prediction for {deal}")]
    NoOpenPrediction {
        deal: String,
        prediction_type: PredictionType,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
