//! Daily deal assessment
//!
//! [`AssessmentOrchestrator`] drives each deal through
//! collect → fingerprint → classify → route → reason → persist.

mod orchestrator;
mod types;

pub use orchestrator::{AssessmentOrchestrator, BatchOutcome, DealReport};
pub use types::{
    Assessment, DealFailure, ProbabilityEstimates, RiskJudgment, RunSummary,
};

use crate::context::ContextError;
use crate::predictions::PredictionError;
use crate::reasoner::ReasonerError;
use crate::store::StoreError;
use thiserror::Error;

/// Per-deal assessment errors. None of them abort the batch.
#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Context: {0}")]
    Context(#[from] ContextError),
    #[error("Reasoner: {0}")]
    Reasoner(#[from] ReasonerError),
    #[error("Store: {0}")]
    Store(#[from] StoreError),
    #[error("Prediction: {0}")]
    Prediction(#[from] PredictionError),
}
