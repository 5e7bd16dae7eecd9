//! Prediction scoring, calibration and signal weighting

mod calibration;
mod scores;
mod signals;

pub use calibration::{
    CalibrationBrief, CalibrationBucket, CalibrationComputer, CalibrationLabel, CalibrationSample,
    CalibrationScope, CalibrationSnapshot,
};
pub use scores::{brier, log_score, LOG_CLAMP};
pub use signals::{
    SignalAccuracy, SignalObservation, SignalSource, SignalWeightEngine, SignalWeights,
    GLOBAL_SCOPE, UNINFORMED_BRIER,
};
