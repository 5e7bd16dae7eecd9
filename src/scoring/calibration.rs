//! Calibration analysis over resolved predictions
//!
//! Predictions are grouped into probability bands. For each band with
//! enough samples the observed hit rate is compared to the band midpoint.
//! Summary statistics follow the usual Murphy decomposition terms: expected
//! calibration error, sharpness and resolution skill.

use crate::config::CalibrationConfig;
use crate::predictions::{Prediction, PredictionType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Aggregation scope of a calibration snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationScope {
    Global,
    PredictionType(PredictionType),
}

impl CalibrationScope {
    /// Every scope the daily run computes
    pub fn all() -> Vec<CalibrationScope> {
        let mut scopes = vec![CalibrationScope::Global];
        scopes.extend(PredictionType::ALL.into_iter().map(CalibrationScope::PredictionType));
        scopes
    }

    pub fn includes(&self, prediction_type: PredictionType) -> bool {
        match self {
            CalibrationScope::Global => true,
            CalibrationScope::PredictionType(t) => *t == prediction_type,
        }
    }
}

impl fmt::Display for CalibrationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationScope::Global => f.write_str("global"),
            CalibrationScope::PredictionType(t) => write!(f, "type:{t}"),
        }
    }
}

/// Reliability label for one band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationLabel {
    /// Events happened less often than the band claims
    Overconfident,
    /// Events happened more often than the band claims
    Underconfident,
    WellCalibrated,
    /// Fewer samples than `min_bucket_samples`
    Insufficient,
}

/// One probability band of the reliability curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_predicted: f64,
    pub hit_rate: f64,
    /// `hit_rate - midpoint`
    pub deviation: f64,
    pub label: CalibrationLabel,
}

impl CalibrationBucket {
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

/// Appended aggregate for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub id: Uuid,
    pub scope: CalibrationScope,
    pub computed_on: NaiveDate,
    pub computed_at: DateTime<Utc>,
    pub sample_count: usize,
    pub buckets: Vec<CalibrationBucket>,
    pub brier_mean: Option<f64>,
    pub log_score_mean: Option<f64>,
    /// Expected calibration error
    pub ece: Option<f64>,
    /// Variance of the predicted probabilities
    pub sharpness: Option<f64>,
    pub resolution_skill: Option<f64>,
    pub base_rate: Option<f64>,
    /// False when there are fewer than `min_total_samples`
    pub usable: bool,
    /// Previous snapshot in the same scope
    pub previous_id: Option<Uuid>,
    /// `brier_mean - previous.brier_mean`, negative is an improvement
    pub brier_delta: Option<f64>,
}

impl CalibrationSnapshot {
    /// Compact view handed to the reasoner
    pub fn brief(&self) -> CalibrationBrief {
        CalibrationBrief {
            scope: self.scope.to_string(),
            sample_count: self.sample_count,
            brier_mean: self.brier_mean,
            ece: self.ece,
            flagged_bands: self
                .buckets
                .iter()
                .filter(|b| {
                    matches!(
                        b.label,
                        CalibrationLabel::Overconfident | CalibrationLabel::Underconfident
                    )
                })
                .map(|b| {
                    format!(
                        "{:.0}-{:.0}%: predicted {:.0}%, observed {:.0}% ({:?})",
                        b.lower * 100.0,
                        b.upper * 100.0,
                        b.mean_predicted * 100.0,
                        b.hit_rate * 100.0,
                        b.label
                    )
                })
                .collect(),
        }
    }
}

/// Calibration feedback in a reasoner request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBrief {
    pub scope: String,
    pub sample_count: usize,
    pub brier_mean: Option<f64>,
    pub ece: Option<f64>,
    pub flagged_bands: Vec<String>,
}

/// A scored resolution, the unit of calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub prediction_type: PredictionType,
    pub probability: f64,
    pub actual: bool,
    pub brier: f64,
    pub log_score: f64,
}

impl CalibrationSample {
    /// `None` unless the prediction resolved with a score
    pub fn from_prediction(prediction: &Prediction) -> Option<Self> {
        if !prediction.status.is_scored() {
            return None;
        }
        let resolution = prediction.resolution.as_ref()?;
        Some(Self {
            prediction_type: prediction.prediction_type(),
            probability: prediction.probability,
            actual: resolution.actual?,
            brier: resolution.brier?,
            log_score: resolution.log_score?,
        })
    }
}

/// Builds calibration snapshots
#[derive(Debug, Clone)]
pub struct CalibrationComputer {
    config: CalibrationConfig,
}

impl CalibrationComputer {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CalibrationConfig::default())
    }

    /// Snapshot for `scope` from every scored prediction in `predictions`
    pub fn compute_from_predictions(
        &self,
        scope: CalibrationScope,
        predictions: &[Prediction],
        previous: Option<&CalibrationSnapshot>,
        today: NaiveDate,
    ) -> CalibrationSnapshot {
        let samples: Vec<CalibrationSample> = predictions
            .iter()
            .filter_map(CalibrationSample::from_prediction)
            .filter(|s| scope.includes(s.prediction_type))
            .collect();
        self.compute(scope, &samples, previous, today)
    }

    pub fn compute(
        &self,
        scope: CalibrationScope,
        samples: &[CalibrationSample],
        previous: Option<&CalibrationSnapshot>,
        today: NaiveDate,
    ) -> CalibrationSnapshot {
        let n = samples.len();
        let brier_mean = mean(samples.iter().map(|s| s.brier));
        let log_score_mean = mean(samples.iter().map(|s| s.log_score));
        let brier_delta = match (brier_mean, previous.and_then(|p| p.brier_mean)) {
            (Some(now), Some(before)) => Some(now - before),
            _ => None,
        };

        let mut snapshot = CalibrationSnapshot {
            id: Uuid::new_v4(),
            scope,
            computed_on: today,
            computed_at: Utc::now(),
            sample_count: n,
            buckets: vec![],
            brier_mean,
            log_score_mean,
            ece: None,
            sharpness: None,
            resolution_skill: None,
            base_rate: None,
            usable: false,
            previous_id: previous.map(|p| p.id),
            brier_delta,
        };

        if n < self.config.min_total_samples.max(1) {
            return snapshot;
        }

        let bins = self.config.bins.max(1);
        let width = 1.0 / bins as f64;
        let mut grouped: Vec<Vec<&CalibrationSample>> = vec![Vec::new(); bins];
        for sample in samples {
            let p = sample.probability.clamp(0.0, 1.0);
            let index = ((p / width).floor() as usize).min(bins - 1);
            grouped[index].push(sample);
        }

        let total = n as f64;
        let hits = samples.iter().filter(|s| s.actual).count() as f64;
        let base_rate = hits / total;

        let mut ece = 0.0;
        let mut resolution_skill = 0.0;
        for (index, members) in grouped.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let count = members.len();
            let mean_predicted = members.iter().map(|s| s.probability).sum::<f64>() / count as f64;
            let hit_rate = members.iter().filter(|s| s.actual).count() as f64 / count as f64;
            let weight = count as f64 / total;
            ece += weight * (hit_rate - mean_predicted).abs();
            resolution_skill += weight * (hit_rate - base_rate).powi(2);

            let lower = index as f64 * width;
            let upper = lower + width;
            let deviation = hit_rate - (lower + upper) / 2.0;
            let label = if count < self.config.min_bucket_samples {
                CalibrationLabel::Insufficient
            } else if deviation < -self.config.deviation_threshold {
                CalibrationLabel::Overconfident
            } else if deviation > self.config.deviation_threshold {
                CalibrationLabel::Underconfident
            } else {
                CalibrationLabel::WellCalibrated
            };

            snapshot.buckets.push(CalibrationBucket {
                lower,
                upper,
                count,
                mean_predicted,
                hit_rate,
                deviation,
                label,
            });
        }

        let mean_p = samples.iter().map(|s| s.probability).sum::<f64>() / total;
        let sharpness = samples
            .iter()
            .map(|s| (s.probability - mean_p).powi(2))
            .sum::<f64>()
            / total;

        snapshot.ece = Some(ece);
        snapshot.sharpness = Some(sharpness);
        snapshot.resolution_skill = Some(resolution_skill);
        snapshot.base_rate = Some(base_rate);
        snapshot.usable = true;
        snapshot
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
