//! Per-source accuracy tracking and ensemble weights
//!
//! Each signal source (our reasoner, the external analyst, the market's
//! implied probability) is scored on deals that have reached an outcome.
//! Inverse-Brier weights are shrunk toward an equal split until every
//! source has `target_sample_size` observations.

use super::scores::brier;
use crate::config::SignalConfig;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Brier assumed for a source with no observations
pub const UNINFORMED_BRIER: f64 = 0.25;

/// Scope label for portfolio-wide weights
pub const GLOBAL_SCOPE: &str = "global";

/// Independent probability-of-close estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Reasoner,
    Analyst,
    MarketImplied,
}

impl SignalSource {
    pub const ALL: [SignalSource; 3] = [
        SignalSource::Reasoner,
        SignalSource::Analyst,
        SignalSource::MarketImplied,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Reasoner => "reasoner",
            SignalSource::Analyst => "analyst",
            SignalSource::MarketImplied => "market_implied",
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's stated probability for a deal that later resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalObservation {
    pub source: SignalSource,
    pub deal: String,
    /// Date the probability was stated
    pub observed_on: NaiveDate,
    pub probability: f64,
    /// Whether the deal completed
    pub actual: bool,
}

impl SignalObservation {
    pub fn brier(&self) -> f64 {
        brier(self.probability, self.actual)
    }
}

/// Appended per-source accuracy row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalAccuracy {
    pub id: Uuid,
    pub source: SignalSource,
    pub scope: String,
    pub computed_on: NaiveDate,
    pub computed_at: DateTime<Utc>,
    pub sample_count: usize,
    /// Mean Brier over the window, `None` without samples
    pub mean_brier: Option<f64>,
    pub weight: f64,
    pub shrinkage: f64,
}

/// Normalized ensemble weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub weights: BTreeMap<SignalSource, f64>,
    pub shrinkage: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self::equal()
    }
}

impl SignalWeights {
    /// 1/n per source
    pub fn equal() -> Self {
        let share = 1.0 / SignalSource::ALL.len() as f64;
        Self {
            weights: SignalSource::ALL.iter().map(|s| (*s, share)).collect(),
            shrinkage: 0.0,
        }
    }

    /// Rebuild from the latest accuracy rows, falling back to equal weights
    pub fn from_accuracy(rows: &[SignalAccuracy]) -> Self {
        let mut weights = Self::equal();
        let mut found = false;
        for row in rows {
            weights.weights.insert(row.source, row.weight);
            weights.shrinkage = row.shrinkage;
            found = true;
        }
        if !found {
            return Self::equal();
        }
        weights
    }

    pub fn weight(&self, source: SignalSource) -> f64 {
        self.weights.get(&source).copied().unwrap_or(0.0)
    }

    /// Weighted mean of the available estimates, renormalized over the
    /// sources present. `None` when no source has an estimate.
    pub fn blend(&self, estimates: &[(SignalSource, Option<f64>)]) -> Option<f64> {
        let mut total_weight = 0.0;
        let mut sum = 0.0;
        for (source, estimate) in estimates {
            if let Some(p) = estimate.filter(|p| p.is_finite()) {
                let w = self.weight(*source);
                total_weight += w;
                sum += w * p.clamp(0.0, 1.0);
            }
        }
        if total_weight > 0.0 {
            Some(sum / total_weight)
        } else {
            // All present sources carry zero weight
            let present: Vec<f64> = estimates
                .iter()
                .filter_map(|(_, p)| p.filter(|p| p.is_finite()))
                .collect();
            (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

/// Derives ensemble weights from resolved signal observations
#[derive(Debug, Clone)]
pub struct SignalWeightEngine {
    config: SignalConfig,
}

impl SignalWeightEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SignalConfig::default())
    }

    /// Weights plus one accuracy row per source
    pub fn compute(
        &self,
        observations: &[SignalObservation],
        today: NaiveDate,
    ) -> (SignalWeights, Vec<SignalAccuracy>) {
        let window_start = today - Duration::days(self.config.window_days.max(0));

        let mut briers: BTreeMap<SignalSource, Vec<f64>> =
            SignalSource::ALL.iter().map(|s| (*s, Vec::new())).collect();
        for obs in observations {
            if obs.observed_on < window_start || obs.observed_on > today {
                continue;
            }
            if !obs.probability.is_finite() {
                continue;
            }
            if let Some(scores) = briers.get_mut(&obs.source) {
                scores.push(obs.brier());
            }
        }

        let n = SignalSource::ALL.len() as f64;
        let epsilon = self.config.epsilon.max(f64::MIN_POSITIVE);

        let raw: BTreeMap<SignalSource, f64> = briers
            .iter()
            .map(|(source, scores)| {
                let mean = if scores.is_empty() {
                    UNINFORMED_BRIER
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                };
                (*source, 1.0 / (mean + epsilon))
            })
            .collect();
        let raw_total: f64 = raw.values().sum();

        let min_samples = briers.values().map(Vec::len).min().unwrap_or(0);
        let shrinkage = if self.config.target_sample_size == 0 {
            1.0
        } else {
            (min_samples as f64 / self.config.target_sample_size as f64).min(1.0)
        };

        let mut blended: BTreeMap<SignalSource, f64> = raw
            .iter()
            .map(|(source, w)| {
                let data = w / raw_total;
                (*source, shrinkage * data + (1.0 - shrinkage) / n)
            })
            .collect();
        let total: f64 = blended.values().sum();
        for w in blended.values_mut() {
            *w /= total;
        }

        let computed_at = Utc::now();
        let rows = briers
            .iter()
            .map(|(source, scores)| SignalAccuracy {
                id: Uuid::new_v4(),
                source: *source,
                scope: GLOBAL_SCOPE.to_string(),
                computed_on: today,
                computed_at,
                sample_count: scores.len(),
                mean_brier: (!scores.is_empty())
                    .then(|| scores.iter().sum::<f64>() / scores.len() as f64),
                weight: blended.get(source).copied().unwrap_or(0.0),
                shrinkage,
            })
            .collect();

        (
            SignalWeights {
                weights: blended,
                shrinkage,
            },
            rows,
        )
    }
}
