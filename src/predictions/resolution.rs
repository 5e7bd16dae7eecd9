//! Automatic resolution of open predictions
//!
//! After each batch the engine walks every open prediction and checks it
//! against the facts observed during the batch. Event-linked rules
//! (milestone, outcome, spread) take precedence over deadline expiry.

use super::types::{
    Prediction, PredictionId, PredictionKind, PredictionStatus, Resolution, ResolutionSource,
    SpreadDirection,
};
use super::PredictionError;
use crate::config::ResolutionConfig;
use crate::context::{ContextSnapshot, DealOutcome, Milestone};
use crate::store::{PredictionStore, Store, StoreError};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Facts gathered while assessing the batch
#[derive(Debug, Clone, Default)]
pub struct ResolutionFacts {
    pub milestones: HashMap<String, Vec<Milestone>>,
    pub outcomes: HashMap<String, DealOutcome>,
    pub spreads_bps: HashMap<String, Decimal>,
}

impl ResolutionFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what a snapshot says about its deal
    pub fn observe(&mut self, snapshot: &ContextSnapshot) {
        let deal = snapshot.deal.clone();
        self.milestones.insert(deal.clone(), snapshot.milestones.clone());
        if let Some(spread) = snapshot.market.spread_bps() {
            self.spreads_bps.insert(deal.clone(), spread);
        }
        if let Some(outcome) = &snapshot.outcome {
            self.outcomes.insert(deal, outcome.clone());
        }
    }

    /// Merge outcomes logged on earlier runs
    pub fn with_outcomes(
        mut self,
        outcomes: impl IntoIterator<Item = (String, DealOutcome)>,
    ) -> Self {
        for (deal, outcome) in outcomes {
            self.outcomes.entry(deal).or_insert(outcome);
        }
        self
    }

    fn milestone(&self, deal: &str, id: &str) -> Option<&Milestone> {
        self.milestones
            .get(deal)
            .and_then(|ms| ms.iter().find(|m| m.id == id))
    }
}

/// What a rule decided for one prediction
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Scored {
        actual: bool,
        source: ResolutionSource,
        observed_value: Option<Decimal>,
    },
    Expired {
        source: ResolutionSource,
    },
}

/// Counts from one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub examined: usize,
    /// Scored resolutions by trigger
    pub resolved: BTreeMap<ResolutionSource, usize>,
    /// Unscored expiries by trigger
    pub expired: BTreeMap<ResolutionSource, usize>,
    /// Rows that were no longer open when written
    pub conflicts: usize,
    pub resolved_ids: Vec<PredictionId>,
}

impl ResolutionReport {
    pub fn total_resolved(&self) -> usize {
        self.resolved.values().sum()
    }

    pub fn total_expired(&self) -> usize {
        self.expired.values().sum()
    }

    /// Scored and expired transitions per trigger
    pub fn by_trigger(&self) -> BTreeMap<ResolutionSource, usize> {
        let mut counts = self.resolved.clone();
        for (source, n) in &self.expired {
            *counts.entry(*source).or_default() += n;
        }
        counts
    }
}

/// Closes predictions against observed facts
pub struct ResolutionEngine {
    config: ResolutionConfig,
    store: Arc<dyn Store>,
}

impl ResolutionEngine {
    pub fn new(config: ResolutionConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    /// Decide one prediction. Pure; `None` leaves it open.
    pub fn evaluate(
        &self,
        prediction: &Prediction,
        facts: &ResolutionFacts,
        today: NaiveDate,
    ) -> Option<Verdict> {
        let deal = prediction.deal.as_str();

        match &prediction.kind {
            PredictionKind::MilestoneCompletion { milestone_id } => {
                if let Some(milestone) = facts.milestone(deal, milestone_id) {
                    if milestone.status.is_terminal() {
                        return Some(Verdict::Scored {
                            actual: milestone.status.is_satisfied(),
                            source: ResolutionSource::Milestone,
                            observed_value: None,
                        });
                    }
                }
            }
            PredictionKind::DealCloses | PredictionKind::BreakPrice { .. } => {
                if let Some(outcome) = facts.outcomes.get(deal) {
                    return Some(Verdict::Scored {
                        actual: outcome.kind.is_completion(),
                        source: ResolutionSource::Outcome,
                        observed_value: outcome.final_price,
                    });
                }
            }
            PredictionKind::SpreadDirection {
                direction,
                spread_at_submission_bps,
            } => {
                return self.evaluate_spread(
                    prediction,
                    *direction,
                    *spread_at_submission_bps,
                    facts.spreads_bps.get(deal).copied(),
                    today,
                );
            }
            PredictionKind::NextEvent { .. } => {}
        }

        if !prediction.is_overdue(today) {
            return None;
        }
        match prediction.kind {
            PredictionKind::NextEvent { .. } => Some(Verdict::Expired {
                source: ResolutionSource::DeadlineExpiry,
            }),
            _ => Some(Verdict::Scored {
                actual: false,
                source: ResolutionSource::DeadlineExpiry,
                observed_value: None,
            }),
        }
    }

    fn evaluate_spread(
        &self,
        prediction: &Prediction,
        predicted: SpreadDirection,
        at_submission: Option<Decimal>,
        current: Option<Decimal>,
        today: NaiveDate,
    ) -> Option<Verdict> {
        let deadline = prediction.deadline?;
        if today < deadline {
            return None;
        }

        let expired = Verdict::Expired {
            source: ResolutionSource::SpreadDirection,
        };
        let Some(before) = at_submission else {
            // Nothing to compare against
            return Some(expired);
        };
        let Some(now) = current else {
            let grace_end = deadline + Duration::days(self.config.spread_grace_days.max(0));
            return (today > grace_end).then_some(expired);
        };

        let moved = now - before;
        let observed = if moved.abs() < self.config.spread_stable_bps {
            SpreadDirection::Stable
        } else if moved.is_sign_negative() {
            SpreadDirection::Tighter
        } else {
            SpreadDirection::Wider
        };

        Some(Verdict::Scored {
            actual: observed == predicted,
            source: ResolutionSource::SpreadDirection,
            observed_value: Some(now),
        })
    }

    /// Resolve every open prediction the facts allow
    pub async fn run(
        &self,
        facts: &ResolutionFacts,
        today: NaiveDate,
    ) -> Result<ResolutionReport, PredictionError> {
        let open = self.store.open_predictions(None).await?;
        let mut report = ResolutionReport {
            examined: open.len(),
            ..Default::default()
        };

        for prediction in &open {
            let Some(verdict) = self.evaluate(prediction, facts, today) else {
                continue;
            };

            let (result, source, scored) = match verdict {
                Verdict::Scored {
                    actual,
                    source,
                    observed_value,
                } => {
                    let resolution = Resolution::scored(
                        prediction.probability,
                        actual,
                        source,
                        observed_value,
                        today,
                    );
                    let status = PredictionStatus::from_outcome(prediction.probability, actual);
                    (
                        self.store.resolve(prediction.id, status, resolution).await,
                        source,
                        true,
                    )
                }
                Verdict::Expired { source } => (
                    self.store
                        .expire(prediction.id, Resolution::unscored(source, today))
                        .await,
                    source,
                    false,
                ),
            };

            match result {
                Ok(()) => {
                    tracing::info!(
                        deal = %prediction.deal,
                        prediction_type = %prediction.prediction_type(),
                        source = source.as_str(),
                        scored,
                        "Prediction resolved"
                    );
                    metrics::counter!(
                        "dealassess_resolutions_total",
                        "source" => source.as_str(),
                        "scored" => if scored { "true" } else { "false" }
                    )
                    .increment(1);
                    if scored {
                        *report.resolved.entry(source).or_default() += 1;
                    } else {
                        *report.expired.entry(source).or_default() += 1;
                    }
                    report.resolved_ids.push(prediction.id);
                }
                Err(StoreError::Conflict { id, status }) => {
                    tracing::debug!(%id, ?status, "Prediction already closed, skipping");
                    report.conflicts += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(report)
    }
}
