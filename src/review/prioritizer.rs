//! Human review queue
//!
//! Each trigger contributes a capped score; a deal's priority is the sum.
//! Read-only over assessments and predictions.

use crate::assessment::Assessment;
use crate::config::ReviewConfig;
use crate::context::MilestoneStatus;
use crate::predictions::Prediction;
use crate::scoring::SignalSource;
use crate::store::{AssessmentStore, Store, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Points per grade step on a swing
const GRADE_STEP_SCORE: f64 = 10.0;

/// Why a deal was queued, with the points it contributed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum ReviewTrigger {
    /// Reasoner disagrees with another signal
    Divergence {
        against: SignalSource,
        gap: f64,
        score: f64,
    },
    /// Probability or grade moved since the prior assessment
    Swing {
        probability_delta: Option<f64>,
        grade_steps: u32,
        score: f64,
    },
    /// Recent scored predictions for the deal did badly
    PoorPredictions {
        mean_brier: f64,
        count: usize,
        score: f64,
    },
    /// A high-impact milestone completed since the prior assessment
    MilestoneCompleted {
        milestone_id: String,
        kind: String,
        score: f64,
    },
}

impl ReviewTrigger {
    pub fn score(&self) -> f64 {
        match self {
            ReviewTrigger::Divergence { score, .. }
            | ReviewTrigger::Swing { score, .. }
            | ReviewTrigger::PoorPredictions { score, .. }
            | ReviewTrigger::MilestoneCompleted { score, .. } => *score,
        }
    }
}

/// One entry in the review queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub deal: String,
    pub date: NaiveDate,
    pub assessment_id: Uuid,
    pub score: f64,
    pub triggers: Vec<ReviewTrigger>,
}

/// What the prioritizer looks at for one deal
#[derive(Debug, Clone, Copy)]
pub struct ReviewInput<'a> {
    pub assessment: &'a Assessment,
    pub prior: Option<&'a Assessment>,
    /// All predictions for the deal; only scored ones are used
    pub predictions: &'a [Prediction],
}

/// Ranks assessed deals for human attention
#[derive(Debug, Clone)]
pub struct ReviewPrioritizer {
    config: ReviewConfig,
}

impl ReviewPrioritizer {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReviewConfig::default())
    }

    /// Queue for all deals assessed on `date`
    pub async fn queue_for(
        &self,
        store: &dyn Store,
        date: NaiveDate,
    ) -> Result<Vec<ReviewItem>, StoreError> {
        let assessments = store.assessments_on(date).await?;
        let mut priors = Vec::with_capacity(assessments.len());
        let mut predictions = Vec::with_capacity(assessments.len());
        for assessment in &assessments {
            priors.push(
                store
                    .latest_assessment_before(&assessment.deal, date)
                    .await?,
            );
            predictions.push(store.predictions_for(&assessment.deal).await?);
        }

        let inputs: Vec<ReviewInput<'_>> = assessments
            .iter()
            .zip(&priors)
            .zip(&predictions)
            .map(|((assessment, prior), predictions)| ReviewInput {
                assessment,
                prior: prior.as_ref(),
                predictions,
            })
            .collect();
        Ok(self.prioritize(&inputs))
    }

    /// Score every input and rank: highest score first, ties by deal.
    /// Deals with no trigger are left out.
    pub fn prioritize(&self, inputs: &[ReviewInput<'_>]) -> Vec<ReviewItem> {
        let mut queue: Vec<ReviewItem> = inputs
            .iter()
            .filter_map(|input| self.score(input))
            .collect();

        queue.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.deal.cmp(&b.deal))
        });

        if let Some(top) = queue.first() {
            tracing::debug!(queued = queue.len(), top = %top.deal, score = top.score, "Review queue built");
        }
        queue
    }

    fn score(&self, input: &ReviewInput<'_>) -> Option<ReviewItem> {
        let assessment = input.assessment;
        let mut triggers = Vec::new();

        if let Some(t) = self.divergence(assessment) {
            triggers.push(t);
        }
        if let Some(t) = input.prior.and_then(|prior| self.swing(prior, assessment)) {
            triggers.push(t);
        }
        if let Some(t) = self.poor_predictions(input.predictions) {
            triggers.push(t);
        }
        triggers.extend(self.completed_milestones(input.prior, assessment));

        if triggers.is_empty() {
            return None;
        }
        Some(ReviewItem {
            deal: assessment.deal.clone(),
            date: assessment.date,
            assessment_id: assessment.id,
            score: triggers.iter().map(ReviewTrigger::score).sum(),
            triggers,
        })
    }

    fn divergence(&self, assessment: &Assessment) -> Option<ReviewTrigger> {
        let p = &assessment.probabilities;
        let reasoner = p.reasoner?;

        let (against, gap) = [
            (SignalSource::MarketImplied, p.market_implied),
            (SignalSource::Analyst, p.analyst),
        ]
        .into_iter()
        .filter_map(|(source, other)| other.map(|o| (source, (reasoner - o).abs())))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;

        (gap > self.config.divergence_threshold).then(|| ReviewTrigger::Divergence {
            against,
            gap,
            score: (gap * 100.0).min(self.config.divergence_cap),
        })
    }

    fn swing(&self, prior: &Assessment, current: &Assessment) -> Option<ReviewTrigger> {
        let delta = match (prior.probabilities.reasoner, current.probabilities.reasoner) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        };
        let grade_steps = (current.judgment.overall_grade as i32
            - prior.judgment.overall_grade as i32)
            .unsigned_abs();

        let swung = delta.is_some_and(|d| d.abs() >= self.config.swing_threshold);
        if !swung && grade_steps == 0 {
            return None;
        }

        let points = delta.map_or(0.0, |d| d.abs() * 100.0) + grade_steps as f64 * GRADE_STEP_SCORE;
        Some(ReviewTrigger::Swing {
            probability_delta: delta,
            grade_steps,
            score: points.min(self.config.swing_cap),
        })
    }

    fn poor_predictions(&self, predictions: &[Prediction]) -> Option<ReviewTrigger> {
        let mut scored: Vec<(NaiveDate, f64)> = predictions
            .iter()
            .filter_map(|p| {
                let r = p.resolution.as_ref()?;
                Some((r.resolved_on, r.brier?))
            })
            .collect();
        if scored.is_empty() {
            return None;
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.config.recent_predictions.max(1));

        let count = scored.len();
        let mean_brier = scored.iter().map(|(_, b)| b).sum::<f64>() / count as f64;
        (mean_brier > self.config.poor_brier_threshold).then(|| ReviewTrigger::PoorPredictions {
            mean_brier,
            count,
            score: ((mean_brier - self.config.poor_brier_threshold) * 100.0)
                .min(self.config.poor_prediction_cap),
        })
    }

    fn completed_milestones(
        &self,
        prior: Option<&Assessment>,
        current: &Assessment,
    ) -> Vec<ReviewTrigger> {
        current
            .milestones
            .iter()
            .filter(|m| m.status == MilestoneStatus::Completed)
            .filter(|m| self.config.high_impact_milestones.contains(&m.kind))
            .filter(|m| {
                // Already completed at the prior assessment is not news
                let before = prior.and_then(|p| p.milestones.iter().find(|pm| pm.id == m.id));
                !before.is_some_and(|pm| pm.status == MilestoneStatus::Completed)
            })
            .map(|m| ReviewTrigger::MilestoneCompleted {
                milestone_id: m.id.clone(),
                kind: m.kind.clone(),
                score: self.config.milestone_score,
            })
            .collect()
    }
}
