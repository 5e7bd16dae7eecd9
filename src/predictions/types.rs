//! Prediction types

use crate::scoring::{brier, log_score};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prediction identifier
pub type PredictionId = Uuid;

/// Prediction type tag. At most one open prediction per (deal, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    DealCloses,
    MilestoneCompletion,
    SpreadDirection,
    BreakPrice,
    NextEvent,
}

impl PredictionType {
    pub const ALL: [PredictionType; 5] = [
        PredictionType::DealCloses,
        PredictionType::MilestoneCompletion,
        PredictionType::SpreadDirection,
        PredictionType::BreakPrice,
        PredictionType::NextEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::DealCloses => "deal_closes",
            PredictionType::MilestoneCompletion => "milestone_completion",
            PredictionType::SpreadDirection => "spread_direction",
            PredictionType::BreakPrice => "break_price",
            PredictionType::NextEvent => "next_event",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted spread movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpreadDirection {
    Tighter,
    Wider,
    Stable,
}

/// Qualitative confidence attached to a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Type tag plus type-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictionKind {
    DealCloses,
    MilestoneCompletion {
        milestone_id: String,
    },
    SpreadDirection {
        direction: SpreadDirection,
        /// Gross spread when the claim was made
        spread_at_submission_bps: Option<Decimal>,
    },
    BreakPrice {
        price: Option<Decimal>,
    },
    NextEvent {
        event: String,
    },
}

impl PredictionKind {
    pub fn prediction_type(&self) -> PredictionType {
        match self {
            PredictionKind::DealCloses => PredictionType::DealCloses,
            PredictionKind::MilestoneCompletion { .. } => PredictionType::MilestoneCompletion,
            PredictionKind::SpreadDirection { .. } => PredictionType::SpreadDirection,
            PredictionKind::BreakPrice { .. } => PredictionType::BreakPrice,
            PredictionKind::NextEvent { .. } => PredictionType::NextEvent,
        }
    }
}

/// Prediction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Open,
    ResolvedCorrect,
    ResolvedIncorrect,
    ResolvedPartial,
    Superseded,
    Expired,
}

impl PredictionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, PredictionStatus::Open)
    }

    /// Resolved with a score; superseded and expired rows never are
    pub fn is_scored(&self) -> bool {
        matches!(
            self,
            PredictionStatus::ResolvedCorrect
                | PredictionStatus::ResolvedIncorrect
                | PredictionStatus::ResolvedPartial
        )
    }

    /// Status for a scored resolution: the forecast leaned toward what
    /// happened, away from it, or sat exactly on the fence.
    pub fn from_outcome(probability: f64, actual: bool) -> Self {
        if probability == 0.5 {
            return PredictionStatus::ResolvedPartial;
        }
        if (probability > 0.5) == actual {
            PredictionStatus::ResolvedCorrect
        } else {
            PredictionStatus::ResolvedIncorrect
        }
    }
}

/// Which trigger closed a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Milestone,
    Outcome,
    SpreadDirection,
    DeadlineExpiry,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Milestone => "milestone",
            ResolutionSource::Outcome => "outcome",
            ResolutionSource::SpreadDirection => "spread_direction",
            ResolutionSource::DeadlineExpiry => "deadline_expiry",
        }
    }
}

/// Terminal transition of a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Whether the claimed event happened; `None` for unscored expiry
    pub actual: Option<bool>,
    /// Numeric evidence, e.g. the observed spread in bps
    pub observed_value: Option<Decimal>,
    pub source: ResolutionSource,
    pub brier: Option<f64>,
    pub log_score: Option<f64>,
    pub resolved_on: NaiveDate,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    /// Scored resolution; scores are computed here, once
    pub fn scored(
        probability: f64,
        actual: bool,
        source: ResolutionSource,
        observed_value: Option<Decimal>,
        resolved_on: NaiveDate,
    ) -> Self {
        Self {
            actual: Some(actual),
            observed_value,
            source,
            brier: Some(brier(probability, actual)),
            log_score: Some(log_score(probability, actual)),
            resolved_on,
            resolved_at: Utc::now(),
        }
    }

    /// Expiry without a score
    pub fn unscored(source: ResolutionSource, resolved_on: NaiveDate) -> Self {
        Self {
            actual: None,
            observed_value: None,
            source,
            brier: None,
            log_score: None,
            resolved_on,
            resolved_at: Utc::now(),
        }
    }
}

/// A falsifiable, dated, probabilistic claim about one deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub deal: String,
    /// Assessment that emitted the claim
    pub assessment_id: Option<Uuid>,
    pub kind: PredictionKind,
    pub claim: String,
    pub deadline: Option<NaiveDate>,
    /// 0.0 to 1.0
    pub probability: f64,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
    pub status: PredictionStatus,
    pub created_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub superseded_by: Option<PredictionId>,
    pub resolution: Option<Resolution>,
}

impl Prediction {
    pub fn prediction_type(&self) -> PredictionType {
        self.kind.prediction_type()
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Past its deadline as of `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.deadline.is_some_and(|d| d < today)
    }
}

/// Input to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub deal: String,
    pub assessment_id: Option<Uuid>,
    pub kind: PredictionKind,
    pub claim: String,
    pub deadline: Option<NaiveDate>,
    pub probability: f64,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
}

impl NewPrediction {
    pub fn prediction_type(&self) -> PredictionType {
        self.kind.prediction_type()
    }

    /// Materialize as an open prediction created on `today`
    pub fn into_open(self, today: NaiveDate) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            deal: self.deal,
            assessment_id: self.assessment_id,
            kind: self.kind,
            claim: self.claim,
            deadline: self.deadline,
            probability: self.probability,
            confidence: self.confidence,
            evidence: self.evidence,
            status: PredictionStatus::Open,
            created_on: today,
            created_at: Utc::now(),
            superseded_by: None,
            resolution: None,
        }
    }
}

/// Probability revision for the open prediction of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PredictionUpdate {
    pub prediction_type: PredictionType,
    /// Revised probability, 0.0 to 1.0
    pub probability: f64,
    /// Revised deadline, keeps the current one when absent
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Evidence for the revision
    #[serde(default)]
    pub evidence: Vec<String>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn test_kind_serializes_with_tag() {
        let kind = PredictionKind::MilestoneCompletion {
            milestone_id: "hsr".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "milestone_completion");
        assert_eq!(json["milestone_id"], "hsr");

        let back: PredictionKind = serde_json::from_value(json).unwrap();
        assert_eq!(back.prediction_type(), PredictionType::MilestoneCompletion);
    }

    #[test]
    fn test_status_from_outcome() {
        assert_eq!(
            PredictionStatus::from_outcome(0.9, true),
            PredictionStatus::ResolvedCorrect
        );
        assert_eq!(
            PredictionStatus::from_outcome(0.2, false),
            PredictionStatus::ResolvedCorrect
        );
        assert_eq!(
            PredictionStatus::from_outcome(0.8, false),
            PredictionStatus::ResolvedIncorrect
        );
        assert_eq!(
            PredictionStatus::from_outcome(0.5, true),
            PredictionStatus::ResolvedPartial
        );
    }

    #[test]
    fn test_status_scored() {
        assert!(PredictionStatus::ResolvedPartial.is_scored());
        assert!(!PredictionStatus::Superseded.is_scored());
        assert!(!PredictionStatus::Expired.is_scored());
        assert!(!PredictionStatus::Open.is_scored());
    }

    #[test]
    fn test_scored_resolution() {
        let resolution =
            Resolution::scored(0.9, true, ResolutionSource::Milestone, None, day());
        assert_eq!(resolution.actual, Some(true));
        assert!((resolution.brier.unwrap() - 0.01).abs() < 1e-9);
        assert!(resolution.log_score.unwrap() > 0.0);
    }

    #[test]
    fn test_unscored_resolution() {
        let resolution = Resolution::unscored(ResolutionSource::DeadlineExpiry, day());
        assert!(resolution.actual.is_none());
        assert!(resolution.brier.is_none());
    }

    #[test]
    fn test_into_open_and_overdue() {
        let prediction = NewPrediction {
            deal: "ACME".to_string(),
            assessment_id: None,
            kind: PredictionKind::DealCloses,
            claim: "Deal closes by June".to_string(),
            deadline: Some(day()),
            probability: 0.8,
            confidence: Confidence::High,
            evidence: vec!["HSR cleared".to_string()],
        }
        .into_open(day());

        assert!(prediction.is_open());
        assert!(!prediction.is_overdue(day()));
        assert!(prediction.is_overdue(day().succ_opt().unwrap()));
    }
}
