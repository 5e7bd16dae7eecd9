//! Reasoner request/response contract

use crate::assessment::RiskJudgment;
use crate::context::{ContextSnapshot, RiskLevel};
use crate::fingerprint::FingerprintSummary;
use crate::predictions::{
    Confidence, NewPrediction, Prediction, PredictionError, PredictionKind, PredictionType,
    PredictionUpdate, SpreadDirection,
};
use crate::scoring::{CalibrationBrief, SignalSource};
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Which kind of reasoning pass is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentMode {
    /// Update the prior judgment from the listed changes
    Delta,
    /// Fresh judgment from the full context
    Full,
}

/// Yesterday's opinion, sent with delta requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorJudgment {
    pub date: NaiveDate,
    pub judgment: RiskJudgment,
    pub deal_close_probability: Option<f64>,
}

/// Open prediction as shown to the reasoner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBrief {
    pub prediction_type: PredictionType,
    pub claim: String,
    pub probability: f64,
    pub deadline: Option<NaiveDate>,
    pub created_on: NaiveDate,
}

impl From<&Prediction> for PredictionBrief {
    fn from(p: &Prediction) -> Self {
        Self {
            prediction_type: p.prediction_type(),
            claim: p.claim.clone(),
            probability: p.probability,
            deadline: p.deadline,
            created_on: p.created_on,
        }
    }
}

/// Track record fed back into each request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDigest {
    pub open_predictions: Vec<PredictionBrief>,
    pub calibration: Option<CalibrationBrief>,
    pub signal_weights: BTreeMap<SignalSource, f64>,
}

/// One reasoning request
#[derive(Debug, Clone, Serialize)]
pub struct ReasonerRequest {
    pub deal: String,
    pub date: NaiveDate,
    pub mode: AssessmentMode,
    pub summary: FingerprintSummary,
    /// Full snapshot, sent with full requests only
    pub context: Option<ContextSnapshot>,
    pub changes: Vec<String>,
    pub prior: Option<PriorJudgment>,
    pub feedback: FeedbackDigest,
}

/// New prediction as emitted by the reasoner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PredictionDraft {
    pub prediction_type: PredictionType,
    pub claim: String,
    /// 0.0 to 1.0
    pub probability: f64,
    pub confidence: Confidence,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Required for `milestone_completion`
    #[serde(default)]
    pub milestone_id: Option<String>,
    /// Required for `spread_direction`
    #[serde(default)]
    pub direction: Option<SpreadDirection>,
    /// Expected price if the deal breaks, for `break_price`
    #[serde(default)]
    pub break_price: Option<f64>,
    /// Required for `next_event`
    #[serde(default)]
    pub event: Option<String>,
}

impl PredictionDraft {
    /// Registry input for this draft. `spread_bps` is today's gross spread,
    /// recorded on spread-direction claims.
    pub fn to_new_prediction(
        &self,
        deal: &str,
        assessment_id: Option<Uuid>,
        spread_bps: Option<Decimal>,
    ) -> Result<NewPrediction, PredictionError> {
        let kind = match self.prediction_type {
            PredictionType::DealCloses => PredictionKind::DealCloses,
            PredictionType::MilestoneCompletion => PredictionKind::MilestoneCompletion {
                milestone_id: self.milestone_id.clone().unwrap_or_default(),
            },
            PredictionType::SpreadDirection => PredictionKind::SpreadDirection {
                direction: self.direction.ok_or_else(|| PredictionError::Invalid {
                    deal: deal.to_string(),
                    reason: "spread prediction without direction".to_string(),
                })?,
                spread_at_submission_bps: spread_bps,
            },
            PredictionType::BreakPrice => PredictionKind::BreakPrice {
                price: self.break_price.and_then(Decimal::from_f64),
            },
            PredictionType::NextEvent => PredictionKind::NextEvent {
                event: self.event.clone().unwrap_or_default(),
            },
        };

        Ok(NewPrediction {
            deal: deal.to_string(),
            assessment_id,
            kind,
            claim: self.claim.clone(),
            deadline: self.deadline,
            probability: self.probability,
            confidence: self.confidence,
            evidence: self.evidence.clone(),
        })
    }
}

/// Structured judgment. Unknown top-level fields are rejected; prediction
/// items are checked one by one so a bad item only drops itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReasonerResponse {
    pub overall_grade: RiskLevel,
    #[serde(default)]
    pub factor_grades: BTreeMap<String, RiskLevel>,
    /// Probability the deal closes on current terms, 0.0 to 1.0
    pub deal_close_probability: f64,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    pub summary: String,
    #[serde(default)]
    #[schemars(with = "Vec<PredictionDraft>")]
    pub predictions: Vec<serde_json::Value>,
    #[serde(default)]
    #[schemars(with = "Vec<PredictionUpdate>")]
    pub prediction_updates: Vec<serde_json::Value>,
}

impl ReasonerResponse {
    pub fn judgment(&self) -> RiskJudgment {
        RiskJudgment {
            overall_grade: self.overall_grade,
            factor_grades: self.factor_grades.clone(),
            summary: self.summary.clone(),
            expected_close_date: self.expected_close_date,
        }
    }

    /// Emitted predictions, each parsed on its own
    pub fn prediction_drafts(&self) -> Vec<Result<PredictionDraft, serde_json::Error>> {
        self.predictions
            .iter()
            .map(PredictionDraft::deserialize)
            .collect()
    }

    /// Emitted revisions, each parsed on its own
    pub fn updates(&self) -> Vec<Result<PredictionUpdate, serde_json::Error>> {
        self.prediction_updates
            .iter()
            .map(PredictionUpdate::deserialize)
            .collect()
    }
}

/// Parsed response plus the text it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonerReply {
    pub response: ReasonerResponse,
    pub raw: String,
}

/// Reasoner errors
#[derive(Debug, Error)]
pub enum ReasonerError {
    /// Output did not parse or failed validation
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Reasoner timed out")]
    Timeout,
    #[error("API request failed: {0}")]
    Api(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
}

impl ReasonerError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ReasonerError::Malformed(_))
    }
}

/// Semantic checks the schema cannot express
pub fn validate_response(response: &ReasonerResponse) -> Result<(), ReasonerError> {
    if !response.deal_close_probability.is_finite()
        || !(0.0..=1.0).contains(&response.deal_close_probability)
    {
        return Err(ReasonerError::Malformed(
            "deal_close_probability must be in [0,1]".into(),
        ));
    }
    if response.summary.trim().is_empty() {
        return Err(ReasonerError::Malformed("summary is empty".into()));
    }
    Ok(())
}

/// Parse the JSON object out of reasoner text output and validate it
pub fn parse_response(text: &str) -> Result<ReasonerResponse, ReasonerError> {
    let start = text
        .find('{')
        .ok_or_else(|| ReasonerError::Malformed("no JSON object in output".into()))?;
    let end = text
        .rfind('}')
        .map(|i| i + 1)
        .filter(|end| *end > start)
        .ok_or_else(|| ReasonerError::Malformed("unterminated JSON object".into()))?;

    let response: ReasonerResponse = serde_json::from_str(&text[start..end])
        .map_err(|e| ReasonerError::Malformed(e.to_string()))?;
    validate_response(&response)?;
    Ok(response)
}
