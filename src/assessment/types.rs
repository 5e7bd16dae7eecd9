//! Assessment records and run summaries

use crate::context::{MarketFigures, Milestone, RiskLevel};
use crate::fingerprint::{ChangeSignificance, Fingerprint, Strategy};
use crate::predictions::ResolutionSource;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Structured risk opinion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskJudgment {
    pub overall_grade: RiskLevel,
    /// Factor name to grade
    pub factor_grades: BTreeMap<String, RiskLevel>,
    pub summary: String,
    pub expected_close_date: Option<NaiveDate>,
}

/// Probability-of-close estimates by source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEstimates {
    pub reasoner: Option<f64>,
    pub analyst: Option<f64>,
    pub market_implied: Option<f64>,
    /// Weighted ensemble of the above
    pub blended: Option<f64>,
}

/// One deal's assessment for one day. Keyed by `(deal, date)`, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: Uuid,
    pub deal: String,
    pub date: NaiveDate,
    pub strategy: Strategy,
    /// A Delta attempt fell back to Full
    pub escalated: bool,
    pub significance: ChangeSignificance,
    pub fingerprint: Fingerprint,
    pub judgment: RiskJudgment,
    pub probabilities: ProbabilityEstimates,
    pub market: MarketFigures,
    /// Milestones as observed on `date`
    pub milestones: Vec<Milestone>,
    pub changes: Vec<String>,
    /// Reasoner output as received, for audit
    pub raw_response: Option<String>,
    /// Assessment whose judgment was carried forward
    pub reused_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Assessment {
    /// Carry `prior` forward to `date` with refreshed market data
    pub fn carried_forward(
        prior: &Assessment,
        date: NaiveDate,
        fingerprint: Fingerprint,
        market: MarketFigures,
        milestones: Vec<Milestone>,
        probabilities: ProbabilityEstimates,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            deal: prior.deal.clone(),
            date,
            strategy: Strategy::Reuse,
            escalated: false,
            significance: ChangeSignificance::NoChange,
            fingerprint,
            judgment: prior.judgment.clone(),
            probabilities,
            market,
            milestones,
            changes: vec![],
            raw_response: None,
            reused_from: Some(prior.id),
            created_at: Utc::now(),
        }
    }
}

/// A deal that could not be assessed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealFailure {
    pub deal: String,
    pub error: String,
}

/// Outcome of one orchestrator batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub date: Option<NaiveDate>,
    pub total: usize,
    pub assessed: usize,
    pub failed: usize,
    pub reused: usize,
    pub delta: usize,
    pub full: usize,
    pub escalations: usize,
    pub predictions_submitted: usize,
    pub predictions_rejected: usize,
    pub updates_applied: usize,
    pub resolutions: BTreeMap<ResolutionSource, usize>,
    pub failures: Vec<DealFailure>,
    /// Batch stopped early on the abort flag
    pub aborted: bool,
}

impl RunSummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn record_strategy(&mut self, strategy: Strategy, escalated: bool) {
        self.assessed += 1;
        match strategy {
            Strategy::Reuse => self.reused += 1,
            Strategy::Delta => self.delta += 1,
            Strategy::Full => self.full += 1,
        }
        if escalated {
            self.escalations += 1;
        }
    }

    pub fn record_failure(&mut self, deal: &str, error: impl ToString) {
        self.failed += 1;
        self.failures.push(DealFailure {
            deal: deal.to_string(),
            error: error.to_string(),
        });
    }

    /// Share of assessed deals that skipped the reasoner
    pub fn reuse_rate(&self) -> f64 {
        if self.assessed == 0 {
            return 0.0;
        }
        self.reused as f64 / self.assessed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_summary_counts() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut summary = RunSummary::new(date);
        summary.total = 4;
        summary.record_strategy(Strategy::Reuse, false);
        summary.record_strategy(Strategy::Full, true);
        summary.record_strategy(Strategy::Delta, false);
        summary.record_failure("BAD", "context unavailable");

        assert_eq!(summary.assessed, 3);
        assert_eq!(summary.escalations, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].deal, "BAD");
        assert!((summary.reuse_rate() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_reuse_rate() {
        assert_eq!(RunSummary::default().reuse_rate(), 0.0);
    }
}
