//! Shared unit-test fixtures

use crate::assessment::{Assessment, ProbabilityEstimates, RiskJudgment};
use crate::context::{ContextSnapshot, MarketFigures, Milestone, MilestoneStatus, RiskLevel};
use crate::fingerprint::{ChangeSignificance, ContextFingerprinter, Strategy};
use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use uuid::Uuid;

pub(crate) fn snapshot_fixture(deal: &str, date: NaiveDate) -> ContextSnapshot {
    let mut snapshot = ContextSnapshot::new(deal, date, MarketFigures::new(dec!(50), dec!(48.6)));
    snapshot.implied_probability = Some(0.92);
    snapshot.milestones = vec![Milestone {
        id: "hsr".to_string(),
        kind: "regulatory_clearance".to_string(),
        status: MilestoneStatus::Pending,
        expected_date: None,
        actual_date: None,
    }];
    snapshot
}

pub(crate) fn assessment_fixture(deal: &str, date: NaiveDate) -> Assessment {
    let snapshot = snapshot_fixture(deal, date);
    Assessment {
        id: Uuid::new_v4(),
        deal: deal.to_string(),
        date,
        strategy: Strategy::Full,
        escalated: false,
        significance: ChangeSignificance::Major,
        fingerprint: ContextFingerprinter::with_defaults().fingerprint(&snapshot),
        judgment: RiskJudgment {
            overall_grade: RiskLevel::Medium,
            factor_grades: BTreeMap::from([("antitrust".to_string(), RiskLevel::Medium)]),
            summary: "Second request likely".to_string(),
            expected_close_date: None,
        },
        probabilities: ProbabilityEstimates {
            reasoner: Some(0.85),
            analyst: None,
            market_implied: Some(0.92),
            blended: Some(0.885),
        },
        market: snapshot.market.clone(),
        milestones: snapshot.milestones.clone(),
        changes: vec!["no prior assessment".to_string()],
        raw_response: None,
        reused_from: None,
        created_at: Utc::now(),
    }
}
