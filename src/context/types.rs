//! Per-deal context snapshot types

use crate::config::FeatureFlags;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Deal price and last traded target price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFigures {
    /// Per-share consideration offered by the acquirer
    pub deal_price: Decimal,
    /// Current target share price
    pub current_price: Decimal,
}

impl MarketFigures {
    pub fn new(deal_price: Decimal, current_price: Decimal) -> Self {
        Self {
            deal_price,
            current_price,
        }
    }

    /// Gross spread in basis points, `None` when the current price is not positive
    pub fn spread_bps(&self) -> Option<Decimal> {
        if self.current_price <= Decimal::ZERO {
            return None;
        }
        Some((self.deal_price - self.current_price) / self.current_price * dec!(10000))
    }
}

/// Qualitative severity of a risk factor, also used as a risk grade
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// A named risk factor with its current level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub level: RiskLevel,
    #[serde(default)]
    pub note: Option<String>,
}

/// Milestone status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Waived,
}

impl MilestoneStatus {
    /// Completed, failed and waived milestones never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MilestoneStatus::Completed | MilestoneStatus::Failed | MilestoneStatus::Waived
        )
    }

    /// Whether the milestone no longer stands in the way of closing
    pub fn is_satisfied(&self) -> bool {
        matches!(self, MilestoneStatus::Completed | MilestoneStatus::Waived)
    }
}

/// A deal milestone (regulatory clearance, shareholder vote, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Stable identifier that predictions link against
    pub id: String,
    /// Milestone category, e.g. `regulatory_clearance`
    pub kind: String,
    pub status: MilestoneStatus,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub actual_date: Option<NaiveDate>,
}

/// Listed options summary for the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsData {
    pub implied_volatility: f64,
    #[serde(default)]
    pub put_call_ratio: Option<f64>,
}

/// How a deal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    ClosedAtDeal,
    ClosedHigher,
    ClosedLower,
    Terminated,
    Withdrawn,
}

impl OutcomeKind {
    /// Closed at or above the originally announced terms
    pub fn is_completion(&self) -> bool {
        matches!(self, OutcomeKind::ClosedAtDeal | OutcomeKind::ClosedHigher)
    }
}

/// Terminal deal outcome record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealOutcome {
    pub kind: OutcomeKind,
    pub observed_on: NaiveDate,
    #[serde(default)]
    pub final_price: Option<Decimal>,
}

/// Everything the core knows about one deal on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Target ticker
    pub deal: String,
    pub as_of: NaiveDate,
    pub market: MarketFigures,
    /// Market-implied probability of completion, 0.0 to 1.0
    #[serde(default)]
    pub implied_probability: Option<f64>,
    /// External analyst probability of completion, 0.0 to 1.0
    #[serde(default)]
    pub analyst_probability: Option<f64>,
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub options: Option<OptionsData>,
    /// Trading halt in effect, `None` when halt data was not collected
    #[serde(default)]
    pub halted: Option<bool>,
    #[serde(default)]
    pub outcome: Option<DealOutcome>,
    /// Sections a collector could not supply
    #[serde(default)]
    pub unavailable_sections: Vec<String>,
}

impl ContextSnapshot {
    /// Minimal snapshot with market figures only
    pub fn new(deal: impl Into<String>, as_of: NaiveDate, market: MarketFigures) -> Self {
        Self {
            deal: deal.into(),
            as_of,
            market,
            implied_probability: None,
            analyst_probability: None,
            risk_factors: vec![],
            milestones: vec![],
            options: None,
            halted: None,
            outcome: None,
            unavailable_sections: vec![],
        }
    }

    /// Strip sections turned off in configuration
    pub fn apply_features(&mut self, flags: &FeatureFlags) {
        if !flags.options_data {
            self.options = None;
        }
        if !flags.halts {
            self.halted = None;
        }
        if !flags.analyst_estimates {
            self.analyst_probability = None;
        }
        if !flags.risk_factors {
            self.risk_factors.clear();
        }
        if !flags.milestones {
            self.milestones.clear();
        }
    }

    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }
}
