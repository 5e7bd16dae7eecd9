//! Fingerprint, change and strategy types

use crate::context::RiskLevel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Milestone counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub waived: usize,
}

impl MilestoneCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed + self.waived
    }
}

/// Bucketed, human-readable view of a snapshot. The fingerprint hash is a
/// pure function of this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSummary {
    /// Deal price, floored to the price band
    pub deal_price: Decimal,
    /// Current price, floored to the price band
    pub current_price: Decimal,
    /// Gross spread (bps), floored to the spread band
    pub spread_bps: Option<Decimal>,
    /// Implied probability (pp), floored to the probability band
    pub implied_probability_pp: Option<f64>,
    /// Analyst probability (pp), floored to the probability band
    pub analyst_probability_pp: Option<f64>,
    pub milestones: MilestoneCounts,
    /// Lowercased factor name to level
    pub risk_factors: BTreeMap<String, RiskLevel>,
    pub halted: Option<bool>,
    pub has_outcome: bool,
}

/// Content-addressable digest of a deal's observable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex-encoded blake3 digest
    pub hash: String,
    pub summary: FingerprintSummary,
}

/// How much a deal's state moved since the last assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSignificance {
    NoChange,
    Minor,
    Moderate,
    Major,
}

impl ChangeSignificance {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSignificance::NoChange => "no_change",
            ChangeSignificance::Minor => "minor",
            ChangeSignificance::Moderate => "moderate",
            ChangeSignificance::Major => "major",
        }
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub significance: ChangeSignificance,
    /// One line per detector that fired
    pub changes: Vec<String>,
}

impl ChangeReport {
    pub fn unchanged() -> Self {
        Self {
            significance: ChangeSignificance::NoChange,
            changes: vec![],
        }
    }

    /// Record a detector result. The level only ever rises.
    pub fn raise(&mut self, level: ChangeSignificance, description: impl Into<String>) {
        self.significance = self.significance.max(level);
        self.changes.push(description.into());
    }
}

/// Assessment strategy, in increasing cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Carry yesterday's judgment forward, no reasoner call
    Reuse,
    /// Ask the reasoner to update the prior judgment from changed facts
    Delta,
    /// Ask the reasoner for a fresh judgment from the full context
    Full,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Reuse => "reuse",
            Strategy::Delta => "delta",
            Strategy::Full => "full",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
