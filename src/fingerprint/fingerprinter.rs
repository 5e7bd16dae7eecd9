//! Context fingerprinting
//!
//! Reduces a snapshot to a fixed, ordered list of `(field, bucket)` pairs and
//! hashes their canonical encoding. Values that stay inside their tolerance
//! band never move the hash, so market noise does not invalidate the cache.

use super::bucket::{bucket_decimal, bucket_probability_pp};
use super::types::{Fingerprint, FingerprintSummary, MilestoneCounts};
use crate::config::FingerprintConfig;
use crate::context::{ContextSnapshot, MilestoneStatus};
use std::collections::BTreeMap;

/// Bump when the canonical encoding changes
pub const FINGERPRINT_VERSION: &str = "DAFP_V1";

/// Computes fingerprints for context snapshots
#[derive(Debug, Clone)]
pub struct ContextFingerprinter {
    config: FingerprintConfig,
}

impl ContextFingerprinter {
    pub fn new(config: FingerprintConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FingerprintConfig::default())
    }

    /// Bucket a snapshot. Pure function of its input.
    pub fn summarize(&self, snapshot: &ContextSnapshot) -> FingerprintSummary {
        let band = self.config.probability_band_pp;

        let mut milestones = MilestoneCounts::default();
        for m in &snapshot.milestones {
            match m.status {
                MilestoneStatus::Pending => milestones.pending += 1,
                MilestoneStatus::InProgress => milestones.in_progress += 1,
                MilestoneStatus::Completed => milestones.completed += 1,
                MilestoneStatus::Failed => milestones.failed += 1,
                MilestoneStatus::Waived => milestones.waived += 1,
            }
        }

        let mut risk_factors = BTreeMap::new();
        for factor in &snapshot.risk_factors {
            let name = factor.name.trim().to_lowercase();
            // Duplicate names keep the most severe level
            let level = risk_factors.entry(name).or_insert(factor.level);
            *level = (*level).max(factor.level);
        }

        FingerprintSummary {
            deal_price: bucket_decimal(snapshot.market.deal_price, self.config.price_tolerance),
            current_price: bucket_decimal(
                snapshot.market.current_price,
                self.config.price_tolerance,
            ),
            spread_bps: snapshot
                .market
                .spread_bps()
                .map(|s| bucket_decimal(s, self.config.spread_tolerance_bps)),
            implied_probability_pp: snapshot
                .implied_probability
                .and_then(|p| bucket_probability_pp(p, band)),
            analyst_probability_pp: snapshot
                .analyst_probability
                .and_then(|p| bucket_probability_pp(p, band)),
            milestones,
            risk_factors,
            halted: snapshot.halted,
            has_outcome: snapshot.outcome.is_some(),
        }
    }

    /// Fingerprint a snapshot
    pub fn fingerprint(&self, snapshot: &ContextSnapshot) -> Fingerprint {
        let summary = self.summarize(snapshot);
        let hash = hash_summary(&summary);
        Fingerprint { hash, summary }
    }
}

/// Fixed-order canonical pairs for a summary
fn canonical_pairs(summary: &FingerprintSummary) -> Vec<(String, String)> {
    fn opt<T: ToString>(value: &Option<T>) -> String {
        value.as_ref().map_or_else(|| "-".to_string(), T::to_string)
    }
    fn pp(value: Option<f64>) -> String {
        value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
    }

    let m = &summary.milestones;
    let mut pairs = vec![
        ("deal_price".to_string(), summary.deal_price.to_string()),
        ("current_price".to_string(), summary.current_price.to_string()),
        ("spread_bps".to_string(), opt(&summary.spread_bps)),
        ("implied_pp".to_string(), pp(summary.implied_probability_pp)),
        ("analyst_pp".to_string(), pp(summary.analyst_probability_pp)),
        ("ms.pending".to_string(), m.pending.to_string()),
        ("ms.in_progress".to_string(), m.in_progress.to_string()),
        ("ms.completed".to_string(), m.completed.to_string()),
        ("ms.failed".to_string(), m.failed.to_string()),
        ("ms.waived".to_string(), m.waived.to_string()),
        ("halted".to_string(), opt(&summary.halted)),
        ("outcome".to_string(), summary.has_outcome.to_string()),
    ];
    // BTreeMap iteration is already sorted by name
    for (name, level) in &summary.risk_factors {
        pairs.push((format!("risk.{name}"), level.as_str().to_string()));
    }
    pairs
}

/// Hex blake3 digest of the canonical encoding
pub fn hash_summary(summary: &FingerprintSummary) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(FINGERPRINT_VERSION.as_bytes());
    for (field, value) in canonical_pairs(summary) {
        hasher.update(b"|");
        hasher.update(field.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
