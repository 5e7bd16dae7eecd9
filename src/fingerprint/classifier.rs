//! Change classification between consecutive fingerprint summaries
//!
//! Each detector proposes a level independently; the report keeps the
//! maximum, so a later detector can never lower what an earlier one raised.

use super::types::{ChangeReport, ChangeSignificance, FingerprintSummary};
use crate::config::ClassifierConfig;

/// Compares today's summary to the last assessed one
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    config: ClassifierConfig,
}

impl ChangeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ClassifierConfig::default())
    }

    /// Classify the move from `prior` to `current`. No prior always means Major.
    pub fn classify(
        &self,
        prior: Option<&FingerprintSummary>,
        current: &FingerprintSummary,
    ) -> ChangeReport {
        let mut report = ChangeReport::unchanged();

        let prior = match prior {
            Some(p) => p,
            None => {
                report.raise(ChangeSignificance::Major, "no prior assessment");
                return report;
            }
        };

        if prior == current {
            return report;
        }

        self.detect_terms(prior, current, &mut report);
        self.detect_price(prior, current, &mut report);
        self.detect_spread(prior, current, &mut report);
        self.detect_probability(prior, current, &mut report);
        self.detect_milestones(prior, current, &mut report);
        self.detect_risk_factors(prior, current, &mut report);
        self.detect_status(prior, current, &mut report);

        report
    }

    fn detect_terms(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        if prior.deal_price != current.deal_price {
            report.raise(
                ChangeSignificance::Major,
                format!(
                    "deal price band moved {} -> {}",
                    prior.deal_price, current.deal_price
                ),
            );
        }
    }

    fn detect_price(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        if prior.current_price != current.current_price {
            report.raise(
                ChangeSignificance::Minor,
                format!(
                    "current price band moved {} -> {}",
                    prior.current_price, current.current_price
                ),
            );
        }
    }

    fn detect_spread(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        match (prior.spread_bps, current.spread_bps) {
            (Some(before), Some(after)) if before != after => {
                let moved = (after - before).abs();
                let level = if moved >= self.config.major_spread_bps {
                    ChangeSignificance::Major
                } else if moved >= self.config.moderate_spread_bps {
                    ChangeSignificance::Moderate
                } else {
                    ChangeSignificance::Minor
                };
                report.raise(level, format!("spread moved {before}bps -> {after}bps"));
            }
            (Some(_), None) | (None, Some(_)) => {
                report.raise(ChangeSignificance::Minor, "spread availability changed");
            }
            _ => {}
        }
    }

    fn detect_probability(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        match (prior.implied_probability_pp, current.implied_probability_pp) {
            (Some(before), Some(after)) if before != after => {
                let moved = (after - before).abs();
                let description =
                    format!("implied probability moved {before:.0}pp -> {after:.0}pp");
                if moved > self.config.major_probability_pp {
                    report.raise(ChangeSignificance::Major, description);
                } else {
                    report.raise(ChangeSignificance::Minor, description);
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                report.raise(
                    ChangeSignificance::Minor,
                    "implied probability availability changed",
                );
            }
            _ => {}
        }

        if prior.analyst_probability_pp != current.analyst_probability_pp {
            report.raise(ChangeSignificance::Minor, "analyst estimate changed");
        }
    }

    fn detect_milestones(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        let (before, after) = (&prior.milestones, &current.milestones);
        if before == after {
            return;
        }

        if after.failed > before.failed {
            report.raise(
                ChangeSignificance::Major,
                format!("{} milestone(s) failed", after.failed - before.failed),
            );
        }
        let satisfied_before = before.completed + before.waived;
        let satisfied_after = after.completed + after.waived;
        if satisfied_after > satisfied_before {
            report.raise(
                ChangeSignificance::Moderate,
                format!(
                    "{} milestone(s) completed",
                    satisfied_after - satisfied_before
                ),
            );
        }
        if after.total() != before.total() {
            report.raise(
                ChangeSignificance::Minor,
                format!("milestone count {} -> {}", before.total(), after.total()),
            );
        } else if after.failed <= before.failed && satisfied_after <= satisfied_before {
            report.raise(ChangeSignificance::Minor, "milestone status mix changed");
        }
    }

    fn detect_risk_factors(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        if prior.risk_factors == current.risk_factors {
            return;
        }
        for (name, level) in &current.risk_factors {
            match prior.risk_factors.get(name) {
                None => report.raise(
                    ChangeSignificance::Moderate,
                    format!("new risk factor {name} ({})", level.as_str()),
                ),
                Some(old) if old != level => report.raise(
                    ChangeSignificance::Moderate,
                    format!("risk factor {name} {} -> {}", old.as_str(), level.as_str()),
                ),
                Some(_) => {}
            }
        }
        for name in prior.risk_factors.keys() {
            if !current.risk_factors.contains_key(name) {
                report.raise(
                    ChangeSignificance::Moderate,
                    format!("risk factor {name} dropped"),
                );
            }
        }
    }

    fn detect_status(
        &self,
        prior: &FingerprintSummary,
        current: &FingerprintSummary,
        report: &mut ChangeReport,
    ) {
        if prior.halted != current.halted {
            let level = if current.halted == Some(true) || prior.halted == Some(true) {
                ChangeSignificance::Major
            } else {
                ChangeSignificance::Minor
            };
            report.raise(level, "trading halt status changed");
        }
        if !prior.has_outcome && current.has_outcome {
            report.raise(ChangeSignificance::Major, "deal outcome recorded");
        }
    }
}
