//! Deal context collection
//!
//! The core never builds context itself: a collector hands it a
//! [`ContextSnapshot`] per deal per day, or a recoverable error.

mod file;
mod types;

pub use file::FileCollector;
pub use types::{
    ContextSnapshot, DealOutcome, MarketFigures, Milestone, MilestoneStatus, OptionsData,
    OutcomeKind, RiskFactor, RiskLevel,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Context collection errors
#[derive(Debug, Error)]
pub enum ContextError {
    /// No usable context for this deal today; the deal is skipped for this run
    #[error("Context unavailable for {deal}: {reason}")]
    DataUnavailable { deal: String, reason: String },
    /// Context exists but could not be decoded
    #[error("Invalid context for {deal}: {source}")]
    Invalid {
        deal: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of per-deal context snapshots
#[async_trait]
pub trait ContextCollector: Send + Sync {
    /// Deals in the active portfolio on `date`
    async fn portfolio(&self, date: NaiveDate) -> Result<Vec<String>, ContextError>;
    /// Build today's snapshot for one deal
    async fn collect(&self, deal: &str, date: NaiveDate) -> Result<ContextSnapshot, ContextError>;
}
