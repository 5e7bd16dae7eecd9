//! Scheduled daily pipeline

mod daily;

pub use daily::{gather_facts, signal_observations, DailyReport, DailyRun, ScoringPass};
