//! deal-assess: daily merger-arbitrage deal assessment
//!
//! This library provides the core components for:
//! - Context snapshots per deal per day
//! - Fingerprinting and Reuse/Delta/Full routing
//! - Structured reasoning over deal context
//! - A prediction registry with automatic resolution
//! - Brier/log scoring, calibration and signal weighting
//! - A review queue for human attention
//! - Durable JSON state and Parquet export
//! - Logging and Prometheus metrics

pub mod assessment;
pub mod cli;
pub mod config;
pub mod context;
pub mod export;
pub mod fingerprint;
pub mod pipeline;
pub mod predictions;
pub mod reasoner;
pub mod review;
pub mod scoring;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;
