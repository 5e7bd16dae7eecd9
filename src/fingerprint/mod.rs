//! Fingerprinting and strategy routing
//!
//! Decides, per deal per day, whether the expensive reasoner call is needed:
//! - `ContextFingerprinter`: bucketed digest of the snapshot
//! - `ChangeClassifier`: significance of the move since the last assessment
//! - `StrategyRouter`: significance to {Reuse, Delta, Full}

mod bucket;
mod classifier;
mod fingerprinter;
mod router;
mod types;

pub use bucket::{bucket_decimal, bucket_probability_pp};
pub use classifier::ChangeClassifier;
pub use fingerprinter::{hash_summary, ContextFingerprinter, FINGERPRINT_VERSION};
pub use router::StrategyRouter;
pub use types::{
    ChangeReport, ChangeSignificance, Fingerprint, FingerprintSummary, MilestoneCounts, Strategy,
};
