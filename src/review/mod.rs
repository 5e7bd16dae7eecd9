//! Review prioritization

mod prioritizer;

pub use prioritizer::{ReviewInput, ReviewItem, ReviewPrioritizer, ReviewTrigger};
