//! External reasoning service
//!
//! Text in, structured judgment out. The response schema is strict; any
//! deviation surfaces as [`ReasonerError::Malformed`] so the orchestrator
//! can tell a bad answer from a failed call.

mod client;
mod types;

pub use client::AnthropicReasoner;
pub use types::{
    parse_response, validate_response, AssessmentMode, FeedbackDigest, PredictionBrief,
    PredictionDraft, PriorJudgment, ReasonerError, ReasonerReply, ReasonerRequest,
    ReasonerResponse,
};

use async_trait::async_trait;

/// Produces a structured judgment for one deal
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn assess(&self, request: &ReasonerRequest) -> Result<ReasonerReply, ReasonerError>;
}
