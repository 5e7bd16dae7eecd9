//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::NaiveDate;
use deal_assess::context::{ContextSnapshot, MarketFigures, Milestone, MilestoneStatus};
use deal_assess::reasoner::{
    parse_response, Reasoner, ReasonerError, ReasonerReply, ReasonerRequest,
};
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

pub fn snapshot(deal: &str, date: NaiveDate) -> ContextSnapshot {
    let mut s = ContextSnapshot::new(deal, date, MarketFigures::new(dec!(50), dec!(48.6)));
    s.implied_probability = Some(0.92);
    s.milestones = vec![Milestone {
        id: "hsr".to_string(),
        kind: "regulatory_clearance".to_string(),
        status: MilestoneStatus::Pending,
        expected_date: Some(day(20)),
        actual_date: None,
    }];
    s
}

/// Drop a snapshot where the file collector looks for it
pub fn write_snapshot(root: &Path, snapshot: &ContextSnapshot) {
    let dir = root.join(snapshot.as_of.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.json", snapshot.deal)),
        serde_json::to_string_pretty(snapshot).unwrap(),
    )
    .unwrap();
}

/// Replays canned responses in order, repeating the last one
pub struct ScriptedReasoner {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn assess(&self, _request: &ReasonerRequest) -> Result<ReasonerReply, ReasonerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let raw = {
            let mut replies = self.replies.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = replies.pop_front() {
                *last = Some(next);
            }
            last.clone()
                .ok_or_else(|| ReasonerError::Api("no scripted reply".into()))?
        };
        Ok(ReasonerReply {
            response: parse_response(&raw)?,
            raw,
        })
    }
}

pub const MILESTONE_CALL: &str = r#"{
    "overall_grade": "medium",
    "factor_grades": { "antitrust": "medium" },
    "deal_close_probability": 0.88,
    "summary": "HSR waiting period running, no second request expected",
    "predictions": [{
        "prediction_type": "milestone_completion",
        "claim": "HSR clearance by March 31",
        "probability": 0.9,
        "confidence": "high",
        "deadline": "2026-03-31",
        "evidence": ["Waiting period expires March 25"],
        "milestone_id": "hsr"
    }]
}"#;

pub const SHORT_DEADLINES: &str = r#"{
    "overall_grade": "high",
    "deal_close_probability": 0.4,
    "summary": "Financing uncertain",
    "predictions": [{
        "prediction_type": "next_event",
        "claim": "Financing commitment announced by March 3",
        "probability": 0.6,
        "confidence": "low",
        "deadline": "2026-03-03",
        "evidence": ["Management commentary"],
        "event": "financing_commitment"
    }, {
        "prediction_type": "deal_closes",
        "claim": "Deal closes by March 3",
        "probability": 0.3,
        "confidence": "low",
        "deadline": "2026-03-03",
        "evidence": ["Outside date approaching"]
    }]
}"#;
