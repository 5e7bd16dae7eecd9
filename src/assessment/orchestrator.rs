//! Per-deal assessment pipeline
//!
//! For each deal: collect context, fingerprint it, compare with the last
//! assessment, route to Reuse/Delta/Full, call the reasoner when needed,
//! persist, then register the predictions the reasoner emitted.
//!
//! A Delta attempt whose answer is malformed escalates to Full exactly once.
//! Any other failure fails only that deal.

use super::types::{Assessment, ProbabilityEstimates, RunSummary};
use super::AssessmentError;
use crate::config::Config;
use crate::context::{ContextCollector, ContextSnapshot};
use crate::fingerprint::{
    ChangeClassifier, ChangeReport, ContextFingerprinter, Fingerprint, Strategy, StrategyRouter,
};
use crate::predictions::{PredictionError, PredictionRegistry, ResolutionFacts};
use crate::reasoner::{
    AssessmentMode, FeedbackDigest, PredictionBrief, PriorJudgment, Reasoner, ReasonerError,
    ReasonerReply, ReasonerRequest,
};
use crate::scoring::{CalibrationBrief, CalibrationScope, SignalSource, SignalWeights};
use crate::store::{AssessmentStore, Store};
use crate::telemetry::{record_latency, LatencyMetric};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Reasoner attempt within one deal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Delta,
    Full { escalated: bool },
}

impl Attempt {
    fn mode(&self) -> AssessmentMode {
        match self {
            Attempt::Delta => AssessmentMode::Delta,
            Attempt::Full { .. } => AssessmentMode::Full,
        }
    }
}

/// Track record loaded once per batch
#[derive(Debug, Clone, Default)]
struct BatchFeedback {
    weights: SignalWeights,
    calibration: Option<CalibrationBrief>,
}

/// Result of assessing one deal
#[derive(Debug, Clone)]
pub struct DealReport {
    pub assessment: Assessment,
    pub predictions_submitted: usize,
    pub predictions_rejected: usize,
    pub updates_applied: usize,
}

/// Everything a batch produced
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub summary: RunSummary,
    pub assessments: Vec<Assessment>,
    /// Observed facts for the resolution pass
    pub facts: ResolutionFacts,
}

/// Runs the daily assessment batch
pub struct AssessmentOrchestrator<C: ContextCollector, R: Reasoner> {
    config: Config,
    collector: Arc<C>,
    reasoner: Arc<R>,
    store: Arc<dyn Store>,
    registry: PredictionRegistry,
    fingerprinter: ContextFingerprinter,
    classifier: ChangeClassifier,
    router: StrategyRouter,
    abort: Arc<AtomicBool>,
}

impl<C: ContextCollector, R: Reasoner> AssessmentOrchestrator<C, R> {
    pub fn new(config: Config, collector: Arc<C>, reasoner: Arc<R>, store: Arc<dyn Store>) -> Self {
        Self {
            registry: PredictionRegistry::new(config.registry.clone(), store.clone()),
            fingerprinter: ContextFingerprinter::new(config.fingerprint.clone()),
            classifier: ChangeClassifier::new(config.classifier.clone()),
            router: StrategyRouter,
            abort: Arc::new(AtomicBool::new(false)),
            config,
            collector,
            reasoner,
            store,
        }
    }

    /// Flag checked between deals; setting it stops the batch
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn registry(&self) -> &PredictionRegistry {
        &self.registry
    }

    async fn load_feedback(&self) -> Result<BatchFeedback, AssessmentError> {
        let rows = self.store.latest_signal_accuracy().await?;
        let calibration = self
            .store
            .latest_calibration(CalibrationScope::Global)
            .await?
            .map(|s| s.brief());
        Ok(BatchFeedback {
            weights: SignalWeights::from_accuracy(&rows),
            calibration,
        })
    }

    /// Assess `deals` sequentially for `date`
    pub async fn run_batch(
        &self,
        deals: &[String],
        date: NaiveDate,
    ) -> Result<BatchOutcome, AssessmentError> {
        let feedback = self.load_feedback().await?;
        let mut outcome = BatchOutcome {
            summary: RunSummary::new(date),
            ..Default::default()
        };
        outcome.summary.total = deals.len();

        tracing::info!(%date, deals = deals.len(), "Starting assessment batch");

        for deal in deals {
            if self.abort.load(Ordering::SeqCst) {
                tracing::warn!(%deal, "Batch aborted");
                outcome.summary.aborted = true;
                break;
            }

            match self
                .assess_deal(deal, date, &feedback, &mut outcome.facts)
                .await
            {
                Ok(report) => {
                    let summary = &mut outcome.summary;
                    summary.record_strategy(
                        report.assessment.strategy,
                        report.assessment.escalated,
                    );
                    summary.predictions_submitted += report.predictions_submitted;
                    summary.predictions_rejected += report.predictions_rejected;
                    summary.updates_applied += report.updates_applied;
                    outcome.assessments.push(report.assessment);
                }
                Err(e) => {
                    tracing::warn!(%deal, error = %e, "Deal assessment failed");
                    metrics::counter!("dealassess_deal_failures_total").increment(1);
                    outcome.summary.record_failure(deal, &e);
                }
            }
        }

        tracing::info!(
            %date,
            assessed = outcome.summary.assessed,
            failed = outcome.summary.failed,
            reused = outcome.summary.reused,
            delta = outcome.summary.delta,
            full = outcome.summary.full,
            escalations = outcome.summary.escalations,
            "Assessment batch complete"
        );
        Ok(outcome)
    }

    /// Assess a single deal
    async fn assess_deal(
        &self,
        deal: &str,
        date: NaiveDate,
        feedback: &BatchFeedback,
        facts: &mut ResolutionFacts,
    ) -> Result<DealReport, AssessmentError> {
        let mut snapshot = self.collector.collect(deal, date).await?;
        snapshot.apply_features(&self.config.features);
        if !snapshot.unavailable_sections.is_empty() {
            tracing::debug!(
                %deal,
                sections = ?snapshot.unavailable_sections,
                "Assessing with partial context"
            );
        }
        facts.observe(&snapshot);
        if let Some(outcome) = &snapshot.outcome {
            if self.store.record_outcome(deal, outcome.clone()).await? {
                tracing::info!(%deal, outcome = ?outcome.kind, "Deal outcome recorded");
            }
        }

        let fingerprint = self.fingerprinter.fingerprint(&snapshot);
        let prior = self.store.latest_assessment_before(deal, date).await?;
        let changes = self
            .classifier
            .classify(prior.as_ref().map(|a| &a.fingerprint.summary), &fingerprint.summary);

        let mut strategy = self.router.route(changes.significance);
        if strategy == Strategy::Reuse && prior.is_none() {
            strategy = Strategy::Full;
        }

        tracing::info!(
            %deal,
            significance = ?changes.significance,
            strategy = %strategy,
            changes = changes.changes.len(),
            "Routed deal"
        );

        let report = match (strategy, prior) {
            (Strategy::Reuse, Some(prior)) => {
                let probabilities =
                    self.estimates(prior.probabilities.reasoner, &snapshot, &feedback.weights);
                let mut assessment = Assessment::carried_forward(
                    &prior,
                    date,
                    fingerprint,
                    snapshot.market.clone(),
                    snapshot.milestones.clone(),
                    probabilities,
                );
                assessment.changes = changes.changes;
                self.store.upsert_assessment(assessment.clone()).await?;
                DealReport {
                    assessment,
                    predictions_submitted: 0,
                    predictions_rejected: 0,
                    updates_applied: 0,
                }
            }
            (strategy, prior) => {
                self.assess_with_reasoner(
                    strategy,
                    &snapshot,
                    fingerprint,
                    changes,
                    prior,
                    feedback,
                )
                .await?
            }
        };

        metrics::counter!(
            "dealassess_assessments_total",
            "strategy" => report.assessment.strategy.as_str()
        )
        .increment(1);
        Ok(report)
    }

    async fn assess_with_reasoner(
        &self,
        strategy: Strategy,
        snapshot: &ContextSnapshot,
        fingerprint: Fingerprint,
        changes: ChangeReport,
        prior: Option<Assessment>,
        feedback: &BatchFeedback,
    ) -> Result<DealReport, AssessmentError> {
        let deal = snapshot.deal.as_str();
        let date = snapshot.as_of;

        let open = self.registry.list_open(deal).await?;
        let digest = FeedbackDigest {
            open_predictions: open.iter().map(PredictionBrief::from).collect(),
            calibration: feedback.calibration.clone(),
            signal_weights: feedback.weights.weights.clone(),
        };

        // Delta needs something to be a delta against
        let mut attempt = match (strategy, &prior) {
            (Strategy::Delta, Some(_)) => Attempt::Delta,
            _ => Attempt::Full { escalated: false },
        };

        let reply = loop {
            let request = ReasonerRequest {
                deal: deal.to_string(),
                date,
                mode: attempt.mode(),
                summary: fingerprint.summary.clone(),
                context: matches!(attempt, Attempt::Full { .. }).then(|| snapshot.clone()),
                changes: changes.changes.clone(),
                prior: match attempt {
                    Attempt::Delta => prior.as_ref().map(|p| PriorJudgment {
                        date: p.date,
                        judgment: p.judgment.clone(),
                        deal_close_probability: p.probabilities.reasoner,
                    }),
                    Attempt::Full { .. } => None,
                },
                feedback: digest.clone(),
            };

            match self.call_reasoner(&request).await {
                Ok(reply) => break reply,
                Err(e) if e.is_malformed() && attempt == Attempt::Delta => {
                    tracing::warn!(%deal, error = %e, "Malformed delta response, escalating to full");
                    metrics::counter!("dealassess_escalations_total").increment(1);
                    attempt = Attempt::Full { escalated: true };
                }
                Err(e) => return Err(e.into()),
            }
        };

        let (strategy, escalated) = match attempt {
            Attempt::Delta => (Strategy::Delta, false),
            Attempt::Full { escalated } => (Strategy::Full, escalated),
        };

        let response = &reply.response;
        let assessment = Assessment {
            id: Uuid::new_v4(),
            deal: deal.to_string(),
            date,
            strategy,
            escalated,
            significance: changes.significance,
            fingerprint,
            judgment: response.judgment(),
            probabilities: self.estimates(
                Some(response.deal_close_probability),
                snapshot,
                &feedback.weights,
            ),
            market: snapshot.market.clone(),
            milestones: snapshot.milestones.clone(),
            changes: changes.changes,
            raw_response: Some(reply.raw.clone()),
            reused_from: None,
            created_at: Utc::now(),
        };
        self.store.upsert_assessment(assessment.clone()).await?;

        let mut report = DealReport {
            assessment,
            predictions_submitted: 0,
            predictions_rejected: 0,
            updates_applied: 0,
        };
        self.register_predictions(&reply, snapshot, &mut report)
            .await?;
        Ok(report)
    }

    async fn call_reasoner(
        &self,
        request: &ReasonerRequest,
    ) -> Result<ReasonerReply, ReasonerError> {
        let timeout = Duration::from_secs(self.config.orchestrator.reasoner_timeout_secs);
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.reasoner.assess(request))
            .await
            .unwrap_or(Err(ReasonerError::Timeout));

        record_latency(LatencyMetric::Reasoner, started.elapsed());
        result
    }

    async fn register_predictions(
        &self,
        reply: &ReasonerReply,
        snapshot: &ContextSnapshot,
        report: &mut DealReport,
    ) -> Result<(), AssessmentError> {
        let deal = snapshot.deal.as_str();
        let date = snapshot.as_of;
        let assessment_id = Some(report.assessment.id);
        let spread = snapshot.market.spread_bps();

        for item in reply.response.prediction_drafts() {
            let result = item
                .map_err(|e| PredictionError::Invalid {
                    deal: deal.to_string(),
                    reason: e.to_string(),
                })
                .and_then(|draft| draft.to_new_prediction(deal, assessment_id, spread));
            let result = match result {
                Ok(prediction) => self
                    .registry
                    .submit(prediction, &snapshot.milestones, date)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.predictions_submitted += 1,
                Err(PredictionError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(%deal, error = %e, "Dropping prediction");
                    metrics::counter!("dealassess_predictions_rejected_total").increment(1);
                    report.predictions_rejected += 1;
                }
            }
        }

        for item in reply.response.updates() {
            let result = match item {
                Ok(update) => self
                    .registry
                    .apply_update(deal, assessment_id, update, &snapshot.milestones, date)
                    .await
                    .map(|_| ()),
                Err(e) => Err(PredictionError::Invalid {
                    deal: deal.to_string(),
                    reason: e.to_string(),
                }),
            };
            match result {
                Ok(()) => report.updates_applied += 1,
                Err(PredictionError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(%deal, error = %e, "Dropping prediction update");
                    metrics::counter!("dealassess_predictions_rejected_total").increment(1);
                    report.predictions_rejected += 1;
                }
            }
        }
        Ok(())
    }

    fn estimates(
        &self,
        reasoner: Option<f64>,
        snapshot: &ContextSnapshot,
        weights: &SignalWeights,
    ) -> ProbabilityEstimates {
        let analyst = snapshot.analyst_probability;
        let market_implied = snapshot.implied_probability;
        let blended = weights.blend(&[
            (SignalSource::Reasoner, reasoner),
            (SignalSource::Analyst, analyst),
            (SignalSource::MarketImplied, market_implied),
        ]);
        ProbabilityEstimates {
            reasoner,
            analyst,
            market_implied,
            blended,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextError, RiskFactor, RiskLevel};
    use crate::predictions::{PredictionKind, PredictionStatus, PredictionType};
    use crate::reasoner::{parse_response, ReasonerResponse};
    use crate::store::{MemoryStore, PredictionStore};
    use crate::testing::snapshot_fixture;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    struct MockCollector {
        snapshots: Mutex<HashMap<(String, NaiveDate), ContextSnapshot>>,
    }

    impl MockCollector {
        fn new() -> Self {
            Self {
                snapshots: Mutex::new(HashMap::new()),
            }
        }

        fn put(&self, snapshot: ContextSnapshot) {
            self.snapshots
                .lock()
                .unwrap()
                .insert((snapshot.deal.clone(), snapshot.as_of), snapshot);
        }
    }

    #[async_trait]
    impl ContextCollector for MockCollector {
        async fn portfolio(&self, date: NaiveDate) -> Result<Vec<String>, ContextError> {
            let snapshots = self.snapshots.lock().unwrap();
            let mut deals: Vec<String> = snapshots
                .keys()
                .filter(|(_, d)| *d == date)
                .map(|(deal, _)| deal.clone())
                .collect();
            deals.sort();
            Ok(deals)
        }

        async fn collect(
            &self,
            deal: &str,
            date: NaiveDate,
        ) -> Result<ContextSnapshot, ContextError> {
            self.snapshots
                .lock()
                .unwrap()
                .get(&(deal.to_string(), date))
                .cloned()
                .ok_or_else(|| ContextError::DataUnavailable {
                    deal: deal.to_string(),
                    reason: "no fixture".to_string(),
                })
        }
    }

    const GOOD: &str = r#"{
        "overall_grade": "medium",
        "deal_close_probability": 0.85,
        "summary": "On track",
        "predictions": [{
            "prediction_type": "milestone_completion",
            "claim": "HSR clears by month end",
            "probability": 0.9,
            "confidence": "high",
            "deadline": "2026-03-31",
            "evidence": ["Timing agreement"],
            "milestone_id": "hsr"
        }, {
            "prediction_type": "deal_closes",
            "claim": "",
            "probability": 0.8,
            "confidence": "medium",
            "evidence": ["x"]
        }]
    }"#;

    /// Replies from a script, one entry per call; `None` is a malformed reply
    struct ScriptedReasoner {
        script: Mutex<Vec<Option<&'static str>>>,
        calls: AtomicUsize,
        modes: Mutex<Vec<AssessmentMode>>,
    }

    impl ScriptedReasoner {
        fn new(script: Vec<Option<&'static str>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                modes: Mutex::new(vec![]),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn assess(
            &self,
            request: &ReasonerRequest,
        ) -> Result<ReasonerReply, ReasonerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(request.mode);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Some(GOOD)
                } else {
                    script.remove(0)
                }
            };
            match next {
                Some(text) => {
                    let response: ReasonerResponse = parse_response(text)?;
                    Ok(ReasonerReply {
                        response,
                        raw: text.to_string(),
                    })
                }
                None => Err(ReasonerError::Malformed("garbage".into())),
            }
        }
    }

    struct SlowReasoner;

    #[async_trait]
    impl Reasoner for SlowReasoner {
        async fn assess(&self, _: &ReasonerRequest) -> Result<ReasonerReply, ReasonerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ReasonerError::Api("unreachable".into()))
        }
    }

    fn orchestrator<R: Reasoner>(
        collector: Arc<MockCollector>,
        reasoner: Arc<R>,
    ) -> (AssessmentOrchestrator<MockCollector, R>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            AssessmentOrchestrator::new(Config::default(), collector, reasoner, store.clone()),
            store,
        )
    }

    /// A new risk factor is a moderate change, routed to Delta
    fn with_new_risk(mut snapshot: ContextSnapshot) -> ContextSnapshot {
        snapshot.risk_factors = vec![RiskFactor {
            name: "antitrust".to_string(),
            level: RiskLevel::High,
            note: None,
        }];
        snapshot
    }

    fn deals() -> Vec<String> {
        vec!["ACME".to_string()]
    }

    #[tokio::test]
    async fn test_first_assessment_is_full_and_registers_predictions() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
        let (orch, store) = orchestrator(collector, reasoner.clone());

        let outcome = orch.run_batch(&deals(), day(2)).await.unwrap();
        assert_eq!(outcome.summary.full, 1);
        assert_eq!(reasoner.calls(), 1);
        // Second draft has an empty claim
        assert_eq!(outcome.summary.predictions_submitted, 1);
        assert_eq!(outcome.summary.predictions_rejected, 1);

        let assessment = store.assessment("ACME", day(2)).await.unwrap().unwrap();
        assert_eq!(assessment.strategy, Strategy::Full);
        assert_eq!(assessment.probabilities.reasoner, Some(0.85));
        assert!(assessment.probabilities.blended.is_some());
        assert!(assessment.raw_response.is_some());

        let open = store.open_predictions(Some("ACME")).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].assessment_id, Some(assessment.id));
    }

    #[tokio::test]
    async fn test_bad_prediction_item_drops_only_itself() {
        const MIXED: &str = r#"{
            "overall_grade": "medium",
            "deal_close_probability": 0.8,
            "summary": "Clearance on schedule",
            "predictions": [{
                "prediction_type": "milestone_completion",
                "claim": "HSR clears by month end",
                "probability": 0.9,
                "confidence": "high",
                "deadline": "2026-03-31",
                "evidence": ["Timing agreement"],
                "milestone_id": "hsr"
            }, {
                "prediction_type": "regulatory_delay",
                "claim": "CMA opens phase 2",
                "probability": 0.3,
                "confidence": "low",
                "evidence": ["Press reports"]
            }, {
                "prediction_type": "milestone_completion",
                "claim": "CFIUS clears",
                "probability": 0.7,
                "confidence": "medium",
                "evidence": ["Filing accepted"],
                "milestone_id": "cfius"
            }],
            "prediction_updates": [{
                "prediction_type": "deal_closes",
                "probability": "high",
                "reason": "not a number"
            }]
        }"#;

        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let reasoner = Arc::new(ScriptedReasoner::new(vec![Some(MIXED)]));
        let (orch, store) = orchestrator(collector, reasoner.clone());

        let outcome = orch.run_batch(&deals(), day(2)).await.unwrap();
        assert_eq!(outcome.summary.failed, 0);
        assert_eq!(outcome.summary.full, 1);
        assert_eq!(reasoner.calls(), 1);
        assert_eq!(outcome.summary.predictions_submitted, 1);
        // Unknown type, unknown milestone, unparseable update
        assert_eq!(outcome.summary.predictions_rejected, 3);
        assert_eq!(outcome.summary.updates_applied, 0);

        let open = store.open_predictions(Some("ACME")).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(
            open[0].kind,
            PredictionKind::MilestoneCompletion {
                milestone_id: "hsr".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_noise_within_band_reuses_without_reasoner_call() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let mut next = snapshot_fixture("ACME", day(3));
        next.implied_probability = Some(0.93);
        collector.put(next);

        let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
        let (orch, store) = orchestrator(collector, reasoner.clone());

        orch.run_batch(&deals(), day(2)).await.unwrap();
        let outcome = orch.run_batch(&deals(), day(3)).await.unwrap();

        assert_eq!(reasoner.calls(), 1);
        assert_eq!(outcome.summary.reused, 1);
        let first = store.assessment("ACME", day(2)).await.unwrap().unwrap();
        let second = store.assessment("ACME", day(3)).await.unwrap().unwrap();
        assert_eq!(second.strategy, Strategy::Reuse);
        assert_eq!(second.reused_from, Some(first.id));
        assert_eq!(second.judgment, first.judgment);
        assert_eq!(second.probabilities.market_implied, Some(0.93));
    }

    #[tokio::test]
    async fn test_malformed_delta_escalates_once() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        collector.put(with_new_risk(snapshot_fixture("ACME", day(3))));

        let reasoner = Arc::new(ScriptedReasoner::new(vec![Some(GOOD), None, Some(GOOD)]));
        let (orch, store) = orchestrator(collector, reasoner.clone());

        orch.run_batch(&deals(), day(2)).await.unwrap();
        let outcome = orch.run_batch(&deals(), day(3)).await.unwrap();

        assert_eq!(outcome.summary.escalations, 1);
        assert_eq!(outcome.summary.full, 1);
        assert_eq!(
            *reasoner.modes.lock().unwrap(),
            vec![
                AssessmentMode::Full,
                AssessmentMode::Delta,
                AssessmentMode::Full
            ]
        );
        let assessment = store.assessment("ACME", day(3)).await.unwrap().unwrap();
        assert!(assessment.escalated);
        assert_eq!(assessment.strategy, Strategy::Full);
    }

    #[tokio::test]
    async fn test_malformed_full_fails_deal() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let reasoner = Arc::new(ScriptedReasoner::new(vec![None, None]));
        let (orch, store) = orchestrator(collector, reasoner.clone());

        let outcome = orch.run_batch(&deals(), day(2)).await.unwrap();
        assert_eq!(reasoner.calls(), 1);
        assert_eq!(outcome.summary.failed, 1);
        assert!(store.assessment("ACME", day(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
        let (orch, _) = orchestrator(collector, reasoner);

        let deals = vec!["MISSING".to_string(), "ACME".to_string()];
        let outcome = orch.run_batch(&deals, day(2)).await.unwrap();
        assert_eq!(outcome.summary.total, 2);
        assert_eq!(outcome.summary.failed, 1);
        assert_eq!(outcome.summary.assessed, 1);
        assert_eq!(outcome.summary.failures[0].deal, "MISSING");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoner_timeout_fails_deal() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let (orch, _) = orchestrator(collector, Arc::new(SlowReasoner));

        let outcome = orch.run_batch(&deals(), day(2)).await.unwrap();
        assert_eq!(outcome.summary.failed, 1);
        assert!(outcome.summary.failures[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_abort_flag_stops_between_deals() {
        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        let (orch, _) = orchestrator(collector, Arc::new(ScriptedReasoner::new(vec![])));

        orch.abort_handle().store(true, Ordering::SeqCst);
        let outcome = orch.run_batch(&deals(), day(2)).await.unwrap();
        assert!(outcome.summary.aborted);
        assert_eq!(outcome.summary.assessed, 0);
    }

    #[tokio::test]
    async fn test_prediction_update_supersedes() {
        const UPDATE: &str = r#"{
            "overall_grade": "high",
            "deal_close_probability": 0.6,
            "summary": "Second request",
            "prediction_updates": [{
                "prediction_type": "milestone_completion",
                "probability": 0.5,
                "reason": "Second request issued"
            }]
        }"#;

        let collector = Arc::new(MockCollector::new());
        collector.put(snapshot_fixture("ACME", day(2)));
        collector.put(with_new_risk(snapshot_fixture("ACME", day(3))));

        let reasoner = Arc::new(ScriptedReasoner::new(vec![Some(GOOD), Some(UPDATE)]));
        let (orch, store) = orchestrator(collector, reasoner);

        orch.run_batch(&deals(), day(2)).await.unwrap();
        let outcome = orch.run_batch(&deals(), day(3)).await.unwrap();
        assert_eq!(outcome.summary.delta, 1);
        assert_eq!(outcome.summary.updates_applied, 1);

        let all = store.predictions_for("ACME").await.unwrap();
        let milestone: Vec<_> = all
            .iter()
            .filter(|p| p.prediction_type() == PredictionType::MilestoneCompletion)
            .collect();
        assert_eq!(milestone.len(), 2);
        assert_eq!(
            milestone
                .iter()
                .filter(|p| p.status == PredictionStatus::Open)
                .count(),
            1
        );
        let open = milestone.iter().find(|p| p.is_open()).unwrap();
        assert_eq!(open.probability, 0.5);
    }

    #[tokio::test]
    async fn test_disabled_features_are_stripped_before_fingerprinting() {
        let collector = Arc::new(MockCollector::new());
        let mut snapshot = snapshot_fixture("ACME", day(2));
        snapshot.analyst_probability = Some(0.7);
        collector.put(snapshot);

        let mut config = Config::default();
        config.features.analyst_estimates = false;
        let store = Arc::new(MemoryStore::new());
        let orch = AssessmentOrchestrator::new(
            config,
            collector,
            Arc::new(ScriptedReasoner::new(vec![])),
            store.clone(),
        );
        orch.run_batch(&deals(), day(2)).await.unwrap();

        let assessment = store.assessment("ACME", day(2)).await.unwrap().unwrap();
        assert!(assessment.probabilities.analyst.is_none());
        assert!(assessment.fingerprint.summary.analyst_probability_pp.is_none());
    }
}
