//! Daily run: assess → resolve → calibrate → weigh → review

use crate::assessment::{Assessment, AssessmentOrchestrator, RunSummary};
use crate::config::Config;
use crate::context::{ContextCollector, DealOutcome};
use crate::predictions::{ResolutionEngine, ResolutionFacts, ResolutionReport};
use crate::reasoner::Reasoner;
use crate::review::{ReviewItem, ReviewPrioritizer};
use crate::scoring::{
    CalibrationComputer, CalibrationScope, CalibrationSnapshot, SignalAccuracy,
    SignalObservation, SignalSource, SignalWeightEngine, SignalWeights,
};
use crate::store::{AssessmentStore, HistoryStore, PredictionStore, Store};
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Everything one daily run produced
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub summary: RunSummary,
    pub resolution: ResolutionReport,
    pub calibration: Vec<CalibrationSnapshot>,
    pub weights: SignalWeights,
    pub review_queue: Vec<ReviewItem>,
}

/// Stages that run after assessment. Needs no reasoner, so the CLI can
/// run them on their own.
pub struct ScoringPass {
    store: Arc<dyn Store>,
    resolution: ResolutionEngine,
    calibration: CalibrationComputer,
    signals: SignalWeightEngine,
    review: ReviewPrioritizer,
}

impl ScoringPass {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        Self {
            resolution: ResolutionEngine::new(config.resolution.clone(), store.clone()),
            calibration: CalibrationComputer::new(config.calibration.clone()),
            signals: SignalWeightEngine::new(config.signals.clone()),
            review: ReviewPrioritizer::new(config.review.clone()),
            store,
        }
    }

    /// Resolve open predictions against `facts` plus the outcome log
    pub async fn resolve(
        &self,
        facts: ResolutionFacts,
        date: NaiveDate,
    ) -> Result<ResolutionReport> {
        let facts = facts.with_outcomes(self.store.outcomes().await?);
        Ok(self.resolution.run(&facts, date).await?)
    }

    /// Append one calibration snapshot per scope
    pub async fn calibrate(&self, date: NaiveDate) -> Result<Vec<CalibrationSnapshot>> {
        let predictions = self.store.all_predictions().await?;
        let mut snapshots = Vec::new();

        for scope in CalibrationScope::all() {
            let previous = self.store.latest_calibration(scope).await?;
            let snapshot = self.calibration.compute_from_predictions(
                scope,
                &predictions,
                previous.as_ref(),
                date,
            );

            if let Some(ece) = snapshot.ece {
                metrics::gauge!("dealassess_calibration_ece", "scope" => scope.to_string())
                    .set(ece);
            }
            tracing::debug!(
                scope = %scope,
                samples = snapshot.sample_count,
                usable = snapshot.usable,
                brier = ?snapshot.brier_mean,
                "Calibration computed"
            );

            self.store.append_calibration(snapshot.clone()).await?;
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    /// Recompute signal weights from deals with a logged outcome
    pub async fn update_signal_weights(
        &self,
        date: NaiveDate,
    ) -> Result<(SignalWeights, Vec<SignalAccuracy>)> {
        let outcomes = self.store.outcomes().await?;
        let assessments = self.store.all_assessments().await?;
        let observations = signal_observations(&assessments, &outcomes);

        let (weights, rows) = self.signals.compute(&observations, date);
        for (source, weight) in &weights.weights {
            metrics::gauge!("dealassess_signal_weight", "source" => source.as_str()).set(*weight);
        }
        tracing::info!(
            observations = observations.len(),
            shrinkage = weights.shrinkage,
            weights = ?weights.weights,
            "Signal weights updated"
        );

        self.store.append_signal_accuracy(rows.clone()).await?;
        Ok((weights, rows))
    }

    pub async fn review(&self, date: NaiveDate) -> Result<Vec<ReviewItem>> {
        Ok(self.review.queue_for(self.store.as_ref(), date).await?)
    }
}

/// Collect today's facts for every portfolio deal, logging any outcome.
/// Deals whose context is unavailable contribute nothing.
pub async fn gather_facts<C: ContextCollector>(
    collector: &C,
    store: &dyn Store,
    date: NaiveDate,
) -> Result<ResolutionFacts> {
    let deals = collector
        .portfolio(date)
        .await
        .context("Failed to list portfolio")?;
    let mut facts = ResolutionFacts::new();
    for deal in &deals {
        match collector.collect(deal, date).await {
            Ok(snapshot) => {
                if let Some(outcome) = &snapshot.outcome {
                    store.record_outcome(deal, outcome.clone()).await?;
                }
                facts.observe(&snapshot);
            }
            Err(e) => tracing::warn!(%deal, error = %e, "No facts for deal"),
        }
    }
    Ok(facts)
}

/// Wires the daily stages over one store
pub struct DailyRun<C: ContextCollector, R: Reasoner> {
    collector: Arc<C>,
    store: Arc<dyn Store>,
    orchestrator: AssessmentOrchestrator<C, R>,
    scoring: ScoringPass,
}

impl<C: ContextCollector, R: Reasoner> DailyRun<C, R> {
    pub fn new(config: Config, collector: Arc<C>, reasoner: Arc<R>, store: Arc<dyn Store>) -> Self {
        Self {
            scoring: ScoringPass::new(&config, store.clone()),
            orchestrator: AssessmentOrchestrator::new(
                config,
                collector.clone(),
                reasoner,
                store.clone(),
            ),
            collector,
            store,
        }
    }

    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.orchestrator.abort_handle()
    }

    pub fn scoring(&self) -> &ScoringPass {
        &self.scoring
    }

    /// Full daily run. `deals` defaults to the collector's portfolio.
    pub async fn run(&self, date: NaiveDate, deals: Option<Vec<String>>) -> Result<DailyReport> {
        let started = Instant::now();
        let deals = match deals {
            Some(deals) => deals,
            None => self
                .collector
                .portfolio(date)
                .await
                .context("Failed to list portfolio")?,
        };

        let batch = self.orchestrator.run_batch(&deals, date).await?;
        let mut summary = batch.summary;

        let resolution = self.scoring.resolve(batch.facts, date).await?;
        summary.resolutions = resolution.by_trigger();

        let calibration = self.scoring.calibrate(date).await?;
        let (weights, _) = self.scoring.update_signal_weights(date).await?;
        let review_queue = self.scoring.review(date).await?;

        let open = self.store.open_predictions(None).await?.len();
        set_gauge(GaugeMetric::DealsAssessed, summary.assessed as f64);
        set_gauge(GaugeMetric::DealsFailed, summary.failed as f64);
        set_gauge(GaugeMetric::ReuseRate, summary.reuse_rate());
        set_gauge(GaugeMetric::ReviewQueueLength, review_queue.len() as f64);
        set_gauge(GaugeMetric::OpenPredictions, open as f64);
        record_latency(LatencyMetric::DailyRun, started.elapsed());

        tracing::info!(
            %date,
            assessed = summary.assessed,
            failed = summary.failed,
            reuse_rate = summary.reuse_rate(),
            resolved = resolution.total_resolved(),
            expired = resolution.total_expired(),
            queued = review_queue.len(),
            "Daily run complete"
        );

        Ok(DailyReport {
            summary,
            resolution,
            calibration,
            weights,
            review_queue,
        })
    }
}

/// One observation per source per resolved deal, taken from the last
/// assessment before the outcome was observed
pub fn signal_observations(
    assessments: &[Assessment],
    outcomes: &BTreeMap<String, DealOutcome>,
) -> Vec<SignalObservation> {
    let mut observations = Vec::new();
    for (deal, outcome) in outcomes {
        let Some(last) = assessments
            .iter()
            .filter(|a| &a.deal == deal && a.date < outcome.observed_on)
            .max_by_key(|a| a.date)
        else {
            continue;
        };

        let actual = outcome.kind.is_completion();
        let p = &last.probabilities;
        for (source, probability) in [
            (SignalSource::Reasoner, p.reasoner),
            (SignalSource::Analyst, p.analyst),
            (SignalSource::MarketImplied, p.market_implied),
        ] {
            if let Some(probability) = probability {
                observations.push(SignalObservation {
                    source,
                    deal: deal.clone(),
                    observed_on: outcome.observed_on,
                    probability,
                    actual,
                });
            }
        }
    }
    observations
}
