//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMetric {
    /// One reasoner round trip
    Reasoner,
    /// Whole daily run
    DailyRun,
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::Reasoner => "dealassess_reasoner_latency_seconds",
            LatencyMetric::DailyRun => "dealassess_daily_run_seconds",
        }
    }
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Deals assessed in the last run
    DealsAssessed,
    /// Deals that failed in the last run
    DealsFailed,
    /// Share of assessed deals served by Reuse
    ReuseRate,
    /// Entries on the review queue
    ReviewQueueLength,
    /// Open predictions after resolution
    OpenPredictions,
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::DealsAssessed => "dealassess_deals_assessed",
            GaugeMetric::DealsFailed => "dealassess_deals_failed",
            GaugeMetric::ReuseRate => "dealassess_reuse_rate",
            GaugeMetric::ReviewQueueLength => "dealassess_review_queue_length",
            GaugeMetric::OpenPredictions => "dealassess_open_predictions",
        }
    }
}

/// Record a latency measurement, in seconds
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(metric.name()).record(duration.as_secs_f64());
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            LatencyMetric::Reasoner.name(),
            LatencyMetric::DailyRun.name(),
            GaugeMetric::DealsAssessed.name(),
            GaugeMetric::DealsFailed.name(),
            GaugeMetric::ReuseRate.name(),
            GaugeMetric::ReviewQueueLength.name(),
            GaugeMetric::OpenPredictions.name(),
        ] {
            assert!(name.starts_with("dealassess_"), "{name}");
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_latency(LatencyMetric::Reasoner, Duration::from_millis(250));
        set_gauge(GaugeMetric::ReuseRate, 0.5);
    }
}
