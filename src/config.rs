//! Configuration types for deal-assess

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Bucket widths used when fingerprinting a deal snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintConfig {
    /// Dollar band for deal and current prices
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: Decimal,

    /// Band for the gross spread, in basis points
    #[serde(default = "default_spread_tolerance_bps")]
    pub spread_tolerance_bps: Decimal,

    /// Band for implied and analyst probabilities, in percentage points
    #[serde(default = "default_probability_band_pp")]
    pub probability_band_pp: f64,
}

fn default_price_tolerance() -> Decimal {
    Decimal::new(50, 2) // $0.50
}
fn default_spread_tolerance_bps() -> Decimal {
    Decimal::new(25, 0)
}
fn default_probability_band_pp() -> f64 {
    5.0
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            price_tolerance: default_price_tolerance(),
            spread_tolerance_bps: default_spread_tolerance_bps(),
            probability_band_pp: default_probability_band_pp(),
        }
    }
}

/// Thresholds for the change detectors
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Implied probability move (pp) beyond which a full assessment is
    /// forced. Smaller band moves are minor.
    #[serde(default = "default_major_probability_pp")]
    pub major_probability_pp: f64,

    /// Spread move (bps) that counts as a moderate change
    #[serde(default = "default_moderate_spread_bps")]
    pub moderate_spread_bps: Decimal,

    /// Spread move (bps) that forces a full assessment
    #[serde(default = "default_major_spread_bps")]
    pub major_spread_bps: Decimal,
}

fn default_major_probability_pp() -> f64 {
    10.0
}
fn default_moderate_spread_bps() -> Decimal {
    Decimal::new(50, 0)
}
fn default_major_spread_bps() -> Decimal {
    Decimal::new(150, 0)
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            major_probability_pp: default_major_probability_pp(),
            moderate_spread_bps: default_moderate_spread_bps(),
            major_spread_bps: default_major_spread_bps(),
        }
    }
}

/// Per-deal pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on a single reasoner call, in seconds
    #[serde(default = "default_reasoner_timeout_secs")]
    pub reasoner_timeout_secs: u64,
}

fn default_reasoner_timeout_secs() -> u64 {
    180
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reasoner_timeout_secs: default_reasoner_timeout_secs(),
        }
    }
}

/// Optional context sections. A disabled section is stripped from the
/// snapshot before it is fingerprinted or sent to the reasoner.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub options_data: bool,
    #[serde(default = "default_true")]
    pub halts: bool,
    #[serde(default = "default_true")]
    pub analyst_estimates: bool,
    #[serde(default = "default_true")]
    pub risk_factors: bool,
    #[serde(default = "default_true")]
    pub milestones: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            options_data: true,
            halts: true,
            analyst_estimates: true,
            risk_factors: true,
            milestones: true,
        }
    }
}

/// External reasoner endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Prediction registry settings
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Maximum open predictions returned per deal
    #[serde(default = "default_open_list_cap")]
    pub open_list_cap: usize,
}

fn default_open_list_cap() -> usize {
    10
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            open_list_cap: default_open_list_cap(),
        }
    }
}

/// Resolution trigger settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    /// Spread moves smaller than this (bps) count as "stable"
    #[serde(default = "default_spread_stable_bps")]
    pub spread_stable_bps: Decimal,

    /// Days past deadline a spread prediction may wait for an observation
    #[serde(default = "default_spread_grace_days")]
    pub spread_grace_days: i64,
}

fn default_spread_stable_bps() -> Decimal {
    Decimal::new(25, 0)
}
fn default_spread_grace_days() -> i64 {
    5
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            spread_stable_bps: default_spread_stable_bps(),
            spread_grace_days: default_spread_grace_days(),
        }
    }
}

/// Calibration curve settings
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_bins")]
    pub bins: usize,

    #[serde(default = "default_min_bucket_samples")]
    pub min_bucket_samples: usize,

    #[serde(default = "default_min_total_samples")]
    pub min_total_samples: usize,

    /// Deviation from the band midpoint tolerated as well-calibrated
    #[serde(default = "default_deviation_threshold")]
    pub deviation_threshold: f64,
}

fn default_bins() -> usize {
    10
}
fn default_min_bucket_samples() -> usize {
    3
}
fn default_min_total_samples() -> usize {
    10
}
fn default_deviation_threshold() -> f64 {
    0.05
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bins: default_bins(),
            min_bucket_samples: default_min_bucket_samples(),
            min_total_samples: default_min_total_samples(),
            deviation_threshold: default_deviation_threshold(),
        }
    }
}

/// Ensemble weighting settings
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    /// Rolling window for per-source Brier means
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Sample count at which weights become fully empirical
    #[serde(default = "default_target_sample_size")]
    pub target_sample_size: usize,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_window_days() -> i64 {
    365
}
fn default_target_sample_size() -> usize {
    30
}
fn default_epsilon() -> f64 {
    0.01
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            target_sample_size: default_target_sample_size(),
            epsilon: default_epsilon(),
        }
    }
}

/// Review queue trigger weights and thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold: f64,
    #[serde(default = "default_divergence_cap")]
    pub divergence_cap: f64,

    #[serde(default = "default_swing_threshold")]
    pub swing_threshold: f64,
    #[serde(default = "default_swing_cap")]
    pub swing_cap: f64,

    /// Mean Brier above which recent predictions count as poor
    #[serde(default = "default_poor_brier_threshold")]
    pub poor_brier_threshold: f64,
    #[serde(default = "default_poor_prediction_cap")]
    pub poor_prediction_cap: f64,
    /// How many of the latest scored predictions count as recent
    #[serde(default = "default_recent_predictions")]
    pub recent_predictions: usize,

    /// Milestone kinds whose completion always warrants a look
    #[serde(default = "default_high_impact_milestones")]
    pub high_impact_milestones: Vec<String>,
    #[serde(default = "default_milestone_score")]
    pub milestone_score: f64,
}

fn default_divergence_threshold() -> f64 {
    0.10
}
fn default_divergence_cap() -> f64 {
    40.0
}
fn default_swing_threshold() -> f64 {
    0.05
}
fn default_swing_cap() -> f64 {
    30.0
}
fn default_poor_brier_threshold() -> f64 {
    0.25
}
fn default_poor_prediction_cap() -> f64 {
    20.0
}
fn default_recent_predictions() -> usize {
    5
}
fn default_high_impact_milestones() -> Vec<String> {
    vec![
        "regulatory_clearance".to_string(),
        "shareholder_vote".to_string(),
        "financing".to_string(),
    ]
}
fn default_milestone_score() -> f64 {
    15.0
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: default_divergence_threshold(),
            divergence_cap: default_divergence_cap(),
            swing_threshold: default_swing_threshold(),
            swing_cap: default_swing_cap(),
            poor_brier_threshold: default_poor_brier_threshold(),
            poor_prediction_cap: default_poor_prediction_cap(),
            recent_predictions: default_recent_predictions(),
            high_impact_milestones: default_high_impact_milestones(),
            milestone_score: default_milestone_score(),
        }
    }
}

/// Where per-deal context files are read from
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_context_dir")]
    pub context_dir: PathBuf,
}

fn default_context_dir() -> PathBuf {
    PathBuf::from("./context")
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            context_dir: default_context_dir(),
        }
    }
}

/// Durable state location
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state/deal-assess.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus listener port; metrics are not exported when unset
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
