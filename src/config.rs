// Tuner Configuration
//
// Thresholds, windows, and search settings for the collect -> analyze ->
// optimize -> apply -> monitor loop. Every field defaults to the stock
// constants, so an empty TOML file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Widest analysis, monitoring, or lookback window accepted (one year)
pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

/// Main tuner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub collector: CollectorConfig,
    pub analyzer: AnalyzerConfig,
    pub optimizer: OptimizerConfig,
    pub applier: ApplierConfig,
    pub monitor: MonitorConfig,
    pub recommendations: RecommendationConfig,
    pub auto_tune: AutoTuneConfig,
}

/// Telemetry ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Size of the recent-records ring in the short-lived cache
    pub recent_capacity: usize,

    /// Upper bound on a single durable write (milliseconds)
    pub write_timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            recent_capacity: 1000,
            write_timeout_ms: 2000,
        }
    }
}

/// Statistical analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub default_window_hours: u32,

    /// Records needed before parameter/metric correlations are computed
    pub min_correlation_records: usize,

    /// Samples needed before a parameter's variation is judged
    pub min_variation_samples: usize,

    /// Coefficient of variation above which a parameter is flagged as tunable
    pub variation_threshold: f64,

    /// Overall-score gap between strategies that warrants a switch
    pub strategy_gap_threshold: f64,

    /// Minimum parameter similarity for a record to inform an estimate
    pub similarity_cutoff: f64,

    /// Estimate returned when no historical record is similar enough
    pub baseline_score: f64,

    pub bottlenecks: BottleneckThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_window_hours: 24,
            min_correlation_records: 10,
            min_variation_samples: 5,
            variation_threshold: 0.2,
            strategy_gap_threshold: 0.1,
            similarity_cutoff: 0.7,
            baseline_score: 0.5,
            bottlenecks: BottleneckThresholds::default(),
        }
    }
}

/// Fixed bottleneck thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BottleneckThresholds {
    pub response_time_medium_secs: f64,
    pub response_time_high_secs: f64,
    pub p95_response_time_secs: f64,
    pub relevance_medium: f64,
    pub relevance_high: f64,
    pub satisfaction_medium: f64,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            response_time_medium_secs: 3.0,
            response_time_high_secs: 5.0,
            p95_response_time_secs: 8.0,
            relevance_medium: 0.7,
            relevance_high: 0.5,
            satisfaction_medium: 0.75,
        }
    }
}

/// Parameter search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Records required for the current strategy over the lookback window
    pub min_records: usize,
    pub lookback_days: u32,

    /// Wall-clock budget for the three searches combined (milliseconds)
    pub search_deadline_ms: u64,

    pub gradient_iterations: usize,
    pub learning_rate: f64,
    pub learning_rate_decay: f64,

    pub random_samples: usize,
    /// Initial standard deviation of the random-search perturbation
    pub exploration_factor: f64,
    /// Fixed seed for reproducible random search
    pub random_seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_records: 20,
            lookback_days: 7,
            search_deadline_ms: 5000,
            gradient_iterations: 10,
            learning_rate: 0.1,
            learning_rate_decay: 0.9,
            random_samples: 20,
            exploration_factor: 0.1,
            random_seed: None,
        }
    }
}

/// Live-configuration publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplierConfig {
    pub config_ttl_hours: u32,
    pub history_limit: usize,
    /// Improvements below this are applied but logged as low confidence
    pub low_improvement_threshold: f64,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            config_ttl_hours: 24,
            history_limit: 50,
            low_improvement_threshold: 0.05,
        }
    }
}

/// Impact verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub default_window_hours: u32,
    /// Share of the expected improvement that must materialize
    pub success_ratio: f64,
    pub report_ttl_days: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_window_hours: 24,
            success_ratio: 0.8,
            report_ttl_days: 7,
        }
    }
}

/// Advisory heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub window_hours: u32,
    pub max_results_step_high: f64,
    pub max_results_step_medium: f64,
    pub similarity_threshold_step: f64,
    pub personalization_step: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            max_results_step_high: 5.0,
            max_results_step_medium: 2.0,
            similarity_threshold_step: 0.1,
            personalization_step: 0.05,
        }
    }
}

/// Background auto-tuning loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoTuneConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Mean overall score below which an optimization run is triggered
    pub trigger_score: f64,
    /// Estimated improvement required before a result is applied
    pub min_apply_improvement: f64,
}

impl Default for AutoTuneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 3600,
            trigger_score: 0.6,
            min_apply_improvement: 0.0,
        }
    }
}

impl TunerConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: TunerConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collector.recent_capacity == 0 {
            return Err(invalid("collector.recent_capacity must be positive"));
        }
        if self.collector.write_timeout_ms == 0 {
            return Err(invalid("collector.write_timeout_ms must be positive"));
        }

        let analyzer = &self.analyzer;
        check_window("analyzer.default_window_hours", analyzer.default_window_hours)?;
        check_unit("analyzer.similarity_cutoff", analyzer.similarity_cutoff)?;
        check_unit("analyzer.baseline_score", analyzer.baseline_score)?;

        let b = &analyzer.bottlenecks;
        if b.response_time_medium_secs >= b.response_time_high_secs {
            return Err(invalid(
                "analyzer.bottlenecks: response_time_medium_secs must be below response_time_high_secs",
            ));
        }
        if b.relevance_high >= b.relevance_medium {
            return Err(invalid(
                "analyzer.bottlenecks: relevance_high must be below relevance_medium",
            ));
        }

        let optimizer = &self.optimizer;
        if optimizer.min_records == 0 {
            return Err(invalid("optimizer.min_records must be positive"));
        }
        check_window(
            "optimizer.lookback_days (in hours)",
            optimizer.lookback_days.saturating_mul(24),
        )?;
        if optimizer.learning_rate <= 0.0 {
            return Err(invalid("optimizer.learning_rate must be positive"));
        }
        check_unit("optimizer.learning_rate_decay", optimizer.learning_rate_decay)?;
        if optimizer.exploration_factor < 0.0 {
            return Err(invalid("optimizer.exploration_factor cannot be negative"));
        }

        if self.applier.config_ttl_hours == 0 || self.applier.history_limit == 0 {
            return Err(invalid(
                "applier: config_ttl_hours and history_limit must be positive",
            ));
        }

        check_window("monitor.default_window_hours", self.monitor.default_window_hours)?;
        if self.monitor.report_ttl_days == 0 {
            return Err(invalid("monitor.report_ttl_days must be positive"));
        }
        check_unit("monitor.success_ratio", self.monitor.success_ratio)?;

        check_window("recommendations.window_hours", self.recommendations.window_hours)?;

        if self.auto_tune.interval_secs < 60 {
            return Err(invalid("auto_tune.interval_secs must be at least 60"));
        }
        check_unit("auto_tune.trigger_score", self.auto_tune.trigger_score)?;

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// Windows live in [1, MAX_WINDOW_HOURS]
fn check_window(name: &str, hours: u32) -> Result<(), ConfigError> {
    if (1..=MAX_WINDOW_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be within [1, {}] hours, got {}",
            name, MAX_WINDOW_HOURS, hours
        )))
    }
}

/// Ratios live in (0, 1]
fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be within (0, 1], got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = TunerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TunerConfig::from_toml("").unwrap();
        assert_eq!(config.collector.recent_capacity, 1000);
        assert_eq!(config.optimizer.min_records, 20);
        assert_eq!(config.applier.history_limit, 50);
        assert!((config.monitor.success_ratio - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml_str = r#"
            [optimizer]
            min_records = 50
            random_seed = 7

            [analyzer.bottlenecks]
            response_time_high_secs = 6.5
        "#;

        let config = TunerConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.optimizer.min_records, 50);
        assert_eq!(config.optimizer.random_seed, Some(7));
        assert_eq!(config.optimizer.gradient_iterations, 10);
        assert!((config.analyzer.bottlenecks.response_time_high_secs - 6.5).abs() < 1e-12);
        assert!((config.analyzer.bottlenecks.response_time_medium_secs - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_unordered_response_thresholds() {
        let mut config = TunerConfig::default();
        config.analyzer.bottlenecks.response_time_medium_secs = 6.0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("response_time_medium_secs must be below"));
    }

    #[test]
    fn test_validate_success_ratio_range() {
        let mut config = TunerConfig::default();
        config.monitor.success_ratio = 1.5;
        assert!(config.validate().is_err());

        config.monitor.success_ratio = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_window_bounds() {
        let mut config = TunerConfig::default();
        config.recommendations.window_hours = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("recommendations.window_hours"));

        let mut config = TunerConfig::default();
        config.analyzer.default_window_hours = 0;
        assert!(config.validate().is_err());

        let mut config = TunerConfig::default();
        config.optimizer.lookback_days = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = TunerConfig::default();
        config.monitor.default_window_hours = MAX_WINDOW_HOURS;
        assert!(config.validate().is_ok());
        config.monitor.default_window_hours = MAX_WINDOW_HOURS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tuner.toml");

        let mut config = TunerConfig::default();
        config.optimizer.random_seed = Some(42);
        config.to_file(&path).unwrap();

        let loaded = TunerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.optimizer.random_seed, Some(42));
        assert_eq!(loaded.collector.write_timeout_ms, 2000);
    }
}
