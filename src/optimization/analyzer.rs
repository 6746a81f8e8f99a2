//! Statistical analysis of collected performance records.
//!
//! Produces a [`PerformanceReport`] for a time window:
//! - Strategy distribution (records per strategy)
//! - Per-metric trends (least-squares slope over time-ordered values)
//! - Parameter/metric Pearson correlations
//! - Bottlenecks (fixed thresholds on aggregate metrics)
//! - Opportunities (high-variance parameters, cross-strategy score gaps)

use crate::config::AnalyzerConfig;
use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::optimization::collector::{hours_before, PerformanceCollector};
use crate::optimization::evaluator::PerformanceEvaluator;
use crate::optimization::stats::{self, MetricStats};
use crate::types::{MetricKind, ParameterField, PerformanceRecord, RetrievalStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Slopes with a smaller magnitude count as flat
const STABLE_SLOPE_EPSILON: f64 = 1e-6;

/// Direction of a metric over the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub slope: f64,
    pub direction: TrendDirection,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckType {
    ResponseTime,
    ResponseTimeP95,
    Relevance,
    UserSatisfaction,
}

/// Aggregate metric crossing a fixed threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    #[serde(rename = "type")]
    pub kind: BottleneckType,
    pub severity: Severity,
    pub description: String,
    pub metric_value: f64,
    pub threshold: f64,
}

/// Detected chance for improvement below bottleneck severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Opportunity {
    ParameterTuning {
        parameter: ParameterField,
        mean: f64,
        coefficient_of_variation: f64,
        /// Value used by the best-scoring record in the window
        best_observed_value: f64,
        expected_impact: f64,
        description: String,
    },
    StrategySwitch {
        from: RetrievalStrategy,
        to: RetrievalStrategy,
        performance_gap: f64,
        expected_impact: f64,
        description: String,
    },
}

impl Opportunity {
    pub fn expected_impact(&self) -> f64 {
        match self {
            Opportunity::ParameterTuning {
                expected_impact, ..
            }
            | Opportunity::StrategySwitch {
                expected_impact, ..
            } => *expected_impact,
        }
    }
}

/// Analysis of one window of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub strategy: Option<RetrievalStrategy>,
    pub window_hours: u32,
    pub total_records: usize,
    pub generated_at: DateTime<Utc>,
    pub strategy_distribution: BTreeMap<RetrievalStrategy, usize>,
    pub metric_summary: BTreeMap<MetricKind, MetricStats>,
    pub trends: BTreeMap<MetricKind, TrendAnalysis>,
    /// Empty when the window holds too few records
    pub correlations: BTreeMap<ParameterField, BTreeMap<MetricKind, f64>>,
    pub bottlenecks: Vec<Bottleneck>,
    pub opportunities: Vec<Opportunity>,
}

impl PerformanceReport {
    pub fn mean(&self, metric: MetricKind) -> Option<f64> {
        self.metric_summary.get(&metric).map(|s| s.mean)
    }

    pub fn bottleneck(&self, kind: BottleneckType) -> Option<&Bottleneck> {
        self.bottlenecks.iter().find(|b| b.kind == kind)
    }
}

/// Window analysis over the durable record history
#[derive(Debug, Clone)]
pub struct PerformanceAnalyzer {
    ctx: TunerContext,
    collector: PerformanceCollector,
}

impl PerformanceAnalyzer {
    pub fn new(ctx: TunerContext) -> Self {
        let collector = PerformanceCollector::new(ctx.clone());
        Self { ctx, collector }
    }

    fn config(&self) -> &AnalyzerConfig {
        &self.ctx.config.analyzer
    }

    /// Analyze the trailing `window_hours`, optionally for one strategy
    ///
    /// Fails with `NoData` when the window is empty and with
    /// `WindowOutOfRange` when it reaches past the representable time range.
    pub async fn analyze(
        &self,
        strategy: Option<RetrievalStrategy>,
        window_hours: u32,
    ) -> Result<PerformanceReport> {
        let end = Utc::now();
        let start = hours_before(end, window_hours as u64)?;

        let records = self
            .collector
            .history(strategy, start, end)
            .await
            .inspect_err(|e| warn!("Failed to load records for analysis: {}", e))?;

        if records.is_empty() {
            debug!("No records in the last {} hours", window_hours);
            return Err(TunerError::NoData { window_hours });
        }

        let report = self.build_report(strategy, window_hours, &records);
        info!(
            "Analyzed {} records: {} bottlenecks, {} opportunities",
            report.total_records,
            report.bottlenecks.len(),
            report.opportunities.len()
        );
        Ok(report)
    }

    /// Evaluation function over a record snapshot, using analyzer settings
    pub fn evaluator<'a>(&self, records: &'a [PerformanceRecord]) -> PerformanceEvaluator<'a> {
        PerformanceEvaluator::new(
            records,
            self.config().similarity_cutoff,
            self.config().baseline_score,
        )
    }

    /// Build the report for an already loaded set of records
    pub fn build_report(
        &self,
        strategy: Option<RetrievalStrategy>,
        window_hours: u32,
        records: &[PerformanceRecord],
    ) -> PerformanceReport {
        let mut ordered: Vec<&PerformanceRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        PerformanceReport {
            strategy,
            window_hours,
            total_records: records.len(),
            generated_at: Utc::now(),
            strategy_distribution: strategy_distribution(&ordered),
            metric_summary: metric_summary(&ordered),
            trends: trends(&ordered),
            correlations: self.correlations(&ordered),
            bottlenecks: self.bottlenecks(&ordered),
            opportunities: self.opportunities(&ordered),
        }
    }

    fn correlations(
        &self,
        records: &[&PerformanceRecord],
    ) -> BTreeMap<ParameterField, BTreeMap<MetricKind, f64>> {
        let mut correlations = BTreeMap::new();
        if records.len() < self.config().min_correlation_records {
            return correlations;
        }

        for field in ParameterField::ALL {
            let params: Vec<f64> = records.iter().map(|r| r.parameters.get(field)).collect();
            let mut by_metric = BTreeMap::new();

            for metric in MetricKind::ALL {
                let values: Vec<f64> = records.iter().map(|r| r.metrics.value(metric)).collect();
                if let Some(r) = stats::pearson(&params, &values) {
                    by_metric.insert(metric, r);
                }
            }

            if !by_metric.is_empty() {
                correlations.insert(field, by_metric);
            }
        }

        correlations
    }

    fn bottlenecks(&self, records: &[&PerformanceRecord]) -> Vec<Bottleneck> {
        let thresholds = &self.config().bottlenecks;
        let mut bottlenecks = Vec::new();

        let response_times = metric_values(records, MetricKind::ResponseTime);
        if let Some(avg) = stats::mean(&response_times) {
            let breached = if avg > thresholds.response_time_high_secs {
                Some((Severity::High, thresholds.response_time_high_secs))
            } else if avg > thresholds.response_time_medium_secs {
                Some((Severity::Medium, thresholds.response_time_medium_secs))
            } else {
                None
            };
            if let Some((severity, threshold)) = breached {
                bottlenecks.push(Bottleneck {
                    kind: BottleneckType::ResponseTime,
                    severity,
                    description: format!(
                        "Average response time {:.2}s exceeds {:.1}s",
                        avg, threshold
                    ),
                    metric_value: avg,
                    threshold,
                });
            }
        }

        if let Some(p95) = stats::percentile(&response_times, 95.0) {
            if p95 > thresholds.p95_response_time_secs {
                bottlenecks.push(Bottleneck {
                    kind: BottleneckType::ResponseTimeP95,
                    severity: Severity::High,
                    description: format!(
                        "P95 response time {:.2}s exceeds {:.1}s",
                        p95, thresholds.p95_response_time_secs
                    ),
                    metric_value: p95,
                    threshold: thresholds.p95_response_time_secs,
                });
            }
        }

        if let Some(avg) = stats::mean(&metric_values(records, MetricKind::RelevanceScore)) {
            let breached = if avg < thresholds.relevance_high {
                Some((Severity::High, thresholds.relevance_high))
            } else if avg < thresholds.relevance_medium {
                Some((Severity::Medium, thresholds.relevance_medium))
            } else {
                None
            };
            if let Some((severity, threshold)) = breached {
                bottlenecks.push(Bottleneck {
                    kind: BottleneckType::Relevance,
                    severity,
                    description: format!(
                        "Average relevance {:.3} is below {:.2}",
                        avg, threshold
                    ),
                    metric_value: avg,
                    threshold,
                });
            }
        }

        if let Some(avg) = stats::mean(&metric_values(records, MetricKind::UserSatisfaction)) {
            if avg < thresholds.satisfaction_medium {
                bottlenecks.push(Bottleneck {
                    kind: BottleneckType::UserSatisfaction,
                    severity: Severity::Medium,
                    description: format!(
                        "Average user satisfaction {:.3} is below {:.2}",
                        avg, thresholds.satisfaction_medium
                    ),
                    metric_value: avg,
                    threshold: thresholds.satisfaction_medium,
                });
            }
        }

        bottlenecks
    }

    fn opportunities(&self, records: &[&PerformanceRecord]) -> Vec<Opportunity> {
        let config = self.config();
        let mut opportunities = Vec::new();

        let best_record = records
            .iter()
            .max_by(|a, b| a.overall_score().total_cmp(&b.overall_score()));

        if records.len() >= config.min_variation_samples {
            for field in ParameterField::ALL {
                let values: Vec<f64> = records.iter().map(|r| r.parameters.get(field)).collect();
                let (Some(cv), Some(mean)) =
                    (stats::coefficient_of_variation(&values), stats::mean(&values))
                else {
                    continue;
                };

                if cv > config.variation_threshold {
                    let best_observed_value = best_record
                        .map(|r| r.parameters.get(field))
                        .unwrap_or(mean);
                    opportunities.push(Opportunity::ParameterTuning {
                        parameter: field,
                        mean,
                        coefficient_of_variation: cv,
                        best_observed_value,
                        expected_impact: (cv * 0.5).min(0.3),
                        description: format!(
                            "{} varies widely (CV {:.2}); tuning it may pay off",
                            field, cv
                        ),
                    });
                }
            }
        }

        let mut by_strategy: BTreeMap<RetrievalStrategy, Vec<f64>> = BTreeMap::new();
        for record in records {
            by_strategy
                .entry(record.strategy())
                .or_default()
                .push(record.overall_score());
        }

        if by_strategy.len() >= 2 {
            let means: Vec<(RetrievalStrategy, f64)> = by_strategy
                .iter()
                .filter_map(|(strategy, scores)| stats::mean(scores).map(|m| (*strategy, m)))
                .collect();

            let best = means.iter().max_by(|a, b| a.1.total_cmp(&b.1));
            let worst = means.iter().min_by(|a, b| a.1.total_cmp(&b.1));

            if let (Some(&(to, best_score)), Some(&(from, worst_score))) = (best, worst) {
                let gap = best_score - worst_score;
                if gap > config.strategy_gap_threshold {
                    opportunities.push(Opportunity::StrategySwitch {
                        from,
                        to,
                        performance_gap: gap,
                        expected_impact: gap * 0.8,
                        description: format!(
                            "{} outscores {} by {:.3} overall",
                            to, from, gap
                        ),
                    });
                }
            }
        }

        opportunities
    }
}

fn metric_values(records: &[&PerformanceRecord], metric: MetricKind) -> Vec<f64> {
    records.iter().map(|r| r.metrics.value(metric)).collect()
}

fn strategy_distribution(records: &[&PerformanceRecord]) -> BTreeMap<RetrievalStrategy, usize> {
    let mut distribution = BTreeMap::new();
    for record in records {
        *distribution.entry(record.strategy()).or_insert(0) += 1;
    }
    distribution
}

/// Mean, P95, and standard deviation for every metric
pub fn metric_summary(records: &[&PerformanceRecord]) -> BTreeMap<MetricKind, MetricStats> {
    MetricKind::ALL
        .into_iter()
        .filter_map(|metric| {
            MetricStats::from_values(&metric_values(records, metric)).map(|s| (metric, s))
        })
        .collect()
}

/// Records must already be in time order
fn trends(records: &[&PerformanceRecord]) -> BTreeMap<MetricKind, TrendAnalysis> {
    let mut trends = BTreeMap::new();

    for metric in MetricKind::ALL {
        let values = metric_values(records, metric);
        let Some(slope) = stats::linear_slope(&values) else {
            continue;
        };

        // Lower response time is better
        let oriented = if metric == MetricKind::ResponseTime {
            -slope
        } else {
            slope
        };
        let direction = if oriented.abs() < STABLE_SLOPE_EPSILON {
            TrendDirection::Stable
        } else if oriented > 0.0 {
            TrendDirection::Improving
        } else {
            TrendDirection::Declining
        };

        trends.insert(
            metric,
            TrendAnalysis {
                slope,
                direction,
                data_points: values.len(),
            },
        );
    }

    trends
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::config::TunerConfig;
    use crate::types::{PerformanceMetrics, RetrievalParameters};

    fn analyzer() -> PerformanceAnalyzer {
        PerformanceAnalyzer::new(TunerContext::in_memory(TunerConfig::default()))
    }

    fn record(
        strategy: RetrievalStrategy,
        minutes_ago: i64,
        relevance: f64,
        response_time: f64,
        satisfaction: f64,
    ) -> PerformanceRecord {
        let metrics = PerformanceMetrics::from_precision_recall(
            relevance,
            response_time,
            satisfaction,
            relevance,
            relevance,
            1,
        )
        .at(Utc::now() - Duration::minutes(minutes_ago));
        PerformanceRecord::observed(
            format!("q-{}", minutes_ago),
            RetrievalParameters::defaults_for(strategy),
            metrics,
        )
    }

    #[test]
    fn test_strategy_distribution_counts() {
        let records = vec![
            record(RetrievalStrategy::HybridSearch, 3, 0.8, 1.0, 0.8),
            record(RetrievalStrategy::HybridSearch, 2, 0.8, 1.0, 0.8),
            record(RetrievalStrategy::KeywordSearch, 1, 0.8, 1.0, 0.8),
        ];

        let report = analyzer().build_report(None, 24, &records);
        assert_eq!(report.total_records, 3);
        assert_eq!(report.strategy_distribution[&RetrievalStrategy::HybridSearch], 2);
        assert_eq!(report.strategy_distribution[&RetrievalStrategy::KeywordSearch], 1);
    }

    #[test]
    fn test_trend_directions() {
        // Oldest first after sorting: relevance rises, response time rises
        let records: Vec<PerformanceRecord> = (0..5)
            .map(|i| {
                record(
                    RetrievalStrategy::HybridSearch,
                    50 - i * 10,
                    0.5 + i as f64 * 0.1,
                    1.0 + i as f64,
                    0.8,
                )
            })
            .collect();

        let report = analyzer().build_report(None, 24, &records);

        let relevance = &report.trends[&MetricKind::RelevanceScore];
        assert_eq!(relevance.direction, TrendDirection::Improving);
        assert!((relevance.slope - 0.1).abs() < 1e-9);
        assert_eq!(relevance.data_points, 5);

        assert_eq!(
            report.trends[&MetricKind::ResponseTime].direction,
            TrendDirection::Declining
        );
        assert_eq!(
            report.trends[&MetricKind::UserSatisfaction].direction,
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_single_record_has_no_trends_or_correlations() {
        let records = vec![record(RetrievalStrategy::HybridSearch, 1, 0.8, 1.0, 0.8)];
        let report = analyzer().build_report(None, 24, &records);
        assert!(report.trends.is_empty());
        assert!(report.correlations.is_empty());
    }

    #[test]
    fn test_response_time_bottleneck_severity() {
        let slow: Vec<PerformanceRecord> = (0..50)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.9, 6.0, 0.9))
            .collect();
        let report = analyzer().build_report(None, 24, &slow);
        let bottleneck = report.bottleneck(BottleneckType::ResponseTime).unwrap();
        assert_eq!(bottleneck.severity, Severity::High);
        assert_eq!(bottleneck.threshold, 5.0);

        let medium: Vec<PerformanceRecord> = (0..10)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.9, 4.0, 0.9))
            .collect();
        let report = analyzer().build_report(None, 24, &medium);
        assert_eq!(
            report.bottleneck(BottleneckType::ResponseTime).unwrap().severity,
            Severity::Medium
        );

        let fast: Vec<PerformanceRecord> = (0..50)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.9, 1.0, 0.9))
            .collect();
        let report = analyzer().build_report(None, 24, &fast);
        assert!(report.bottleneck(BottleneckType::ResponseTime).is_none());
        assert!(report.bottleneck(BottleneckType::ResponseTimeP95).is_none());
        assert!(report.bottlenecks.is_empty());
    }

    #[test]
    fn test_tail_latency_bottleneck() {
        let mut records: Vec<PerformanceRecord> = (0..18)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.9, 1.0, 0.9))
            .collect();
        records.push(record(RetrievalStrategy::HybridSearch, 30, 0.9, 12.0, 0.9));
        records.push(record(RetrievalStrategy::HybridSearch, 31, 0.9, 12.0, 0.9));

        let report = analyzer().build_report(None, 24, &records);
        let p95 = report.bottleneck(BottleneckType::ResponseTimeP95).unwrap();
        assert_eq!(p95.severity, Severity::High);
        // Average is 2.1s, below the medium threshold
        assert!(report.bottleneck(BottleneckType::ResponseTime).is_none());
    }

    #[test]
    fn test_relevance_and_satisfaction_bottlenecks() {
        let records: Vec<PerformanceRecord> = (0..10)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.4, 1.0, 0.6))
            .collect();
        let report = analyzer().build_report(None, 24, &records);

        let relevance = report.bottleneck(BottleneckType::Relevance).unwrap();
        assert_eq!(relevance.severity, Severity::High);
        assert_eq!(relevance.threshold, 0.5);

        let satisfaction = report.bottleneck(BottleneckType::UserSatisfaction).unwrap();
        assert_eq!(satisfaction.severity, Severity::Medium);
    }

    #[test]
    fn test_medium_relevance_bottleneck_band() {
        let records: Vec<PerformanceRecord> = (0..10)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.6, 1.0, 0.9))
            .collect();
        let report = analyzer().build_report(None, 24, &records);
        let relevance = report.bottleneck(BottleneckType::Relevance).unwrap();
        assert_eq!(relevance.severity, Severity::Medium);
        assert_eq!(relevance.threshold, 0.7);
        assert!((relevance.metric_value - 0.6).abs() < 1e-12);

        // Lower edge of the band is medium, not high
        let records: Vec<PerformanceRecord> = (0..10)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.5, 1.0, 0.9))
            .collect();
        let report = analyzer().build_report(None, 24, &records);
        assert_eq!(
            report.bottleneck(BottleneckType::Relevance).unwrap().severity,
            Severity::Medium
        );

        // Upper edge is healthy
        let records = vec![record(RetrievalStrategy::HybridSearch, 1, 0.7, 1.0, 0.9)];
        let report = analyzer().build_report(None, 24, &records);
        assert!(report.bottleneck(BottleneckType::Relevance).is_none());
    }

    #[test]
    fn test_parameter_variation_opportunity() {
        let records: Vec<PerformanceRecord> = [5.0, 10.0, 20.0, 40.0, 50.0]
            .iter()
            .enumerate()
            .map(|(i, max_results)| {
                let metrics = PerformanceMetrics::new(0.5 + i as f64 * 0.1, 1.0, 0.8, 0.8, 0.8, 0.8, 1);
                PerformanceRecord::new(
                    format!("q-{}", i),
                    RetrievalParameters::defaults_for(RetrievalStrategy::HybridSearch)
                        .with_clamped(ParameterField::MaxResults, *max_results),
                    metrics,
                )
            })
            .collect();

        let report = analyzer().build_report(None, 24, &records);
        let tuning = report
            .opportunities
            .iter()
            .find_map(|o| match o {
                Opportunity::ParameterTuning {
                    parameter: ParameterField::MaxResults,
                    coefficient_of_variation,
                    best_observed_value,
                    expected_impact,
                    ..
                } => Some((*coefficient_of_variation, *best_observed_value, *expected_impact)),
                _ => None,
            })
            .expect("max_results should be flagged");

        assert!(tuning.0 > 0.2);
        assert_eq!(tuning.1, 50.0);
        assert!((tuning.2 - (tuning.0 * 0.5).min(0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_strategy_switch_opportunity() {
        let mut records: Vec<PerformanceRecord> = (0..5)
            .map(|i| record(RetrievalStrategy::HybridSearch, i, 0.9, 0.5, 0.9))
            .collect();
        records.extend((5..10).map(|i| record(RetrievalStrategy::KeywordSearch, i, 0.3, 6.0, 0.3)));

        let report = analyzer().build_report(None, 24, &records);
        let switch = report
            .opportunities
            .iter()
            .find(|o| matches!(o, Opportunity::StrategySwitch { .. }))
            .expect("switch opportunity");

        match switch {
            Opportunity::StrategySwitch {
                from,
                to,
                performance_gap,
                expected_impact,
                ..
            } => {
                assert_eq!(*from, RetrievalStrategy::KeywordSearch);
                assert_eq!(*to, RetrievalStrategy::HybridSearch);
                assert!(*performance_gap > 0.1);
                assert!((expected_impact - performance_gap * 0.8).abs() < 1e-12);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_analyze_empty_window_is_no_data() {
        let err = analyzer()
            .analyze(Some(RetrievalStrategy::HybridSearch), 24)
            .await
            .unwrap_err();
        assert!(matches!(err, TunerError::NoData { window_hours: 24 }));
    }

    #[tokio::test]
    async fn test_analyze_unrepresentable_window_fails() {
        let err = analyzer().analyze(None, u32::MAX).await.unwrap_err();
        assert!(matches!(
            err,
            TunerError::WindowOutOfRange { window_hours } if window_hours == u32::MAX as u64
        ));
    }
}
