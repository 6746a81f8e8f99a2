// Auto-tuning scheduler
//
// Periodically analyzes each tracked strategy, optimizes and applies when the
// mean overall score drops below the trigger, and measures the impact of
// earlier applications once their after-window has elapsed.

use crate::config::AutoTuneConfig;
use crate::context::TunerContext;
use crate::error::{Result, TunerError};
use crate::optimization::analyzer::PerformanceAnalyzer;
use crate::optimization::applier::OptimizationApplier;
use crate::optimization::collector::hours_after;
use crate::optimization::monitor::{ImpactMonitor, ImpactReport};
use crate::optimization::optimizer::ParameterOptimizer;
use crate::types::{MetricKind, OptimizationResult, RetrievalParameters, RetrievalStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::sleep;

/// Outcome of one auto-tuning cycle for one strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub strategy: RetrievalStrategy,
    pub started_at: DateTime<Utc>,
    /// `None` when the analysis window was empty
    pub mean_overall_score: Option<f64>,
    pub triggered: bool,
    pub optimization: Option<OptimizationResult>,
    pub applied: bool,
    /// Impact reports produced for earlier applications
    pub impacts: Vec<ImpactReport>,
    /// Why an optimization run was triggered but produced nothing
    pub skipped_reason: Option<String>,
    #[serde(with = "serde_duration_millis")]
    pub duration: Duration,
}

mod serde_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Closed-loop tuner driving analyze, optimize, apply, and monitor
pub struct AutoTuner {
    ctx: TunerContext,
    analyzer: PerformanceAnalyzer,
    optimizer: ParameterOptimizer,
    applier: OptimizationApplier,
    monitor: ImpactMonitor,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl AutoTuner {
    pub fn new(ctx: TunerContext) -> Self {
        Self {
            analyzer: PerformanceAnalyzer::new(ctx.clone()),
            optimizer: ParameterOptimizer::new(ctx.clone()),
            applier: OptimizationApplier::new(ctx.clone()),
            monitor: ImpactMonitor::new(ctx.clone()),
            ctx,
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    fn config(&self) -> &AutoTuneConfig {
        &self.ctx.config.auto_tune
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one cycle for the strategy of `current`
    ///
    /// Empty windows and the optimizer's data gate are reported in the cycle
    /// report; store failures are returned as errors.
    pub async fn run_cycle(&self, current: &RetrievalParameters) -> Result<CycleReport> {
        let started = Instant::now();
        let strategy = current.strategy();
        let mut report = CycleReport {
            strategy,
            started_at: Utc::now(),
            mean_overall_score: None,
            triggered: false,
            optimization: None,
            applied: false,
            impacts: Vec::new(),
            skipped_reason: None,
            duration: Duration::ZERO,
        };

        report.impacts = self.monitor_elapsed(strategy).await?;

        let window = self.ctx.config.analyzer.default_window_hours;
        match self.analyzer.analyze(Some(strategy), window).await {
            Ok(analysis) => {
                report.mean_overall_score = analysis.mean(MetricKind::OverallScore);
            }
            Err(TunerError::NoData { .. }) => {
                tracing::debug!("No {} records in the last {} hours", strategy, window);
            }
            Err(e) => return Err(e),
        }

        let trigger = self.config().trigger_score;
        if let Some(score) = report.mean_overall_score.filter(|score| *score < trigger) {
            report.triggered = true;
            tracing::info!(
                "{} mean overall score {:.3} below {:.2}, optimizing",
                strategy,
                score,
                trigger
            );

            match self.optimizer.optimize(current, None).await {
                Ok(result) => {
                    if result.performance_improvement >= self.config().min_apply_improvement {
                        self.applier.apply(&result).await?;
                        report.applied = true;
                    } else {
                        tracing::info!(
                            "Estimated improvement {:+.3} for {} too small to apply",
                            result.performance_improvement,
                            strategy
                        );
                    }
                    report.optimization = Some(result);
                }
                Err(e @ (TunerError::InsufficientData { .. } | TunerError::OptimizationFailed(_))) => {
                    tracing::warn!("Skipping {} optimization: {}", strategy, e);
                    report.skipped_reason = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        report.duration = started.elapsed();
        Ok(report)
    }

    /// Monitor applied results whose after-window has fully elapsed and that
    /// have no stored impact report yet
    async fn monitor_elapsed(&self, strategy: RetrievalStrategy) -> Result<Vec<ImpactReport>> {
        let window_hours = self.ctx.config.monitor.default_window_hours;
        let now = Utc::now();
        let mut impacts = Vec::new();

        for result in self.applier.history(strategy).await? {
            if hours_after(result.applied_at, window_hours as u64)? > now {
                continue;
            }
            if self
                .monitor
                .stored_report(strategy, result.applied_at)
                .await?
                .is_some()
            {
                continue;
            }

            match self.monitor.monitor(&result, window_hours).await {
                Ok(impact) => impacts.push(impact),
                Err(TunerError::InsufficientData { .. }) => {
                    tracing::debug!(
                        "Not enough records to judge {} optimization applied at {}",
                        strategy,
                        result.applied_at
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(impacts)
    }

    /// Loop over `currents` every interval until [`stop`](Self::stop)
    ///
    /// Each cycle starts from the live applied configuration when one exists.
    /// Refuses to run unless `auto_tune.enabled` is set.
    pub async fn start(&self, currents: Vec<RetrievalParameters>) -> Result<()> {
        if !self.config().enabled {
            return Err(TunerError::InvalidOperation(
                "auto-tuning is disabled; set auto_tune.enabled = true".to_string(),
            ));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TunerError::InvalidOperation(
                "auto-tuner is already running".to_string(),
            ));
        }

        let interval = Duration::from_secs(self.config().interval_secs);
        tracing::info!(
            "Starting auto-tuner for {} strategies every {:?}",
            currents.len(),
            interval
        );

        while self.is_running() {
            for fallback in &currents {
                if !self.is_running() {
                    break;
                }

                let current = match self.applier.current(fallback.strategy()).await {
                    Ok(Some(applied)) => applied.parameters,
                    Ok(None) => fallback.clone(),
                    Err(e) => {
                        tracing::warn!("Failed to read live {} configuration: {}", fallback.strategy(), e);
                        fallback.clone()
                    }
                };

                match self.run_cycle(&current).await {
                    Ok(report) => tracing::debug!(
                        "Cycle for {} finished in {:?} (triggered: {}, applied: {})",
                        report.strategy,
                        report.duration,
                        report.triggered,
                        report.applied
                    ),
                    Err(e) => tracing::error!("Auto-tune cycle for {} failed: {}", current.strategy(), e),
                }
            }

            tokio::select! {
                _ = sleep(interval) => {}
                _ = self.wake.notified() => {}
            }
        }

        tracing::info!("Stopping auto-tuner");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}
