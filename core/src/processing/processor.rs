use crate::ingest::{Event, Reading};
use crate::prelude::{GuardConfig, GuardResult};
use crate::processing::outlier_guard::OutlierGuard;
use crate::processing::resource_guardian::ResourceGuardian;
use crate::processing::robust_stats::RobustStatsEngine;
use crate::processing::sanitizer::Sanitizer;
use crate::processing::state::PipelineState;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::telemetry::report::{GuardSignal, Telemetry, TelemetryReport};
use serde::{Deserialize, Serialize};

/// Everything one call hands back besides the updated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Finite readings in non-decreasing timestamp order. Ordering holds
    /// within this call only: a reading older than something emitted by an
    /// earlier call is still emitted here and counted as late in telemetry.
    pub readings: Vec<Reading>,
    pub center: f64,
    pub spread: f64,
    pub telemetry: Telemetry,
}

impl BatchOutcome {
    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|reading| reading.value).collect()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.readings.iter().map(|reading| reading.timestamp).collect()
    }
}

/// Sanitizer, robust statistics, outlier guard and resource guardian run in
/// sequence over one batch against a caller-owned [`PipelineState`].
pub struct BatchProcessor {
    config: GuardConfig,
    sanitizer: Sanitizer,
    stats: RobustStatsEngine,
    guard: OutlierGuard,
    guardian: ResourceGuardian,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl BatchProcessor {
    pub fn new(config: GuardConfig) -> GuardResult<Self> {
        config.validate()?;
        Ok(Self {
            sanitizer: Sanitizer::new(),
            stats: RobustStatsEngine::new(&config),
            guard: OutlierGuard::new(&config),
            guardian: ResourceGuardian::new(&config),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("batch-processor"),
            config,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// State for the first call of a new stream.
    pub fn fresh_state(&self) -> PipelineState {
        PipelineState::new(&self.config)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Runs one batch through every stage. Never fails: malformed input,
    /// degenerate statistics and oversized batches are absorbed and reported
    /// through the returned telemetry.
    pub fn process_batch(&self, events: &[Event], state: &mut PipelineState) -> BatchOutcome {
        let offered = events.len();

        let sanitized = self.sanitizer.sanitize(events, &mut state.degradation);
        let accepted = sanitized.readings.len();
        let rejected = sanitized.rejected();

        let stats = self
            .stats
            .estimate(&state.history, &sanitized.readings, &state.stats);
        state.stats = stats;

        let decision = self.guard.partition(sanitized.readings, &stats);
        let verdict = self.guardian.commit(
            &decision.retained,
            offered,
            decision.capped + decision.filtered,
            state,
        );
        state.calls += 1;

        let mut report = TelemetryReport {
            signals: Vec::new(),
            offered,
            accepted,
            rejected,
            rejected_value: sanitized.rejected_value,
            rejected_timestamp: sanitized.rejected_timestamp,
            capped: decision.capped,
            filtered: decision.filtered,
            protected: decision.protected,
            emitted: decision.retained.len(),
            evicted: verdict.evicted,
            late: verdict.late,
            center: stats.center,
            spread: stats.spread,
            effective_threshold: decision.effective_threshold,
            buffer_len: state.history.len(),
            buffer_capacity: state.history.capacity(),
            shed_rate: verdict.shed_rate,
            churn_rate: verdict.churn_rate,
            backpressure: verdict.backpressure,
            sustained: verdict.sustained,
        };
        report.raise(GuardSignal::Rejected, rejected > 0);
        report.raise(GuardSignal::Reordered, sanitized.reordered);
        report.raise(GuardSignal::LateArrival, verdict.late > 0);
        report.raise(GuardSignal::SpreadFloored, stats.floored && accepted > 0);
        report.raise(GuardSignal::Capped, decision.capped > 0);
        report.raise(GuardSignal::Filtered, decision.filtered > 0);
        report.raise(GuardSignal::ToleranceWidened, decision.widened);
        report.raise(GuardSignal::Evicted, verdict.evicted > 0);
        report.raise(GuardSignal::Backpressure, verdict.backpressure);
        report.raise(GuardSignal::Sustained, verdict.sustained);

        self.metrics.record_batch(&report);
        self.logger.record(&format!(
            "batch {} offered {} emitted {} rejected {} filtered {} evicted {} buffer {}/{}",
            state.calls,
            offered,
            report.emitted,
            rejected,
            report.filtered + report.capped,
            report.evicted,
            report.buffer_len,
            report.buffer_capacity
        ));
        state.telemetry = report.clone();

        BatchOutcome {
            readings: decision.retained,
            center: stats.center,
            spread: stats.spread,
            telemetry: Telemetry::from_report(report),
        }
    }
}
