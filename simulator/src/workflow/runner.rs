use crate::generator::profile::{build_batch_from_config, GeneratorConfig, ScenarioKind};
use crate::workflow::config::WorkflowConfig;
use anyhow::{anyhow, Context};
use guardcore::telemetry::MetricsSnapshot;
use guardcore::{BatchOutcome, BatchProcessor, Event, PipelineState, Telemetry};
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub values: Vec<f64>,
    pub timestamps: Vec<f64>,
    pub emitted: usize,
    pub center: f64,
    pub spread: f64,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub telemetry: Telemetry,
}

impl WorkflowResult {
    fn from_outcome(outcome: BatchOutcome, state: &PipelineState) -> Self {
        Self {
            values: outcome.values(),
            timestamps: outcome.timestamps(),
            emitted: outcome.readings.len(),
            center: outcome.center,
            spread: outcome.spread,
            buffer_len: state.history.len(),
            buffer_capacity: state.history.capacity(),
            telemetry: outcome.telemetry,
        }
    }
}

/// Totals for one scenario replayed against its own state.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub scenario: ScenarioKind,
    pub batches: usize,
    pub offered: usize,
    pub emitted: usize,
    pub rejected: usize,
    pub filtered: usize,
    pub evicted: usize,
    pub backpressure_calls: usize,
    pub sustained: bool,
    pub center: f64,
    pub spread: f64,
    pub buffer_len: usize,
    pub max_emitted: Option<f64>,
}

impl ScenarioSummary {
    fn new(scenario: ScenarioKind) -> Self {
        Self {
            scenario,
            batches: 0,
            offered: 0,
            emitted: 0,
            rejected: 0,
            filtered: 0,
            evicted: 0,
            backpressure_calls: 0,
            sustained: false,
            center: 0.0,
            spread: 0.0,
            buffer_len: 0,
            max_emitted: None,
        }
    }

    fn absorb(&mut self, offered: usize, outcome: &BatchOutcome, state: &PipelineState) {
        self.batches += 1;
        self.offered += offered;
        self.emitted += outcome.readings.len();
        if let Some(report) = outcome.telemetry.report() {
            self.rejected += report.rejected;
            self.filtered += report.filtered + report.capped;
            self.evicted += report.evicted;
            if report.backpressure {
                self.backpressure_calls += 1;
            }
            self.sustained |= report.sustained;
        }
        self.center = outcome.center;
        self.spread = outcome.spread;
        self.buffer_len = state.history.len();
        self.max_emitted = outcome
            .readings
            .iter()
            .map(|reading| reading.value)
            .chain(self.max_emitted)
            .reduce(f64::max);
    }
}

/// Owns one processor and the pipeline state shared by every clone.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    processor: Arc<BatchProcessor>,
    state: Arc<Mutex<PipelineState>>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let processor =
            BatchProcessor::new(config.to_guard_config()).context("building batch processor")?;
        let state = processor.fresh_state();
        Ok(Self {
            config,
            processor: Arc::new(processor),
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.processor.metrics()
    }

    /// Runs `events` against the shared state.
    pub fn execute(&self, events: &[Event]) -> anyhow::Result<WorkflowResult> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("pipeline state lock poisoned"))?;
        let outcome = self.processor.process_batch(events, &mut state);
        Ok(WorkflowResult::from_outcome(outcome, &state))
    }

    pub fn execute_generated(&self, generator: &GeneratorConfig) -> anyhow::Result<WorkflowResult> {
        let events = build_batch_from_config(generator)
            .with_context(|| format!("generating {} batch", generator.scenario.name()))?;
        self.execute(&events)
    }

    /// Replays `scenario` for the configured number of batches on a fresh
    /// state, leaving the shared state untouched.
    pub fn run_scenario(&self, scenario: ScenarioKind) -> anyhow::Result<ScenarioSummary> {
        let mut state = self.processor.fresh_state();
        let mut summary = ScenarioSummary::new(scenario);
        for index in 0..self.config.batches.max(1) {
            let generator = self.config.generator_for(scenario, index);
            let events = build_batch_from_config(&generator)
                .with_context(|| format!("generating {} batch {}", scenario.name(), index))?;
            let outcome = self.processor.process_batch(&events, &mut state);
            summary.absorb(events.len(), &outcome, &state);
        }
        Ok(summary)
    }

    pub fn run_workflow(&self) -> anyhow::Result<Vec<ScenarioSummary>> {
        self.config
            .scenarios
            .iter()
            .map(|&scenario| self.run_scenario(scenario))
            .collect()
    }
}
