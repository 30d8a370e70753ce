use serde::{Deserialize, Serialize};

/// Guard conditions that can fire during one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardSignal {
    Rejected,
    Reordered,
    LateArrival,
    SpreadFloored,
    Capped,
    Filtered,
    ToleranceWidened,
    Evicted,
    Backpressure,
    Sustained,
}

/// Diagnostic record for one `process_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub signals: Vec<GuardSignal>,
    pub offered: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejected_value: usize,
    pub rejected_timestamp: usize,
    pub capped: usize,
    pub filtered: usize,
    pub protected: usize,
    pub emitted: usize,
    pub evicted: usize,
    pub late: usize,
    pub center: f64,
    pub spread: f64,
    pub effective_threshold: f64,
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    pub shed_rate: f64,
    pub churn_rate: f64,
    pub backpressure: bool,
    pub sustained: bool,
}

impl TelemetryReport {
    pub fn has(&self, signal: GuardSignal) -> bool {
        self.signals.contains(&signal)
    }

    pub(crate) fn raise(&mut self, signal: GuardSignal, fired: bool) {
        if fired && !self.has(signal) {
            self.signals.push(signal);
        }
    }
}

/// Outward health signal: either nothing fired or a full diagnostic record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum Telemetry {
    #[default]
    Quiet,
    Report(TelemetryReport),
}

impl Telemetry {
    pub fn from_report(report: TelemetryReport) -> Self {
        if report.signals.is_empty() {
            Telemetry::Quiet
        } else {
            Telemetry::Report(report)
        }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Telemetry::Quiet)
    }

    pub fn report(&self) -> Option<&TelemetryReport> {
        match self {
            Telemetry::Quiet => None,
            Telemetry::Report(report) => Some(report),
        }
    }

    pub fn backpressure(&self) -> bool {
        self.report().map(|report| report.backpressure).unwrap_or(false)
    }
}
