use crate::telemetry::report::TelemetryReport;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Cumulative counters across every call served by one processor.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub offered: u64,
    pub emitted: u64,
    pub rejected: u64,
    pub filtered: u64,
    pub evicted: u64,
    pub backpressure_calls: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_batch(&self, report: &TelemetryReport) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.batches += 1;
            metrics.offered += report.offered as u64;
            metrics.emitted += report.emitted as u64;
            metrics.rejected += report.rejected as u64;
            metrics.filtered += (report.filtered + report.capped) as u64;
            metrics.evicted += report.evicted as u64;
            if report.backpressure {
                metrics.backpressure_calls += 1;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
