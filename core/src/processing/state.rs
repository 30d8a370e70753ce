use crate::prelude::GuardConfig;
use crate::processing::history::HistoryBuffer;
use crate::processing::robust_stats::RobustAccumulator;
use crate::telemetry::TelemetryReport;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Caller-owned state threaded through every `process_batch` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub history: HistoryBuffer,
    pub stats: RobustAccumulator,
    /// Report of the most recent call, kept even when that call was quiet.
    pub telemetry: TelemetryReport,
    pub degradation: DegradationTracker,
    /// Largest timestamp emitted so far.
    pub watermark: Option<f64>,
    pub calls: u64,
}

impl PipelineState {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            history: HistoryBuffer::with_capacity(config.max_buffer),
            stats: RobustAccumulator::seed(config.min_spread),
            telemetry: TelemetryReport::default(),
            degradation: DegradationTracker::default(),
            watermark: None,
            calls: 0,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}

/// Per-call counts kept in the rolling degradation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSample {
    pub offered: usize,
    pub shed: usize,
    pub evicted: usize,
}

/// Aggregate rates over the rolling window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowRates {
    pub shed_rate: f64,
    pub evicted: usize,
}

/// Rolling error/backpressure counter used to detect sustained degradation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationTracker {
    samples: VecDeque<CallSample>,
    pending_rejected: usize,
    pub consecutive_backpressure: usize,
    pub total_rejected: u64,
    pub total_filtered: u64,
    pub total_evicted: u64,
}

impl DegradationTracker {
    /// Counts rejections for the call in progress.
    pub fn note_rejections(&mut self, count: usize) {
        self.pending_rejected += count;
        self.total_rejected += count as u64;
    }

    pub fn pending_rejections(&self) -> usize {
        self.pending_rejected
    }

    /// Closes the call in progress and returns the rates over the last
    /// `window` calls, this one included.
    pub fn close_call(
        &mut self,
        offered: usize,
        filtered: usize,
        evicted: usize,
        window: usize,
    ) -> WindowRates {
        let sample = CallSample {
            offered,
            shed: self.pending_rejected + filtered,
            evicted,
        };
        self.pending_rejected = 0;
        self.total_filtered += filtered as u64;
        self.total_evicted += evicted as u64;

        self.samples.push_back(sample);
        while self.samples.len() > window.max(1) {
            self.samples.pop_front();
        }

        let offered: usize = self.samples.iter().map(|s| s.offered).sum();
        let shed: usize = self.samples.iter().map(|s| s.shed).sum();
        let shed_rate = if offered == 0 {
            0.0
        } else {
            shed as f64 / offered as f64
        };
        WindowRates {
            shed_rate,
            evicted: self.samples.iter().map(|s| s.evicted).sum(),
        }
    }

    /// Updates the consecutive-backpressure streak and returns its length.
    pub fn note_backpressure(&mut self, fired: bool) -> usize {
        if fired {
            self.consecutive_backpressure += 1;
        } else {
            self.consecutive_backpressure = 0;
        }
        self.consecutive_backpressure
    }

    pub fn window_len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rates_cover_recent_calls_only() {
        let mut tracker = DegradationTracker::default();
        tracker.note_rejections(10);
        let rates = tracker.close_call(10, 0, 0, 2);
        assert_eq!(rates.shed_rate, 1.0);

        tracker.close_call(10, 0, 5, 2);
        let rates = tracker.close_call(10, 0, 1, 2);
        assert_eq!(tracker.window_len(), 2);
        assert_eq!(rates.shed_rate, 0.0);
        assert_eq!(rates.evicted, 6);
        assert_eq!(tracker.total_rejected, 10);
        assert_eq!(tracker.pending_rejections(), 0);
    }

    #[test]
    fn empty_calls_report_zero_rate() {
        let mut tracker = DegradationTracker::default();
        let rates = tracker.close_call(0, 0, 0, 4);
        assert_eq!(rates.shed_rate, 0.0);
        assert_eq!(rates.evicted, 0);
    }

    #[test]
    fn backpressure_streak_resets() {
        let mut tracker = DegradationTracker::default();
        assert_eq!(tracker.note_backpressure(true), 1);
        assert_eq!(tracker.note_backpressure(true), 2);
        assert_eq!(tracker.note_backpressure(false), 0);
    }

    #[test]
    fn fresh_state_uses_configured_capacity() {
        let config = GuardConfig {
            max_buffer: 12,
            ..Default::default()
        };
        let state = PipelineState::new(&config);
        assert_eq!(state.history.capacity(), 12);
        assert!(state.history.is_empty());
        assert!(state.stats.spread > 0.0);
    }
}
