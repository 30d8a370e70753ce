use crate::ingest::Reading;
use crate::prelude::GuardConfig;
use crate::processing::state::PipelineState;
use crate::telemetry::log::LogManager;

/// Outcome of the bounded-memory and backpressure checks for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceVerdict {
    pub evicted: usize,
    /// Emitted readings older than the watermark of earlier calls.
    pub late: usize,
    pub shed_rate: f64,
    /// Evictions over the rolling window, in buffer capacities.
    pub churn_rate: f64,
    pub backpressure: bool,
    pub sustained: bool,
}

/// Final stage: commits retained readings to the bounded history and decides
/// whether to raise backpressure.
pub struct ResourceGuardian {
    config: GuardConfig,
    logger: LogManager,
}

impl ResourceGuardian {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            config: config.clone(),
            logger: LogManager::new("resource-guardian"),
        }
    }

    /// `shed` counts readings the guard removed this call; rejections were
    /// already noted on the tracker by the sanitizer.
    pub fn commit(
        &self,
        retained: &[Reading],
        offered: usize,
        shed: usize,
        state: &mut PipelineState,
    ) -> ResourceVerdict {
        // a state built under another config is brought back to this ceiling
        let mut evicted = state.history.set_capacity(self.config.max_buffer);

        let late = match state.watermark {
            Some(mark) => retained.iter().filter(|r| r.timestamp < mark).count(),
            None => 0,
        };
        if let Some(last) = retained.last() {
            let mark = state
                .watermark
                .map_or(last.timestamp, |mark| mark.max(last.timestamp));
            state.watermark = Some(mark);
        }

        evicted += state.history.extend_bounded(retained.iter().cloned());

        let rates = state
            .degradation
            .close_call(offered, shed, evicted, self.config.rate_window);
        let churn_rate = rates.evicted as f64 / self.config.max_buffer as f64;
        // an idle call carries no traffic to push back on and holds the streak
        let idle = offered == 0;
        let backpressure = !idle
            && (rates.shed_rate >= self.config.backpressure_shed_rate
                || churn_rate >= self.config.backpressure_churn);
        let sustained = if idle {
            false
        } else {
            state.degradation.note_backpressure(backpressure) >= self.config.sustained_calls
        };
        let streak = state.degradation.consecutive_backpressure;

        if sustained {
            self.logger.alert(&format!(
                "sustained backpressure for {} calls (shed rate {:.2}, churn {:.2})",
                streak, rates.shed_rate, churn_rate
            ));
        } else if backpressure {
            self.logger.alert(&format!(
                "backpressure raised (shed rate {:.2}, churn {:.2})",
                rates.shed_rate, churn_rate
            ));
        }

        ResourceVerdict {
            evicted,
            late,
            shed_rate: rates.shed_rate,
            churn_rate,
            backpressure,
            sustained,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(count: usize, start: f64) -> Vec<Reading> {
        (0..count)
            .map(|i| Reading::new(1.0, start + i as f64))
            .collect()
    }

    #[test]
    fn history_never_exceeds_ceiling() {
        let config = GuardConfig {
            max_buffer: 10,
            ..Default::default()
        };
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);

        let verdict = guardian.commit(&readings(25, 0.0), 25, 0, &mut state);
        assert_eq!(state.history.len(), 10);
        assert_eq!(verdict.evicted, 15);
        assert_eq!(state.history.latest().unwrap().timestamp, 24.0);
    }

    #[test]
    fn oversized_carried_state_is_shrunk() {
        let wide = GuardConfig {
            max_buffer: 260,
            ..Default::default()
        };
        let mut state = PipelineState::new(&wide);
        state.history.extend_bounded(readings(250, -300.0));

        let guardian = ResourceGuardian::new(&GuardConfig::default());
        let verdict = guardian.commit(&readings(60, 0.0), 60, 0, &mut state);
        assert_eq!(state.history.capacity(), 240);
        assert_eq!(state.history.len(), 240);
        assert_eq!(verdict.evicted, 70);
    }

    #[test]
    fn high_shed_rate_raises_backpressure_and_sustains() {
        let config = GuardConfig::default();
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);

        let verdicts: Vec<ResourceVerdict> = (0..config.sustained_calls)
            .map(|_| {
                state.degradation.note_rejections(8);
                guardian.commit(&readings(2, 0.0), 10, 0, &mut state)
            })
            .collect();
        assert!(verdicts.iter().all(|verdict| verdict.backpressure));
        let last = verdicts.last().unwrap();
        assert!(last.sustained);
        assert!((last.shed_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn churn_raises_backpressure() {
        let config = GuardConfig {
            max_buffer: 10,
            backpressure_churn: 2.0,
            ..Default::default()
        };
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);
        let verdict = guardian.commit(&readings(40, 0.0), 40, 0, &mut state);
        assert_eq!(verdict.evicted, 30);
        assert!(verdict.churn_rate >= 2.0);
        assert!(verdict.backpressure);
    }

    #[test]
    fn late_readings_are_counted_against_watermark() {
        let config = GuardConfig::default();
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);

        guardian.commit(&readings(3, 10.0), 3, 0, &mut state);
        assert_eq!(state.watermark, Some(12.0));
        let verdict = guardian.commit(&readings(4, 10.0), 4, 0, &mut state);
        assert_eq!(verdict.late, 2);
        assert_eq!(state.watermark, Some(13.0));
    }

    #[test]
    fn idle_calls_after_a_bad_batch_stay_calm() {
        let config = GuardConfig::default();
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);

        state.degradation.note_rejections(3);
        let verdict = guardian.commit(&[], 3, 0, &mut state);
        assert!(verdict.backpressure);
        assert_eq!(state.degradation.consecutive_backpressure, 1);

        for _ in 0..config.sustained_calls + 1 {
            let verdict = guardian.commit(&[], 0, 0, &mut state);
            assert!(!verdict.backpressure);
            assert!(!verdict.sustained);
        }
        assert_eq!(state.degradation.consecutive_backpressure, 1);

        // the streak resumes once traffic returns
        state.degradation.note_rejections(3);
        guardian.commit(&[], 3, 0, &mut state);
        assert_eq!(state.degradation.consecutive_backpressure, 2);
    }

    #[test]
    fn empty_commit_leaves_history_alone() {
        let config = GuardConfig::default();
        let guardian = ResourceGuardian::new(&config);
        let mut state = PipelineState::new(&config);
        guardian.commit(&readings(5, 0.0), 5, 0, &mut state);
        let before = state.history.clone();

        for _ in 0..4 {
            let verdict = guardian.commit(&[], 0, 0, &mut state);
            assert_eq!(verdict.evicted, 0);
            assert!(!verdict.backpressure);
        }
        assert_eq!(state.history, before);
    }
}
