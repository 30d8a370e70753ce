use crate::ingest::Reading;
use crate::math::stats::StatsHelper;
use crate::prelude::GuardConfig;
use crate::processing::robust_stats::RobustAccumulator;
use crate::telemetry::log::LogManager;

/// Result of partitioning one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardDecision {
    /// Retained readings, in the order they were offered.
    pub retained: Vec<Reading>,
    /// Removed by the hard ceiling.
    pub capped: usize,
    /// Removed by the z-score filter.
    pub filtered: usize,
    /// Over the threshold but kept as members of a coherent cluster.
    pub protected: usize,
    pub effective_threshold: f64,
    pub widened: bool,
}

/// Third stage: hard cap plus a z-score filter that widens instead of
/// deleting a legitimate minority pattern.
pub struct OutlierGuard {
    config: GuardConfig,
    logger: LogManager,
}

impl OutlierGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            config: config.clone(),
            logger: LogManager::new("outlier-guard"),
        }
    }

    pub fn partition(&self, readings: Vec<Reading>, stats: &RobustAccumulator) -> GuardDecision {
        let ceiling = self.config.sane_ceiling;
        let offered = readings.len();
        let candidates: Vec<Reading> = readings
            .into_iter()
            .filter(|reading| reading.value.abs() <= ceiling)
            .collect();
        let capped = offered - candidates.len();

        let spread = stats.spread.max(self.config.min_spread);
        let scores: Vec<f64> = candidates
            .iter()
            .map(|reading| (reading.value - stats.center).abs() / spread)
            .collect();
        let clustered = self.coherent_members(&candidates, spread);

        let threshold = self.config.z_threshold;
        let flagged: Vec<usize> = (0..candidates.len())
            .filter(|&idx| scores[idx] > threshold)
            .collect();
        let protected = flagged.iter().filter(|&&idx| clustered[idx]).count();
        let mut removable: Vec<usize> = flagged
            .into_iter()
            .filter(|&idx| !clustered[idx])
            .collect();

        // the cap is a share of the whole statistics window, so a short batch
        // after a long history can still shed its spikes
        let base = stats.window.max(candidates.len());
        let allowed = (base as f64 * self.config.max_filter_fraction).floor() as usize;
        let mut effective_threshold = threshold;
        let widened = removable.len() > allowed;
        if widened {
            let mut ranked: Vec<f64> = removable.iter().map(|&idx| scores[idx]).collect();
            ranked.sort_by(|a, b| b.total_cmp(a));
            effective_threshold = ranked[allowed];
            removable.retain(|&idx| scores[idx] > effective_threshold);
        }

        let mut removed = vec![false; candidates.len()];
        for &idx in &removable {
            removed[idx] = true;
        }
        let retained: Vec<Reading> = candidates
            .into_iter()
            .zip(removed)
            .filter_map(|(reading, dropped)| (!dropped).then_some(reading))
            .collect();

        if widened {
            self.logger.trace_stage(&format!(
                "tolerance widened to {:.3} to keep removal within {} of {}",
                effective_threshold, allowed, base
            ));
        }

        GuardDecision {
            retained,
            capped,
            filtered: removable.len(),
            protected,
            effective_threshold,
            widened,
        }
    }

    /// Marks readings that sit in a cluster large enough to count as a mode.
    fn coherent_members(&self, candidates: &[Reading], spread: f64) -> Vec<bool> {
        let total = candidates.len();
        let mut order: Vec<usize> = (0..total).collect();
        order.sort_by(|&a, &b| candidates[a].value.total_cmp(&candidates[b].value));
        let sorted: Vec<f64> = order.iter().map(|&idx| candidates[idx].value).collect();

        let gap = spread * self.config.cluster_gap_factor;
        let min_members = (self.config.min_cluster_fraction * total as f64)
            .ceil()
            .max(self.config.min_cluster_size as f64) as usize;

        let mut clustered = vec![false; total];
        for cluster in StatsHelper::clusters(&sorted, gap, self.config.cluster_relative_gap) {
            if cluster.len() >= min_members {
                for &idx in &order[cluster] {
                    clustered[idx] = true;
                }
            }
        }
        clustered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .enumerate()
            .map(|(idx, &value)| Reading::new(value, idx as f64))
            .collect()
    }

    fn stats(center: f64, spread: f64) -> RobustAccumulator {
        windowed(center, spread, 0)
    }

    fn windowed(center: f64, spread: f64, window: usize) -> RobustAccumulator {
        RobustAccumulator {
            center,
            spread,
            window,
            floored: false,
            trimmed: 0,
        }
    }

    #[test]
    fn isolated_spike_is_filtered() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let mut values = vec![10.0, 10.2, 9.8, 10.1, 9.9, 10.0, 10.3, 9.7];
        values.push(400.0);
        let decision = guard.partition(readings(&values), &stats(10.0, 0.3));
        assert_eq!(decision.filtered, 1);
        assert_eq!(decision.retained.len(), 8);
        assert!(decision.retained.iter().all(|r| r.value < 11.0));
        assert!(!decision.widened);
    }

    #[test]
    fn values_beyond_ceiling_are_capped() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let decision = guard.partition(
            readings(&[1000.0, 1000.0, 950.0, -5000.0, 50.0]),
            &stats(1000.0, 1.0),
        );
        assert_eq!(decision.capped, 4);
        assert_eq!(decision.retained.len(), 1);
        assert_eq!(decision.retained[0].value, 50.0);
    }

    #[test]
    fn coherent_minority_cluster_is_protected() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let mut values = vec![10.0; 16];
        values.extend([50.0, 50.5, 49.5, 50.0]);
        let decision = guard.partition(readings(&values), &stats(10.0, 0.01));
        assert_eq!(decision.filtered, 0);
        assert_eq!(decision.protected, 4);
        assert_eq!(decision.retained.len(), 20);
    }

    #[test]
    fn removal_beyond_fraction_widens_tolerance() {
        let config = GuardConfig {
            min_cluster_size: 10,
            ..Default::default()
        };
        let guard = OutlierGuard::new(&config);
        // eight scattered values, none forming a cluster, five far away
        let values = [0.0, 0.1, -0.1, 20.0, 40.0, 60.0, 80.0, 100.0];
        let decision = guard.partition(readings(&values), &stats(0.0, 1.0));
        assert!(decision.widened);
        assert_eq!(decision.filtered, 2);
        assert_eq!(decision.effective_threshold, 60.0);
        let kept: Vec<f64> = decision.retained.iter().map(|r| r.value).collect();
        assert_eq!(kept, vec![0.0, 0.1, -0.1, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn lone_spike_in_short_batch_is_filtered_against_history() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let decision = guard.partition(readings(&[850.0, 10.0, 10.0]), &windowed(10.0, 0.01, 203));
        assert_eq!(decision.filtered, 1);
        assert!(!decision.widened);
        let kept: Vec<f64> = decision.retained.iter().map(|r| r.value).collect();
        assert_eq!(kept, vec![10.0, 10.0]);
    }

    #[test]
    fn several_spikes_in_small_batch_are_all_filtered() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let mut values = vec![10.0; 7];
        values.extend([500.0, 650.0, 880.0]);
        let decision = guard.partition(readings(&values), &windowed(10.0, 0.01, 210));
        assert_eq!(decision.filtered, 3);
        assert!(!decision.widened);
        assert_eq!(decision.effective_threshold, 3.0);
        assert!(decision.retained.iter().all(|r| r.value == 10.0));
    }

    #[test]
    fn empty_input_yields_empty_decision() {
        let guard = OutlierGuard::new(&GuardConfig::default());
        let decision = guard.partition(Vec::new(), &stats(0.0, 1.0));
        assert!(decision.retained.is_empty());
        assert_eq!(decision.filtered + decision.capped, 0);
    }
}
