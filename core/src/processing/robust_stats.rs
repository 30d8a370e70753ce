use crate::ingest::Reading;
use crate::math::stats::{StatsHelper, MAD_SCALE};
use crate::prelude::{CenterEstimator, GuardConfig};
use crate::processing::history::HistoryBuffer;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Running location/scale estimate carried in the pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustAccumulator {
    pub center: f64,
    /// Always strictly positive.
    pub spread: f64,
    /// Number of admissible values the estimate was formed from.
    pub window: usize,
    /// Whether the spread floor replaced the measured spread.
    pub floored: bool,
    /// Values trimmed from each tail.
    pub trimmed: usize,
}

impl RobustAccumulator {
    pub fn seed(min_spread: f64) -> Self {
        Self {
            center: 0.0,
            spread: min_spread,
            window: 0,
            floored: true,
            trimmed: 0,
        }
    }
}

/// Median/MAD engine over the recent history plus the incoming batch.
pub struct RobustStatsEngine {
    config: GuardConfig,
    logger: LogManager,
}

impl RobustStatsEngine {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            config: config.clone(),
            logger: LogManager::new("robust-stats"),
        }
    }

    pub fn estimate(
        &self,
        history: &HistoryBuffer,
        fresh: &[Reading],
        carried: &RobustAccumulator,
    ) -> RobustAccumulator {
        let ceiling = self.config.sane_ceiling;
        let window: Vec<f64> = history
            .recent(self.config.stats_window)
            .chain(fresh.iter())
            .map(|reading| reading.value)
            .filter(|value| value.abs() <= ceiling)
            .collect();

        if window.is_empty() {
            self.logger
                .trace_stage("no admissible values, reusing carried estimate");
            return RobustAccumulator {
                window: 0,
                trimmed: 0,
                ..*carried
            };
        }

        let sorted = StatsHelper::sorted(&window);
        let median = StatsHelper::median_sorted(&sorted).unwrap_or(carried.center);
        let (center, trimmed) = match self.config.center_estimator {
            CenterEstimator::Median => (median, 0),
            CenterEstimator::TrimmedMean { fraction } => {
                self.trimmed_center(&sorted, median, fraction)
            }
        };

        let raw = StatsHelper::mad(&sorted, center).unwrap_or(0.0) * MAD_SCALE;
        let floor = self.spread_floor(center);
        let floored = raw.is_nan() || raw <= floor;
        let spread = if floored { floor } else { raw };

        self.logger.trace_stage(&format!(
            "center {:.4} spread {:.4} window {} trimmed {}{}",
            center,
            spread,
            sorted.len(),
            trimmed,
            if floored { " (floored)" } else { "" }
        ));

        RobustAccumulator {
            center,
            spread,
            window: sorted.len(),
            floored,
            trimmed,
        }
    }

    fn spread_floor(&self, center: f64) -> f64 {
        self.config
            .min_spread
            .max(self.config.min_relative_spread * center.abs())
    }

    /// Trimmed mean whose trim never removes every member of a value cluster
    /// beyond what `min_cluster_retention` allows.
    fn trimmed_center(&self, sorted: &[f64], median: f64, fraction: f64) -> (f64, usize) {
        let len = sorted.len();
        let fraction = fraction.min(self.config.max_trim_fraction).max(0.0);
        let mut trim = (len as f64 * fraction).floor() as usize;

        let pilot = StatsHelper::mad(sorted, median).unwrap_or(0.0) * MAD_SCALE;
        let gap = pilot.max(self.spread_floor(median)) * self.config.cluster_gap_factor;
        let clusters = StatsHelper::clusters(sorted, gap, self.config.cluster_relative_gap);
        let required =
            (clusters.len() as f64 * self.config.min_cluster_retention).ceil() as usize;

        while trim > 0 {
            let kept = trim..len - trim;
            let surviving = clusters
                .iter()
                .filter(|cluster| cluster.start < kept.end && cluster.end > kept.start)
                .count();
            if surviving >= required {
                break;
            }
            trim -= 1;
        }

        let center = StatsHelper::mean(&sorted[trim..len - trim]).unwrap_or(median);
        (center, trim)
    }
}
