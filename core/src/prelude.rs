use serde::{Deserialize, Serialize};

/// Estimator used for the robust center of the active window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CenterEstimator {
    #[default]
    Median,
    /// Mean after trimming `fraction` of the window from each tail.
    TrimmedMean { fraction: f64 },
}

/// Policy constants shared by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Ceiling on the carried history buffer.
    pub max_buffer: usize,
    /// Number of most recent history values folded into the estimate.
    pub stats_window: usize,
    pub z_threshold: f64,
    /// Hard cap on `|value|` for anything emitted.
    pub sane_ceiling: f64,
    pub min_spread: f64,
    pub min_relative_spread: f64,
    pub center_estimator: CenterEstimator,
    /// Upper bound on the per-tail trim fraction.
    pub max_trim_fraction: f64,
    /// Share of value clusters that must survive trimming.
    pub min_cluster_retention: f64,
    /// Largest share of candidates the z filter may remove in one call.
    pub max_filter_fraction: f64,
    pub min_cluster_size: usize,
    pub min_cluster_fraction: f64,
    /// Gap between neighbouring sorted values, in spreads, that splits clusters.
    pub cluster_gap_factor: f64,
    /// Gap, as a share of the larger neighbour's magnitude, that still joins a cluster.
    pub cluster_relative_gap: f64,
    /// Number of calls in the rolling degradation window.
    pub rate_window: usize,
    pub backpressure_shed_rate: f64,
    /// Evictions over the window, in buffer capacities, that count as churn.
    pub backpressure_churn: f64,
    pub sustained_calls: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_buffer: 240,
            stats_window: 240,
            z_threshold: 3.0,
            sane_ceiling: 900.0,
            min_spread: 1e-3,
            min_relative_spread: 1e-3,
            center_estimator: CenterEstimator::Median,
            max_trim_fraction: 0.25,
            min_cluster_retention: 1.0,
            max_filter_fraction: 0.25,
            min_cluster_size: 3,
            min_cluster_fraction: 0.05,
            cluster_gap_factor: 4.0,
            cluster_relative_gap: 0.02,
            rate_window: 8,
            backpressure_shed_rate: 0.5,
            backpressure_churn: 4.0,
            sustained_calls: 3,
        }
    }
}

impl GuardConfig {
    /// Checks every constant before a processor is built from it.
    pub fn validate(&self) -> GuardResult<()> {
        if self.max_buffer == 0 {
            return Err(invalid("max_buffer must be at least 1"));
        }
        if self.stats_window == 0 {
            return Err(invalid("stats_window must be at least 1"));
        }
        if self.rate_window == 0 {
            return Err(invalid("rate_window must be at least 1"));
        }
        if self.sustained_calls == 0 {
            return Err(invalid("sustained_calls must be at least 1"));
        }
        if self.min_cluster_size == 0 {
            return Err(invalid("min_cluster_size must be at least 1"));
        }
        positive("z_threshold", self.z_threshold)?;
        positive("sane_ceiling", self.sane_ceiling)?;
        positive("min_spread", self.min_spread)?;
        positive("cluster_gap_factor", self.cluster_gap_factor)?;
        positive("backpressure_churn", self.backpressure_churn)?;
        unit_interval("min_relative_spread", self.min_relative_spread)?;
        unit_interval("min_cluster_retention", self.min_cluster_retention)?;
        unit_interval("max_filter_fraction", self.max_filter_fraction)?;
        unit_interval("min_cluster_fraction", self.min_cluster_fraction)?;
        unit_interval("cluster_relative_gap", self.cluster_relative_gap)?;
        unit_interval("backpressure_shed_rate", self.backpressure_shed_rate)?;
        if self.backpressure_shed_rate == 0.0 {
            return Err(invalid("backpressure_shed_rate must be above 0"));
        }
        below_half("max_trim_fraction", self.max_trim_fraction)?;
        if let CenterEstimator::TrimmedMean { fraction } = self.center_estimator {
            below_half("center_estimator.fraction", fraction)?;
        }
        Ok(())
    }
}

fn invalid(message: &str) -> GuardError {
    GuardError::InvalidConfig(message.to_string())
}

fn positive(name: &str, value: f64) -> GuardResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GuardError::InvalidConfig(format!(
            "{} must be finite and positive, got {}",
            name, value
        )))
    }
}

fn unit_interval(name: &str, value: f64) -> GuardResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GuardError::InvalidConfig(format!(
            "{} must lie in [0, 1], got {}",
            name, value
        )))
    }
}

fn below_half(name: &str, value: f64) -> GuardResult<()> {
    if (0.0..0.5).contains(&value) {
        Ok(())
    } else {
        Err(GuardError::InvalidConfig(format!(
            "{} must lie in [0, 0.5), got {}",
            name, value
        )))
    }
}

/// Errors raised at construction and decoding boundaries. Batch processing
/// itself never fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("history holds {len} readings but capacity is {capacity}")]
    StateCapacity { len: usize, capacity: usize },
}

pub type GuardResult<T> = Result<T, GuardError>;
