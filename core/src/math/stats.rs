use std::ops::Range;

/// Scale factor that makes the MAD comparable to a standard deviation under
/// Gaussian noise.
pub const MAD_SCALE: f64 = 1.4826;

pub struct StatsHelper;

impl StatsHelper {
    pub fn sorted(values: &[f64]) -> Vec<f64> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    /// Median of an already sorted slice.
    pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
        let len = sorted.len();
        match len {
            0 => None,
            _ if len % 2 == 1 => Some(sorted[len / 2]),
            _ => Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0),
        }
    }

    pub fn median(values: &[f64]) -> Option<f64> {
        Self::median_sorted(&Self::sorted(values))
    }

    /// Median absolute deviation around `center` (unscaled).
    pub fn mad(values: &[f64], center: f64) -> Option<f64> {
        let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
        Self::median(&deviations)
    }

    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Splits a sorted slice into runs of neighbouring values. Two neighbours
    /// stay together while their distance is at most `gap` or at most
    /// `relative_gap` of the larger magnitude.
    pub fn clusters(sorted: &[f64], gap: f64, relative_gap: f64) -> Vec<Range<usize>> {
        let mut clusters = Vec::new();
        if sorted.is_empty() {
            return clusters;
        }
        let mut start = 0;
        for idx in 1..sorted.len() {
            let (lower, upper) = (sorted[idx - 1], sorted[idx]);
            let allowed = gap.max(relative_gap * lower.abs().max(upper.abs()));
            if upper - lower > allowed {
                clusters.push(start..idx);
                start = idx;
            }
        }
        clusters.push(start..sorted.len());
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_empty_is_none() {
        assert_eq!(StatsHelper::median(&[]), None);
        assert_eq!(StatsHelper::mean(&[]), None);
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(StatsHelper::median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn mad_ignores_a_single_spike() {
        let values = [10.0, 10.0, 11.0, 9.0, 1000.0];
        let center = StatsHelper::median(&values).unwrap();
        assert_eq!(center, 10.0);
        assert_eq!(StatsHelper::mad(&values, center), Some(1.0));
    }

    #[test]
    fn clusters_split_on_wide_gaps() {
        let sorted = [1.0, 1.1, 1.2, 5.0, 5.1, 20.0];
        let clusters = StatsHelper::clusters(&sorted, 0.5, 0.0);
        assert_eq!(clusters, vec![0..3, 3..5, 5..6]);
        assert!(StatsHelper::clusters(&[], 1.0, 0.0).is_empty());
    }

    #[test]
    fn relative_gap_joins_distant_but_proportionally_close_values() {
        let sorted = [10.0, 49.5, 50.0, 50.5];
        let clusters = StatsHelper::clusters(&sorted, 0.04, 0.02);
        assert_eq!(clusters, vec![0..1, 1..4]);
    }
}
